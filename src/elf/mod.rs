//! ELF (Executable and Linkable Format) parser
//!
//! Builds an immutable [`ElfImage`] from a byte buffer: header, sections,
//! program headers, symbol tables and dynamic linking information, for both
//! 32-bit and 64-bit files in either byte order.

pub mod dynamic;
pub mod headers;
pub mod image;
pub mod sections;
pub mod segments;
pub mod symbols;
pub mod types;
pub mod utils;
pub mod width;

pub use dynamic::DynamicInfo;
pub use image::ElfImage;
pub use sections::{Section, SectionTable};
pub use segments::{ProgramHeaderTable, Segment};
pub use symbols::{Symbol, SymbolBind, SymbolTable, SymbolType, SymbolVisibility};
pub use types::*;
