//! Read-only ELF image parsing.
//!
//! [`ElfImage`] turns a complete ELF file into typed, queryable structures:
//! the file header, sections indexed by position and name, program headers,
//! static and dynamic symbol tables with address resolution, and dynamic
//! linking information.
//!
//! ```no_run
//! use elfimage::ElfImage;
//!
//! let image = ElfImage::open("/bin/true")?;
//! println!("{} ({}-bit)", image.machine_name(), image.elf_type().bits());
//! if let Some(sym) = image.find_symbol(image.entry(), true) {
//!     println!("entry is in {}", sym.name());
//! }
//! # Ok::<(), elfimage::Error>(())
//! ```

pub mod config;
pub mod demangle;
pub mod elf;
pub mod error;
pub mod io;
pub mod logging;

pub use config::ParseConfig;
pub use elf::{
    DynamicInfo, ElfClass, ElfError, ElfImage, Endian, ProgramHeaderTable, Section, SectionTable,
    Segment, Symbol, SymbolBind, SymbolTable, SymbolType,
};
pub use error::{Error, Result};
