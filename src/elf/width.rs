//! Word-width abstraction over 32-bit and 64-bit ELF records.
//!
//! Every table walk in this crate is written once against [`ElfLayout`] and
//! instantiated for [`Elf32`] or [`Elf64`]. The image picks the instantiation
//! from `EI_CLASS` exactly once; records are then widened into the
//! class-independent types in [`crate::elf::types`].
//!
//! Records whose fields only differ in width (file header, section header,
//! dynamic entry) are decoded by the generic functions below using
//! [`ElfLayout::WORD_SIZE`]. Program headers and symbols reorder their fields
//! between classes, so each layout decodes those itself.

use crate::elf::types::*;
use crate::elf::utils::EndianRead;

/// On-disk record layout for one ELF class.
pub trait ElfLayout: Send + Sync + 'static {
    /// Unsigned word type (`Elf32_Addr` / `Elf64_Addr`).
    type Word: Copy + Into<u64>;

    const CLASS: ElfClass;
    const WORD_SIZE: usize;
    const EHDR_SIZE: usize;
    const PHDR_SIZE: usize;
    const SHDR_SIZE: usize;
    const SYM_SIZE: usize;
    const DYN_SIZE: usize;

    fn read_word(data: &[u8], offset: usize, endian: Endian) -> Result<Self::Word>;

    /// Signed word, widened to `i64`.
    fn read_sword(data: &[u8], offset: usize, endian: Endian) -> Result<i64>;

    fn parse_program_header(data: &[u8], offset: usize, endian: Endian) -> Result<ProgramHeader>;

    fn parse_symbol(data: &[u8], offset: usize, endian: Endian) -> Result<RawSymbol>;

    /// Read a word and widen it to `u64`.
    fn read_addr(data: &[u8], offset: usize, endian: Endian) -> Result<u64> {
        Self::read_word(data, offset, endian).map(Into::into)
    }
}

/// 32-bit records (`ELFCLASS32`)
#[derive(Debug, Clone, Copy)]
pub struct Elf32;

/// 64-bit records (`ELFCLASS64`)
#[derive(Debug, Clone, Copy)]
pub struct Elf64;

impl ElfLayout for Elf32 {
    type Word = u32;

    const CLASS: ElfClass = ElfClass::Elf32;
    const WORD_SIZE: usize = 4;
    const EHDR_SIZE: usize = 52;
    const PHDR_SIZE: usize = 32;
    const SHDR_SIZE: usize = 40;
    const SYM_SIZE: usize = 16;
    const DYN_SIZE: usize = 8;

    fn read_word(data: &[u8], offset: usize, endian: Endian) -> Result<u32> {
        data.read_u32(offset, endian)
    }

    fn read_sword(data: &[u8], offset: usize, endian: Endian) -> Result<i64> {
        data.read_i32(offset, endian).map(i64::from)
    }

    fn parse_program_header(data: &[u8], offset: usize, endian: Endian) -> Result<ProgramHeader> {
        Ok(ProgramHeader {
            p_type: data.read_u32(offset, endian)?,
            p_offset: Self::read_addr(data, offset + 4, endian)?,
            p_vaddr: Self::read_addr(data, offset + 8, endian)?,
            p_paddr: Self::read_addr(data, offset + 12, endian)?,
            p_filesz: Self::read_addr(data, offset + 16, endian)?,
            p_memsz: Self::read_addr(data, offset + 20, endian)?,
            p_flags: data.read_u32(offset + 24, endian)?,
            p_align: Self::read_addr(data, offset + 28, endian)?,
        })
    }

    fn parse_symbol(data: &[u8], offset: usize, endian: Endian) -> Result<RawSymbol> {
        Ok(RawSymbol {
            st_name: data.read_u32(offset, endian)?,
            st_value: Self::read_addr(data, offset + 4, endian)?,
            st_size: Self::read_addr(data, offset + 8, endian)?,
            st_info: data.read_u8(offset + 12)?,
            st_other: data.read_u8(offset + 13)?,
            st_shndx: data.read_u16(offset + 14, endian)?,
        })
    }
}

impl ElfLayout for Elf64 {
    type Word = u64;

    const CLASS: ElfClass = ElfClass::Elf64;
    const WORD_SIZE: usize = 8;
    const EHDR_SIZE: usize = 64;
    const PHDR_SIZE: usize = 56;
    const SHDR_SIZE: usize = 64;
    const SYM_SIZE: usize = 24;
    const DYN_SIZE: usize = 16;

    fn read_word(data: &[u8], offset: usize, endian: Endian) -> Result<u64> {
        data.read_u64(offset, endian)
    }

    fn read_sword(data: &[u8], offset: usize, endian: Endian) -> Result<i64> {
        data.read_i64(offset, endian)
    }

    fn parse_program_header(data: &[u8], offset: usize, endian: Endian) -> Result<ProgramHeader> {
        Ok(ProgramHeader {
            p_type: data.read_u32(offset, endian)?,
            p_flags: data.read_u32(offset + 4, endian)?,
            p_offset: data.read_u64(offset + 8, endian)?,
            p_vaddr: data.read_u64(offset + 16, endian)?,
            p_paddr: data.read_u64(offset + 24, endian)?,
            p_filesz: data.read_u64(offset + 32, endian)?,
            p_memsz: data.read_u64(offset + 40, endian)?,
            p_align: data.read_u64(offset + 48, endian)?,
        })
    }

    fn parse_symbol(data: &[u8], offset: usize, endian: Endian) -> Result<RawSymbol> {
        Ok(RawSymbol {
            st_name: data.read_u32(offset, endian)?,
            st_info: data.read_u8(offset + 4)?,
            st_other: data.read_u8(offset + 5)?,
            st_shndx: data.read_u16(offset + 6, endian)?,
            st_value: data.read_u64(offset + 8, endian)?,
            st_size: data.read_u64(offset + 16, endian)?,
        })
    }
}

/// Decode a section header. Field order is identical in both classes.
pub fn parse_section_header<L: ElfLayout>(
    data: &[u8],
    offset: usize,
    endian: Endian,
) -> Result<SectionHeader> {
    let w = L::WORD_SIZE;
    Ok(SectionHeader {
        sh_name: data.read_u32(offset, endian)?,
        sh_type: data.read_u32(offset + 4, endian)?,
        sh_flags: L::read_addr(data, offset + 8, endian)?,
        sh_addr: L::read_addr(data, offset + 8 + w, endian)?,
        sh_offset: L::read_addr(data, offset + 8 + 2 * w, endian)?,
        sh_size: L::read_addr(data, offset + 8 + 3 * w, endian)?,
        sh_link: data.read_u32(offset + 8 + 4 * w, endian)?,
        sh_info: data.read_u32(offset + 12 + 4 * w, endian)?,
        sh_addralign: L::read_addr(data, offset + 16 + 4 * w, endian)?,
        sh_entsize: L::read_addr(data, offset + 16 + 5 * w, endian)?,
    })
}

/// Decode a dynamic entry: a signed tag followed by a word value.
pub fn parse_dynamic_entry<L: ElfLayout>(
    data: &[u8],
    offset: usize,
    endian: Endian,
) -> Result<DynamicEntry> {
    Ok(DynamicEntry {
        d_tag: L::read_sword(data, offset, endian)?,
        d_val: L::read_addr(data, offset + L::WORD_SIZE, endian)?,
    })
}
