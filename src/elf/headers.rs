//! ELF header parsing

use crate::elf::types::*;
use crate::elf::utils::EndianRead;
use crate::elf::width::{Elf32, ElfLayout};

/// Parse and validate the identification block.
///
/// Checks run in a fixed order: minimum length (a 32-bit file header), magic,
/// class, then byte order.
pub fn parse_ident(data: &[u8]) -> Result<ElfIdent> {
    if data.len() < Elf32::EHDR_SIZE {
        return Err(ElfError::Truncated {
            offset: 0,
            needed: Elf32::EHDR_SIZE as u64,
        });
    }

    if &data[0..4] != ELF_MAGIC {
        return Err(ElfError::InvalidMagic);
    }

    let class = ElfClass::from_u8(data[EI_CLASS])?;
    let endian = Endian::from_u8(data[EI_DATA])?;

    let mut bytes = [0u8; EI_NIDENT];
    bytes.copy_from_slice(&data[..EI_NIDENT]);

    Ok(ElfIdent {
        bytes,
        class,
        endian,
        version: data[EI_VERSION],
        osabi: data[EI_OSABI],
        abiversion: data[EI_ABIVERSION],
    })
}

/// Parse the file header for one class.
///
/// Fields after `e_version` are shifted by the word size, which is the only
/// difference between the two layouts.
pub fn parse_header<L: ElfLayout>(data: &[u8], ident: ElfIdent) -> Result<ElfHeader> {
    if ident.class != L::CLASS {
        return Err(ElfError::invariant("file header layout does not match EI_CLASS"));
    }

    if data.len() < L::EHDR_SIZE {
        return Err(ElfError::Truncated {
            offset: 0,
            needed: L::EHDR_SIZE as u64,
        });
    }

    let endian = ident.endian;
    let w = L::WORD_SIZE;
    let tail = 24 + 3 * w;

    let header = ElfHeader {
        ident,
        e_type: data.read_u16(16, endian)?,
        e_machine: data.read_u16(18, endian)?,
        e_version: data.read_u32(20, endian)?,
        e_entry: L::read_addr(data, 24, endian)?,
        e_phoff: L::read_addr(data, 24 + w, endian)?,
        e_shoff: L::read_addr(data, 24 + 2 * w, endian)?,
        e_flags: data.read_u32(tail, endian)?,
        e_ehsize: data.read_u16(tail + 4, endian)?,
        e_phentsize: data.read_u16(tail + 6, endian)?,
        e_phnum: data.read_u16(tail + 8, endian)?,
        e_shentsize: data.read_u16(tail + 10, endian)?,
        e_shnum: data.read_u16(tail + 12, endian)?,
        e_shstrndx: data.read_u16(tail + 14, endian)?,
    };

    validate_header::<L>(&header)?;
    Ok(header)
}

fn validate_header<L: ElfLayout>(header: &ElfHeader) -> Result<()> {
    if header.e_ehsize as usize != L::EHDR_SIZE {
        return Err(ElfError::MalformedHeader(format!(
            "Invalid e_ehsize: expected {}, got {}",
            L::EHDR_SIZE,
            header.e_ehsize
        )));
    }

    if header.e_phnum > 0 && header.e_phentsize as usize != L::PHDR_SIZE {
        return Err(ElfError::MalformedHeader(format!(
            "Invalid e_phentsize: expected {}, got {}",
            L::PHDR_SIZE,
            header.e_phentsize
        )));
    }

    // e_shnum may be zero with a table present (extended numbering)
    if header.e_shoff != 0 && header.e_shentsize as usize != L::SHDR_SIZE {
        return Err(ElfError::MalformedHeader(format!(
            "Invalid e_shentsize: expected {}, got {}",
            L::SHDR_SIZE,
            header.e_shentsize
        )));
    }

    Ok(())
}
