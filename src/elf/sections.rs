//! Section header table

use bytes::Bytes;
use std::collections::HashMap;
use tracing::trace;

use crate::config::ParseConfig;
use crate::elf::types::*;
use crate::elf::utils::{checked_range, checked_table, read_cstring};
use crate::elf::width::{parse_section_header, ElfLayout};

/// One row of the section header table with its name resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    index: usize,
    name: String,
    header: SectionHeader,
    data: Bytes,
}

impl Section {
    /// Position in the section header table
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &SectionHeader {
        &self.header
    }

    pub fn section_type(&self) -> u32 {
        self.header.sh_type
    }

    pub fn flags(&self) -> u64 {
        self.header.sh_flags
    }

    pub fn addr(&self) -> u64 {
        self.header.sh_addr
    }

    pub fn offset(&self) -> u64 {
        self.header.sh_offset
    }

    pub fn size(&self) -> u64 {
        self.header.sh_size
    }

    pub fn link(&self) -> u32 {
        self.header.sh_link
    }

    pub fn info(&self) -> u32 {
        self.header.sh_info
    }

    pub fn addralign(&self) -> u64 {
        self.header.sh_addralign
    }

    pub fn entsize(&self) -> u64 {
        self.header.sh_entsize
    }

    /// File contents of the section. Empty for `SHT_NOBITS`.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn is_executable(&self) -> bool {
        (self.header.sh_flags & SHF_EXECINSTR) != 0
    }

    pub fn is_writable(&self) -> bool {
        (self.header.sh_flags & SHF_WRITE) != 0
    }

    pub fn is_allocated(&self) -> bool {
        (self.header.sh_flags & SHF_ALLOC) != 0
    }

    pub fn is_nobits(&self) -> bool {
        self.header.sh_type == SHT_NOBITS
    }

    fn contains_addr(&self, addr: u64) -> bool {
        self.is_allocated()
            && addr >= self.header.sh_addr
            && addr - self.header.sh_addr < self.header.sh_size
    }
}

/// Section table with a name index
#[derive(Debug, Clone, Default)]
pub struct SectionTable {
    sections: Vec<Section>,
    by_name: HashMap<String, usize>,
    shstrndx: u32,
}

impl SectionTable {
    /// Parse the section header table from ELF data.
    ///
    /// Any header, name or data range that falls outside the buffer fails the
    /// whole table.
    pub fn parse<L: ElfLayout>(data: &Bytes, header: &ElfHeader, config: &ParseConfig) -> Result<Self> {
        if header.e_shoff == 0 {
            return Ok(Self::default());
        }

        let endian = header.ident.endian;
        let shdr_size = L::SHDR_SIZE as u64;

        // Section 0 carries the real count and string index when they overflow
        // the 16-bit header fields.
        let first_range = checked_table(header.e_shoff, shdr_size, 1, data.len())?;
        let first = parse_section_header::<L>(data, first_range.start, endian)?;

        let count = if header.e_shnum == 0 {
            first.sh_size
        } else {
            u64::from(header.e_shnum)
        };
        ParseConfig::check("sections", count as usize, config.max_sections)?;

        let table = checked_table(header.e_shoff, shdr_size, count, data.len())?;
        let headers = table
            .step_by(L::SHDR_SIZE)
            .map(|offset| parse_section_header::<L>(data, offset, endian))
            .collect::<Result<Vec<_>>>()?;

        let shstrndx = if header.e_shstrndx == SHN_XINDEX {
            first.sh_link
        } else {
            u32::from(header.e_shstrndx)
        };

        let strings: &[u8] = if shstrndx == u32::from(SHN_UNDEF) {
            &[]
        } else {
            let strtab = headers
                .get(shstrndx as usize)
                .ok_or(ElfError::InvalidSectionIndex(shstrndx))?;
            &data[checked_range(strtab.sh_offset, strtab.sh_size, data.len())?]
        };

        let mut sections = Vec::with_capacity(headers.len());
        let mut by_name = HashMap::with_capacity(headers.len());
        for (index, sh) in headers.into_iter().enumerate() {
            let name = if strings.is_empty() {
                String::new()
            } else {
                read_cstring(strings, sh.sh_name as usize)?
            };

            let section_data = if sh.sh_type == SHT_NOBITS {
                Bytes::new()
            } else {
                data.slice(checked_range(sh.sh_offset, sh.sh_size, data.len())?)
            };

            trace!(index, name = %name, sh_type = sh.sh_type, size = sh.sh_size, "section");

            // Later sections shadow earlier ones with the same name
            by_name.insert(name.clone(), index);
            sections.push(Section {
                index,
                name,
                header: sh,
                data: section_data,
            });
        }

        Ok(Self {
            sections,
            by_name,
            shstrndx,
        })
    }

    /// Get section by name
    pub fn by_name(&self, name: &str) -> Option<&Section> {
        self.by_name.get(name).and_then(|&idx| self.by_index(idx))
    }

    /// Get section by index
    pub fn by_index(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    /// First section of the given type
    pub fn by_type(&self, sh_type: u32) -> Option<&Section> {
        self.sections.iter().find(|s| s.section_type() == sh_type)
    }

    /// Find the allocated section containing a virtual address
    pub fn by_addr(&self, addr: u64) -> Option<&Section> {
        self.sections.iter().find(|s| s.contains_addr(addr))
    }

    /// Get all sections in table order
    pub fn iter(&self) -> std::slice::Iter<'_, Section> {
        self.sections.iter()
    }

    /// Count sections
    pub fn count(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Index of the section-name string table, after extended numbering
    pub fn shstrndx(&self) -> u32 {
        self.shstrndx
    }
}

impl<'a> IntoIterator for &'a SectionTable {
    type Item = &'a Section;
    type IntoIter = std::slice::Iter<'a, Section>;

    fn into_iter(self) -> Self::IntoIter {
        self.sections.iter()
    }
}
