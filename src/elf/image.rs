//! The parsed ELF image and its query surface

use bytes::Bytes;
use std::path::Path;
use tracing::debug;

use crate::config::ParseConfig;
use crate::elf::dynamic::DynamicInfo;
use crate::elf::headers::{parse_header, parse_ident};
use crate::elf::sections::{Section, SectionTable};
use crate::elf::segments::ProgramHeaderTable;
use crate::elf::symbols::{Symbol, SymbolTable};
use crate::elf::types::*;
use crate::elf::utils::{checked_range, read_cstring};
use crate::elf::width::{Elf32, Elf64, ElfLayout};
use crate::io::{IOLimits, SafeReader};

/// A fully parsed, immutable ELF file.
///
/// Construction reads every table once; all queries afterwards are lookups
/// into owned structures, so an `ElfImage` can be shared across threads.
/// Section and segment contents are views into the image's own buffer.
#[derive(Debug, Clone)]
pub struct ElfImage {
    data: Bytes,
    header: ElfHeader,
    sections: SectionTable,
    program_headers: ProgramHeaderTable,
    symtab: Option<SymbolTable>,
    dynsym: Option<SymbolTable>,
    dynamic: Option<DynamicInfo>,
    interpreter: Option<String>,
}

impl ElfImage {
    /// Parse an in-memory ELF file with default limits.
    pub fn parse(data: impl Into<Bytes>) -> Result<Self> {
        Self::parse_with(data, &ParseConfig::default())
    }

    /// Parse an in-memory ELF file.
    ///
    /// Fails without producing an image if the identification block is
    /// invalid or any table, string or data range lies outside the buffer.
    pub fn parse_with(data: impl Into<Bytes>, config: &ParseConfig) -> Result<Self> {
        let data = data.into();
        let ident = parse_ident(&data)?;
        match ident.class {
            ElfClass::Elf32 => Self::build::<Elf32>(data, ident, config),
            ElfClass::Elf64 => Self::build::<Elf64>(data, ident, config),
        }
    }

    /// Load and parse a file with default limits.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        Self::open_with(path, &IOLimits::default(), &ParseConfig::default())
    }

    /// Load and parse a file.
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        limits: &IOLimits,
        config: &ParseConfig,
    ) -> crate::Result<Self> {
        let data = SafeReader::open(path, limits.clone())?.into_bytes();
        Ok(Self::parse_with(data, config)?)
    }

    fn build<L: ElfLayout>(data: Bytes, ident: ElfIdent, config: &ParseConfig) -> Result<Self> {
        let header = parse_header::<L>(&data, ident)?;
        let endian = ident.endian;

        let sections = SectionTable::parse::<L>(&data, &header, config)?;

        let phnum = if header.e_phnum == PN_XNUM {
            sections
                .by_index(0)
                .map(|s| s.info() as usize)
                .ok_or_else(|| {
                    ElfError::MalformedHeader("PN_XNUM without a section header table".to_string())
                })?
        } else {
            header.e_phnum as usize
        };
        let program_headers = ProgramHeaderTable::parse::<L>(&data, &header, phnum, config)?;

        let symtab = Self::symbol_table_of::<L>(&sections, SHT_SYMTAB, endian, config)?;
        let dynsym = Self::symbol_table_of::<L>(&sections, SHT_DYNSYM, endian, config)?;

        let interpreter = match program_headers.interpreter() {
            Some(path) => Some(path),
            None => sections
                .by_name(".interp")
                .map(|s| read_cstring(s.data(), 0))
                .transpose()?,
        };

        let dynamic = Self::dynamic_info::<L>(&sections, &program_headers, endian, config)?;

        debug!(
            class = L::CLASS.bits(),
            endian = ?endian,
            sections = sections.count(),
            segments = program_headers.count(),
            symbols = symtab.as_ref().map_or(0, SymbolTable::len),
            dynamic_symbols = dynsym.as_ref().map_or(0, SymbolTable::len),
            has_dynamic = dynamic.is_some(),
            "Parsed ELF image"
        );

        Ok(Self {
            data,
            header,
            sections,
            program_headers,
            symtab,
            dynsym,
            dynamic,
            interpreter,
        })
    }

    fn symbol_table_of<L: ElfLayout>(
        sections: &SectionTable,
        sh_type: u32,
        endian: Endian,
        config: &ParseConfig,
    ) -> Result<Option<SymbolTable>> {
        let Some(symtab) = sections.by_type(sh_type) else {
            return Ok(None);
        };
        let strtab = sections
            .by_index(symtab.link() as usize)
            .ok_or(ElfError::InvalidSectionIndex(symtab.link()))?;
        SymbolTable::parse::<L>(symtab, strtab, endian, config).map(Some)
    }

    /// Dynamic info from `SHT_DYNAMIC`, or from `PT_DYNAMIC` when the section
    /// table is absent.
    fn dynamic_info<L: ElfLayout>(
        sections: &SectionTable,
        segments: &ProgramHeaderTable,
        endian: Endian,
        config: &ParseConfig,
    ) -> Result<Option<DynamicInfo>> {
        if let Some(section) = sections.by_type(SHT_DYNAMIC) {
            let strings = match section.link() {
                0 => Self::mapped_strtab::<L>(section.data(), segments, endian)?,
                link => sections
                    .by_index(link as usize)
                    .ok_or(ElfError::InvalidSectionIndex(link))?
                    .data()
                    .clone(),
            };
            return DynamicInfo::parse::<L>(section.data(), &strings, endian, config).map(Some);
        }

        if let Some(segment) = segments.by_type(PT_DYNAMIC) {
            let strings = Self::mapped_strtab::<L>(segment.data(), segments, endian)?;
            return DynamicInfo::parse::<L>(segment.data(), &strings, endian, config).map(Some);
        }

        Ok(None)
    }

    // Locate the dynamic string table through DT_STRTAB / DT_STRSZ and the
    // PT_LOAD mappings. Empty when DT_STRTAB is absent.
    fn mapped_strtab<L: ElfLayout>(
        dynamic: &Bytes,
        segments: &ProgramHeaderTable,
        endian: Endian,
    ) -> Result<Bytes> {
        let Some(addr) = DynamicInfo::find_tag::<L>(dynamic, endian, DT_STRTAB)? else {
            return Ok(Bytes::new());
        };
        let segment = segments
            .segment_at_vaddr(addr)
            .ok_or(ElfError::InvalidOffset { offset: addr })?;
        let start = addr - segment.vaddr();
        let available = segment.filesz().saturating_sub(start);
        let size = DynamicInfo::find_tag::<L>(dynamic, endian, DT_STRSZ)?.unwrap_or(available);
        let range = checked_range(start, size, segment.data().len())?;
        Ok(segment.data().slice(range))
    }

    /// The whole file
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn header(&self) -> &ElfHeader {
        &self.header
    }

    /// The 16 identification bytes
    pub fn ident(&self) -> &[u8; EI_NIDENT] {
        &self.header.ident.bytes
    }

    pub fn osabi(&self) -> u8 {
        self.header.ident.osabi
    }

    pub fn abi_version(&self) -> u8 {
        self.header.ident.abiversion
    }

    /// Raw `e_type`
    pub fn file_type(&self) -> u16 {
        self.header.e_type
    }

    pub fn object_type(&self) -> ObjectType {
        self.header.object_type()
    }

    /// Raw `e_machine`
    pub fn machine(&self) -> u16 {
        self.header.e_machine
    }

    pub fn architecture(&self) -> ElfMachine {
        self.header.machine()
    }

    pub fn machine_name(&self) -> &'static str {
        self.header.machine().name()
    }

    pub fn version(&self) -> u32 {
        self.header.e_version
    }

    pub fn entry(&self) -> u64 {
        self.header.e_entry
    }

    pub fn phoff(&self) -> u64 {
        self.header.e_phoff
    }

    pub fn shoff(&self) -> u64 {
        self.header.e_shoff
    }

    pub fn flags(&self) -> u32 {
        self.header.e_flags
    }

    pub fn ehsize(&self) -> u16 {
        self.header.e_ehsize
    }

    pub fn phentsize(&self) -> u16 {
        self.header.e_phentsize
    }

    /// Raw `e_phnum`; see [`segment_num`](Self::segment_num) for the resolved count
    pub fn phnum(&self) -> u16 {
        self.header.e_phnum
    }

    pub fn shentsize(&self) -> u16 {
        self.header.e_shentsize
    }

    /// Raw `e_shnum`; see [`section_num`](Self::section_num) for the resolved count
    pub fn shnum(&self) -> u16 {
        self.header.e_shnum
    }

    pub fn shstrndx(&self) -> u16 {
        self.header.e_shstrndx
    }

    /// Word width of the file
    pub fn elf_type(&self) -> ElfClass {
        self.header.ident.class
    }

    pub fn is_elf32(&self) -> bool {
        self.elf_type() == ElfClass::Elf32
    }

    pub fn is_elf64(&self) -> bool {
        self.elf_type() == ElfClass::Elf64
    }

    pub fn endian(&self) -> Endian {
        self.header.ident.endian
    }

    pub fn is_little_endian(&self) -> bool {
        self.endian() == Endian::Little
    }

    pub fn is_big_endian(&self) -> bool {
        self.endian() == Endian::Big
    }

    pub fn section_num(&self) -> usize {
        self.sections.count()
    }

    pub fn segment_num(&self) -> usize {
        self.program_headers.count()
    }

    pub fn sections(&self) -> &SectionTable {
        &self.sections
    }

    /// Sections in table order
    pub fn iter(&self) -> std::slice::Iter<'_, Section> {
        self.sections.iter()
    }

    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.by_index(index)
    }

    /// Section by name. When names repeat, the last one in the table wins.
    pub fn section_by_name(&self, name: &str) -> Option<&Section> {
        self.sections.by_name(name)
    }

    pub fn program_header(&self) -> &ProgramHeaderTable {
        &self.program_headers
    }

    /// `.dynsym` when `dynamic` is set, `.symtab` otherwise.
    /// `None` if the requested table is not in the file.
    pub fn symbol_table(&self, dynamic: bool) -> Option<&SymbolTable> {
        if dynamic {
            self.dynsym.as_ref()
        } else {
            self.symtab.as_ref()
        }
    }

    pub fn dynamic(&self) -> Option<&DynamicInfo> {
        self.dynamic.as_ref()
    }

    /// Program interpreter from `PT_INTERP` or `.interp`
    pub fn interpreter(&self) -> Option<&str> {
        self.interpreter.as_deref()
    }

    /// Resolve an address against both `.symtab` and `.dynsym`.
    ///
    /// Each table is queried with [`SymbolTable::find_symbol`] and the match
    /// with the greater value wins, so nearest mode returns the closest
    /// preceding symbol across the two tables. When both matches share a
    /// value the `.symtab` one is returned.
    pub fn find_symbol(&self, address: u64, find_near: bool) -> Option<&Symbol> {
        [self.symtab.as_ref(), self.dynsym.as_ref()]
            .into_iter()
            .flatten()
            .filter_map(|table| table.find_symbol(address, find_near))
            .reduce(|best, sym| if sym.value() > best.value() { sym } else { best })
    }
}

impl<'a> IntoIterator for &'a ElfImage {
    type Item = &'a Section;
    type IntoIter = std::slice::Iter<'a, Section>;

    fn into_iter(self) -> Self::IntoIter {
        self.sections.iter()
    }
}
