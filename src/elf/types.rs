//! Core ELF types and constants

use thiserror::Error;

/// ELF parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ElfError {
    #[error("Invalid ELF magic")]
    InvalidMagic,
    #[error("Unsupported ELF class: {0}")]
    UnsupportedClass(u8),
    #[error("Unsupported ELF data encoding: {0}")]
    UnsupportedByteOrder(u8),
    #[error("Invalid offset: {offset:#x}")]
    InvalidOffset { offset: u64 },
    #[error("Truncated at {offset:#x}, needed {needed} bytes")]
    Truncated { offset: u64, needed: u64 },
    #[error("Invalid section index: {0}")]
    InvalidSectionIndex(u32),
    #[error("Malformed header: {0}")]
    MalformedHeader(String),
    #[error("Too many {what}: {found} exceeds limit of {limit}")]
    LimitExceeded {
        what: &'static str,
        limit: usize,
        found: usize,
    },
    /// An internal consistency check failed. This is an engine bug, not bad input.
    #[error("Internal invariant violated: {0}")]
    InvariantViolated(&'static str),
}

impl ElfError {
    /// Build an `InvariantViolated` error, aborting in debug builds.
    pub(crate) fn invariant(what: &'static str) -> Self {
        debug_assert!(false, "invariant violated: {}", what);
        ElfError::InvariantViolated(what)
    }

    /// True when the error describes bad input rather than an engine bug.
    pub fn is_malformed_input(&self) -> bool {
        !matches!(self, ElfError::InvariantViolated(_))
    }
}

pub type Result<T> = std::result::Result<T, ElfError>;

/// ELF magic number
pub const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

/// Size of the identification block
pub const EI_NIDENT: usize = 16;

pub const EI_CLASS: usize = 4;
pub const EI_DATA: usize = 5;
pub const EI_VERSION: usize = 6;
pub const EI_OSABI: usize = 7;
pub const EI_ABIVERSION: usize = 8;

/// ELF class (32-bit or 64-bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElfClass {
    Elf32 = 1,
    Elf64 = 2,
}

impl ElfClass {
    pub fn from_u8(val: u8) -> Result<Self> {
        match val {
            1 => Ok(ElfClass::Elf32),
            2 => Ok(ElfClass::Elf64),
            _ => Err(ElfError::UnsupportedClass(val)),
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            ElfClass::Elf32 => 32,
            ElfClass::Elf64 => 64,
        }
    }
}

/// Byte order declared by `EI_DATA`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    Little = 1,
    Big = 2,
}

impl Endian {
    /// Decode `EI_DATA`. `ELFDATANONE` and any unknown value are rejected.
    pub fn from_u8(val: u8) -> Result<Self> {
        match val {
            1 => Ok(Endian::Little),
            2 => Ok(Endian::Big),
            _ => Err(ElfError::UnsupportedByteOrder(val)),
        }
    }

    pub fn is_little_endian(&self) -> bool {
        matches!(self, Endian::Little)
    }
}

/// ELF object file type (`e_type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    None,
    Relocatable,
    Executable,
    SharedObject,
    Core,
    Other(u16),
}

impl From<u16> for ObjectType {
    fn from(val: u16) -> Self {
        match val {
            0 => ObjectType::None,
            1 => ObjectType::Relocatable,
            2 => ObjectType::Executable,
            3 => ObjectType::SharedObject,
            4 => ObjectType::Core,
            other => ObjectType::Other(other),
        }
    }
}

/// ELF machine architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfMachine {
    None,
    Sparc,
    X86,
    Mips,
    PowerPC,
    PowerPC64,
    S390,
    ARM,
    SuperH,
    IA64,
    X86_64,
    AArch64,
    RiscV,
    LoongArch,
    Other(u16),
}

impl From<u16> for ElfMachine {
    fn from(val: u16) -> Self {
        match val {
            0 => ElfMachine::None,
            2 => ElfMachine::Sparc,
            3 => ElfMachine::X86,
            8 => ElfMachine::Mips,
            20 => ElfMachine::PowerPC,
            21 => ElfMachine::PowerPC64,
            22 => ElfMachine::S390,
            40 => ElfMachine::ARM,
            42 => ElfMachine::SuperH,
            50 => ElfMachine::IA64,
            62 => ElfMachine::X86_64,
            183 => ElfMachine::AArch64,
            243 => ElfMachine::RiscV,
            258 => ElfMachine::LoongArch,
            other => ElfMachine::Other(other),
        }
    }
}

impl ElfMachine {
    /// Human readable architecture name
    pub fn name(&self) -> &'static str {
        match self {
            ElfMachine::None => "None",
            ElfMachine::Sparc => "SPARC",
            ElfMachine::X86 => "Intel 80386",
            ElfMachine::Mips => "MIPS R3000",
            ElfMachine::PowerPC => "PowerPC",
            ElfMachine::PowerPC64 => "PowerPC64",
            ElfMachine::S390 => "IBM S/390",
            ElfMachine::ARM => "ARM",
            ElfMachine::SuperH => "Renesas / SuperH SH",
            ElfMachine::IA64 => "Intel IA-64",
            ElfMachine::X86_64 => "Advanced Micro Devices X86-64",
            ElfMachine::AArch64 => "AArch64",
            ElfMachine::RiscV => "RISC-V",
            ElfMachine::LoongArch => "LoongArch",
            ElfMachine::Other(_) => "Unknown",
        }
    }
}

/// ELF identification (first 16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfIdent {
    pub bytes: [u8; EI_NIDENT],
    pub class: ElfClass,
    pub endian: Endian,
    pub version: u8,
    pub osabi: u8,
    pub abiversion: u8,
}

/// ELF file header, widened to 64-bit fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfHeader {
    pub ident: ElfIdent,
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u64,
    pub e_phoff: u64,
    pub e_shoff: u64,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

impl ElfHeader {
    pub fn object_type(&self) -> ObjectType {
        ObjectType::from(self.e_type)
    }

    pub fn machine(&self) -> ElfMachine {
        ElfMachine::from(self.e_machine)
    }
}

/// Raw section header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionHeader {
    pub sh_name: u32,
    pub sh_type: u32,
    pub sh_flags: u64,
    pub sh_addr: u64,
    pub sh_offset: u64,
    pub sh_size: u64,
    pub sh_link: u32,
    pub sh_info: u32,
    pub sh_addralign: u64,
    pub sh_entsize: u64,
}

/// Section types
pub const SHT_NULL: u32 = 0;
pub const SHT_PROGBITS: u32 = 1;
pub const SHT_SYMTAB: u32 = 2;
pub const SHT_STRTAB: u32 = 3;
pub const SHT_RELA: u32 = 4;
pub const SHT_HASH: u32 = 5;
pub const SHT_DYNAMIC: u32 = 6;
pub const SHT_NOTE: u32 = 7;
pub const SHT_NOBITS: u32 = 8;
pub const SHT_REL: u32 = 9;
pub const SHT_DYNSYM: u32 = 11;

/// Section flags
pub const SHF_WRITE: u64 = 0x1;
pub const SHF_ALLOC: u64 = 0x2;
pub const SHF_EXECINSTR: u64 = 0x4;
pub const SHF_TLS: u64 = 0x400;

/// Special section indices
pub const SHN_UNDEF: u16 = 0;
pub const SHN_ABS: u16 = 0xfff1;
pub const SHN_COMMON: u16 = 0xfff2;
pub const SHN_XINDEX: u16 = 0xffff;

/// `e_phnum` escape meaning the real count lives in section 0's `sh_info`
pub const PN_XNUM: u16 = 0xffff;

/// Raw program header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub p_flags: u32,
    pub p_offset: u64,
    pub p_vaddr: u64,
    pub p_paddr: u64,
    pub p_filesz: u64,
    pub p_memsz: u64,
    pub p_align: u64,
}

/// Program header types
pub const PT_NULL: u32 = 0;
pub const PT_LOAD: u32 = 1;
pub const PT_DYNAMIC: u32 = 2;
pub const PT_INTERP: u32 = 3;
pub const PT_NOTE: u32 = 4;
pub const PT_SHLIB: u32 = 5;
pub const PT_PHDR: u32 = 6;
pub const PT_TLS: u32 = 7;
pub const PT_GNU_EH_FRAME: u32 = 0x6474e550;
pub const PT_GNU_STACK: u32 = 0x6474e551;
pub const PT_GNU_RELRO: u32 = 0x6474e552;

/// Program header flags
pub const PF_X: u32 = 0x1;
pub const PF_W: u32 = 0x2;
pub const PF_R: u32 = 0x4;

/// Raw symbol table entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSymbol {
    pub st_name: u32,
    pub st_value: u64,
    pub st_size: u64,
    pub st_info: u8,
    pub st_other: u8,
    pub st_shndx: u16,
}

/// Symbol binding
pub const STB_LOCAL: u8 = 0;
pub const STB_GLOBAL: u8 = 1;
pub const STB_WEAK: u8 = 2;

/// Symbol types
pub const STT_NOTYPE: u8 = 0;
pub const STT_OBJECT: u8 = 1;
pub const STT_FUNC: u8 = 2;
pub const STT_SECTION: u8 = 3;
pub const STT_FILE: u8 = 4;
pub const STT_TLS: u8 = 6;

/// Symbol visibility (low bits of `st_other`)
pub const STV_DEFAULT: u8 = 0;
pub const STV_INTERNAL: u8 = 1;
pub const STV_HIDDEN: u8 = 2;
pub const STV_PROTECTED: u8 = 3;

/// Dynamic entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicEntry {
    pub d_tag: i64,
    pub d_val: u64,
}

/// Dynamic tags
pub const DT_NULL: i64 = 0;
pub const DT_NEEDED: i64 = 1;
pub const DT_PLTRELSZ: i64 = 2;
pub const DT_PLTGOT: i64 = 3;
pub const DT_HASH: i64 = 4;
pub const DT_STRTAB: i64 = 5;
pub const DT_SYMTAB: i64 = 6;
pub const DT_RELA: i64 = 7;
pub const DT_RELASZ: i64 = 8;
pub const DT_RELAENT: i64 = 9;
pub const DT_STRSZ: i64 = 10;
pub const DT_SYMENT: i64 = 11;
pub const DT_INIT: i64 = 12;
pub const DT_FINI: i64 = 13;
pub const DT_SONAME: i64 = 14;
pub const DT_RPATH: i64 = 15;
pub const DT_SYMBOLIC: i64 = 16;
pub const DT_REL: i64 = 17;
pub const DT_RELSZ: i64 = 18;
pub const DT_RELENT: i64 = 19;
pub const DT_PLTREL: i64 = 20;
pub const DT_DEBUG: i64 = 21;
pub const DT_TEXTREL: i64 = 22;
pub const DT_JMPREL: i64 = 23;
pub const DT_BIND_NOW: i64 = 24;
pub const DT_RUNPATH: i64 = 29;
pub const DT_FLAGS: i64 = 30;

/// Dynamic flags
pub const DF_BIND_NOW: u64 = 0x8;
