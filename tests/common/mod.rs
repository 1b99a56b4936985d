//! Common test utilities and helpers.

#![allow(dead_code)]

mod builder;

pub use builder::{ElfBuilder, SectionSpec, SegmentSource, SegmentSpec, Sym};

use elfimage::elf::types::*;
use elfimage::{ElfClass, Endian};

/// All four class/byte-order combinations
pub const LAYOUTS: [(ElfClass, Endian); 4] = [
    (ElfClass::Elf32, Endian::Little),
    (ElfClass::Elf32, Endian::Big),
    (ElfClass::Elf64, Endian::Little),
    (ElfClass::Elf64, Endian::Big),
];

pub const TEXT_ADDR: u64 = 0x401000;

/// A statically linked executable: `.text`, `.data`, `.bss` and a `.symtab`
/// with three functions and one object.
pub fn static_exe(class: ElfClass, endian: Endian) -> ElfBuilder {
    let mut b = ElfBuilder::new(class, endian);
    b.entry = TEXT_ADDR;
    let text = b.add_progbits(".text", SHF_ALLOC | SHF_EXECINSTR, TEXT_ADDR, &[0x90; 0x40]);
    b.add_progbits(".data", SHF_ALLOC | SHF_WRITE, 0x402000, &[1, 2, 3, 4, 5, 6, 7, 8]);
    b.add_section(SectionSpec {
        name: ".bss".to_string(),
        sh_type: SHT_NOBITS,
        flags: SHF_ALLOC | SHF_WRITE,
        addr: 0x403000,
        data: vec![0; 0x100],
        link: 0,
        info: 0,
        entsize: 0,
    });
    b.add_symbols(
        SHT_SYMTAB,
        ".symtab",
        ".strtab",
        &[
            Sym::func("_start", TEXT_ADDR, 0x10),
            Sym::func("main", TEXT_ADDR + 0x10, 0x20),
            Sym::func("helper", TEXT_ADDR + 0x30, 0x10),
            Sym::object("counter", 0x402000, 8),
        ],
    );
    b.add_segment_for(PT_LOAD, PF_R | PF_X, text);
    b
}
