//! A small ELF writer for building test images by hand.
//!
//! Layout: file header, program headers, section contents (8-byte aligned),
//! `.shstrtab`, then the section header table. Section 0 is the null section
//! and `.shstrtab` is always the last section.

use elfimage::elf::types::*;
use elfimage::{ElfClass, Endian};

#[derive(Debug, Clone)]
pub struct SectionSpec {
    pub name: String,
    pub sh_type: u32,
    pub flags: u64,
    pub addr: u64,
    pub data: Vec<u8>,
    pub link: u32,
    pub info: u32,
    pub entsize: u64,
}

#[derive(Debug, Clone, Copy)]
pub enum SegmentSource {
    /// Cover the file range and address of a section (by section index)
    Section(usize),
    /// Explicit file range
    Raw { offset: u64, filesz: u64 },
}

#[derive(Debug, Clone, Copy)]
pub struct SegmentSpec {
    pub p_type: u32,
    pub flags: u32,
    pub vaddr: u64,
    pub memsz: Option<u64>,
    pub source: SegmentSource,
}

#[derive(Debug, Clone, Copy)]
pub struct Sym {
    pub name: &'static str,
    pub value: u64,
    pub size: u64,
    pub info: u8,
    pub shndx: u16,
}

impl Sym {
    pub fn func(name: &'static str, value: u64, size: u64) -> Self {
        Self {
            name,
            value,
            size,
            info: (STB_GLOBAL << 4) | STT_FUNC,
            shndx: 1,
        }
    }

    pub fn object(name: &'static str, value: u64, size: u64) -> Self {
        Self {
            name,
            value,
            size,
            info: (STB_GLOBAL << 4) | STT_OBJECT,
            shndx: 1,
        }
    }

    pub fn undefined(name: &'static str) -> Self {
        Self {
            name,
            value: 0,
            size: 0,
            info: (STB_GLOBAL << 4) | STT_FUNC,
            shndx: SHN_UNDEF,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ElfBuilder {
    pub class: ElfClass,
    pub endian: Endian,
    pub e_type: u16,
    pub machine: u16,
    pub entry: u64,
    pub flags: u32,
    pub osabi: u8,
    /// Emit the section header table
    pub with_section_headers: bool,
    /// Store section count and string index in section 0
    pub extended_numbering: bool,
    sections: Vec<SectionSpec>,
    segments: Vec<SegmentSpec>,
}

struct Writer {
    big: bool,
    wide: bool,
}

impl Writer {
    fn put(&self, out: &mut [u8], at: usize, value: u64, size: usize) {
        let bytes = if self.big {
            value.to_be_bytes()[8 - size..].to_vec()
        } else {
            value.to_le_bytes()[..size].to_vec()
        };
        out[at..at + size].copy_from_slice(&bytes);
    }

    fn half(&self, out: &mut [u8], at: usize, value: u16) {
        self.put(out, at, value as u64, 2);
    }

    fn word32(&self, out: &mut [u8], at: usize, value: u32) {
        self.put(out, at, value as u64, 4);
    }

    fn addr(&self, out: &mut [u8], at: usize, value: u64) {
        self.put(out, at, value, self.w());
    }

    fn w(&self) -> usize {
        if self.wide {
            8
        } else {
            4
        }
    }
}

impl ElfBuilder {
    pub fn new(class: ElfClass, endian: Endian) -> Self {
        Self {
            class,
            endian,
            e_type: 2,
            machine: 62,
            entry: 0,
            flags: 0,
            osabi: 0,
            with_section_headers: true,
            extended_numbering: false,
            sections: Vec::new(),
            segments: Vec::new(),
        }
    }

    pub fn elf64_le() -> Self {
        Self::new(ElfClass::Elf64, Endian::Little)
    }

    fn is64(&self) -> bool {
        self.class == ElfClass::Elf64
    }

    pub fn sym_size(&self) -> u64 {
        if self.is64() {
            24
        } else {
            16
        }
    }

    pub fn dyn_size(&self) -> u64 {
        if self.is64() {
            16
        } else {
            8
        }
    }

    /// Add a section and return its index in the section header table
    pub fn add_section(&mut self, spec: SectionSpec) -> usize {
        self.sections.push(spec);
        self.sections.len()
    }

    /// Mutable access to a previously added section (by section index)
    pub fn section_mut(&mut self, index: usize) -> &mut SectionSpec {
        &mut self.sections[index - 1]
    }

    pub fn add_progbits(&mut self, name: &str, flags: u64, addr: u64, data: &[u8]) -> usize {
        self.add_section(SectionSpec {
            name: name.to_string(),
            sh_type: SHT_PROGBITS,
            flags,
            addr,
            data: data.to_vec(),
            link: 0,
            info: 0,
            entsize: 0,
        })
    }

    pub fn add_strtab(&mut self, name: &str, strings: &[&str]) -> (usize, Vec<u32>) {
        let mut data = vec![0u8];
        let mut offsets = Vec::new();
        for s in strings {
            offsets.push(data.len() as u32);
            data.extend_from_slice(s.as_bytes());
            data.push(0);
        }
        let idx = self.add_section(SectionSpec {
            name: name.to_string(),
            sh_type: SHT_STRTAB,
            flags: 0,
            addr: 0,
            data,
            link: 0,
            info: 0,
            entsize: 0,
        });
        (idx, offsets)
    }

    /// Add a symbol table and its string table. A null entry is prepended.
    /// Returns the symbol section index.
    pub fn add_symbols(&mut self, sh_type: u32, name: &str, strtab: &str, syms: &[Sym]) -> usize {
        let names: Vec<&str> = syms.iter().map(|s| s.name).collect();
        let (str_idx, offsets) = self.add_strtab(strtab, &names);

        let w = Writer {
            big: self.endian == Endian::Big,
            wide: self.is64(),
        };
        let entsize = self.sym_size() as usize;
        let mut data = vec![0u8; entsize * (syms.len() + 1)];
        for (i, (sym, &name_off)) in syms.iter().zip(&offsets).enumerate() {
            let at = (i + 1) * entsize;
            w.word32(&mut data, at, name_off);
            if self.is64() {
                data[at + 4] = sym.info;
                w.half(&mut data, at + 6, sym.shndx);
                w.addr(&mut data, at + 8, sym.value);
                w.addr(&mut data, at + 16, sym.size);
            } else {
                w.addr(&mut data, at + 4, sym.value);
                w.addr(&mut data, at + 8, sym.size);
                data[at + 12] = sym.info;
                w.half(&mut data, at + 14, sym.shndx);
            }
        }

        self.add_section(SectionSpec {
            name: name.to_string(),
            sh_type,
            flags: if sh_type == SHT_DYNSYM { SHF_ALLOC } else { 0 },
            addr: 0,
            data,
            link: str_idx as u32,
            info: 1,
            entsize: entsize as u64,
        })
    }

    /// Add `.dynstr` at `dynstr_addr` and a `.dynamic` section linked to it.
    ///
    /// Entries: one `DT_NEEDED` per library, an optional `DT_SONAME`,
    /// `DT_STRTAB`/`DT_STRSZ`, then `extra`, then `DT_NULL`.
    /// Returns `(dynamic index, dynstr index)`.
    pub fn add_dynamic(
        &mut self,
        needed: &[&str],
        soname: Option<&str>,
        dynstr_addr: u64,
        extra: &[(i64, u64)],
    ) -> (usize, usize) {
        let mut strings: Vec<&str> = needed.to_vec();
        if let Some(s) = soname {
            strings.push(s);
        }
        let (dynstr, offsets) = self.add_strtab(".dynstr", &strings);
        self.sections[dynstr - 1].addr = dynstr_addr;
        self.sections[dynstr - 1].flags = SHF_ALLOC;
        let strsz = self.sections[dynstr - 1].data.len() as u64;

        let mut entries: Vec<(i64, u64)> = Vec::new();
        for off in &offsets[..needed.len()] {
            entries.push((DT_NEEDED, *off as u64));
        }
        if soname.is_some() {
            entries.push((DT_SONAME, offsets[needed.len()] as u64));
        }
        entries.push((DT_STRTAB, dynstr_addr));
        entries.push((DT_STRSZ, strsz));
        entries.extend_from_slice(extra);
        entries.push((DT_NULL, 0));

        let w = Writer {
            big: self.endian == Endian::Big,
            wide: self.is64(),
        };
        let entsize = self.dyn_size() as usize;
        let mut data = vec![0u8; entsize * entries.len()];
        for (i, (tag, val)) in entries.iter().enumerate() {
            w.addr(&mut data, i * entsize, *tag as u64);
            w.addr(&mut data, i * entsize + w.w(), *val);
        }

        let dynamic = self.add_section(SectionSpec {
            name: ".dynamic".to_string(),
            sh_type: SHT_DYNAMIC,
            flags: SHF_ALLOC | SHF_WRITE,
            addr: dynstr_addr + 0x1000,
            data,
            link: dynstr as u32,
            info: 0,
            entsize: entsize as u64,
        });
        (dynamic, dynstr)
    }

    pub fn add_segment(&mut self, spec: SegmentSpec) -> usize {
        self.segments.push(spec);
        self.segments.len() - 1
    }

    /// A segment covering a section's file range at the section's address
    pub fn add_segment_for(&mut self, p_type: u32, flags: u32, section: usize) -> usize {
        let vaddr = self.sections[section - 1].addr;
        self.add_segment(SegmentSpec {
            p_type,
            flags,
            vaddr,
            memsz: None,
            source: SegmentSource::Section(section),
        })
    }

    pub fn build(&self) -> Vec<u8> {
        let w = Writer {
            big: self.endian == Endian::Big,
            wide: self.is64(),
        };
        let (ehsize, phsize, shsize) = if self.is64() { (64, 56, 64) } else { (52, 32, 40) };

        let phoff = if self.segments.is_empty() { 0 } else { ehsize };
        let mut out = vec![0u8; ehsize + self.segments.len() * phsize];

        // Section names, with .shstrtab appended last
        let mut shstr = vec![0u8];
        let mut name_offsets = Vec::new();
        for name in self
            .sections
            .iter()
            .map(|s| s.name.as_str())
            .chain(std::iter::once(".shstrtab"))
        {
            name_offsets.push(shstr.len() as u32);
            shstr.extend_from_slice(name.as_bytes());
            shstr.push(0);
        }

        // Section contents
        let mut offsets = Vec::new();
        for s in &self.sections {
            align8(&mut out);
            offsets.push(out.len() as u64);
            if s.sh_type != SHT_NOBITS {
                out.extend_from_slice(&s.data);
            }
        }
        align8(&mut out);
        let shstr_offset = out.len() as u64;
        out.extend_from_slice(&shstr);

        // Section header table
        let total_sections = self.sections.len() + 2;
        let shstrndx = total_sections - 1;
        let shoff = if self.with_section_headers {
            align8(&mut out);
            let shoff = out.len();
            out.resize(shoff + total_sections * shsize, 0);

            let wd = w.w();
            let mut write_sh = |idx: usize, name: u32, spec: &SectionSpec, offset: u64, size: u64| {
                let at = shoff + idx * shsize;
                w.word32(&mut out, at, name);
                w.word32(&mut out, at + 4, spec.sh_type);
                w.addr(&mut out, at + 8, spec.flags);
                w.addr(&mut out, at + 8 + wd, spec.addr);
                w.addr(&mut out, at + 8 + 2 * wd, offset);
                w.addr(&mut out, at + 8 + 3 * wd, size);
                w.word32(&mut out, at + 8 + 4 * wd, spec.link);
                w.word32(&mut out, at + 12 + 4 * wd, spec.info);
                w.addr(&mut out, at + 16 + 4 * wd, 1);
                w.addr(&mut out, at + 16 + 5 * wd, spec.entsize);
            };

            if self.extended_numbering {
                let null = SectionSpec {
                    name: String::new(),
                    sh_type: SHT_NULL,
                    flags: 0,
                    addr: 0,
                    data: Vec::new(),
                    link: shstrndx as u32,
                    info: self.segments.len() as u32,
                    entsize: 0,
                };
                write_sh(0, 0, &null, 0, total_sections as u64);
            }

            for (i, s) in self.sections.iter().enumerate() {
                write_sh(i + 1, name_offsets[i], s, offsets[i], s.data.len() as u64);
            }
            let shstrtab = SectionSpec {
                name: ".shstrtab".to_string(),
                sh_type: SHT_STRTAB,
                flags: 0,
                addr: 0,
                data: Vec::new(),
                link: 0,
                info: 0,
                entsize: 0,
            };
            write_sh(
                shstrndx,
                name_offsets[self.sections.len()],
                &shstrtab,
                shstr_offset,
                shstr.len() as u64,
            );
            shoff as u64
        } else {
            0
        };

        // Program headers
        for (i, seg) in self.segments.iter().enumerate() {
            let (offset, filesz) = match seg.source {
                SegmentSource::Section(idx) => {
                    let s = &self.sections[idx - 1];
                    let size = if s.sh_type == SHT_NOBITS { 0 } else { s.data.len() as u64 };
                    (offsets[idx - 1], size)
                }
                SegmentSource::Raw { offset, filesz } => (offset, filesz),
            };
            let memsz = seg.memsz.unwrap_or(filesz);
            let at = phoff + i * phsize;
            w.word32(&mut out, at, seg.p_type);
            if self.is64() {
                w.word32(&mut out, at + 4, seg.flags);
                w.addr(&mut out, at + 8, offset);
                w.addr(&mut out, at + 16, seg.vaddr);
                w.addr(&mut out, at + 24, seg.vaddr);
                w.addr(&mut out, at + 32, filesz);
                w.addr(&mut out, at + 40, memsz);
                w.addr(&mut out, at + 48, 0x1000);
            } else {
                w.addr(&mut out, at + 4, offset);
                w.addr(&mut out, at + 8, seg.vaddr);
                w.addr(&mut out, at + 12, seg.vaddr);
                w.addr(&mut out, at + 16, filesz);
                w.addr(&mut out, at + 20, memsz);
                w.word32(&mut out, at + 24, seg.flags);
                w.addr(&mut out, at + 28, 0x1000);
            }
        }

        // File header
        out[0..4].copy_from_slice(ELF_MAGIC);
        out[4] = self.class as u8;
        out[5] = self.endian as u8;
        out[6] = 1;
        out[7] = self.osabi;
        w.half(&mut out, 16, self.e_type);
        w.half(&mut out, 18, self.machine);
        w.word32(&mut out, 20, 1);
        w.addr(&mut out, 24, self.entry);
        let wd = w.w();
        w.addr(&mut out, 24 + wd, phoff as u64);
        w.addr(&mut out, 24 + 2 * wd, shoff);
        let tail = 24 + 3 * wd;
        w.word32(&mut out, tail, self.flags);
        w.half(&mut out, tail + 4, ehsize as u16);
        w.half(&mut out, tail + 6, phsize as u16);
        w.half(&mut out, tail + 8, if self.extended_numbering { PN_XNUM } else { self.segments.len() as u16 });
        w.half(&mut out, tail + 10, if self.with_section_headers { shsize as u16 } else { 0 });
        let (shnum, shstrndx_field) = if !self.with_section_headers {
            (0, 0)
        } else if self.extended_numbering {
            (0, SHN_XINDEX)
        } else {
            (total_sections as u16, shstrndx as u16)
        };
        w.half(&mut out, tail + 12, shnum);
        w.half(&mut out, tail + 14, shstrndx_field);

        out
    }
}

fn align8(out: &mut Vec<u8>) {
    while out.len() % 8 != 0 {
        out.push(0);
    }
}
