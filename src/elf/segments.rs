//! Program header table

use bytes::Bytes;
use tracing::trace;

use crate::config::ParseConfig;
use crate::elf::types::*;
use crate::elf::utils::{checked_range, checked_table};
use crate::elf::width::ElfLayout;

/// One program header with a view of its file contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    header: ProgramHeader,
    data: Bytes,
}

impl Segment {
    pub fn header(&self) -> &ProgramHeader {
        &self.header
    }

    pub fn segment_type(&self) -> u32 {
        self.header.p_type
    }

    pub fn flags(&self) -> u32 {
        self.header.p_flags
    }

    pub fn offset(&self) -> u64 {
        self.header.p_offset
    }

    pub fn vaddr(&self) -> u64 {
        self.header.p_vaddr
    }

    pub fn paddr(&self) -> u64 {
        self.header.p_paddr
    }

    pub fn filesz(&self) -> u64 {
        self.header.p_filesz
    }

    pub fn memsz(&self) -> u64 {
        self.header.p_memsz
    }

    pub fn align(&self) -> u64 {
        self.header.p_align
    }

    /// The `p_filesz` bytes at `p_offset`
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn is_executable(&self) -> bool {
        (self.header.p_flags & PF_X) != 0
    }

    pub fn is_writable(&self) -> bool {
        (self.header.p_flags & PF_W) != 0
    }

    pub fn is_readable(&self) -> bool {
        (self.header.p_flags & PF_R) != 0
    }

    pub fn contains_vaddr(&self, addr: u64) -> bool {
        addr >= self.header.p_vaddr && addr - self.header.p_vaddr < self.header.p_memsz
    }
}

/// Program headers in on-disk order
#[derive(Debug, Clone, Default)]
pub struct ProgramHeaderTable {
    segments: Vec<Segment>,
}

impl ProgramHeaderTable {
    /// Parse `count` program headers starting at `e_phoff`.
    ///
    /// `count` is passed separately because `PN_XNUM` defers it to section 0.
    pub fn parse<L: ElfLayout>(
        data: &Bytes,
        header: &ElfHeader,
        count: usize,
        config: &ParseConfig,
    ) -> Result<Self> {
        if count == 0 || header.e_phoff == 0 {
            return Ok(Self::default());
        }
        ParseConfig::check("segments", count, config.max_segments)?;

        let endian = header.ident.endian;
        let table = checked_table(header.e_phoff, L::PHDR_SIZE as u64, count as u64, data.len())?;

        let segments = table
            .step_by(L::PHDR_SIZE)
            .map(|offset| {
                let ph = L::parse_program_header(data, offset, endian)?;
                let range = checked_range(ph.p_offset, ph.p_filesz, data.len())?;
                trace!(p_type = ph.p_type, vaddr = ph.p_vaddr, filesz = ph.p_filesz, "segment");
                Ok(Segment {
                    header: ph,
                    data: data.slice(range),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { segments })
    }

    pub fn by_index(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    /// First segment of the given type
    pub fn by_type(&self, p_type: u32) -> Option<&Segment> {
        self.segments.iter().find(|s| s.segment_type() == p_type)
    }

    /// Find segment containing virtual address
    pub fn segment_at_vaddr(&self, vaddr: u64) -> Option<&Segment> {
        self.load_segments().find(|s| s.contains_vaddr(vaddr))
    }

    /// Convert virtual address to file offset through the `PT_LOAD` mappings.
    ///
    /// Addresses in the zero-filled tail (`p_filesz..p_memsz`) have no file offset.
    pub fn vaddr_to_offset(&self, vaddr: u64) -> Option<u64> {
        let seg = self.segment_at_vaddr(vaddr)?;
        let delta = vaddr - seg.vaddr();
        if delta < seg.filesz() {
            Some(seg.offset() + delta)
        } else {
            None
        }
    }

    /// Get all LOAD segments
    pub fn load_segments(&self) -> impl Iterator<Item = &Segment> + '_ {
        self.segments.iter().filter(|s| s.segment_type() == PT_LOAD)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    /// Count segments
    pub fn count(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Interpreter path from `PT_INTERP`, up to the first NUL
    pub fn interpreter(&self) -> Option<String> {
        self.by_type(PT_INTERP).map(|seg| {
            let bytes = seg.data();
            let len = memchr::memchr(0, bytes).unwrap_or(bytes.len());
            String::from_utf8_lossy(&bytes[..len]).into_owned()
        })
    }
}

impl<'a> IntoIterator for &'a ProgramHeaderTable {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}
