//! Dynamic section parsing

use tracing::trace;

use crate::config::ParseConfig;
use crate::elf::types::*;
use crate::elf::utils::read_cstring;
use crate::elf::width::{parse_dynamic_entry, ElfLayout};

/// Dynamic linking information: the `(tag, value)` entries up to `DT_NULL`
/// plus the string-valued entries resolved against the dynamic string table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamicInfo {
    entries: Vec<DynamicEntry>,
    needed: Vec<String>,
    soname: Option<String>,
    rpath: Option<String>,
    runpath: Option<String>,
}

impl DynamicInfo {
    /// Parse dynamic entries from `data`, resolving names in `strings`.
    ///
    /// Reading stops at the first `DT_NULL` or at the end of `data`.
    pub fn parse<L: ElfLayout>(
        data: &[u8],
        strings: &[u8],
        endian: Endian,
        config: &ParseConfig,
    ) -> Result<Self> {
        let mut entries = Vec::new();
        let mut offset = 0;

        while offset + L::DYN_SIZE <= data.len() {
            let entry = parse_dynamic_entry::<L>(data, offset, endian)?;
            if entry.d_tag == DT_NULL {
                break;
            }
            entries.push(entry);
            ParseConfig::check("dynamic entries", entries.len(), config.max_dynamic_entries)?;
            offset += L::DYN_SIZE;
        }

        let lookup = |tag: i64| -> Result<Option<String>> {
            entries
                .iter()
                .find(|e| e.d_tag == tag)
                .map(|e| read_cstring(strings, e.d_val as usize))
                .transpose()
        };

        let needed = entries
            .iter()
            .filter(|e| e.d_tag == DT_NEEDED)
            .map(|e| read_cstring(strings, e.d_val as usize))
            .collect::<Result<Vec<_>>>()?;
        let soname = lookup(DT_SONAME)?;
        let rpath = lookup(DT_RPATH)?;
        let runpath = lookup(DT_RUNPATH)?;

        trace!(entries = entries.len(), needed = needed.len(), "dynamic section");

        Ok(Self {
            entries,
            needed,
            soname,
            rpath,
            runpath,
        })
    }

    /// Value of the first `tag` entry in raw dynamic data, without resolving strings.
    pub fn find_tag<L: ElfLayout>(data: &[u8], endian: Endian, tag: i64) -> Result<Option<u64>> {
        for offset in (0..data.len() / L::DYN_SIZE).map(|i| i * L::DYN_SIZE) {
            let entry = parse_dynamic_entry::<L>(data, offset, endian)?;
            if entry.d_tag == DT_NULL {
                break;
            }
            if entry.d_tag == tag {
                return Ok(Some(entry.d_val));
            }
        }
        Ok(None)
    }

    /// Get all entries, excluding the terminating `DT_NULL`
    pub fn entries(&self) -> &[DynamicEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value of the first entry with this tag
    pub fn get(&self, tag: i64) -> Option<u64> {
        self.entries.iter().find(|e| e.d_tag == tag).map(|e| e.d_val)
    }

    /// Get entries by tag
    pub fn entries_by_tag(&self, tag: i64) -> impl Iterator<Item = &DynamicEntry> + '_ {
        self.entries.iter().filter(move |e| e.d_tag == tag)
    }

    /// Needed libraries (`DT_NEEDED`) in entry order
    pub fn needed(&self) -> &[String] {
        &self.needed
    }

    pub fn soname(&self) -> Option<&str> {
        self.soname.as_deref()
    }

    pub fn rpath(&self) -> Option<&str> {
        self.rpath.as_deref()
    }

    pub fn runpath(&self) -> Option<&str> {
        self.runpath.as_deref()
    }

    pub fn flags(&self) -> Option<u64> {
        self.get(DT_FLAGS)
    }

    /// Check if BIND_NOW is set, either as a tag or as a `DT_FLAGS` bit
    pub fn is_bind_now(&self) -> bool {
        self.get(DT_BIND_NOW).is_some()
            || self.flags().is_some_and(|flags| flags & DF_BIND_NOW != 0)
    }

    /// Get INIT function address
    pub fn init(&self) -> Option<u64> {
        self.get(DT_INIT)
    }

    /// Get FINI function address
    pub fn fini(&self) -> Option<u64> {
        self.get(DT_FINI)
    }
}
