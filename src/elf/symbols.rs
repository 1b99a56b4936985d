//! Symbol table parsing and address resolution

use std::collections::HashMap;
use std::fmt;
use tracing::trace;

use crate::config::ParseConfig;
use crate::elf::sections::Section;
use crate::elf::types::*;
use crate::elf::utils::read_cstring;
use crate::elf::width::ElfLayout;

/// Symbol binding decoded from the high nibble of `st_info`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolBind {
    Local,
    Global,
    Weak,
    Other,
}

impl From<u8> for SymbolBind {
    fn from(bind: u8) -> Self {
        match bind {
            STB_LOCAL => SymbolBind::Local,
            STB_GLOBAL => SymbolBind::Global,
            STB_WEAK => SymbolBind::Weak,
            _ => SymbolBind::Other,
        }
    }
}

/// Symbol type decoded from the low nibble of `st_info`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolType {
    NoType,
    Object,
    Function,
    Section,
    File,
    Other,
}

impl From<u8> for SymbolType {
    fn from(ty: u8) -> Self {
        match ty {
            STT_NOTYPE => SymbolType::NoType,
            STT_OBJECT => SymbolType::Object,
            STT_FUNC => SymbolType::Function,
            STT_SECTION => SymbolType::Section,
            STT_FILE => SymbolType::File,
            _ => SymbolType::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolVisibility {
    Default,
    Internal,
    Hidden,
    Protected,
}

impl From<u8> for SymbolVisibility {
    fn from(other: u8) -> Self {
        match other & 0x3 {
            STV_INTERNAL => SymbolVisibility::Internal,
            STV_HIDDEN => SymbolVisibility::Hidden,
            STV_PROTECTED => SymbolVisibility::Protected,
            _ => SymbolVisibility::Default,
        }
    }
}

/// A symbol table entry with its name resolved.
///
/// Bind and type are decoded once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    name: String,
    name_index: u32,
    info: u8,
    other: u8,
    shndx: u16,
    value: u64,
    size: u64,
    bind: SymbolBind,
    sym_type: SymbolType,
}

impl Symbol {
    pub fn new(name: String, raw: &RawSymbol) -> Self {
        Self {
            name,
            name_index: raw.st_name,
            info: raw.st_info,
            other: raw.st_other,
            shndx: raw.st_shndx,
            value: raw.st_value,
            size: raw.st_size,
            bind: SymbolBind::from(raw.st_info >> 4),
            sym_type: SymbolType::from(raw.st_info & 0xf),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Offset of the name in the linked string table
    pub fn name_index(&self) -> u32 {
        self.name_index
    }

    pub fn info(&self) -> u8 {
        self.info
    }

    pub fn other(&self) -> u8 {
        self.other
    }

    pub fn shndx(&self) -> u16 {
        self.shndx
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn bind(&self) -> SymbolBind {
        self.bind
    }

    pub fn symbol_type(&self) -> SymbolType {
        self.sym_type
    }

    pub fn visibility(&self) -> SymbolVisibility {
        SymbolVisibility::from(self.other)
    }

    pub fn is_local(&self) -> bool {
        self.bind == SymbolBind::Local
    }

    pub fn is_global(&self) -> bool {
        self.bind == SymbolBind::Global
    }

    pub fn is_weak(&self) -> bool {
        self.bind == SymbolBind::Weak
    }

    pub fn is_no_type(&self) -> bool {
        self.sym_type == SymbolType::NoType
    }

    pub fn is_object(&self) -> bool {
        self.sym_type == SymbolType::Object
    }

    pub fn is_function(&self) -> bool {
        self.sym_type == SymbolType::Function
    }

    pub fn is_section(&self) -> bool {
        self.sym_type == SymbolType::Section
    }

    pub fn is_file(&self) -> bool {
        self.sym_type == SymbolType::File
    }

    pub fn is_undefined(&self) -> bool {
        self.shndx == SHN_UNDEF
    }

    /// Whether `addr` falls inside `[value, value + size)`.
    /// A zero-sized symbol only covers its own address.
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.value && (addr - self.value < self.size || addr == self.value)
    }

    /// Demangled Rust or C++ name, if the name is mangled
    pub fn demangled_name(&self) -> Option<String> {
        crate::demangle::demangle(&self.name)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ndx = match self.shndx {
            SHN_UNDEF => "UND".to_string(),
            SHN_ABS => "ABS".to_string(),
            SHN_COMMON => "COM".to_string(),
            n => n.to_string(),
        };
        write!(
            f,
            "{:016x} {:>6} {:<8} {:<6} {:>4} {}",
            self.value,
            self.size,
            format!("{:?}", self.sym_type).to_uppercase(),
            format!("{:?}", self.bind).to_uppercase(),
            ndx,
            self.name
        )
    }
}

/// Symbols of one `SHT_SYMTAB` or `SHT_DYNSYM` section.
///
/// Entries are kept in file order. The name index maps each name to the last
/// entry carrying it. The address index holds every entry sorted by value,
/// with ties kept in file order.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    by_name: HashMap<String, usize>,
    by_addr: Vec<usize>,
}

impl SymbolTable {
    /// Build a symbol table from a symbol section and its linked string section.
    pub fn parse<L: ElfLayout>(
        symtab: &Section,
        strtab: &Section,
        endian: Endian,
        config: &ParseConfig,
    ) -> Result<Self> {
        let entsize = match symtab.entsize() {
            0 => L::SYM_SIZE,
            n if n < L::SYM_SIZE as u64 => {
                return Err(ElfError::MalformedHeader(format!(
                    "symbol entry size {} smaller than {}",
                    n,
                    L::SYM_SIZE
                )))
            }
            n => n as usize,
        };

        let data = symtab.data();
        let count = data.len() / entsize;
        ParseConfig::check("symbols", count, config.max_symbols)?;

        let strings = strtab.data();
        let mut symbols = Vec::with_capacity(count);
        for i in 0..count {
            let raw = L::parse_symbol(data, i * entsize, endian)?;
            let name = read_cstring(strings, raw.st_name as usize)?;
            symbols.push(Symbol::new(name, &raw));
        }

        trace!(section = symtab.name(), count, "symbol table");
        Ok(Self::from_symbols(symbols))
    }

    /// Index a list of symbols given in file order.
    pub fn from_symbols(symbols: Vec<Symbol>) -> Self {
        let mut by_name = HashMap::with_capacity(symbols.len());
        for (i, sym) in symbols.iter().enumerate() {
            by_name.insert(sym.name.clone(), i);
        }

        let mut by_addr: Vec<usize> = (0..symbols.len()).collect();
        // Stable: equal values stay in file order
        by_addr.sort_by_key(|&i| symbols[i].value);

        Self {
            symbols,
            by_name,
            by_addr,
        }
    }

    /// Get symbol by index
    pub fn by_index(&self, index: usize) -> Option<&Symbol> {
        self.symbols.get(index)
    }

    /// Get symbol by name. The last entry with that name wins.
    pub fn by_name(&self, name: &str) -> Option<&Symbol> {
        self.by_name.get(name).and_then(|&idx| self.by_index(idx))
    }

    /// Check if a symbol exists
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Resolve an address to a symbol.
    ///
    /// Without `find_near`, only a symbol whose value equals `address` matches.
    /// With `find_near`, the symbol with the greatest value not above `address`
    /// matches; its size is not consulted. Among symbols sharing a value the
    /// first in file order is returned.
    pub fn find_symbol(&self, address: u64, find_near: bool) -> Option<&Symbol> {
        let value_at = |pos: usize| self.symbols[self.by_addr[pos]].value;

        if !find_near {
            let pos = self.by_addr.partition_point(|&i| self.symbols[i].value < address);
            return (pos < self.by_addr.len() && value_at(pos) == address)
                .then(|| &self.symbols[self.by_addr[pos]]);
        }

        let (start, _) = self.nearest_group(address)?;
        Some(&self.symbols[self.by_addr[start]])
    }

    /// Like nearest-mode [`find_symbol`](Self::find_symbol), but the address
    /// must also lie within the symbol's `[value, value + size)` range.
    pub fn find_containing(&self, address: u64) -> Option<&Symbol> {
        let (start, end) = self.nearest_group(address)?;
        self.by_addr[start..end]
            .iter()
            .map(|&i| &self.symbols[i])
            .find(|sym| sym.contains(address))
    }

    // Range in `by_addr` of the symbols sharing the greatest value <= address
    fn nearest_group(&self, address: u64) -> Option<(usize, usize)> {
        let end = self.by_addr.partition_point(|&i| self.symbols[i].value <= address);
        if end == 0 {
            return None;
        }
        let value = self.symbols[self.by_addr[end - 1]].value;
        let start = self.by_addr[..end].partition_point(|&i| self.symbols[i].value < value);
        Some((start, end))
    }

    /// All entries in file order
    pub fn iter(&self) -> std::slice::Iter<'_, Symbol> {
        self.symbols.iter()
    }

    /// Count total entries, including the null entry
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Undefined named symbols
    pub fn imports(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.symbols
            .iter()
            .filter(|s| s.is_undefined() && !s.name.is_empty())
    }

    /// Defined global or weak symbols
    pub fn exports(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.symbols
            .iter()
            .filter(|s| !s.is_undefined() && (s.is_global() || s.is_weak()))
    }

    /// Get all function symbols
    pub fn functions(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.symbols.iter().filter(|s| s.is_function())
    }
}

impl<'a> IntoIterator for &'a SymbolTable {
    type Item = &'a Symbol;
    type IntoIter = std::slice::Iter<'a, Symbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.symbols.iter()
    }
}
