//! Demangler helpers for Rust and C++ (Itanium) symbols.

// `_Z` prefix, optionally with the extra underscores some platforms add
fn is_itanium_mangled(s: &str) -> bool {
    let rest = s.trim_start_matches('_');
    rest.len() < s.len() && rest.len() > 1 && rest.starts_with('Z')
}

/// Attempt to demangle a single symbol name. Returns None when not recognized.
pub fn demangle(s: &str) -> Option<String> {
    // Rust (v0 + legacy) demangler
    if let Ok(dm) = rustc_demangle::try_demangle(s) {
        return Some(format!("{:#}", dm));
    }
    // C++ (Itanium) demangler
    if is_itanium_mangled(s) {
        if let Ok(sym) = cpp_demangle::Symbol::new(s) {
            return Some(sym.to_string());
        }
    }
    None
}
