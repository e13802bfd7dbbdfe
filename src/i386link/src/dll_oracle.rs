use libloading::Library;
use std::collections::{HashMap, HashSet};

/// The default set of DLLs this linker consults before anything named on
/// the command line. Failing to open one of these is silent; a
/// `-dll`-supplied path that fails to open produces a warning instead
///.
pub const DEFAULT_DLLS: &[&str] = &[
    "kernel32.dll",
    "user32.dll",
    "shell32.dll",
    "msvcrt.dll",
    "gdi32.dll",
    "ole32.dll",
    "advapi32.dll",
    "comctl32.dll",
    "wsock32.dll",
    "mpr.dll",
];

/// A symbol found in a DLL, alongside the resolved name actually exported
/// (which may differ from the name requested after fallback stripping).
#[derive(Debug, Clone)]
pub struct ResolvedSymbol {
    pub resolved_name: String,
    pub dll_name: String,
}

/// Given a symbol name and the set of currently open DLLs, answers
/// "does this symbol exist, and in which DLL". The canonical
/// implementation loads real shared libraries and probes their export
/// table; tests substitute a `HashMap`-backed fake.
pub trait DllOracle {
    fn resolve(&mut self, symbol_name: &str) -> Option<ResolvedSymbol>;
}

/// Fallback name candidates tried after the exact symbol name fails to
/// resolve: first strip everything from the first character
/// that is not `[A-Za-z0-9_]` onward, then strip one or more leading
/// underscores from what remains, yielding progressively shorter
/// alternatives.
pub fn fallback_candidates(symbol_name: &str) -> Vec<String> {
    let mut candidates = Vec::new();

    let stripped_suffix: String = {
        let end = symbol_name
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(symbol_name.len());
        symbol_name[..end].to_string()
    };

    if stripped_suffix != symbol_name {
        candidates.push(stripped_suffix.clone());
    }

    let mut without_underscores = stripped_suffix.as_str();
    while let Some(rest) = without_underscores.strip_prefix('_') {
        candidates.push(rest.to_string());
        without_underscores = rest;
    }

    candidates
}

/// Loads real dynamic libraries via `libloading` and answers symbol
/// lookups against their export tables, caching both hits and the set of
/// names already reported under `-dllwarn` so repeats are silent.
pub struct LibraryOracle {
    libraries: Vec<(String, Library)>,
    cache: HashMap<String, Option<ResolvedSymbol>>,
    reported_names: HashSet<String>,
}

impl LibraryOracle {
    pub fn new() -> Self {
        LibraryOracle {
            libraries: Vec::new(),
            cache: HashMap::new(),
            reported_names: HashSet::new(),
        }
    }

    /// Attempts to open and register `path` under `dll_name`. Returns
    /// `false` on failure; callers decide whether that is a silent skip
    /// (default set) or a warning (`-dll`).
    pub fn open(&mut self, dll_name: &str, path: &str) -> bool {
        match unsafe { Library::new(path) } {
            Ok(library) => {
                self.libraries.push((dll_name.to_string(), library));
                true
            }
            Err(_) => false,
        }
    }

    /// Marks `original_name` as already warned-about for fuzzy resolution,
    /// returning whether it is newly reported (i.e. the caller should
    /// actually emit the warning).
    pub fn mark_reported(&mut self, original_name: &str) -> bool {
        self.reported_names.insert(original_name.to_string())
    }

    fn probe(&self, name: &str) -> Option<String> {
        for (dll_name, library) in &self.libraries {
            let found: Result<libloading::Symbol<*const ()>, _> =
                unsafe { library.get(name.as_bytes()) };
            if found.is_ok() {
                return Some(dll_name.clone());
            }
        }
        None
    }
}

impl Default for LibraryOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl DllOracle for LibraryOracle {
    fn resolve(&mut self, symbol_name: &str) -> Option<ResolvedSymbol> {
        if let Some(cached) = self.cache.get(symbol_name) {
            return cached.clone();
        }

        let mut candidates = vec![symbol_name.to_string()];
        candidates.extend(fallback_candidates(symbol_name));

        let result = candidates.into_iter().find_map(|candidate| {
            self.probe(&candidate).map(|dll_name| ResolvedSymbol {
                resolved_name: candidate,
                dll_name,
            })
        });

        self.cache.insert(symbol_name.to_string(), result.clone());
        result
    }
}
