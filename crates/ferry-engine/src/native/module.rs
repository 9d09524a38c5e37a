//! Loaded native modules
//!
//! A [`NativeModule`] wraps a mapped shared library with its own reference
//! count. The load itself holds one reference; every resolved call binding
//! and every in-flight call holds another. The library is unmapped when the
//! count reaches zero, unless the module was loaded with
//! [`ModuleFlags::NO_UNLOAD`].

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::loader::{Library, LoadError};
use crate::flags::ModuleFlags;

struct ModuleState {
    library: Option<Library>,
    ref_count: usize,
    raw_handle: usize,
}

/// A mapped shared library
pub struct NativeModule {
    path: String,
    requested: String,
    flags: ModuleFlags,
    state: Mutex<ModuleState>,
}

impl std::fmt::Debug for NativeModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("NativeModule")
            .field("path", &self.path)
            .field("flags", &self.flags)
            .field("ref_count", &state.ref_count)
            .field("loaded", &state.library.is_some())
            .finish()
    }
}

fn is_bare_file_name(path: &str) -> bool {
    let p = Path::new(path);
    !p.is_absolute() && p.components().count() == 1
}

impl NativeModule {
    /// Map a library.
    ///
    /// Bare file names are tried against `search_paths` first; a hit is
    /// recorded with [`ModuleFlags::SEARCHED`]. Otherwise the platform loader
    /// performs its own search.
    pub fn load(
        path: &str,
        flags: ModuleFlags,
        search_paths: &[PathBuf],
    ) -> Result<Self, LoadError> {
        let mut flags = flags;
        let mut resolved = path.to_string();
        if is_bare_file_name(path) {
            if let Some(found) = search_paths
                .iter()
                .map(|dir| dir.join(path))
                .find(|candidate| candidate.is_file())
            {
                resolved = found
                    .to_str()
                    .ok_or_else(|| LoadError::InvalidPath(format!("{:?}", found)))?
                    .to_string();
                flags |= ModuleFlags::SEARCHED;
            }
        }

        let library = Library::open(&resolved)?;
        let raw_handle = library.raw_handle();
        log::debug!(target: "ferry::native", "mapped {} at {:#x}", resolved, raw_handle);
        Ok(Self {
            path: resolved,
            requested: path.to_string(),
            flags,
            state: Mutex::new(ModuleState {
                library: Some(library),
                ref_count: 1,
                raw_handle,
            }),
        })
    }

    /// Path the library was mapped from
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path as passed to [`NativeModule::load`]
    pub fn requested_path(&self) -> &str {
        &self.requested
    }

    /// File name component of the path
    pub fn file_name(&self) -> &str {
        Path::new(&self.path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.path)
    }

    /// Load flags
    pub fn flags(&self) -> ModuleFlags {
        self.flags
    }

    /// Whether the library is still mapped
    pub fn is_loaded(&self) -> bool {
        self.state.lock().library.is_some()
    }

    /// Outstanding references
    pub fn ref_count(&self) -> usize {
        self.state.lock().ref_count
    }

    /// OS module handle (0 once unmapped)
    pub fn raw_handle(&self) -> usize {
        let state = self.state.lock();
        if state.library.is_some() {
            state.raw_handle
        } else {
            0
        }
    }

    /// Address of an exported symbol
    pub fn symbol_address(&self, symbol: &str) -> Result<usize, LoadError> {
        let state = self.state.lock();
        match &state.library {
            Some(library) => library.symbol_address(symbol),
            None => Err(LoadError::NotLoaded {
                path: self.path.clone(),
            }),
        }
    }

    /// Take a reference; fails once the library is unmapped
    pub fn add_ref(&self) -> Result<usize, LoadError> {
        let mut state = self.state.lock();
        if state.library.is_none() {
            return Err(LoadError::NotLoaded {
                path: self.path.clone(),
            });
        }
        state.ref_count += 1;
        Ok(state.ref_count)
    }

    /// Drop a reference. Returns `true` when this unmapped the library.
    pub fn release(&self) -> bool {
        let mut state = self.state.lock();
        state.ref_count = state.ref_count.saturating_sub(1);
        if state.ref_count > 0 || self.flags.contains(ModuleFlags::NO_UNLOAD) {
            return false;
        }
        match state.library.take() {
            Some(library) => {
                drop(library);
                log::debug!(target: "ferry::native", "unmapped {}", self.path);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_file_name() {
        assert!(is_bare_file_name("libc.so.6"));
        assert!(!is_bare_file_name("/usr/lib/libc.so.6"));
        assert!(!is_bare_file_name("lib/libc.so.6"));
    }

    #[test]
    fn test_load_missing() {
        let err =
            NativeModule::load("/nonexistent/libnothing.so", ModuleFlags::NONE, &[]).unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_ref_counting_unmaps_at_zero() {
        let module = NativeModule::load("libc.so.6", ModuleFlags::NONE, &[]).unwrap();
        assert_eq!(module.ref_count(), 1);
        assert_eq!(module.add_ref().unwrap(), 2);
        assert!(!module.release());
        assert!(module.is_loaded());
        assert!(module.release());
        assert!(!module.is_loaded());
        assert_eq!(module.raw_handle(), 0);
        assert!(matches!(module.add_ref(), Err(LoadError::NotLoaded { .. })));
        assert!(matches!(module.symbol_address("strlen"), Err(LoadError::NotLoaded { .. })));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_no_unload_keeps_mapping() {
        let module = NativeModule::load("libc.so.6", ModuleFlags::NO_UNLOAD, &[]).unwrap();
        assert!(!module.release());
        assert!(module.is_loaded());
        assert_eq!(module.ref_count(), 0);
    }
}
