//! Dynamic library loading for native modules
//!
//! Cross-platform support for loading shared libraries (.so, .dylib, .dll)
//! and looking up raw symbol addresses.

use std::ffi::CString;
#[cfg(unix)]
use std::ffi::CStr;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during library loading
#[derive(Debug, Error)]
pub enum LoadError {
    /// Library file not found or could not be loaded
    #[error("Library not found: {path}")]
    NotFound {
        /// Path that was attempted
        path: String,
    },

    /// Symbol not found in library
    #[error("Symbol not found: {symbol} in {library}")]
    SymbolNotFound {
        /// Symbol name that was not found
        symbol: String,
        /// Library path
        library: String,
    },

    /// The module was already unmapped
    #[error("Library is not loaded: {path}")]
    NotLoaded {
        /// Library path
        path: String,
    },

    /// Platform-specific error
    #[error("Platform error: {0}")]
    PlatformError(String),

    /// Invalid path encoding
    #[error("Invalid UTF-8 in path: {0}")]
    InvalidPath(String),
}

/// Cross-platform dynamic library handle
pub struct Library {
    handle: LibraryHandle,
    path: String,
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("path", &self.path)
            .field("handle", &format_args!("{:#x}", self.raw_handle()))
            .finish()
    }
}

impl Library {
    /// Load a dynamic library from the given path.
    ///
    /// # Platform-specific behavior
    ///
    /// - **Linux**: Loads `.so` files using `dlopen(RTLD_NOW | RTLD_LOCAL)`
    /// - **macOS**: Loads `.dylib` files using `dlopen(RTLD_NOW | RTLD_LOCAL)`
    /// - **Windows**: Loads `.dll` files using `LoadLibraryW`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path_ref = path.as_ref();
        let path_str = path_ref
            .to_str()
            .ok_or_else(|| LoadError::InvalidPath(format!("{:?}", path_ref)))?;

        let handle = LibraryHandle::load(path_str)?;

        Ok(Library {
            handle,
            path: path_str.to_string(),
        })
    }

    /// Address of an exported symbol
    pub fn symbol_address(&self, symbol: &str) -> Result<usize, LoadError> {
        self.handle.symbol(symbol, &self.path)
    }

    /// Raw OS module handle as an integer
    pub fn raw_handle(&self) -> usize {
        self.handle.handle as usize
    }

    /// Get the path this library was loaded from
    pub fn path(&self) -> &str {
        &self.path
    }
}

// Platform-specific implementations

#[cfg(unix)]
type LibraryHandle = UnixLibrary;

#[cfg(windows)]
type LibraryHandle = WindowsLibrary;

// ============================================================================
// Unix Implementation (Linux, macOS, BSD)
// ============================================================================

#[cfg(unix)]
struct UnixLibrary {
    handle: *mut std::ffi::c_void,
}

#[cfg(unix)]
impl UnixLibrary {
    fn load(path: &str) -> Result<Self, LoadError> {
        let c_path = CString::new(path)
            .map_err(|e| LoadError::PlatformError(format!("Invalid path: {}", e)))?;

        // RTLD_NOW: resolve all symbols immediately
        // RTLD_LOCAL: symbols not available for subsequently loaded libraries
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };

        if handle.is_null() {
            return Err(LoadError::NotFound {
                path: format!("{}: {}", path, last_dl_error()),
            });
        }

        Ok(UnixLibrary { handle })
    }

    fn symbol(&self, name: &str, lib_path: &str) -> Result<usize, LoadError> {
        let c_name = CString::new(name)
            .map_err(|e| LoadError::PlatformError(format!("Invalid symbol name: {}", e)))?;

        let symbol = unsafe {
            // Clear any previous errors
            libc::dlerror();
            libc::dlsym(self.handle, c_name.as_ptr())
        };

        let err_ptr = unsafe { libc::dlerror() };
        if !err_ptr.is_null() {
            let error = unsafe { CStr::from_ptr(err_ptr) }
                .to_string_lossy()
                .into_owned();
            return Err(LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: format!("{}: {}", lib_path, error),
            });
        }

        if symbol.is_null() {
            return Err(LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: lib_path.to_string(),
            });
        }

        Ok(symbol as usize)
    }
}

#[cfg(unix)]
fn last_dl_error() -> String {
    unsafe {
        let err_ptr = libc::dlerror();
        if err_ptr.is_null() {
            "Unknown error".to_string()
        } else {
            CStr::from_ptr(err_ptr).to_string_lossy().into_owned()
        }
    }
}

#[cfg(unix)]
impl Drop for UnixLibrary {
    fn drop(&mut self) {
        unsafe {
            libc::dlclose(self.handle);
        }
    }
}

#[cfg(unix)]
unsafe impl Send for UnixLibrary {}
#[cfg(unix)]
unsafe impl Sync for UnixLibrary {}

// ============================================================================
// Windows Implementation
// ============================================================================

#[cfg(windows)]
struct WindowsLibrary {
    handle: *mut std::ffi::c_void,
}

#[cfg(windows)]
impl WindowsLibrary {
    fn load(path: &str) -> Result<Self, LoadError> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;

        let wide: Vec<u16> = OsStr::new(path)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        let handle = unsafe { LoadLibraryW(wide.as_ptr()) };

        if handle.is_null() {
            let error = unsafe { GetLastError() };
            return Err(LoadError::NotFound {
                path: format!("{} (error code: {})", path, error),
            });
        }

        Ok(WindowsLibrary { handle })
    }

    fn symbol(&self, name: &str, lib_path: &str) -> Result<usize, LoadError> {
        let c_name = CString::new(name)
            .map_err(|e| LoadError::PlatformError(format!("Invalid symbol name: {}", e)))?;

        let symbol = unsafe { GetProcAddress(self.handle, c_name.as_ptr()) };

        if symbol.is_null() {
            let error = unsafe { GetLastError() };
            return Err(LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: format!("{} (error code: {})", lib_path, error),
            });
        }

        Ok(symbol as usize)
    }
}

#[cfg(windows)]
impl Drop for WindowsLibrary {
    fn drop(&mut self) {
        unsafe {
            FreeLibrary(self.handle);
        }
    }
}

#[cfg(windows)]
unsafe impl Send for WindowsLibrary {}
#[cfg(windows)]
unsafe impl Sync for WindowsLibrary {}

#[cfg(windows)]
extern "system" {
    fn LoadLibraryW(filename: *const u16) -> *mut std::ffi::c_void;
    fn GetProcAddress(module: *mut std::ffi::c_void, procname: *const i8) -> *mut std::ffi::c_void;
    fn FreeLibrary(module: *mut std::ffi::c_void) -> i32;
    fn GetLastError() -> u32;
}
