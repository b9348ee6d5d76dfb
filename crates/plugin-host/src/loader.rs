//! Dynamic library loading.
//!
//! `LibraryHandle` is a move-only RAII wrapper around an open
//! `libloading::Library`: it closes the library exactly once, on drop,
//! mirroring the original host's destructor-driven `dlclose`/`FreeLibrary`
//! semantics. It is intentionally not `Clone` — two handles pointing at the
//! same mapped library with independent close-on-drop behavior would be
//! able to double-unmap it.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};

use crate::error::{PluginError, PluginResult};
use crate::traits::{PluginCreateFn, PluginInfo, PluginInfoFn};

const CREATE_SYMBOL: &[u8] = b"CreatePlugin";
const INFO_SYMBOL: &[u8] = b"GetPluginInfo";

/// An open plugin library. Dropping this closes the library; any `Plugin`
/// instance created from it must already have been dropped first, since a
/// `dyn Plugin` vtable lives inside the mapped library.
pub struct LibraryHandle {
    library: Option<Library>,
    path: PathBuf,
}

impl LibraryHandle {
    fn new(library: Library, path: PathBuf) -> Self {
        Self {
            library: Some(library),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn library(&self) -> &Library {
        self.library
            .as_ref()
            .expect("LibraryHandle used after close")
    }

    /// Resolve and call `GetPluginInfo`.
    pub fn read_info(&self) -> PluginResult<PluginInfo> {
        let symbol = unsafe {
            self.library()
                .get::<PluginInfoFn>(INFO_SYMBOL)
                .map_err(|_| PluginError::SymbolMissing {
                    path: self.path.clone(),
                    symbol: String::from_utf8_lossy(INFO_SYMBOL).into_owned(),
                })?
        };
        Ok(unsafe { call_info(&symbol) })
    }

    /// Resolve and call `CreatePlugin`, returning the raw owned instance
    /// pointer. The caller takes ownership and must eventually reclaim it
    /// with `Box::from_raw` before this handle is dropped.
    pub fn create_instance(&self) -> PluginResult<*mut dyn crate::Plugin> {
        let symbol = unsafe {
            self.library()
                .get::<PluginCreateFn>(CREATE_SYMBOL)
                .map_err(|_| PluginError::SymbolMissing {
                    path: self.path.clone(),
                    symbol: String::from_utf8_lossy(CREATE_SYMBOL).into_owned(),
                })?
        };
        let raw = unsafe { call_create(&symbol) };
        if raw.is_null() {
            return Err(PluginError::NullInstance(self.path.clone()));
        }
        Ok(raw)
    }
}

unsafe fn call_info(symbol: &Symbol<'_, PluginInfoFn>) -> PluginInfo {
    (**symbol)()
}

unsafe fn call_create(symbol: &Symbol<'_, PluginCreateFn>) -> *mut dyn crate::Plugin {
    (**symbol)()
}

impl fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryHandle")
            .field("path", &self.path)
            .finish()
    }
}

impl Drop for LibraryHandle {
    fn drop(&mut self) {
        if let Some(library) = self.library.take() {
            if let Err(err) = library.close() {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to close plugin library cleanly");
            }
        }
    }
}

/// Opens plugin libraries and validates their ABI symbols exist.
pub struct Loader;

impl Loader {
    /// Maps the library at `path` into the process.
    ///
    /// # Safety
    ///
    /// Loading arbitrary native code runs the library's initializers
    /// immediately and is unsafe in the same sense `libloading::Library::new`
    /// is: the caller vouches for the library's provenance.
    pub unsafe fn open(path: &Path) -> PluginResult<LibraryHandle> {
        if !path.exists() {
            return Err(PluginError::PathNotFound(path.to_path_buf()));
        }
        let library = Library::new(path).map_err(|err| PluginError::LoadFailed {
            path: path.to_path_buf(),
            detail: err.to_string(),
        })?;
        Ok(LibraryHandle::new(library, path.to_path_buf()))
    }
}

/// Scans a directory for files that look like plugin libraries for the
/// current platform.
pub struct PluginDiscovery;

impl PluginDiscovery {
    /// Platform-native dynamic library extension (`.so`, `.dylib`, `.dll`).
    pub fn platform_extension() -> &'static str {
        if cfg!(target_os = "windows") {
            "dll"
        } else if cfg!(target_os = "macos") {
            "dylib"
        } else {
            "so"
        }
    }

    /// Lists every file directly inside `dir` whose extension matches
    /// [`Self::platform_extension`], sorted by file name for determinism.
    pub fn scan(dir: &Path) -> PluginResult<Vec<PathBuf>> {
        let extension = OsStr::new(Self::platform_extension());
        let mut found = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension() == Some(extension) {
                found.push(path);
            }
        }
        found.sort();
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_path_fails_fast() {
        let result = unsafe { Loader::open(Path::new("/nonexistent/path/to/plugin.so")) };
        assert!(matches!(result, Err(PluginError::PathNotFound(_))));
    }

    #[test]
    fn scan_is_sorted_and_extension_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let ext = PluginDiscovery::platform_extension();
        std::fs::write(dir.path().join(format!("b.{ext}")), b"").unwrap();
        std::fs::write(dir.path().join(format!("a.{ext}")), b"").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"").unwrap();

        let found = PluginDiscovery::scan(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("a.{ext}"), format!("b.{ext}")]);
    }
}
