//! Error types returned by the loader, resolver, registry, and lifecycle
//! controller.
//!
//! The public `PluginHost` API itself stays boolean/`Option`-returning (see
//! `lib.rs`), mirroring the original host's "never let a plugin failure
//! propagate as an exception" stance. `PluginError` is the structured value
//! stored behind that boundary and surfaced through `last_error()`.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate's internals.
pub type PluginResult<T> = Result<T, PluginError>;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("failed to load library at {path}: {detail}")]
    LoadFailed { path: PathBuf, detail: String },

    #[error("library at {path} is missing required symbol {symbol:?}")]
    SymbolMissing { path: PathBuf, symbol: String },

    #[error("a plugin named {0:?} is already registered")]
    DuplicateName(String),

    #[error("CreatePlugin returned a null instance at {0}")]
    NullInstance(PathBuf),

    #[error("no plugin named {0:?} is registered")]
    NotRegistered(String),

    #[error("cannot unload {0:?}: {1:?} still depends on it")]
    BlockedByDependent(String, String),

    #[error("dependency cycle detected at {0:?}")]
    Cycle(String),

    #[error("plugin {0:?} failed to initialize")]
    InitializeFailed(String),

    #[error("hot reload of {0:?} was aborted before any state was lost")]
    HotReloadAborted(String),

    #[error("plugin {0:?} has no recorded library path to reload from")]
    NoRecordedPath(String),

    #[error("hot reload of {name:?} left dependents unrestored: {failed_dependents:?}")]
    HotReloadPartial {
        name: String,
        failed_dependents: Vec<String>,
    },

    #[error("plugin directory scan failed: {0}")]
    Io(#[from] std::io::Error),
}
