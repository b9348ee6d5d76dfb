//! In-memory host configuration.
//!
//! There is deliberately no on-disk config file format: a host embeds
//! `plugin-host` and builds a `HostConfig` in code (or from whatever
//! config layer the embedding application already has), the same way the
//! CLI binary in this workspace builds one from its `clap` arguments.

use std::path::PathBuf;

/// Settings the lifecycle controller and registry consult at construction
/// time and on `load_all`.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Directory scanned for plugin libraries by `load_all`.
    pub plugin_dir: PathBuf,
    /// Whether the registry logs load/unload/hot-reload activity via
    /// `tracing`.
    pub logging_enabled: bool,
    /// Whether `PluginHost::load_all` reports overall failure when any
    /// individual plugin failed to load. Either way every plugin that can
    /// load does, and every failure is still visible through
    /// `PluginHost::last_error`; this only controls the aggregate result.
    pub strict_dependencies: bool,
}

impl HostConfig {
    pub fn new(plugin_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            logging_enabled: true,
            strict_dependencies: false,
        }
    }

    pub fn with_logging_enabled(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    pub fn with_strict_dependencies(mut self, strict: bool) -> Self {
        self.strict_dependencies = strict;
        self
    }
}
