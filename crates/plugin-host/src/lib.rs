//! Dynamically loaded plugin runtime.
//!
//! `PluginHost` wires together a [`Loader`](loader::Loader), a
//! [`DependencyResolver`], a [`PluginRegistry`], and a
//! [`LifecycleController`] into the single entry point embedding
//! applications use. The lower-level pieces stay public for hosts that
//! want to drive them directly (the CLI binary in this workspace uses
//! `PluginHost` alone; a more advanced embedder might want the registry
//! without the directory-scanning convenience of `load_all`).
//!
//! The public surface here is boolean/`Option`-returning rather than
//! `Result`-returning: a plugin failure is an expected, recoverable event,
//! not a reason to make every call site at the host/plugin boundary
//! handle a `Result`. Call [`PluginHost::last_error`] for the structured
//! reason behind the most recent `false`/`None`.

pub mod config;
pub mod dependency;
pub mod error;
pub mod lifecycle;
pub mod loader;
pub mod registry;
pub mod traits;
pub mod version;

use std::path::Path;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

pub use config::HostConfig;
pub use dependency::DependencyResolver;
pub use error::{PluginError, PluginResult};
pub use lifecycle::LifecycleController;
pub use loader::{Loader, PluginDiscovery};
pub use registry::{LifecycleCallback, LifecycleEvent, PluginRegistry};
pub use traits::{Dependency, Plugin, PluginCreateFn, PluginInfo, PluginInfoFn};
pub use version::Version;

/// The embedding application's entry point into the plugin runtime.
pub struct PluginHost {
    config: HostConfig,
    lifecycle: LifecycleController,
}

impl PluginHost {
    pub fn new(config: HostConfig) -> Self {
        let registry = Arc::new(PluginRegistry::new());
        registry.set_logging_enabled(config.logging_enabled);
        Self {
            lifecycle: LifecycleController::new(registry),
            config,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        self.lifecycle.registry()
    }

    /// Discovers and loads every plugin in `config.plugin_dir`, in
    /// dependency order. Returns `true` if every discovered plugin loaded
    /// cleanly; individual failures are always available via
    /// [`Self::last_error`] (the last one reported) even when this returns
    /// `true` for the rest.
    pub fn load_all(&self) -> bool {
        match self.lifecycle.load_all(&self.config.plugin_dir) {
            Ok(failures) => failures.is_empty() || !self.config.strict_dependencies,
            Err(_) => false,
        }
    }

    /// Loads a single plugin library at an explicit path.
    pub fn load(&self, path: &Path) -> bool {
        self.registry().load(path).is_ok()
    }

    /// Unloads a single plugin. Fails if another loaded plugin's
    /// required-dependency chain reaches it.
    pub fn unload(&self, name: &str) -> bool {
        let dependents = self.lifecycle.dependents_of(name);
        self.registry().unload(name, &dependents).is_ok()
    }

    /// Unloads every loaded plugin, dependents before dependencies.
    pub fn unload_all(&self) -> bool {
        self.lifecycle.unload_all().is_empty()
    }

    /// Replaces a loaded plugin's library with a fresh build loaded from
    /// the path it was last loaded from, carrying its serialized state
    /// across and cascading the swap through its dependents.
    pub fn hot_reload(&self, name: &str) -> bool {
        self.lifecycle.hot_reload(name).is_ok()
    }

    /// Verifies every loaded plugin's required dependencies are loaded and
    /// new enough.
    pub fn dependencies_satisfied(&self) -> bool {
        self.lifecycle.verify_dependencies().is_empty()
    }

    /// Re-runs initialization over every loaded plugin in dependency order,
    /// stopping at the first one whose `initialize` returns `false`.
    pub fn resolve_dependencies(&self) -> bool {
        self.lifecycle.resolve_dependencies()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.registry().is_loaded(name)
    }

    pub fn loaded_names(&self) -> Vec<String> {
        self.registry().loaded_names()
    }

    pub fn load_order(&self) -> Vec<String> {
        self.registry().load_order()
    }

    pub fn plugin_info(&self, name: &str) -> Option<PluginInfo> {
        self.registry().info_of(name)
    }

    /// A strong handle to a live plugin instance. See
    /// [`PluginRegistry::get`] for its lifetime caveats.
    pub fn get(&self, name: &str) -> Option<Arc<Mutex<Box<dyn Plugin>>>> {
        self.registry().get(name)
    }

    pub fn get_weak(&self, name: &str) -> Option<Weak<Mutex<Box<dyn Plugin>>>> {
        self.registry().get_weak(name)
    }

    pub fn register_lifecycle_callback(&self, callback: LifecycleCallback) {
        self.registry().register_lifecycle_callback(callback);
    }

    /// The structured reason behind the most recent failed call, if any.
    pub fn last_error(&self) -> Option<String> {
        self.registry().last_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_all_on_an_empty_directory_succeeds_trivially() {
        let dir = tempfile::tempdir().unwrap();
        let host = PluginHost::new(HostConfig::new(dir.path()));
        assert!(host.load_all());
        assert!(host.loaded_names().is_empty());
    }

    #[test]
    fn loading_a_nonexistent_path_reports_last_error() {
        let dir = tempfile::tempdir().unwrap();
        let host = PluginHost::new(HostConfig::new(dir.path()));
        assert!(!host.load(Path::new("/nonexistent/plugin.so")));
        assert!(host.last_error().unwrap().contains("does not exist"));
    }

    #[test]
    fn unloading_a_plugin_with_no_dependents_succeeds() {
        use crate::registry::fixture::FixturePlugin;
        use crate::registry::fixture_support::install_fixture;

        let dir = tempfile::tempdir().unwrap();
        let host = PluginHost::new(HostConfig::new(dir.path()));
        install_fixture(
            host.registry(),
            "math",
            Box::new(FixturePlugin {
                name: "math".into(),
                ..Default::default()
            }),
        );
        install_fixture(
            host.registry(),
            "logging",
            Box::new(FixturePlugin {
                name: "logging".into(),
                ..Default::default()
            }),
        );

        assert!(host.unload("math"));
        assert!(!host.is_loaded("math"));
        assert!(host.is_loaded("logging"));
    }
}
