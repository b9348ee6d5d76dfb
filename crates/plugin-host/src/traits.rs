//! The plugin ABI: the capability set every plugin implements and the two
//! symbols every plugin library must export.

use serde::{Deserialize, Serialize};

use crate::version::Version;

/// A single declared dependency on another plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub min_version: Version,
    pub optional: bool,
}

impl Dependency {
    pub fn required(name: impl Into<String>, min_version: Version) -> Self {
        Self {
            name: name.into(),
            min_version,
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, min_version: Version) -> Self {
        Self {
            name: name.into(),
            min_version,
            optional: true,
        }
    }

    /// Whether `candidate` is new enough to satisfy this dependency.
    pub fn is_satisfied_by(&self, candidate: Version) -> bool {
        candidate >= self.min_version
    }
}

/// Metadata a plugin reports about itself, independent of any loaded
/// instance. Obtained from a library via `GetPluginInfo` before (and after)
/// `CreatePlugin` is ever called.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub version: Version,
    pub author: String,
    pub dependencies: Vec<Dependency>,
}

impl PluginInfo {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        version: Version,
        author: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            description: description.into(),
            version,
            author: author.into(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn required_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(|d| !d.optional)
    }

    pub fn optional_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(|d| d.optional)
    }
}

/// The capability set a loaded plugin instance must implement.
///
/// Every method is synchronous and infallible at the type level; failures
/// are reported through return values (`bool`/`Option`), not `Result`,
/// because instances cross an FFI boundary where unwinding is undefined
/// behavior. The host wraps every call in `catch_unwind` so a panicking
/// plugin degrades to a reported failure instead of aborting the process.
pub trait Plugin: Send {
    /// Called once, after construction, before the plugin is considered
    /// live. Returning `false` aborts the load.
    fn initialize(&mut self) -> bool;

    /// Called once, before the instance is dropped.
    fn shutdown(&mut self);

    /// Metadata for this live instance. Usually identical to what
    /// `GetPluginInfo` reported before construction, but instances are
    /// free to enrich it (e.g. runtime-discovered capabilities).
    fn plugin_info(&self) -> PluginInfo;

    /// Snapshot internal state as an opaque byte blob, used to carry state
    /// across a hot reload.
    fn serialize(&self) -> Vec<u8>;

    /// Restore internal state from a blob produced by `serialize`.
    /// Returns `false` if the blob could not be applied.
    fn deserialize(&mut self, data: &[u8]) -> bool;

    /// Called on the outgoing instance before it is unloaded as part of a
    /// hot reload. Returning `false` aborts the reload before anything is
    /// torn down.
    fn prepare_hot_reload(&mut self) -> bool {
        true
    }

    /// Called on the incoming instance after its state has been restored.
    /// Returning `false` marks this plugin's reload as failed without
    /// aborting dependents that already succeeded.
    fn complete_hot_reload(&mut self) -> bool {
        true
    }
}

/// Signature of the `CreatePlugin` symbol every plugin library exports.
///
/// Constructs and returns an owned instance directly — there is no factory
/// indirection. Ownership of the returned pointer passes to the host, which
/// reclaims it with `Box::from_raw` exactly once, no matter which library
/// produced it.
pub type PluginCreateFn = unsafe fn() -> *mut dyn Plugin;

/// Signature of the `GetPluginInfo` symbol every plugin library exports.
///
/// Returns metadata without constructing an instance, so the host can
/// learn a plugin's name and declared dependencies before deciding whether
/// (or in what order) to call `CreatePlugin`.
pub type PluginInfoFn = unsafe fn() -> PluginInfo;

/// Generates the two exported ABI symbols for a plugin crate.
///
/// ```ignore
/// declare_plugin!(MyPlugin, MyPlugin::default, my_plugin_info);
/// ```
#[macro_export]
macro_rules! declare_plugin {
    ($plugin_ty:ty, $ctor:expr, $info:expr) => {
        #[no_mangle]
        #[allow(non_snake_case)]
        pub fn CreatePlugin() -> *mut dyn $crate::Plugin {
            let ctor: fn() -> $plugin_ty = $ctor;
            let instance: Box<dyn $crate::Plugin> = Box::new(ctor());
            Box::into_raw(instance)
        }

        #[no_mangle]
        #[allow(non_snake_case)]
        pub fn GetPluginInfo() -> $crate::PluginInfo {
            let info: fn() -> $crate::PluginInfo = $info;
            info()
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_satisfaction_is_a_minimum_version_predicate() {
        let dep = Dependency::required("math", Version::new(1, 2, 0));
        assert!(dep.is_satisfied_by(Version::new(1, 2, 0)));
        assert!(dep.is_satisfied_by(Version::new(1, 3, 0)));
        assert!(dep.is_satisfied_by(Version::new(2, 0, 0)));
        assert!(!dep.is_satisfied_by(Version::new(1, 1, 9)));
    }

    #[test]
    fn info_splits_required_and_optional_dependencies() {
        let info = PluginInfo::new("stats", "Stats", "stats plugin", Version::new(1, 0, 0), "me")
            .with_dependency(Dependency::required("math", Version::new(1, 0, 0)))
            .with_dependency(Dependency::optional("logging", Version::new(1, 0, 0)));

        assert_eq!(info.required_dependencies().count(), 1);
        assert_eq!(info.optional_dependencies().count(), 1);
    }
}
