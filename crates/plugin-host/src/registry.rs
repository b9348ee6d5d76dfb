//! The plugin registry: owns every loaded library and instance, and is the
//! single point of mutual exclusion for the whole host.
//!
//! State lives behind one `parking_lot::Mutex`, held across plugin method
//! calls rather than released between "look up" and "call". This is the
//! simpler of the two concurrency models available (the other being a
//! lock-free map with per-entry locks) and matches a host that expects
//! plugin calls to be quick and non-reentrant; a plugin that calls back
//! into the registry from inside one of its own lifecycle methods will
//! deadlock, which is considered a plugin bug rather than something the
//! host should design around.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::{PluginError, PluginResult};
use crate::loader::{Loader, LibraryHandle};
use crate::traits::{Plugin, PluginInfo};

/// A lifecycle event a registered callback can observe.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    Loaded(String),
    Unloaded(String),
    InitializeFailed(String),
    HotReloadStarted(String),
    HotReloadCompleted(String),
    HotReloadFailed(String),
}

/// Callbacks are kept behind `Arc` rather than `Box` so `emit` can clone the
/// list out from under the state lock and invoke each one with the lock
/// released.
pub type LifecycleCallback = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

struct LibraryEntry {
    /// `None` for instances registered without a backing dynamic library
    /// (used by tests to exercise registry/resolver/lifecycle logic with
    /// in-process fixture plugins).
    handle: Option<LibraryHandle>,
    /// The path the library was opened from, kept independent of `handle`
    /// so a hot reload can still recall it after the handle has closed.
    path: Option<PathBuf>,
    instance: Arc<Mutex<Box<dyn Plugin>>>,
    info: PluginInfo,
}

#[derive(Default)]
struct RegistryState {
    entries: std::collections::HashMap<String, LibraryEntry>,
    load_order: Vec<String>,
    last_error: Option<String>,
    logging_enabled: bool,
    callbacks: Vec<LifecycleCallback>,
}

/// Owns every loaded plugin library and instance.
pub struct PluginRegistry {
    state: Mutex<RegistryState>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn set_logging_enabled(&self, enabled: bool) {
        self.state.lock().logging_enabled = enabled;
    }

    pub fn register_lifecycle_callback(&self, callback: LifecycleCallback) {
        self.state.lock().callbacks.push(callback);
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    pub fn loaded_names(&self) -> Vec<String> {
        self.state.lock().load_order.clone()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.state.lock().entries.contains_key(name)
    }

    pub fn load_order(&self) -> Vec<String> {
        self.state.lock().load_order.clone()
    }

    /// Returns a strong handle to a live plugin instance. The returned
    /// `Arc` can outlive the entry being removed from the registry by a
    /// concurrent `unload`; prefer [`Self::get_weak`] for observers that
    /// shouldn't extend a plugin's lifetime past its unload.
    pub fn get(&self, name: &str) -> Option<Arc<Mutex<Box<dyn Plugin>>>> {
        self.state.lock().entries.get(name).map(|e| e.instance.clone())
    }

    pub fn get_weak(&self, name: &str) -> Option<Weak<Mutex<Box<dyn Plugin>>>> {
        self.state
            .lock()
            .entries
            .get(name)
            .map(|e| Arc::downgrade(&e.instance))
    }

    pub fn info_of(&self, name: &str) -> Option<PluginInfo> {
        self.state.lock().entries.get(name).map(|e| e.info.clone())
    }

    /// The path a loaded plugin's library was opened from, if it has one
    /// (fixture-registered test instances don't). Used by the lifecycle
    /// controller to reload a plugin from where it last came from.
    pub fn path_of(&self, name: &str) -> Option<PathBuf> {
        self.state.lock().entries.get(name).and_then(|e| e.path.clone())
    }

    /// Opens a plugin library, constructs an instance via `CreatePlugin`,
    /// and registers it under the name its `GetPluginInfo` reports. Does
    /// not call `initialize`: that's `resolve_dependencies`'s job, run once
    /// over every registered plugin in dependency order, so a plugin is
    /// never initialized before its own dependencies are.
    ///
    /// This does not consult or update the dependency graph; callers that
    /// care about load order use the lifecycle controller, which loads
    /// libraries through this method in an order the resolver already
    /// computed.
    pub fn load(&self, path: &Path) -> PluginResult<String> {
        let handle = unsafe { Loader::open(path) }.map_err(|e| self.fail(e))?;
        let info = handle.read_info().map_err(|e| self.fail(e))?;
        let name = info.name.clone();

        let already_loaded = self.state.lock().entries.contains_key(&name);
        if already_loaded {
            return Err(self.fail(PluginError::DuplicateName(name)));
        }

        let raw = handle.create_instance().map_err(|e| self.fail(e))?;
        // Safety: `create_instance` returned a non-null owned pointer from
        // `CreatePlugin`, which hands off ownership to the host.
        let instance = unsafe { Box::from_raw(raw) };

        let entry = LibraryEntry {
            handle: Some(handle),
            path: Some(path.to_path_buf()),
            instance: Arc::new(Mutex::new(instance)),
            info,
        };

        {
            let mut state = self.state.lock();
            state.load_order.push(name.clone());
            state.entries.insert(name.clone(), entry);
        }

        self.log(&format!("loaded plugin {name:?} from {}", path.display()));
        self.emit(LifecycleEvent::Loaded(name.clone()));
        Ok(name)
    }

    /// Unloads a single plugin by name. Fails if another loaded plugin
    /// still required-depends on it; the caller decides whether to unload
    /// dependents first.
    pub fn unload(&self, name: &str, dependents: &[String]) -> PluginResult<()> {
        if let Some(dependent) = dependents.iter().find(|d| self.is_loaded(d)) {
            return Err(self.fail(PluginError::BlockedByDependent(
                name.to_string(),
                dependent.clone(),
            )));
        }

        let removed = {
            let mut state = self.state.lock();
            let removed = state.entries.remove(name);
            if removed.is_some() {
                state.load_order.retain(|n| n != name);
            }
            removed
        };
        let entry = match removed {
            Some(entry) => entry,
            None => return Err(self.fail(PluginError::NotRegistered(name.to_string()))),
        };

        let mut instance = entry.instance.lock();
        let _ = catch_unwind(AssertUnwindSafe(|| instance.shutdown()));
        drop(instance);

        // Dropping `entry` here closes the library. This only unmaps
        // cleanly if `entry.instance` has no other strong references left;
        // a caller holding an `Arc` from `get()` past this point is why
        // `get_weak` is the recommended handle for long-lived observers.
        drop(entry);

        self.log(&format!("unloaded plugin {name:?}"));
        self.emit(LifecycleEvent::Unloaded(name.to_string()));
        Ok(())
    }

    /// Shuts down and unloads every loaded plugin in `order` (expected to
    /// be the reverse of load order, so dependents go before the
    /// dependencies they hold onto). Collects every failure rather than
    /// stopping at the first one, since a host exiting wants every plugin
    /// given a chance to clean up.
    pub fn unload_all(&self, order: &[String]) -> Vec<(String, PluginError)> {
        let mut failures = Vec::new();
        for name in order {
            if let Err(err) = self.unload(name, &[]) {
                failures.push((name.clone(), err));
            }
        }
        failures
    }

    pub fn plugin_paths(&self) -> Vec<PathBuf> {
        self.state
            .lock()
            .entries
            .values()
            .filter_map(|e| e.path.clone())
            .collect()
    }

    /// Inserts a freshly-built entry for `name`, which must not currently
    /// be registered, reinstating it at `position` in the load order
    /// rather than appending it — used by hot reload to keep a plugin's
    /// relative position stable across a swap.
    pub fn reinstall(
        &self,
        position: usize,
        name: &str,
        path: Option<PathBuf>,
        handle: Option<LibraryHandle>,
        instance: Box<dyn Plugin>,
        info: PluginInfo,
    ) {
        let mut state = self.state.lock();
        state.entries.insert(
            name.to_string(),
            LibraryEntry {
                handle,
                path,
                instance: Arc::new(Mutex::new(instance)),
                info,
            },
        );
        let position = position.min(state.load_order.len());
        state.load_order.insert(position, name.to_string());
    }

    /// Dispatches a lifecycle event to every registered callback, used by
    /// the lifecycle controller for events (like hot reload phases) that
    /// don't originate from a registry method directly.
    pub fn notify(&self, event: LifecycleEvent) {
        self.emit(event);
    }

    /// Invokes every registered callback with the state lock released, so a
    /// callback calling back into any registry method doesn't deadlock on
    /// itself.
    fn emit(&self, event: LifecycleEvent) {
        let callbacks: Vec<LifecycleCallback> = self.state.lock().callbacks.clone();
        for callback in &callbacks {
            let _ = catch_unwind(AssertUnwindSafe(|| callback(&event)));
        }
    }

    fn log(&self, message: &str) {
        if self.state.lock().logging_enabled {
            tracing::info!("{message}");
        }
    }

    /// Records `error` as the last error and returns it unchanged, so call
    /// sites can write `return Err(self.fail(err))`. Visible crate-wide so
    /// the lifecycle controller can surface its own failures (cycle
    /// detection, failed re-initialization) through the same slot.
    pub(crate) fn fail(&self, error: PluginError) -> PluginError {
        let mut state = self.state.lock();
        if state.logging_enabled {
            tracing::error!(%error, "plugin registry operation failed");
        }
        state.last_error = Some(error.to_string());
        drop(state);
        error
    }
}

/// Test-only helper for registering a plugin instance directly, bypassing
/// `Loader`/`libloading` entirely. Shared across this crate's test modules.
#[cfg(test)]
pub(crate) mod fixture_support {
    use super::*;

    pub fn install_fixture(registry: &PluginRegistry, name: &str, plugin: Box<dyn Plugin>) {
        let info = plugin.plugin_info();
        let instance = Arc::new(Mutex::new(plugin));
        let mut state = registry.state.lock();
        state.load_order.push(name.to_string());
        state.entries.insert(
            name.to_string(),
            LibraryEntry {
                handle: None,
                path: None,
                instance,
                info,
            },
        );
    }
}

#[cfg(test)]
pub(crate) mod fixture {
    use super::*;
    use crate::version::Version;

    /// An in-process plugin used by tests so registry/resolver/lifecycle
    /// logic can be exercised without a compiled `cdylib`.
    #[derive(Default)]
    pub struct FixturePlugin {
        pub name: String,
        pub fail_initialize: bool,
        pub counter: u64,
    }

    impl Plugin for FixturePlugin {
        fn initialize(&mut self) -> bool {
            !self.fail_initialize
        }

        fn shutdown(&mut self) {}

        fn plugin_info(&self) -> PluginInfo {
            PluginInfo::new(
                self.name.clone(),
                self.name.clone(),
                "fixture",
                Version::new(1, 0, 0),
                "test",
            )
        }

        fn serialize(&self) -> Vec<u8> {
            self.counter.to_le_bytes().to_vec()
        }

        fn deserialize(&mut self, data: &[u8]) -> bool {
            match data.try_into() {
                Ok(bytes) => {
                    self.counter = u64::from_le_bytes(bytes);
                    true
                }
                Err(_) => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixture::FixturePlugin;
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn direct_entry(registry: &PluginRegistry, name: &str, plugin: FixturePlugin) {
        fixture_support::install_fixture(registry, name, Box::new(plugin));
    }

    #[test]
    fn get_weak_does_not_extend_lifetime_past_unload() {
        let registry = PluginRegistry::new();
        direct_entry(
            &registry,
            "math",
            FixturePlugin {
                name: "math".into(),
                ..Default::default()
            },
        );

        let weak = registry.get_weak("math").unwrap();
        assert!(weak.upgrade().is_some());

        registry.unload("math", &[]).unwrap();
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn unload_is_blocked_by_a_live_dependent() {
        let registry = PluginRegistry::new();
        direct_entry(
            &registry,
            "math",
            FixturePlugin {
                name: "math".into(),
                ..Default::default()
            },
        );
        direct_entry(
            &registry,
            "stats",
            FixturePlugin {
                name: "stats".into(),
                ..Default::default()
            },
        );

        let err = registry
            .unload("math", &["stats".to_string()])
            .unwrap_err();
        assert!(matches!(err, PluginError::BlockedByDependent(_, _)));
    }

    #[test]
    fn callbacks_observe_unload_and_survive_a_panicking_peer() {
        let registry = PluginRegistry::new();
        direct_entry(
            &registry,
            "math",
            FixturePlugin {
                name: "math".into(),
                ..Default::default()
            },
        );

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        registry.register_lifecycle_callback(Arc::new(move |_event: &LifecycleEvent| {
            panic!("a misbehaving callback");
        }));
        registry.register_lifecycle_callback(Arc::new(move |event: &LifecycleEvent| {
            if matches!(event, LifecycleEvent::Unloaded(_)) {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            }
        }));

        registry.unload("math", &[]).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
