//! Bulk loading, dependency verification, and hot reload.
//!
//! This is the only module that drives the loader, resolver, and registry
//! together; each of those stays usable on its own (the registry, in
//! particular, is exercised directly by most of its own tests).

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::dependency::DependencyResolver;
use crate::error::{PluginError, PluginResult};
use crate::loader::{Loader, LibraryHandle, PluginDiscovery};
use crate::registry::{LifecycleEvent, PluginRegistry};
use crate::traits::PluginInfo;

/// Coordinates the loader, resolver, and registry for whole-directory loads,
/// dependency verification, and hot reload.
pub struct LifecycleController {
    registry: Arc<PluginRegistry>,
    resolver: Mutex<DependencyResolver>,
}

impl LifecycleController {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            resolver: Mutex::new(DependencyResolver::new()),
        }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Discovers every plugin library in `dir`, registers its declared
    /// dependencies with the resolver, and loads all of them in dependency
    /// order. Libraries that fail to open, or whose `GetPluginInfo` can't
    /// be read, are skipped and reported alongside any load failure from
    /// plugins that did resolve.
    pub fn load_all(&self, dir: &Path) -> PluginResult<Vec<(String, PluginError)>> {
        let candidates = PluginDiscovery::scan(dir)?;

        let mut path_by_name: HashMap<String, PathBuf> = HashMap::new();
        let mut discovered_names: Vec<String> = Vec::new();
        let mut failures: Vec<(String, PluginError)> = Vec::new();

        for path in &candidates {
            let probe = unsafe { Loader::open(path) }.and_then(|handle| handle.read_info());
            match probe {
                Ok(info) => {
                    self.register_declared_dependencies(&info);
                    discovered_names.push(info.name.clone());
                    path_by_name.insert(info.name, path.clone());
                }
                Err(err) => failures.push((path.display().to_string(), err)),
            }
        }

        let order = self.resolver.lock().resolve_load_order(&discovered_names)?;

        for name in order {
            let Some(path) = path_by_name.get(&name) else {
                continue;
            };
            if let Err(err) = self.registry.load(path) {
                failures.push((name, err));
            }
        }

        if let Err((name, err)) = self.resolve_dependencies_inner() {
            failures.push((name, self.registry.fail(err)));
        }

        Ok(failures)
    }

    fn register_declared_dependencies(&self, info: &PluginInfo) {
        let mut resolver = self.resolver.lock();
        for dep in info.required_dependencies() {
            resolver.add_dependency(&info.name, &dep.name, false);
        }
        for dep in info.optional_dependencies() {
            resolver.add_dependency(&info.name, &dep.name, true);
        }
    }

    /// Checks that every loaded plugin's required dependencies are also
    /// loaded and new enough. Optional dependencies that are missing or
    /// too old are not reported.
    pub fn verify_dependencies(&self) -> Vec<PluginError> {
        let mut problems = Vec::new();
        for name in self.registry.loaded_names() {
            let Some(info) = self.registry.info_of(&name) else {
                continue;
            };
            for dep in info.required_dependencies() {
                match self.registry.info_of(&dep.name) {
                    None => problems.push(PluginError::NotRegistered(dep.name.clone())),
                    Some(dep_info) if !dep.is_satisfied_by(dep_info.version) => {
                        problems.push(PluginError::InitializeFailed(name.clone()));
                    }
                    Some(_) => {}
                }
            }
        }
        problems
    }

    /// Unloads every loaded plugin in the reverse of their current load
    /// order, so dependents are shut down before the dependencies they
    /// hold onto.
    pub fn unload_all(&self) -> Vec<(String, PluginError)> {
        let mut order = self.registry.load_order();
        order.reverse();
        self.registry.unload_all(&order)
    }

    /// Plugins currently loaded whose required-dependency chain reaches
    /// `name`, in load order. Used to decide which dependents need to be
    /// notified (or blocked) when `name` changes.
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        let resolver = self.resolver.lock();
        let loaded = self.registry.loaded_names();
        let mut dependents = Vec::new();

        for candidate in &loaded {
            if candidate == name {
                continue;
            }
            let mut stack = resolver.dependencies_of(candidate);
            let mut seen: HashSet<String> = HashSet::new();
            let mut reaches = false;
            while let Some(dep) = stack.pop() {
                if dep == name {
                    reaches = true;
                    break;
                }
                if seen.insert(dep.clone()) {
                    stack.extend(resolver.dependencies_of(&dep));
                }
            }
            if reaches {
                dependents.push(candidate.clone());
            }
        }

        dependents
    }

    /// Replaces a loaded plugin's library with a fresh build loaded from the
    /// same path it was last loaded from, carrying its serialized state
    /// across and cascading the swap through every plugin that
    /// required-depends on it.
    ///
    /// State machine per affected plugin: LIVE -> PREPARED -> SUSPENDED ->
    /// ABSENT -> LOADED -> RESTORED -> LIVE. Every step up to and including
    /// PREPARED is reversible (a `false` from `prepare_hot_reload` aborts
    /// with nothing touched); every step from SUSPENDED onward is not,
    /// because the old library has already been closed.
    ///
    /// Dependents are suspended (prepared, serialized, torn down) furthest
    /// first so nothing is left holding a reference to an already-closed
    /// library, and restored (reloaded, deserialized, completed) starting
    /// from `name` itself so each dependent comes back after whatever it
    /// depends on already has. `resolve_dependencies` then re-runs
    /// initialization over everything still registered.
    ///
    /// `Ok(())` means `name` and every dependent came back initialized;
    /// `Err(PluginError::HotReloadPartial)` means `name` is live but one or
    /// more dependents failed to rebind to it.
    pub fn hot_reload(&self, name: &str) -> PluginResult<()> {
        if !self.registry.is_loaded(name) {
            return Err(PluginError::NotRegistered(name.to_string()));
        }

        let dependents = self.dependents_of(name);
        let mut suspend_order: Vec<String> = dependents.iter().rev().cloned().collect();
        suspend_order.push(name.to_string());

        for plugin in &suspend_order {
            if !self.call_prepare(plugin)? {
                return Err(PluginError::HotReloadAborted(plugin.clone()));
            }
        }

        // Past this point nothing is reversible, so capture everything a
        // reload needs before any library closes.
        let load_order = self.registry.load_order();
        let mut snapshots: HashMap<String, Vec<u8>> = HashMap::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut paths: HashMap<String, PathBuf> = HashMap::new();
        for plugin in &suspend_order {
            snapshots.insert(plugin.clone(), self.call_serialize(plugin));
            let position = load_order
                .iter()
                .position(|n| n == plugin)
                .unwrap_or(load_order.len());
            positions.insert(plugin.clone(), position);
            let path = self
                .registry
                .path_of(plugin)
                .ok_or_else(|| PluginError::NoRecordedPath(plugin.clone()))?;
            paths.insert(plugin.clone(), path);
        }

        self.emit(LifecycleEvent::HotReloadStarted(name.to_string()));

        for plugin in &suspend_order {
            self.registry.unload(plugin, &[])?;
        }

        let mut restore_order = vec![name.to_string()];
        restore_order.extend(dependents.iter().cloned());

        let mut target_failed: Option<PluginError> = None;
        let mut failed_dependents: Vec<String> = Vec::new();
        let mut primary_completed = false;

        for (index, plugin) in restore_order.iter().enumerate() {
            let path = paths[plugin].clone();

            let opened = self.open_and_read(&path).and_then(|(handle, info)| {
                if info.name != *plugin {
                    return Err(PluginError::LoadFailed {
                        path: path.clone(),
                        detail: format!(
                            "reloaded library declares name {:?}, expected {:?}",
                            info.name, plugin
                        ),
                    });
                }
                Ok((handle, info))
            });

            let (handle, info) = match opened {
                Ok(pair) => pair,
                Err(err) => {
                    if index == 0 {
                        target_failed = Some(err);
                    } else {
                        failed_dependents.push(plugin.clone());
                    }
                    continue;
                }
            };

            let raw = match handle.create_instance() {
                Ok(raw) => raw,
                Err(err) => {
                    if index == 0 {
                        target_failed = Some(err);
                    } else {
                        failed_dependents.push(plugin.clone());
                    }
                    continue;
                }
            };

            // Safety: `create_instance` returned a non-null owned pointer
            // from `CreatePlugin`, which hands off ownership to the host.
            let mut instance = unsafe { Box::from_raw(raw) };
            let snapshot = snapshots.get(plugin).cloned().unwrap_or_default();
            let _ = catch_unwind(AssertUnwindSafe(|| instance.deserialize(&snapshot)));
            let completed =
                catch_unwind(AssertUnwindSafe(|| instance.complete_hot_reload())).unwrap_or(false);

            let position = positions[plugin];
            self.registry
                .reinstall(position, plugin, Some(path), Some(handle), instance, info);

            if index == 0 {
                primary_completed = completed;
            } else if !completed {
                failed_dependents.push(plugin.clone());
            }
        }

        if let Some(err) = target_failed {
            self.emit(LifecycleEvent::HotReloadFailed(name.to_string()));
            return Err(err);
        }

        if let Err((failed_name, err)) = self.resolve_dependencies_inner() {
            self.registry.fail(err);
            if failed_name == name {
                primary_completed = false;
            } else if !failed_dependents.contains(&failed_name) {
                failed_dependents.push(failed_name);
            }
        }

        if !primary_completed {
            self.emit(LifecycleEvent::HotReloadFailed(name.to_string()));
            return Err(PluginError::InitializeFailed(name.to_string()));
        }
        if !failed_dependents.is_empty() {
            self.emit(LifecycleEvent::HotReloadFailed(name.to_string()));
            return Err(PluginError::HotReloadPartial {
                name: name.to_string(),
                failed_dependents,
            });
        }

        self.emit(LifecycleEvent::HotReloadCompleted(name.to_string()));
        Ok(())
    }

    fn call_prepare(&self, name: &str) -> PluginResult<bool> {
        let instance = self
            .registry
            .get(name)
            .ok_or_else(|| PluginError::NotRegistered(name.to_string()))?;
        let mut guard = instance.lock();
        Ok(catch_unwind(AssertUnwindSafe(|| guard.prepare_hot_reload())).unwrap_or(false))
    }

    fn call_serialize(&self, name: &str) -> Vec<u8> {
        let Some(instance) = self.registry.get(name) else {
            return Vec::new();
        };
        let guard = instance.lock();
        catch_unwind(AssertUnwindSafe(|| guard.serialize())).unwrap_or_default()
    }

    fn open_and_read(&self, path: &Path) -> PluginResult<(LibraryHandle, PluginInfo)> {
        let handle = unsafe { Loader::open(path)? };
        let info = handle.read_info()?;
        Ok((handle, info))
    }

    /// Walks every registered plugin in dependency order and calls
    /// `initialize` on each, stopping at the first failure. Plugins
    /// initialized before the failure stay initialized.
    fn resolve_dependencies_inner(&self) -> Result<(), (String, PluginError)> {
        let loaded = self.registry.loaded_names();
        let order = match self.resolver.lock().resolve_load_order(&loaded) {
            Ok(order) => order,
            Err(err) => {
                let label = match &err {
                    PluginError::Cycle(n) => n.clone(),
                    _ => String::new(),
                };
                return Err((label, err));
            }
        };

        for name in order {
            let Some(instance) = self.registry.get(&name) else {
                continue;
            };
            let mut guard = instance.lock();
            let ok = catch_unwind(AssertUnwindSafe(|| guard.initialize())).unwrap_or(false);
            if !ok {
                return Err((name.clone(), PluginError::InitializeFailed(name)));
            }
        }
        Ok(())
    }

    /// Re-runs initialization over every loaded plugin in dependency order,
    /// stopping at the first plugin whose `initialize` returns `false`.
    /// Plugins initialized before the failure stay initialized; the
    /// failure is recorded as the registry's last error.
    pub fn resolve_dependencies(&self) -> bool {
        match self.resolve_dependencies_inner() {
            Ok(()) => true,
            Err((_, err)) => {
                self.registry.fail(err);
                false
            }
        }
    }

    fn emit(&self, event: LifecycleEvent) {
        // The registry owns callback dispatch; route through a synthetic
        // load/unload-shaped event so observers only need to watch one
        // source of lifecycle notifications.
        self.registry.notify(event);
    }
}
