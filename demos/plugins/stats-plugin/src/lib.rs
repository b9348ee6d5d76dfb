//! Sample plugin that keeps a running mean/variance, required-depending on
//! `math` so these demos exercise a real dependency edge: loading,
//! unloading, and hot-reload cascades all have to honor the ordering this
//! declares.
//!
//! The dependency is declarative only — plugins never call into each
//! other's libraries directly, only the host talks to each of them
//! through the `Plugin` trait. `math`'s role here is purely to give the
//! resolver and lifecycle controller something to order around.

use plugin_host::{declare_plugin, Dependency, Plugin, PluginInfo, Version};

#[derive(Default)]
pub struct StatsPlugin {
    count: u64,
    mean: f64,
    m2: f64,
}

impl StatsPlugin {
    pub fn observe(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct StatsSnapshot {
    count: u64,
    mean: f64,
    m2: f64,
}

impl Plugin for StatsPlugin {
    fn initialize(&mut self) -> bool {
        true
    }

    fn shutdown(&mut self) {}

    fn plugin_info(&self) -> PluginInfo {
        stats_plugin_info()
    }

    fn serialize(&self) -> Vec<u8> {
        let snapshot = StatsSnapshot {
            count: self.count,
            mean: self.mean,
            m2: self.m2,
        };
        serde_json::to_vec(&snapshot).unwrap_or_default()
    }

    fn deserialize(&mut self, data: &[u8]) -> bool {
        match serde_json::from_slice::<StatsSnapshot>(data) {
            Ok(snapshot) => {
                self.count = snapshot.count;
                self.mean = snapshot.mean;
                self.m2 = snapshot.m2;
                true
            }
            Err(_) => false,
        }
    }
}

fn stats_plugin_info() -> PluginInfo {
    PluginInfo::new(
        "stats",
        "Running Statistics",
        "Online mean/variance accumulator",
        Version::new(1, 0, 0),
        "Plugin Host Contributors",
    )
    .with_dependency(Dependency::required("math", Version::new(1, 0, 0)))
}

declare_plugin!(StatsPlugin, StatsPlugin::default, stats_plugin_info);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_mean_and_variance() {
        let mut plugin = StatsPlugin::default();
        for value in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            plugin.observe(value);
        }
        assert!((plugin.mean() - 5.0).abs() < 1e-9);
        assert!((plugin.variance() - 4.571428571428571).abs() < 1e-9);
    }

    #[test]
    fn state_survives_serialize_roundtrip() {
        let mut plugin = StatsPlugin::default();
        plugin.observe(1.0);
        plugin.observe(3.0);
        let snapshot = plugin.serialize();

        let mut restored = StatsPlugin::default();
        assert!(restored.deserialize(&snapshot));
        assert_eq!(restored.mean(), plugin.mean());
    }

    #[test]
    fn declares_a_required_dependency_on_math() {
        let info = stats_plugin_info();
        assert_eq!(info.required_dependencies().count(), 1);
        assert_eq!(info.dependencies[0].name, "math");
    }
}
