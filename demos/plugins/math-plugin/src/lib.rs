//! Sample plugin providing a handful of scalar math helpers, mirroring the
//! original host's bundled math utility plugin. Has no dependencies, so it
//! sits at the bottom of every dependency graph built from these demos.

use plugin_host::{declare_plugin, Plugin, PluginInfo, Version};

#[derive(Default)]
pub struct MathPlugin {
    clamp_calls: u64,
}

impl MathPlugin {
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    pub fn clamp(&mut self, value: f32, min: f32, max: f32) -> f32 {
        self.clamp_calls += 1;
        value.max(min).min(max)
    }

    pub fn degrees_to_radians(degrees: f32) -> f32 {
        degrees * std::f32::consts::PI / 180.0
    }
}

impl Plugin for MathPlugin {
    fn initialize(&mut self) -> bool {
        true
    }

    fn shutdown(&mut self) {}

    fn plugin_info(&self) -> PluginInfo {
        math_plugin_info()
    }

    fn serialize(&self) -> Vec<u8> {
        self.clamp_calls.to_le_bytes().to_vec()
    }

    fn deserialize(&mut self, data: &[u8]) -> bool {
        match data.try_into() {
            Ok(bytes) => {
                self.clamp_calls = u64::from_le_bytes(bytes);
                true
            }
            Err(_) => false,
        }
    }
}

fn math_plugin_info() -> PluginInfo {
    PluginInfo::new(
        "math",
        "Math Utilities",
        "Scalar math helpers: lerp, clamp, angle conversion, random ranges",
        Version::new(1, 0, 0),
        "Plugin Host Contributors",
    )
}

declare_plugin!(MathPlugin, MathPlugin::default, math_plugin_info);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_interpolates_between_bounds() {
        assert_eq!(MathPlugin::lerp(0.0, 10.0, 0.5), 5.0);
    }

    #[test]
    fn clamp_tracks_call_count_across_serialize_roundtrip() {
        let mut plugin = MathPlugin::default();
        plugin.clamp(5.0, 0.0, 1.0);
        plugin.clamp(5.0, 0.0, 1.0);
        let snapshot = plugin.serialize();

        let mut restored = MathPlugin::default();
        assert!(restored.deserialize(&snapshot));
        assert_eq!(restored.clamp_calls, 2);
    }
}
