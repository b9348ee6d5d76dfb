//! Sample plugin that forwards leveled log messages to `tracing`, standing
//! in for the original host's spdlog-backed logging plugin. Has no
//! dependencies, so it's safe to load independently of `math`/`stats`.

use plugin_host::{declare_plugin, Plugin, PluginInfo, Version};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

pub struct LoggingPlugin {
    min_level: LogLevel,
}

impl Default for LoggingPlugin {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
        }
    }
}

impl LoggingPlugin {
    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    pub fn level(&self) -> LogLevel {
        self.min_level
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.min_level {
            return;
        }
        match level {
            LogLevel::Trace => tracing::trace!("{message}"),
            LogLevel::Debug => tracing::debug!("{message}"),
            LogLevel::Info => tracing::info!("{message}"),
            LogLevel::Warning => tracing::warn!("{message}"),
            LogLevel::Error | LogLevel::Critical => tracing::error!("{message}"),
        }
    }
}

impl Plugin for LoggingPlugin {
    fn initialize(&mut self) -> bool {
        true
    }

    fn shutdown(&mut self) {}

    fn plugin_info(&self) -> PluginInfo {
        logging_plugin_info()
    }

    fn serialize(&self) -> Vec<u8> {
        vec![self.min_level as u8]
    }

    fn deserialize(&mut self, data: &[u8]) -> bool {
        let level = match data.first() {
            Some(0) => LogLevel::Trace,
            Some(1) => LogLevel::Debug,
            Some(2) => LogLevel::Info,
            Some(3) => LogLevel::Warning,
            Some(4) => LogLevel::Error,
            Some(5) => LogLevel::Critical,
            _ => return false,
        };
        self.min_level = level;
        true
    }
}

fn logging_plugin_info() -> PluginInfo {
    PluginInfo::new(
        "logging",
        "Structured Logging",
        "Forwards leveled messages to the host's tracing subscriber",
        Version::new(1, 0, 0),
        "Plugin Host Contributors",
    )
}

declare_plugin!(LoggingPlugin, LoggingPlugin::default, logging_plugin_info);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_filters_below_threshold() {
        let mut plugin = LoggingPlugin::default();
        plugin.set_level(LogLevel::Warning);
        assert_eq!(plugin.level(), LogLevel::Warning);
    }

    #[test]
    fn level_survives_serialize_roundtrip() {
        let mut plugin = LoggingPlugin::default();
        plugin.set_level(LogLevel::Error);
        let snapshot = plugin.serialize();

        let mut restored = LoggingPlugin::default();
        assert!(restored.deserialize(&snapshot));
        assert_eq!(restored.level(), LogLevel::Error);
    }
}
