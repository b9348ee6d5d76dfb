//! Command-line embedder for `plugin-host`, standing in for the original
//! host's bundled sample application: point it at a directory of plugin
//! libraries and drive loads, the load order, hot reload, and unloads from
//! the shell.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use plugin_host::{HostConfig, PluginHost};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "plugin-host", about = "Plugin loader, resolver, and lifecycle CLI")]
struct Cli {
    /// Directory to scan for plugin libraries.
    #[arg(short, long, default_value = "./plugins")]
    plugin_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load every plugin in the plugin directory, in dependency order.
    LoadAll,
    /// List currently loaded plugins.
    List,
    /// Print the current load order.
    LoadOrder,
    /// Unload a single plugin by name.
    Unload { name: String },
    /// Unload every loaded plugin.
    UnloadAll,
    /// Replace a loaded plugin's library with a fresh build loaded from the
    /// path it was last loaded from, cascading the swap through dependents.
    HotReload { name: String },
    /// Re-run initialization over every loaded plugin in dependency order.
    ResolveDependencies,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let host = PluginHost::new(HostConfig::new(&cli.plugin_dir));

    match cli.command {
        Command::LoadAll => commands::load_all(&host),
        Command::List => commands::list(&host),
        Command::LoadOrder => commands::load_order(&host),
        Command::Unload { name } => commands::unload(&host, &name),
        Command::UnloadAll => commands::unload_all(&host),
        Command::HotReload { name } => commands::hot_reload(&host, &name),
        Command::ResolveDependencies => commands::resolve_dependencies(&host),
    }
}
