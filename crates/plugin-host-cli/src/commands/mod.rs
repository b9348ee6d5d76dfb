use plugin_host::PluginHost;

pub fn load_all(host: &PluginHost) -> anyhow::Result<()> {
    if host.load_all() {
        println!("loaded: {}", host.loaded_names().join(", "));
    } else {
        eprintln!("some plugins failed to load: {}", error_or_unknown(host));
    }
    Ok(())
}

pub fn list(host: &PluginHost) -> anyhow::Result<()> {
    for name in host.loaded_names() {
        let info = host.plugin_info(&name);
        match info {
            Some(info) => println!("{} v{} — {}", info.name, info.version, info.description),
            None => println!("{name}"),
        }
    }
    Ok(())
}

pub fn load_order(host: &PluginHost) -> anyhow::Result<()> {
    println!("{}", host.load_order().join(" -> "));
    Ok(())
}

pub fn unload(host: &PluginHost, name: &str) -> anyhow::Result<()> {
    if host.unload(name) {
        println!("unloaded {name}");
    } else {
        eprintln!("failed to unload {name}: {}", error_or_unknown(host));
    }
    Ok(())
}

pub fn unload_all(host: &PluginHost) -> anyhow::Result<()> {
    if host.unload_all() {
        println!("unloaded every plugin");
    } else {
        eprintln!("some plugins failed to unload: {}", error_or_unknown(host));
    }
    Ok(())
}

pub fn hot_reload(host: &PluginHost, name: &str) -> anyhow::Result<()> {
    if host.hot_reload(name) {
        println!("hot reloaded {name}");
    } else {
        eprintln!("hot reload of {name} failed: {}", error_or_unknown(host));
    }
    Ok(())
}

pub fn resolve_dependencies(host: &PluginHost) -> anyhow::Result<()> {
    if host.resolve_dependencies() {
        println!("every loaded plugin initialized");
    } else {
        eprintln!("initialization failed: {}", error_or_unknown(host));
    }
    Ok(())
}

fn error_or_unknown(host: &PluginHost) -> String {
    host.last_error().unwrap_or_else(|| "unknown error".to_string())
}
