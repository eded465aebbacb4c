use log::{error, info, trace, warn};
use notify::{Config as WatcherConfig, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use vaporwave_core::Config;

/// Reloads the config file whenever it changes on disk and hands valid results to the engine.
/// Dropping the returned watcher stops watching.
pub fn watch(path: PathBuf, fullscreen_override: bool) -> notify::Result<RecommendedWatcher> {
    let watched = path.clone();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                if is_change_to(&event, &watched) {
                    reload(&watched, fullscreen_override);
                }
            }
            Err(e) => error!("Config watch error: {e}"),
        },
        WatcherConfig::default(),
    )?;

    // Editors often replace the file instead of writing it, so watch the directory
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    trace!("Watching {} for changes", path.display());
    Ok(watcher)
}

fn is_change_to(event: &notify::Event, path: &Path) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == path.file_name())
}

fn reload(path: &Path, fullscreen_override: bool) {
    let mut config = match Config::load(Some(path), false) {
        Ok(config) => config,
        Err(e) => {
            warn!("Keeping previous config: {e}");
            return;
        }
    };
    config.fullscreen |= fullscreen_override;

    if let Err(e) = config.validate() {
        warn!("Keeping previous config: {e}");
        return;
    }
    if *Config::current() == config {
        return;
    }

    info!("Config file changed");
    Config::set_config(config);
    vaporwave_core::notify_config_changed();
}
