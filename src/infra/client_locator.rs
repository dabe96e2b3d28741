use crate::app::ports::ClientLocatorPort;
use std::path::{Path, PathBuf};
use tracing::debug;

const CLIENT_MARKERS: &[&str] = &["steam.exe", "steam.sh", "steamapps"];

/// Finds the Steam install directory.
pub struct SteamLocator {
    explicit: Option<PathBuf>,
    search: Vec<PathBuf>,
}

impl SteamLocator {
    /// `explicit` (CLI, config or `STEAM_PATH`) wins over the platform defaults.
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self {
            explicit,
            search: default_locations(),
        }
    }

    pub fn with_search_paths(explicit: Option<PathBuf>, search: Vec<PathBuf>) -> Self {
        Self { explicit, search }
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if cfg!(windows) {
        paths.push(PathBuf::from(r"C:\Program Files (x86)\Steam"));
        paths.push(PathBuf::from(r"C:\Program Files\Steam"));
    }
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        paths.push(home.join(".steam/steam"));
        paths.push(home.join(".local/share/Steam"));
        paths.push(home.join("Library/Application Support/Steam"));
    }
    paths
}

fn looks_like_client(dir: &Path) -> bool {
    CLIENT_MARKERS.iter().any(|marker| dir.join(marker).exists())
}

impl ClientLocatorPort for SteamLocator {
    fn locate(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.explicit {
            // An explicit directory is trusted as long as it exists.
            return dir.is_dir().then(|| dir.clone());
        }
        self.search
            .iter()
            .find(|dir| {
                debug!(candidate = %dir.display(), "checking for client install");
                looks_like_client(dir)
            })
            .cloned()
    }
}
