/// Default candidate repositories, tried in this order
pub const DEFAULT_REPOSITORIES: &[&str] = &[
    "SteamAutoCracks/ManifestHub",
    "ikun0014/ManifestHub",
    "Auiowu/ManifestAutoUpdate",
];

pub const GITHUB_API_BASE: &str = "https://api.github.com";
pub const GITHUB_RAW_BASE: &str = "https://raw.githubusercontent.com";
pub const STORE_API_BASE: &str = "https://store.steampowered.com";

pub const USER_AGENT: &str = concat!("depot-fetch/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// File extensions the acquirer downloads; everything else in a listing is ignored
pub const ARTIFACT_EXTENSIONS: &[&str] = &["manifest", "lua", "vdf", "txt", "st"];

/// Leading bytes of an encrypted key blob
pub const KEY_BLOB_MAGIC: &[u8; 4] = b"DFK1";

// Client layout, relative to the install directory
pub const PLUGIN_DIR: &str = "config/stplug-in";
pub const DEPOT_CACHE_DIR: &str = "config/depotcache";

pub const STEAM_PATH_ENV: &str = "STEAM_PATH";
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";
