use serde::Deserialize;

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30u64
}

fn default_download_directory() -> String {
    "music".to_string()
}

fn default_cache_file() -> Option<String> {
    Some("song_cache.json".to_string())
}

fn default_max_concurrent_downloads() -> usize {
    2
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_retry_backoff() -> String {
    "fixed".to_string()
}

fn default_download_timeout_secs() -> u64 {
    120
}

fn default_monitor_interval_ms() -> u64 {
    500
}

fn default_conductor_interval_ms() -> u64 {
    1_000
}

fn default_progress_interval_ms() -> u64 {
    100
}

fn default_idle_timeout_secs() -> u64 {
    30 * 60
}

fn default_ytdlp_path() -> String {
    "yt-dlp".to_string()
}

fn default_player_command() -> String {
    "ffplay -nodisp -autoexit -loglevel error".to_string()
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct Config {
    #[serde(default = "default_bind_address")]
    pub(crate) bind_address: String,
    #[serde(default = "default_shutdown_timeout")]
    pub(crate) shutdown_timeout: u64,
    pub(crate) youtube_api_key: String,
    #[serde(default = "default_download_directory")]
    pub(crate) download_directory: String,
    #[serde(default = "default_cache_file")]
    pub(crate) cache_file: Option<String>,
    #[serde(default = "default_max_concurrent_downloads")]
    pub(crate) max_concurrent_downloads: usize,
    #[serde(default = "default_max_retries")]
    pub(crate) max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub(crate) retry_delay_ms: u64,
    #[serde(default = "default_retry_backoff")]
    pub(crate) retry_backoff: String,
    #[serde(default = "default_download_timeout_secs")]
    pub(crate) download_timeout_secs: u64,
    #[serde(default = "default_monitor_interval_ms")]
    pub(crate) monitor_interval_ms: u64,
    #[serde(default = "default_conductor_interval_ms")]
    pub(crate) conductor_interval_ms: u64,
    #[serde(default = "default_progress_interval_ms")]
    pub(crate) progress_interval_ms: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub(crate) idle_timeout_secs: u64,
    #[serde(default = "default_ytdlp_path")]
    pub(crate) ytdlp_path: String,
    #[serde(default = "default_player_command")]
    pub(crate) player_command: String,
}

impl Config {
    pub(crate) fn from_env() -> Self {
        match envy::from_env::<Self>() {
            Ok(config) => config,
            Err(error) => panic!("Missing environment variable: {:#?}", error),
        }
    }

    /// An empty `CACHE_FILE` keeps the download cache in memory only.
    pub(crate) fn cache_file(&self) -> Option<&str> {
        self.cache_file.as_deref().filter(|path| !path.trim().is_empty())
    }
}
