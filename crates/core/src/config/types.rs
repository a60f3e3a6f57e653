use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub webdriver: WebDriverConfig,
    #[serde(default)]
    pub automation: AutomationConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Database configuration for the result recorder.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("playlister.db")
}

/// Remote session controller (browser profile manager) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerConfig {
    /// Base URL of the profile API, e.g. "http://127.0.0.1:19995/api/v3/profiles".
    #[serde(default = "default_controller_url")]
    pub base_url: String,
    /// Timeout for start/list requests in seconds.
    #[serde(default = "default_controller_timeout")]
    pub timeout_secs: u64,
    /// Timeout for stop requests in seconds.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_url: default_controller_url(),
            timeout_secs: default_controller_timeout(),
            stop_timeout_secs: default_stop_timeout(),
        }
    }
}

fn default_controller_url() -> String {
    "http://127.0.0.1:19995/api/v3/profiles".to_string()
}

fn default_controller_timeout() -> u64 {
    30
}

fn default_stop_timeout() -> u64 {
    5
}

/// WebDriver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebDriverConfig {
    /// Already running WebDriver endpoint. When unset, the driver binary
    /// reported by the controller is spawned on a free local port.
    #[serde(default)]
    pub url: Option<String>,
    /// How long to wait for a spawned driver to report ready.
    #[serde(default = "default_driver_startup")]
    pub startup_timeout_secs: u64,
    /// Upper bound for a single WebDriver HTTP command.
    #[serde(default = "default_driver_command_timeout")]
    pub command_timeout_secs: u64,
}

impl WebDriverConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: None,
            startup_timeout_secs: default_driver_startup(),
            command_timeout_secs: default_driver_command_timeout(),
        }
    }
}

fn default_driver_startup() -> u64 {
    10
}

fn default_driver_command_timeout() -> u64 {
    30
}

/// Timing and behaviour of the automation pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AutomationConfig {
    /// Page opened in a new tab before the steps start.
    #[serde(default = "default_surface_url")]
    pub surface_url: String,
    /// Upper bound for every wait-until-ready interaction (milliseconds).
    #[serde(default = "default_step_timeout")]
    pub step_timeout_ms: u64,
    /// How often a waiting interaction re-checks the page (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Upper bound for one whole step, every driver command included.
    #[serde(default = "default_step_deadline")]
    pub step_deadline_ms: u64,
    /// Wait after the controller reports the session started.
    #[serde(default = "default_session_settle")]
    pub session_settle_ms: u64,
    /// Wait after the surface tab is opened.
    #[serde(default = "default_surface_settle")]
    pub surface_settle_ms: u64,
    /// Wait before the first item count is read.
    #[serde(default = "default_load_settle")]
    pub load_settle_ms: u64,
    /// Pause between scroll iterations.
    #[serde(default = "default_scroll_pause")]
    pub scroll_pause_ms: u64,
    /// Maximum number of scroll iterations per job.
    #[serde(default = "default_max_scroll")]
    pub max_scroll_iterations: u32,
    /// Wait after confirming creation before reading the link.
    #[serde(default = "default_link_settle")]
    pub link_settle_ms: u64,
    /// Delay between session cleanup and resource lock release.
    #[serde(default = "default_cooldown")]
    pub cooldown_ms: u64,
    /// Target item count used when a job does not specify a valid one.
    #[serde(default = "default_target_count")]
    pub default_target_count: u32,
}

impl AutomationConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn step_deadline(&self) -> Duration {
        Duration::from_millis(self.step_deadline_ms)
    }

    pub fn session_settle(&self) -> Duration {
        Duration::from_millis(self.session_settle_ms)
    }

    pub fn surface_settle(&self) -> Duration {
        Duration::from_millis(self.surface_settle_ms)
    }

    pub fn load_settle(&self) -> Duration {
        Duration::from_millis(self.load_settle_ms)
    }

    pub fn scroll_pause(&self) -> Duration {
        Duration::from_millis(self.scroll_pause_ms)
    }

    pub fn link_settle(&self) -> Duration {
        Duration::from_millis(self.link_settle_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            surface_url: default_surface_url(),
            step_timeout_ms: default_step_timeout(),
            poll_interval_ms: default_poll_interval(),
            step_deadline_ms: default_step_deadline(),
            session_settle_ms: default_session_settle(),
            surface_settle_ms: default_surface_settle(),
            load_settle_ms: default_load_settle(),
            scroll_pause_ms: default_scroll_pause(),
            max_scroll_iterations: default_max_scroll(),
            link_settle_ms: default_link_settle(),
            cooldown_ms: default_cooldown(),
            default_target_count: default_target_count(),
        }
    }
}

fn default_surface_url() -> String {
    "https://www.youtube.com".to_string()
}

fn default_step_timeout() -> u64 {
    10_000
}

fn default_poll_interval() -> u64 {
    250
}

fn default_step_deadline() -> u64 {
    300_000
}

fn default_session_settle() -> u64 {
    5_000
}

fn default_surface_settle() -> u64 {
    5_000
}

fn default_load_settle() -> u64 {
    2_000
}

fn default_scroll_pause() -> u64 {
    5_000
}

fn default_max_scroll() -> u32 {
    20
}

fn default_link_settle() -> u64 {
    3_000
}

fn default_cooldown() -> u64 {
    2_000
}

fn default_target_count() -> u32 {
    100
}

/// Batch dispatch limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatcherConfig {
    /// Worker pool size used when a batch does not ask for one.
    #[serde(default = "default_concurrency")]
    pub default_concurrency: usize,
    /// Hard upper bound on a batch's worker pool size.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_concurrency: default_concurrency(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    30
}

fn default_max_concurrency() -> usize {
    100
}

/// Status store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusConfig {
    /// Lifetime of job and session records.
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    /// How often expired records are swept from memory.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl StatusConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_ttl() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    60
}
