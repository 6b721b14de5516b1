// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Main configuration struct for the link and the navigation loop.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub nav: NavConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkConfig {
    /// Simulator host address. Normally supplied on the command line; the
    /// session cannot start without one.
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            server: None,
            port: default_port(),
            reply_timeout_ms: default_reply_timeout_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

/// Navigation loop tunables.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NavConfig {
    /// Object index the host publishes the navigation target at.
    #[serde(default = "default_destination_object")]
    pub destination_object: u32,
    /// Arrival box half-side, per axis.
    #[serde(default = "default_arrival_tolerance")]
    pub arrival_tolerance: f64,
    /// Bearing error below which a component counts as aligned, radians.
    #[serde(default = "default_bearing_tolerance")]
    pub bearing_tolerance: f64,
    /// Fixed magnitude of the bang-bang attitude rate commands.
    #[serde(default = "default_bearing_rate")]
    pub bearing_rate: f64,
    /// Attitude offset applied when escaping an obstacle.
    #[serde(default = "default_avoidance_offset")]
    pub avoidance_offset: f64,
    /// Collision distances beyond this are treated as corrupt readings.
    #[serde(default = "default_distance_sentinel")]
    pub distance_sentinel: f64,
    #[serde(default = "default_max_retest_passes")]
    pub max_retest_passes: u32,
    #[serde(default = "default_max_alignment_passes")]
    pub max_alignment_passes: u32,
    #[serde(default = "default_max_trim_passes")]
    pub max_trim_passes: u32,
    #[serde(default = "default_trim_command_delay_ms")]
    pub trim_command_delay_ms: u64,
    #[serde(default = "default_trim_settle_delay_ms")]
    pub trim_settle_delay_ms: u64,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            destination_object: default_destination_object(),
            arrival_tolerance: default_arrival_tolerance(),
            bearing_tolerance: default_bearing_tolerance(),
            bearing_rate: default_bearing_rate(),
            avoidance_offset: default_avoidance_offset(),
            distance_sentinel: default_distance_sentinel(),
            max_retest_passes: default_max_retest_passes(),
            max_alignment_passes: default_max_alignment_passes(),
            max_trim_passes: default_max_trim_passes(),
            trim_command_delay_ms: default_trim_command_delay_ms(),
            trim_settle_delay_ms: default_trim_settle_delay_ms(),
        }
    }
}

fn default_port() -> u16 {
    8888
}

fn default_reply_timeout_ms() -> u64 {
    2000
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

fn default_destination_object() -> u32 {
    // index the reference host publishes its navigation fix at
    60
}

fn default_arrival_tolerance() -> f64 {
    5.0
}

fn default_bearing_tolerance() -> f64 {
    0.2
}

fn default_bearing_rate() -> f64 {
    0.04
}

fn default_avoidance_offset() -> f64 {
    0.08
}

fn default_distance_sentinel() -> f64 {
    1e9
}

fn default_max_retest_passes() -> u32 {
    100_000
}

fn default_max_alignment_passes() -> u32 {
    100_000
}

fn default_max_trim_passes() -> u32 {
    10_000
}

fn default_trim_command_delay_ms() -> u64 {
    20
}

fn default_trim_settle_delay_ms() -> u64 {
    200
}

/// Load configuration from a TOML file.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}
