//! Configuration vault – reads/writes `~/.binsort/config.toml`.
//!
//! ```toml
//! min_confidence = 0.5
//! simulate = false
//! offload = false
//!
//! [router]
//! pwm_chip = 0
//! pwm_channel = 0
//!
//! [gate]
//! pwm_chip = 0
//! pwm_channel = 1
//!
//! [calibration]
//! non_organic_target = 9.9
//!
//! [timing]
//! gate_wait_s = 3.5
//! ```
//!
//! Every field is optional; anything missing takes the reference-unit value.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use binsort_hal::{DutyRange, PwmChannel};
use binsort_kernel::{Calibration, ControllerSettings, DispatchMode, Timing};

/// One servo's PWM output and safe duty range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub pwm_chip: u32,
    #[serde(default)]
    pub pwm_channel: u32,
    #[serde(default = "default_period_ns")]
    pub period_ns: u64,
    #[serde(default = "default_min_duty")]
    pub min_duty: f32,
    #[serde(default = "default_max_duty")]
    pub max_duty: f32,
}

impl ChannelConfig {
    fn on_channel(pwm_channel: u32) -> Self {
        Self {
            pwm_chip: 0,
            pwm_channel,
            period_ns: default_period_ns(),
            min_duty: default_min_duty(),
            max_duty: default_max_duty(),
        }
    }

    pub fn pwm(&self) -> PwmChannel {
        PwmChannel {
            chip: self.pwm_chip,
            channel: self.pwm_channel,
            period_ns: self.period_ns,
        }
    }

    pub fn range(&self) -> DutyRange {
        DutyRange {
            min: self.min_duty,
            max: self.max_duty,
        }
    }
}

/// Where the cue sounds live and what plays them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Command invoked with the sound file as its only argument.
    #[serde(default = "default_player")]
    pub player: String,
    #[serde(default = "default_sounds_dir")]
    pub sounds_dir: PathBuf,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            player: default_player(),
            sounds_dir: default_sounds_dir(),
        }
    }
}

/// Persisted configuration stored in `~/.binsort/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Detections at or below this confidence are ignored.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// Skip the PWM hardware entirely.
    #[serde(default)]
    pub simulate: bool,

    /// Run manual-shell sequences on a background thread.  The stdin feed
    /// always does.
    #[serde(default)]
    pub offload: bool,

    #[serde(default = "default_router")]
    pub router: ChannelConfig,

    #[serde(default = "default_gate")]
    pub gate: ChannelConfig,

    #[serde(default)]
    pub calibration: Calibration,

    #[serde(default)]
    pub timing: Timing,

    #[serde(default)]
    pub audio: AudioConfig,
}

fn default_period_ns() -> u64 {
    20_000_000
}
fn default_min_duty() -> f32 {
    DutyRange::default().min
}
fn default_max_duty() -> f32 {
    DutyRange::default().max
}
fn default_router() -> ChannelConfig {
    ChannelConfig::on_channel(0)
}
fn default_gate() -> ChannelConfig {
    ChannelConfig::on_channel(1)
}
fn default_min_confidence() -> f32 {
    0.5
}
fn default_player() -> String {
    "aplay".to_string()
}
fn default_sounds_dir() -> PathBuf {
    PathBuf::from("sounds")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            simulate: false,
            offload: false,
            router: default_router(),
            gate: default_gate(),
            calibration: Calibration::default(),
            timing: Timing::default(),
            audio: AudioConfig::default(),
        }
    }
}

impl Config {
    /// Controller settings for this config.  The per-channel duty limits
    /// replace whatever safe ranges the calibration section carries.
    pub fn controller_settings(&self) -> ControllerSettings {
        let mut calibration = self.calibration.clone();
        calibration.router_range = self.router.range();
        calibration.gate_range = self.gate.range();
        ControllerSettings {
            calibration,
            timing: self.timing.clone(),
            min_confidence: self.min_confidence,
            mode: if self.offload {
                DispatchMode::Offload
            } else {
                DispatchMode::Blocking
            },
        }
    }
}

/// Return the path to `~/.binsort/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".binsort").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `BINSORT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `BINSORT_SIMULATE` | `simulate` (`1`, `true`, `yes`) |
/// | `BINSORT_MIN_CONFIDENCE` | `min_confidence` (0.0 – 1.0) |
/// | `BINSORT_PWM_CHIP` | `router.pwm_chip` and `gate.pwm_chip` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("BINSORT_SIMULATE") {
        cfg.simulate = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Ok(v) = std::env::var("BINSORT_MIN_CONFIDENCE")
        && let Ok(conf) = v.trim().parse::<f32>()
        && (0.0..=1.0).contains(&conf)
    {
        cfg.min_confidence = conf;
    }
    if let Ok(v) = std::env::var("BINSORT_PWM_CHIP")
        && let Ok(chip) = v.trim().parse::<u32>()
    {
        cfg.router.pwm_chip = chip;
        cfg.gate.pwm_chip = chip;
    }
}

/// Save the config to disk, creating `~/.binsort/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
