//! Linux sysfs PWM backend.
//!
//! Drives a hobby servo through the kernel's PWM class interface
//! (`/sys/class/pwm/pwmchipN/pwmM`).  On a Raspberry Pi the `pwm-2chan`
//! overlay exposes both servo outputs as channels 0 and 1 of `pwmchip0`.
//!
//! | File | Written value |
//! |---|---|
//! | `export` / `unexport` | channel number |
//! | `period` | signal period in ns (20 ms for 50 Hz servos) |
//! | `duty_cycle` | high time in ns, derived from the duty percentage |
//! | `enable` | `1` while acquired, `0` on release |

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use binsort_types::{ActuatorId, DutyCycle, SortError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::actuator::Actuator;

const SYSFS_PWM_ROOT: &str = "/sys/class/pwm";

/// How long to wait for udev to create the channel directory after export.
const EXPORT_POLL_INTERVAL: Duration = Duration::from_millis(10);
const EXPORT_POLL_ATTEMPTS: u32 = 50;

/// Location and timing of one PWM output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PwmChannel {
    #[serde(default)]
    pub chip: u32,
    #[serde(default)]
    pub channel: u32,
    /// Signal period in nanoseconds.
    #[serde(default = "default_period_ns")]
    pub period_ns: u64,
}

fn default_period_ns() -> u64 {
    20_000_000
}

impl PwmChannel {
    pub fn new(chip: u32, channel: u32) -> Self {
        Self {
            chip,
            channel,
            period_ns: default_period_ns(),
        }
    }

    /// High time in nanoseconds for `duty`.
    pub fn duty_ns(&self, duty: DutyCycle) -> u64 {
        (self.period_ns as f64 * f64::from(duty.percent()) / 100.0).round() as u64
    }
}

/// A servo attached to a sysfs PWM channel.
pub struct PwmActuator {
    id: ActuatorId,
    channel: PwmChannel,
    chip_dir: PathBuf,
    pwm_dir: PathBuf,
    duty: DutyCycle,
}

impl PwmActuator {
    /// Export and enable `channel` with the signal off.
    ///
    /// # Errors
    ///
    /// Returns [`SortError::HardwareFault`] when the PWM chip does not exist
    /// or any of the sysfs writes fail.  Callers fall back to a
    /// [`SimActuator`][crate::sim::SimActuator] in that case.
    pub fn open(id: ActuatorId, channel: &PwmChannel) -> Result<Box<Self>, SortError> {
        Self::open_at(Path::new(SYSFS_PWM_ROOT), id, channel)
    }

    /// Like [`open`][Self::open] but rooted at `root` instead of
    /// `/sys/class/pwm`.
    pub fn open_at(
        root: &Path,
        id: ActuatorId,
        channel: &PwmChannel,
    ) -> Result<Box<Self>, SortError> {
        let chip_dir = root.join(format!("pwmchip{}", channel.chip));
        if !chip_dir.is_dir() {
            return Err(SortError::hardware(
                id,
                format!("{} is not present", chip_dir.display()),
            ));
        }

        let pwm_dir = chip_dir.join(format!("pwm{}", channel.channel));
        if !pwm_dir.is_dir() {
            write_attr(id, &chip_dir.join("export"), channel.channel)?;
            wait_for_dir(id, &pwm_dir)?;
        }

        let actuator = Self {
            id,
            channel: channel.clone(),
            chip_dir,
            pwm_dir,
            duty: DutyCycle::OFF,
        };
        actuator.write("duty_cycle", 0)?;
        actuator.write("period", channel.period_ns)?;
        actuator.write("enable", 1)?;

        info!(
            actuator = %id,
            chip = channel.chip,
            channel = channel.channel,
            "PWM channel acquired"
        );
        Ok(Box::new(actuator))
    }

    fn write(&self, attr: &str, value: impl ToString) -> Result<(), SortError> {
        write_attr(self.id, &self.pwm_dir.join(attr), value)
    }
}

fn write_attr(id: ActuatorId, path: &Path, value: impl ToString) -> Result<(), SortError> {
    fs::write(path, value.to_string())
        .map_err(|e| SortError::hardware(id, format!("write {}: {e}", path.display())))
}

fn wait_for_dir(id: ActuatorId, dir: &Path) -> Result<(), SortError> {
    for _ in 0..EXPORT_POLL_ATTEMPTS {
        if dir.is_dir() {
            return Ok(());
        }
        thread::sleep(EXPORT_POLL_INTERVAL);
    }
    Err(SortError::hardware(
        id,
        format!("{} did not appear after export", dir.display()),
    ))
}

impl Actuator for PwmActuator {
    fn id(&self) -> ActuatorId {
        self.id
    }

    fn set_duty(&mut self, duty: DutyCycle) -> Result<(), SortError> {
        let ns = self.channel.duty_ns(duty);
        debug!(actuator = %self.id, duty = %duty, duty_ns = ns, "pwm write");
        self.write("duty_cycle", ns)?;
        self.duty = duty;
        Ok(())
    }

    fn duty(&self) -> DutyCycle {
        self.duty
    }

    fn release(&mut self) -> Result<(), SortError> {
        self.write("duty_cycle", 0)?;
        self.write("enable", 0)?;
        write_attr(self.id, &self.chip_dir.join("unexport"), self.channel.channel)?;
        self.duty = DutyCycle::OFF;
        info!(actuator = %self.id, "PWM channel released");
        Ok(())
    }
}
