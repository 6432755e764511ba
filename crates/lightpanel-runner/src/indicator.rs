//! "Connected" indicator LED.
//!
//! The indicator is lit when the panel handshake completes and cleared when
//! the panel reports it has shut down. Each implementation tracks whether it
//! is lit so repeated requests are no-ops.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Default sysfs GPIO root.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Something that can show whether the panel is connected.
pub trait Indicator: Send {
    /// Light or clear the indicator.
    fn set(&mut self, lit: bool) -> io::Result<()>;

    /// Whether the indicator is currently lit.
    fn is_lit(&self) -> bool;
}

/// Indicator that only logs. Used when no GPIO is configured.
#[derive(Debug, Default)]
pub struct LogIndicator {
    lit: bool,
}

impl Indicator for LogIndicator {
    fn set(&mut self, lit: bool) -> io::Result<()> {
        if self.lit != lit {
            info!("connected indicator {}", if lit { "on" } else { "off" });
            self.lit = lit;
        }
        Ok(())
    }

    fn is_lit(&self) -> bool {
        self.lit
    }
}

/// Indicator LED driven through the Linux sysfs GPIO interface.
///
/// The pin is exported and configured as an output when lit, and unexported
/// again when cleared.
#[derive(Debug)]
pub struct SysfsGpioIndicator {
    pin: u32,
    root: PathBuf,
    lit: bool,
}

impl SysfsGpioIndicator {
    /// Create an indicator for a BCM GPIO number under `/sys/class/gpio`.
    pub fn new(pin: u32) -> Self {
        Self::with_root(pin, SYSFS_GPIO_ROOT)
    }

    /// Create an indicator under a custom sysfs root.
    pub fn with_root(pin: u32, root: impl AsRef<Path>) -> Self {
        SysfsGpioIndicator {
            pin,
            root: root.as_ref().to_path_buf(),
            lit: false,
        }
    }

    fn pin_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin))
    }

    fn export(&self) -> io::Result<()> {
        if self.pin_dir().exists() {
            return Ok(());
        }
        fs::write(self.root.join("export"), self.pin.to_string())
    }

    fn unexport(&self) -> io::Result<()> {
        if !self.pin_dir().exists() {
            return Ok(());
        }
        fs::write(self.root.join("unexport"), self.pin.to_string())
    }

    fn write_value(&self, high: bool) -> io::Result<()> {
        fs::write(self.pin_dir().join("value"), if high { "1" } else { "0" })
    }
}

impl Indicator for SysfsGpioIndicator {
    fn set(&mut self, lit: bool) -> io::Result<()> {
        if self.lit == lit {
            return Ok(());
        }

        if lit {
            self.export()?;
            fs::write(self.pin_dir().join("direction"), "out")?;
            self.write_value(true)?;
        } else {
            self.write_value(false)?;
            self.unexport()?;
        }

        debug!("GPIO{} {}", self.pin, if lit { "high" } else { "low" });
        self.lit = lit;
        Ok(())
    }

    fn is_lit(&self) -> bool {
        self.lit
    }
}

/// Build the indicator for an optional GPIO pin.
pub fn indicator_for(pin: Option<u32>) -> Box<dyn Indicator> {
    match pin {
        Some(pin) => Box::new(SysfsGpioIndicator::new(pin)),
        None => Box::new(LogIndicator::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_indicator() {
        let mut indicator = LogIndicator::default();
        assert!(!indicator.is_lit());
        indicator.set(true).unwrap();
        indicator.set(true).unwrap();
        assert!(indicator.is_lit());
        indicator.set(false).unwrap();
        assert!(!indicator.is_lit());
    }

    #[test]
    fn test_sysfs_indicator_writes_pin() {
        let root = tempfile::tempdir().unwrap();
        // Pretend the kernel already created the pin directory on export
        fs::create_dir(root.path().join("gpio17")).unwrap();

        let mut indicator = SysfsGpioIndicator::with_root(17, root.path());
        indicator.set(true).unwrap();

        let pin_dir = root.path().join("gpio17");
        assert_eq!(fs::read_to_string(pin_dir.join("direction")).unwrap(), "out");
        assert_eq!(fs::read_to_string(pin_dir.join("value")).unwrap(), "1");
        assert!(indicator.is_lit());

        indicator.set(false).unwrap();
        assert_eq!(fs::read_to_string(pin_dir.join("value")).unwrap(), "0");
        assert_eq!(fs::read_to_string(root.path().join("unexport")).unwrap(), "17");
        assert!(!indicator.is_lit());
    }

    #[test]
    fn test_sysfs_indicator_exports_missing_pin() {
        let root = tempfile::tempdir().unwrap();
        let mut indicator = SysfsGpioIndicator::with_root(4, root.path());

        // Without a kernel behind the root the pin directory never appears
        assert!(indicator.set(true).is_err());
        assert_eq!(fs::read_to_string(root.path().join("export")).unwrap(), "4");
        assert!(!indicator.is_lit());
    }
}
