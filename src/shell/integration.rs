/// Integration on/off switch
///
/// Shell integration is enabled unless a `disabled` marker file exists in
/// the data directory. The init scripts stay installed either way; `mii
/// select` checks the switch before offering anything.

use crate::config::Config;
use crate::error::Result;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct Integration {
    marker: PathBuf,
}

impl Integration {
    pub fn new(config: &Config) -> Self {
        Self {
            marker: config.disabled_marker(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.marker.exists()
    }

    /// Remove the marker. Returns false if integration was already enabled.
    pub fn enable(&self) -> Result<bool> {
        match fs::remove_file(&self.marker) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn disable(&self) -> Result<()> {
        fs::write(&self.marker, b"")?;
        Ok(())
    }
}
