use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

pub const DEFAULT_SPLIT_POINT: u8 = 60;
pub const DEFAULT_PPQ: u16 = 480;
/// Microseconds per quarter note (120 BPM).
pub const DEFAULT_TEMPO: u32 = 500_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Pitches at or above this go to the upper stream.
    pub split_point: u8,
    pub default_ppq: u16,
    pub default_tempo: u32,
    pub quantize: QuantizeSettings,
    pub measure_epsilon_ticks: u32,
    pub playback: PlaybackSettings,
    /// Substring matched against MIDI input port names.
    pub input_port_hint: Option<String>,
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizeSettings {
    /// Every ladder threshold is multiplied by this.
    pub tolerance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Seconds
    pub min_audible: f64,
    /// Milliseconds
    pub end_margin_ms: u64,
    /// 0.0 -> 1.0
    pub voice_gain: f32,
    /// 0.0 -> 1.0
    pub master_gain: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            split_point: DEFAULT_SPLIT_POINT,
            default_ppq: DEFAULT_PPQ,
            default_tempo: DEFAULT_TEMPO,
            quantize: QuantizeSettings::default(),
            measure_epsilon_ticks: 1,
            playback: PlaybackSettings::default(),
            input_port_hint: None,
            log_level: "info".to_string(),
        }
    }
}

impl Default for QuantizeSettings {
    fn default() -> Self {
        Self { tolerance: 0.90 }
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            min_audible: 0.05,
            end_margin_ms: 200,
            voice_gain: 0.5,
            master_gain: 0.7,
        }
    }
}

impl Settings {
    /// Reads settings from a RON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let ron_string = fs::read_to_string(path)?;
        let settings: Settings =
            ron::from_str(&ron_string).map_err(|e| Error::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, ron_string)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.split_point > 127 {
            return Err(Error::Config(format!(
                "split_point must be a MIDI pitch, got {}",
                self.split_point
            )));
        }
        if self.default_ppq == 0 {
            return Err(Error::Config("default_ppq must be positive".into()));
        }
        if self.default_tempo == 0 {
            return Err(Error::Config("default_tempo must be positive".into()));
        }
        if !(self.quantize.tolerance > 0.0 && self.quantize.tolerance <= 1.0) {
            return Err(Error::Config(format!(
                "quantize.tolerance must be in (0, 1], got {}",
                self.quantize.tolerance
            )));
        }
        if self.playback.min_audible < 0.0 {
            return Err(Error::Config("playback.min_audible must not be negative".into()));
        }
        Ok(())
    }
}
