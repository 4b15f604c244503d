//! PPSDO Settings
//!
//! # Design
//! The settings are static device configuration, fixed at power-up. They
//! describe the trim DAC fitted to the board:
//! 1. The DAC resolution, determining the largest valid trim code.
//! 2. The trim code written at startup and used whenever the calibration
//!    line can not be determined.
//!
//! Settings can be provided as JSON. Missing entries take their defaults.
//! The firmware reads them from the `PPSDO_SETTINGS` build environment.
use serde::{Deserialize, Serialize};

/// Power-up trim code: close to the nominal frequency of the fitted VCTCXO.
pub const DEFAULT_TRIM: u16 = 0x77fa;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unsupported DAC resolution: {0} bits")]
    DacBits(u8),
    #[error("Default trim code {code} exceeds DAC maximum {max}")]
    DefaultTrim { code: u16, max: u16 },
    #[error("Invalid settings JSON: {0}")]
    Json(serde_json_core::de::Error),
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Trim DAC resolution in bits.
    ///
    /// # Value
    /// 1 to 16
    pub dac_bits: u8,

    /// Trim DAC code at power-up and for a degenerate calibration line.
    ///
    /// # Value
    /// Any code not larger than `(1 << dac_bits) - 1`.
    pub default_trim: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dac_bits: 16,
            default_trim: DEFAULT_TRIM,
        }
    }
}

impl Settings {
    pub fn from_json(json: &[u8]) -> Result<Self, Error> {
        let (settings, _) =
            serde_json_core::from_slice(json).map_err(Error::Json)?;
        Ok(settings)
    }

    /// Check the settings and derive the valid trim code range.
    pub fn validate(&self) -> Result<DacRange, Error> {
        let range = DacRange::from_bits(self.dac_bits)
            .ok_or(Error::DacBits(self.dac_bits))?;
        if self.default_trim > range.max() {
            return Err(Error::DefaultTrim {
                code: self.default_trim,
                max: range.max(),
            });
        }
        Ok(range)
    }
}

/// Valid trim DAC codes `0..=max`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DacRange {
    max: u16,
}

impl Default for DacRange {
    fn default() -> Self {
        Self { max: u16::MAX }
    }
}

impl DacRange {
    pub fn from_bits(bits: u8) -> Option<Self> {
        (1..=16).contains(&bits).then(|| Self {
            max: ((1u32 << bits) - 1) as u16,
        })
    }

    pub const fn min(&self) -> u16 {
        0
    }

    pub const fn max(&self) -> u16 {
        self.max
    }

    /// Saturate a code into the range.
    pub fn clamp(&self, code: i64) -> u16 {
        code.clamp(self.min() as _, self.max() as _) as u16
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.default_trim, 30714);
        assert_eq!(settings.validate().unwrap().max(), 65535);
    }

    #[test]
    fn json_partial() {
        let settings = Settings::from_json(br#"{"dac_bits": 12}"#).unwrap();
        assert_eq!(settings.dac_bits, 12);
        assert_eq!(settings.default_trim, DEFAULT_TRIM);
        assert_eq!(
            settings.validate(),
            Err(Error::DefaultTrim {
                code: DEFAULT_TRIM,
                max: 4095
            })
        );

        let settings =
            Settings::from_json(br#"{"dac_bits":12,"default_trim":2048}"#)
                .unwrap();
        assert_eq!(settings.validate().unwrap().max(), 4095);
    }

    #[test]
    fn json_invalid() {
        assert!(matches!(
            Settings::from_json(b"{\"dac_bits\": \"x\"}"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn dac_bits() {
        for bits in [0, 17, 255] {
            let settings = Settings {
                dac_bits: bits,
                ..Default::default()
            };
            assert_eq!(settings.validate(), Err(Error::DacBits(bits)));
        }
        assert_eq!(DacRange::from_bits(1).unwrap().max(), 1);
    }

    #[test]
    fn clamp() {
        let range = DacRange::from_bits(16).unwrap();
        assert_eq!(range.clamp(-1), 0);
        assert_eq!(range.clamp(i64::MIN), 0);
        assert_eq!(range.clamp(70000), 65535);
        assert_eq!(range.clamp(1234), 1234);
    }
}
