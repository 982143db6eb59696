//! Colorization parameters and override merging
//!
//! The four appearance knobs always reach the transform stage fully
//! populated. User overrides arrive as an optional JSON object; anything
//! that is not a well-formed object of numbers degrades to the defaults
//! with a warning instead of failing the request.

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_INTENSITY: f64 = 100.0;
pub const DEFAULT_CONTRAST: f64 = 0.0;
pub const DEFAULT_SATURATION: f64 = 100.0;
pub const DEFAULT_TEMPERATURE: f64 = 0.0;

/// Appearance-tuning parameters applied during transformation
///
/// Values are carried as given; range handling is left to the transform
/// strategy that interprets them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorizationParameters {
    intensity: f64,
    contrast: f64,
    saturation: f64,
    temperature: f64,
}

impl Default for ColorizationParameters {
    fn default() -> Self {
        Self {
            intensity: DEFAULT_INTENSITY,
            contrast: DEFAULT_CONTRAST,
            saturation: DEFAULT_SATURATION,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl ColorizationParameters {
    /// Brightness scale in percent (100 = unchanged)
    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    /// Additional contrast in percent (0 = unchanged)
    pub fn contrast(&self) -> f64 {
        self.contrast
    }

    /// Saturation scale in percent (100 = unchanged)
    pub fn saturation(&self) -> f64 {
        self.saturation
    }

    /// Warm/cool hue shift in percent (0 = unchanged)
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Field-by-field merge: present overrides win, absent fields keep
    /// the value from `self`
    pub fn with_overrides(self, overrides: &ParameterOverrides) -> Self {
        Self {
            intensity: overrides.intensity.unwrap_or(self.intensity),
            contrast: overrides.contrast.unwrap_or(self.contrast),
            saturation: overrides.saturation.unwrap_or(self.saturation),
            temperature: overrides.temperature.unwrap_or(self.temperature),
        }
    }
}

/// Optional per-request overrides (the `parameters` multipart field)
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct ParameterOverrides {
    #[serde(default)]
    pub intensity: Option<f64>,
    #[serde(default)]
    pub contrast: Option<f64>,
    #[serde(default)]
    pub saturation: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

impl ParameterOverrides {
    /// Parse the raw `parameters` payload
    ///
    /// Only a JSON object is accepted; arrays, scalars and objects with
    /// non-numeric knob values are errors.
    pub fn parse(raw: &str) -> Result<Self, ParameterWarning> {
        let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| ParameterWarning {
            reason: format!("parameters are not valid JSON: {}", e),
        })?;

        if !value.is_object() {
            return Err(ParameterWarning {
                reason: "parameters must be a JSON object".to_string(),
            });
        }

        serde_json::from_value(value).map_err(|e| ParameterWarning {
            reason: format!("parameters have an invalid field: {}", e),
        })
    }
}

/// Non-fatal diagnostic: the overrides were discarded and defaults used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterWarning {
    pub reason: String,
}

/// Result of [`merge`]
#[derive(Debug, Clone, PartialEq)]
pub struct MergedParameters {
    pub parameters: ColorizationParameters,
    pub warning: Option<ParameterWarning>,
}

/// Merge raw user overrides onto `defaults`
///
/// Absent or blank input yields `defaults` with no warning. Input that
/// does not parse yields `defaults` plus a warning; the request proceeds.
pub fn merge(defaults: ColorizationParameters, raw_overrides: Option<&str>) -> MergedParameters {
    let raw = match raw_overrides.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => {
            return MergedParameters {
                parameters: defaults,
                warning: None,
            }
        }
    };

    match ParameterOverrides::parse(raw) {
        Ok(overrides) => MergedParameters {
            parameters: defaults.with_overrides(&overrides),
            warning: None,
        },
        Err(warning) => {
            warn!("Failed to parse parameters, using defaults: {}", warning.reason);
            MergedParameters {
                parameters: defaults,
                warning: Some(warning),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> ColorizationParameters {
        ColorizationParameters::default()
    }

    #[test]
    fn test_absent_overrides_yield_defaults() {
        let merged = merge(defaults(), None);
        assert_eq!(merged.parameters, defaults());
        assert!(merged.warning.is_none());

        let blank = merge(defaults(), Some("   "));
        assert_eq!(blank.parameters, defaults());
        assert!(blank.warning.is_none());
    }

    #[test]
    fn test_every_subset_of_overrides_is_fully_populated() {
        let keys = ["intensity", "contrast", "saturation", "temperature"];
        for mask in 0u8..16 {
            let fields: Vec<String> = keys
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(i, k)| format!("\"{}\": {}", k, 7 + i))
                .collect();
            let raw = format!("{{{}}}", fields.join(", "));

            let merged = merge(defaults(), Some(&raw));
            assert!(merged.warning.is_none(), "mask {} should parse", mask);

            let p = merged.parameters;
            let expect = |bit: usize, default: f64| {
                if mask & (1 << bit) != 0 {
                    (7 + bit) as f64
                } else {
                    default
                }
            };
            assert_eq!(p.intensity(), expect(0, DEFAULT_INTENSITY));
            assert_eq!(p.contrast(), expect(1, DEFAULT_CONTRAST));
            assert_eq!(p.saturation(), expect(2, DEFAULT_SATURATION));
            assert_eq!(p.temperature(), expect(3, DEFAULT_TEMPERATURE));
        }
    }

    #[test]
    fn test_malformed_payloads_fall_back_with_warning() {
        for raw in [
            "{not json",
            "[100, 0, 150, 0]",
            "42",
            "\"saturation\"",
            r#"{"saturation": "high"}"#,
        ] {
            let merged = merge(defaults(), Some(raw));
            assert_eq!(merged.parameters, defaults(), "payload {:?}", raw);
            assert!(merged.warning.is_some(), "payload {:?} should warn", raw);
        }
    }

    #[test]
    fn test_null_and_unknown_keys_are_ignored() {
        let merged = merge(
            defaults(),
            Some(r#"{"saturation": 150, "contrast": null, "sharpness": 3}"#),
        );
        assert!(merged.warning.is_none());
        assert_eq!(merged.parameters.saturation(), 150.0);
        assert_eq!(merged.parameters.contrast(), DEFAULT_CONTRAST);
    }

    #[test]
    fn test_out_of_range_values_are_kept_as_given() {
        let merged = merge(defaults(), Some(r#"{"intensity": 250, "saturation": -20}"#));
        assert_eq!(merged.parameters.intensity(), 250.0);
        assert_eq!(merged.parameters.saturation(), -20.0);
    }

    #[test]
    fn test_parameters_serialize_with_field_names() {
        let json = serde_json::to_value(defaults()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "intensity": 100.0,
                "contrast": 0.0,
                "saturation": 100.0,
                "temperature": 0.0
            })
        );
    }
}
