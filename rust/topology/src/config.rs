// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Numeric settings of a [`Model`](crate::Model).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tolerances and switches shared by every operation on a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Confusion distance for vertex merging and point classification.
    pub tolerance: f64,
    /// Fuzziness handed to kernel booleans.
    pub fuzzy: f64,
    /// Nearest-match threshold when transferring dictionaries after a boolean.
    pub transfer_distance: f64,
    /// In/on tolerance used when choosing the cell that hosts a content.
    pub classify_tolerance: f64,
    /// Add entities made by top-level constructors to the aggregate.
    pub register_in_aggregate: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            fuzzy: 1e-6,
            transfer_distance: 1e-4,
            classify_tolerance: 0.1,
            register_in_aggregate: false,
        }
    }
}

impl ModelConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ModelConfig =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects non-positive tolerances.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("tolerance", self.tolerance),
            ("fuzzy", self.fuzzy),
            ("transfer_distance", self.transfer_distance),
            ("classify_tolerance", self.classify_tolerance),
        ];
        for (name, value) in checks {
            if !(value > 0.0) || !value.is_finite() {
                return Err(Error::precondition(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ModelConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transfer_distance, 1e-4);
        assert!(!config.register_in_aggregate);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ModelConfig::from_json(r#"{ "fuzzy": 0.001 }"#).unwrap();
        assert_eq!(config.fuzzy, 0.001);
        assert_eq!(config.tolerance, 1e-6);
    }

    #[test]
    fn non_positive_tolerance_is_rejected() {
        let err = ModelConfig::from_json(r#"{ "tolerance": 0.0 }"#).unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
        assert!(ModelConfig::from_json("not json").is_err());
    }
}
