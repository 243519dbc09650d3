//! Trained preprocessing artifacts: encoders, scaler and feature order

pub mod encoder;
pub mod fit;
pub mod scaler;
pub mod store;

pub use encoder::{CategoryEncoder, EncoderSet, Unseen};
pub use fit::ArtifactFitter;
pub use scaler::{FeatureOrder, Scaler};
pub use store::ArtifactStore;

use crate::error::{Result, ServiceError};
use tracing::warn;

/// The three artifacts the serving path needs, loaded together
#[derive(Debug, Clone, PartialEq)]
pub struct Artifacts {
    pub encoders: EncoderSet,
    pub scaler: Scaler,
    pub feature_order: FeatureOrder,
}

impl Artifacts {
    pub fn new(encoders: EncoderSet, scaler: Scaler, feature_order: FeatureOrder) -> Self {
        Self {
            encoders,
            scaler,
            feature_order,
        }
    }

    /// Check that the artifacts agree with each other.
    ///
    /// Encoder columns outside the feature order are tolerated; they are
    /// encoded and then dropped during alignment.
    pub fn validate(&self) -> Result<()> {
        self.scaler
            .check()
            .map_err(ServiceError::InconsistentArtifacts)?;

        if self.scaler.width() != self.feature_order.len() {
            return Err(ServiceError::InconsistentArtifacts(format!(
                "scaler has {} columns but feature order has {}",
                self.scaler.width(),
                self.feature_order.len()
            )));
        }

        if let Some(name) = self.feature_order.first_duplicate() {
            return Err(ServiceError::InconsistentArtifacts(format!(
                "feature '{}' appears more than once in feature order",
                name
            )));
        }

        for (column, encoder) in self.encoders.iter() {
            encoder.check_bijective().map_err(|reason| {
                ServiceError::InconsistentArtifacts(format!("encoder '{}': {}", column, reason))
            })?;
            if !self.feature_order.contains(column) {
                warn!(column = %column, "Encoder column is not part of the feature order");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn artifacts(order: &[&str], width: usize) -> Artifacts {
        Artifacts::new(
            EncoderSet::new(),
            Scaler::new(vec![0.0; width], vec![1.0; width]),
            order.iter().copied().collect(),
        )
    }

    #[test]
    fn test_validate_accepts_consistent_artifacts() {
        assert!(artifacts(&["a", "b"], 2).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_width_mismatch() {
        let err = artifacts(&["a", "b"], 3).validate().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_validate_rejects_duplicate_features() {
        assert!(artifacts(&["a", "a"], 2).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_bijective_encoder() {
        let mut a = artifacts(&["country"], 1);
        a.encoders.insert(
            "country",
            CategoryEncoder::from_codes(BTreeMap::from([("US".to_string(), 0), ("UK".to_string(), 0)])),
        );
        assert!(a.validate().unwrap_err().is_configuration());
    }
}
