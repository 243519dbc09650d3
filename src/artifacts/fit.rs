//! Offline fitting of preprocessing artifacts from a labelled training table.
//!
//! Mirrors the serving transformation: text columns are label-encoded with
//! missing cells as the `missing` category, every other gap is filled with the
//! missing-value sentinel, and the scaler is fitted on the filled matrix.

use crate::artifacts::{Artifacts, CategoryEncoder, EncoderSet, FeatureOrder, Scaler};
use crate::config::FeaturesConfig;
use crate::feature_aligner::fits_model_input;
use crate::sentinel::{IDENTIFIER_COLUMN, LABEL_COLUMN, MISSING_VALUE};
use crate::types::{RawTable, RawValue};
use tracing::{debug, info};

/// Derives encoders, scaler and feature order from training data
#[derive(Debug, Clone)]
pub struct ArtifactFitter {
    id_column: String,
    label_column: String,
}

impl ArtifactFitter {
    pub fn new(id_column: impl Into<String>, label_column: impl Into<String>) -> Self {
        Self {
            id_column: id_column.into(),
            label_column: label_column.into(),
        }
    }

    /// Use the column roles the server is configured with
    pub fn from_config(features: &FeaturesConfig) -> Self {
        Self::new(features.id_column.as_str(), features.label_column.as_str())
    }

    /// Fit all three artifacts. Label and identifier columns are excluded.
    pub fn fit(&self, table: &RawTable) -> Artifacts {
        let mut encoders = EncoderSet::new();
        let mut names = Vec::new();
        let mut columns: Vec<Vec<f64>> = Vec::new();

        for (index, name) in table.columns().iter().enumerate() {
            if *name == self.id_column || *name == self.label_column {
                continue;
            }

            let values: Vec<f64> = if is_categorical(table.column(index)) {
                let encoder = CategoryEncoder::fit(table.column(index));
                let encoded = table
                    .column(index)
                    .map(|v| encoder.encode_or_sentinel(v) as f64)
                    .collect();
                debug!(column = %name, classes = encoder.len(), "Fitted label encoder");
                encoders.insert(name.clone(), encoder);
                encoded
            } else {
                table
                    .column(index)
                    .map(|v| {
                        v.as_number()
                            .filter(|n| fits_model_input(*n))
                            .unwrap_or(MISSING_VALUE)
                    })
                    .collect()
            };

            names.push(name.clone());
            columns.push(values);
        }

        let scaler = Scaler::fit(&columns);
        let feature_order = FeatureOrder::new(names);

        info!(
            rows = table.row_count(),
            features = feature_order.len(),
            categorical = encoders.len(),
            "Fitted preprocessing artifacts"
        );

        Artifacts::new(encoders, scaler, feature_order)
    }
}

impl Default for ArtifactFitter {
    fn default() -> Self {
        Self::new(IDENTIFIER_COLUMN, LABEL_COLUMN)
    }
}

/// A column is categorical when any present cell is not numeric
fn is_categorical<'a>(mut values: impl Iterator<Item = &'a RawValue>) -> bool {
    values.any(|v| !v.is_missing() && v.as_number().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentinel::UNSEEN_CATEGORY_CODE;

    fn training_table() -> RawTable {
        let csv = "TransactionID,isFraud,amount,card,dist\n\
                   1,0,100,visa,\n\
                   2,1,300,,10\n\
                   3,0,200,amex,20\n";
        RawTable::from_csv_bytes(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_feature_order_excludes_label_and_identifier() {
        let artifacts = ArtifactFitter::default().fit(&training_table());
        assert_eq!(artifacts.feature_order.names(), &["amount", "card", "dist"]);
        assert!(artifacts.validate().is_ok());
    }

    #[test]
    fn test_text_columns_are_label_encoded() {
        let artifacts = ArtifactFitter::default().fit(&training_table());

        assert_eq!(artifacts.encoders.len(), 1);
        let card = artifacts.encoders.get("card").unwrap();
        assert_eq!(card.try_encode(&RawValue::Text("amex".into())), Ok(0));
        assert_eq!(card.try_encode(&RawValue::Missing), Ok(1));
        assert_eq!(card.try_encode(&RawValue::Text("visa".into())), Ok(2));
        assert_eq!(
            card.encode_or_sentinel(&RawValue::Text("discover".into())),
            UNSEEN_CATEGORY_CODE
        );
    }

    #[test]
    fn test_scaler_fitted_on_filled_matrix() {
        let artifacts = ArtifactFitter::default().fit(&training_table());
        let scaler = &artifacts.scaler;

        // amount: 100, 300, 200
        assert_eq!(scaler.mean[0], 200.0);
        // card codes: visa=2, missing=1, amex=0
        assert_eq!(scaler.mean[1], 1.0);
        // dist: -999, 10, 20
        assert_eq!(scaler.mean[2], (MISSING_VALUE + 30.0) / 3.0);
    }

    #[test]
    fn test_configured_column_roles() {
        use crate::feature_aligner::FeatureAligner;
        use std::sync::Arc;

        let features = FeaturesConfig {
            id_column: "id".to_string(),
            label_column: "fraud".to_string(),
        };
        let table = RawTable::from_csv_bytes(b"id,fraud,amount
1,0,10
2,1,30
").unwrap();
        let artifacts = ArtifactFitter::from_config(&features).fit(&table);
        assert_eq!(artifacts.feature_order.names(), &["amount"]);

        // The server strips the same identifier, so nothing is synthesized
        let aligner = FeatureAligner::with_id_column(Arc::new(artifacts), features.id_column);
        let matrix = aligner.align(&table).unwrap();
        assert_eq!(matrix.as_slice(), &[-1.0, 1.0]);
    }

    #[test]
    fn test_constant_column_gets_unit_scale() {
        let table = RawTable::from_csv_bytes(b"a,b\n1,5\n2,5\n").unwrap();
        let artifacts = ArtifactFitter::default().fit(&table);
        assert_eq!(artifacts.scaler.scale[1], 1.0);
    }
}
