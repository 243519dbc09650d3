//! Feature alignment for fraud model inference.
//!
//! Turns an arbitrary uploaded table into the fixed-width, fixed-order matrix
//! the model was trained on. Alignment never fails on the table's contents:
//! missing columns, extra columns, missing cells and unseen categories are all
//! resolved with sentinel values. The only error is a scaler whose width does
//! not match the feature order, which is a configuration bug.

use crate::artifacts::Artifacts;
use crate::error::{Result, ServiceError};
use crate::sentinel::{IDENTIFIER_COLUMN, MISSING_VALUE, UNSEEN_CATEGORY_CODE};
use crate::types::RawTable;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Model input: one row per input row, columns exactly the feature order.
///
/// Stored row-major; every cell is finite.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl AlignedMatrix {
    /// Assemble from column-major data
    fn from_columns(rows: usize, columns: &[Vec<f64>]) -> Self {
        let cols = columns.len();
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for column in columns {
                data.push(column[r]);
            }
        }
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn row(&self, index: usize) -> &[f64] {
        &self.data[index * self.cols..(index + 1) * self.cols]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Single-precision copy for the model input tensor
    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.data.iter().map(|&v| v as f32).collect()
    }
}

/// Counters for one alignment pass, logged at debug level
#[derive(Debug, Default)]
struct AlignStats {
    unseen_cells: usize,
    synthesized_categorical: usize,
    filled_cells: usize,
    synthesized_features: usize,
    dropped_columns: usize,
}

/// Aligns raw tables to the trained feature layout.
///
/// Holds the loaded artifacts read-only, so one aligner can serve concurrent requests.
#[derive(Debug, Clone)]
pub struct FeatureAligner {
    artifacts: Arc<Artifacts>,
    id_column: String,
}

impl FeatureAligner {
    pub fn new(artifacts: Arc<Artifacts>) -> Self {
        Self::with_id_column(artifacts, IDENTIFIER_COLUMN)
    }

    pub fn with_id_column(artifacts: Arc<Artifacts>, id_column: impl Into<String>) -> Self {
        Self {
            artifacts,
            id_column: id_column.into(),
        }
    }

    /// Number of columns every aligned matrix has
    pub fn feature_count(&self) -> usize {
        self.artifacts.feature_order.len()
    }

    /// Feature names, in model input order
    pub fn feature_names(&self) -> &[String] {
        self.artifacts.feature_order.names()
    }

    /// Align `table` to the trained feature layout and scale it.
    ///
    /// Returns an error only when the scaler does not match the feature order.
    pub fn align(&self, table: &RawTable) -> Result<AlignedMatrix> {
        let rows = table.row_count();
        let mut stats = AlignStats::default();

        let input = self.strip_identifier(table);
        let mut working = self.encode_categoricals(table, &input, &mut stats);
        fill_missing(table, &input, &mut working, &mut stats);
        let ordered = self.order_columns(rows, working, &mut stats);
        let scaled = self.scale(ordered)?;

        debug!(
            rows = rows,
            features = scaled.len(),
            unseen_cells = stats.unseen_cells,
            synthesized_categorical = stats.synthesized_categorical,
            filled_cells = stats.filled_cells,
            synthesized_features = stats.synthesized_features,
            dropped_columns = stats.dropped_columns,
            "Aligned input table"
        );

        Ok(AlignedMatrix::from_columns(rows, &scaled))
    }

    /// Map input column names to their index, without the row identifier
    fn strip_identifier<'t>(&self, table: &'t RawTable) -> HashMap<&'t str, usize> {
        table
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, name)| **name != self.id_column)
            .map(|(index, name)| (name.as_str(), index))
            .collect()
    }

    /// Encode every encoder-tracked column, present in the input or not.
    ///
    /// Unseen values and absent columns both become the unseen code.
    fn encode_categoricals(
        &self,
        table: &RawTable,
        input: &HashMap<&str, usize>,
        stats: &mut AlignStats,
    ) -> HashMap<String, Vec<f64>> {
        let rows = table.row_count();
        let unseen = UNSEEN_CATEGORY_CODE as f64;

        self.artifacts
            .encoders
            .iter()
            .map(|(name, encoder)| {
                let column: Vec<f64> = match input.get(name) {
                    Some(&index) => table
                        .column(index)
                        .map(|value| match encoder.try_encode(value) {
                            Ok(code) => code as f64,
                            Err(_) => {
                                stats.unseen_cells += 1;
                                unseen
                            }
                        })
                        .collect(),
                    None => {
                        stats.synthesized_categorical += 1;
                        vec![unseen; rows]
                    }
                };
                (name.to_string(), column)
            })
            .collect()
    }

    /// Select feature-order columns, synthesizing absent ones as missing
    fn order_columns(
        &self,
        rows: usize,
        mut working: HashMap<String, Vec<f64>>,
        stats: &mut AlignStats,
    ) -> Vec<Vec<f64>> {
        let ordered: Vec<Vec<f64>> = self
            .feature_names()
            .iter()
            .map(|name| {
                working.remove(name).unwrap_or_else(|| {
                    stats.synthesized_features += 1;
                    vec![MISSING_VALUE; rows]
                })
            })
            .collect();

        stats.dropped_columns = working.len();
        ordered
    }

    fn scale(&self, columns: Vec<Vec<f64>>) -> Result<Vec<Vec<f64>>> {
        let scaler = &self.artifacts.scaler;
        if scaler.width() != columns.len() || scaler.scale.len() != columns.len() {
            return Err(ServiceError::InconsistentArtifacts(format!(
                "scaler has {} columns but {} features were aligned",
                scaler.width(),
                columns.len()
            )));
        }

        Ok(columns
            .into_iter()
            .enumerate()
            .map(|(index, column)| {
                let fallback = scaler
                    .transform_value(index, MISSING_VALUE)
                    .clamp(-F32_LIMIT, F32_LIMIT);
                column
                    .into_iter()
                    .map(|v| {
                        let scaled = scaler.transform_value(index, v);
                        if fits_model_input(scaled) {
                            scaled
                        } else {
                            fallback
                        }
                    })
                    .collect()
            })
            .collect())
    }
}

/// Largest magnitude the single-precision model input can hold
const F32_LIMIT: f64 = f32::MAX as f64;

pub(crate) fn fits_model_input(value: f64) -> bool {
    value.is_finite() && value.abs() <= F32_LIMIT
}

/// Read the remaining input columns as numbers; missing, non-numeric and
/// out-of-f32-range cells become the missing-value sentinel.
fn fill_missing(
    table: &RawTable,
    input: &HashMap<&str, usize>,
    working: &mut HashMap<String, Vec<f64>>,
    stats: &mut AlignStats,
) {
    for (&name, &index) in input {
        if working.contains_key(name) {
            continue;
        }
        let column: Vec<f64> = table
            .column(index)
            .map(|value| {
                value
                    .as_number()
                    .filter(|v| fits_model_input(*v))
                    .unwrap_or_else(|| {
                        stats.filled_cells += 1;
                        MISSING_VALUE
                    })
            })
            .collect();
        working.insert(name.to_string(), column);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{CategoryEncoder, EncoderSet, FeatureOrder, Scaler};
    use crate::types::RawValue;
    use std::collections::BTreeMap;

    fn identity_aligner(order: &[&str], encoders: EncoderSet) -> FeatureAligner {
        let n = order.len();
        let artifacts = Artifacts::new(
            encoders,
            Scaler::new(vec![0.0; n], vec![1.0; n]),
            order.iter().copied().collect::<FeatureOrder>(),
        );
        FeatureAligner::new(Arc::new(artifacts))
    }

    fn country_encoders() -> EncoderSet {
        let mut encoders = EncoderSet::new();
        encoders.insert(
            "country",
            CategoryEncoder::from_codes(BTreeMap::from([
                ("US".to_string(), 0),
                ("UK".to_string(), 1),
            ])),
        );
        encoders
    }

    fn csv(text: &str) -> RawTable {
        RawTable::from_csv_bytes(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_width_and_order_independent_of_input_shape() {
        let aligner = identity_aligner(&["amount", "country", "dist"], country_encoders());
        let inputs = [
            "amount,country,dist\n1,US,2\n",
            "dist,extra,country,amount,more\n2,x,US,1,y\n",
            "amount\n1\n",
            "foo,bar\n1,2\n",
            "amount,country\n",
        ];

        for input in inputs {
            let matrix = aligner.align(&csv(input)).unwrap();
            assert_eq!(matrix.cols(), 3, "input: {:?}", input);
        }

        let reordered = aligner.align(&csv("dist,extra,country,amount\n2,x,US,1\n")).unwrap();
        assert_eq!(reordered.row(0), &[1.0, 0.0, 2.0]);
    }

    #[test]
    fn test_identifier_only_input() {
        let aligner = identity_aligner(&["A", "B"], EncoderSet::new());
        let matrix = aligner.align(&csv("TransactionID\n42\n43\n")).unwrap();

        assert_eq!(matrix.rows(), 2);
        assert_eq!(matrix.row(0), &[MISSING_VALUE, MISSING_VALUE]);
        assert_eq!(matrix.row(1), &[MISSING_VALUE, MISSING_VALUE]);
    }

    #[test]
    fn test_identifier_is_never_a_feature() {
        // Even when the feature order names it, the identifier is stripped first
        let aligner = identity_aligner(&["TransactionID", "amount"], EncoderSet::new());
        let matrix = aligner.align(&csv("TransactionID,amount\n7,3\n")).unwrap();
        assert_eq!(matrix.row(0), &[MISSING_VALUE, 3.0]);
    }

    #[test]
    fn test_unseen_category_encodes_per_cell() {
        let aligner = identity_aligner(&["country"], country_encoders());

        let matrix = aligner.align(&csv("country\nFR\nUK\nUS\n")).unwrap();
        assert_eq!(matrix.as_slice(), &[-1.0, 1.0, 0.0]);

        let alone = aligner.align(&csv("country\nFR\n")).unwrap();
        assert_eq!(alone.row(0), &[-1.0]);
    }

    #[test]
    fn test_unseen_value_matches_absent_column() {
        let aligner = identity_aligner(&["amount", "country"], country_encoders());

        let unseen = aligner.align(&csv("amount,country\n10,FR\n")).unwrap();
        let absent = aligner.align(&csv("amount\n10\n")).unwrap();

        assert_eq!(unseen.row(0), absent.row(0));
        assert_eq!(unseen.row(0), &[10.0, UNSEEN_CATEGORY_CODE as f64]);
    }

    #[test]
    fn test_missing_categorical_cell_uses_missing_category() {
        let mut encoders = EncoderSet::new();
        encoders.insert(
            "card",
            CategoryEncoder::fit(&[RawValue::Text("visa".into()), RawValue::Missing]),
        );
        let aligner = identity_aligner(&["card"], encoders);

        // "missing" sorts before "visa"
        let matrix = aligner.align(&csv("card,amount\n,1\nvisa,2\n")).unwrap();
        assert_eq!(matrix.as_slice(), &[0.0, 1.0]);

        // Without a fitted missing category the cell is unseen
        let aligner = identity_aligner(&["country"], country_encoders());
        let matrix = aligner.align(&csv("country,amount\n,1\n")).unwrap();
        assert_eq!(matrix.as_slice(), &[-1.0]);
    }

    #[test]
    fn test_missing_and_non_numeric_cells_fill_with_sentinel() {
        let aligner = identity_aligner(&["amount", "dist"], EncoderSet::new());
        let matrix = aligner.align(&csv("amount,dist\n,abc\n5,NaN\n")).unwrap();

        assert_eq!(matrix.row(0), &[MISSING_VALUE, MISSING_VALUE]);
        assert_eq!(matrix.row(1), &[5.0, MISSING_VALUE]);
    }

    #[test]
    fn test_scaling_of_missing_column_is_exact() {
        let mean = 12.5;
        let scale = 3.75;
        let artifacts = Artifacts::new(
            EncoderSet::new(),
            Scaler::new(vec![mean], vec![scale]),
            ["amount"].into_iter().collect(),
        );
        let aligner = FeatureAligner::new(Arc::new(artifacts));

        let matrix = aligner.align(&csv("amount,other\n,1\n,2\n")).unwrap();
        let expected = (MISSING_VALUE - mean) / scale;
        assert_eq!(matrix.as_slice(), &[expected, expected]);
    }

    #[test]
    fn test_json_numbers_in_categorical_columns() {
        let mut encoders = EncoderSet::new();
        encoders.insert(
            "card_bin",
            CategoryEncoder::fit(&[RawValue::Text("100".into()), RawValue::Text("other".into())]),
        );
        let aligner = identity_aligner(&["card_bin"], encoders);

        let table = RawTable::from_json(&serde_json::json!([{"card_bin": 100}, {"card_bin": 7}])).unwrap();
        let matrix = aligner.align(&table).unwrap();
        assert_eq!(matrix.as_slice(), &[0.0, -1.0]);
    }

    #[test]
    fn test_empty_table() {
        let aligner = identity_aligner(&["a", "b", "c"], country_encoders());
        let matrix = aligner.align(&csv("a\n")).unwrap();

        assert!(matrix.is_empty());
        assert_eq!(matrix.cols(), 3);
        assert!(matrix.as_slice().is_empty());
    }

    #[test]
    fn test_scaler_mismatch_fails_loudly() {
        let artifacts = Artifacts::new(
            EncoderSet::new(),
            Scaler::new(vec![0.0], vec![1.0]),
            ["a", "b"].into_iter().collect(),
        );
        let aligner = FeatureAligner::new(Arc::new(artifacts));

        let err = aligner.align(&csv("a,b\n1,2\n")).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_output_cells_are_finite() {
        let aligner = identity_aligner(&["amount", "country"], country_encoders());
        let matrix = aligner
            .align(&csv("amount,country\ninf,US\n1e400,\n-7,UK\n"))
            .unwrap();
        assert!(matrix.as_slice().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_extreme_values_stay_in_model_range() {
        let artifacts = Artifacts::new(
            EncoderSet::new(),
            Scaler::new(vec![0.0], vec![0.5]),
            ["amount"].into_iter().collect(),
        );
        let aligner = FeatureAligner::new(Arc::new(artifacts));

        // 3e38 parses in range but doubles past f32::MAX once scaled
        let matrix = aligner
            .align(&csv("amount
1.7e308
1e39
3e38
5
"))
            .unwrap();
        let missing = MISSING_VALUE / 0.5;
        assert_eq!(matrix.as_slice(), &[missing, missing, missing, 10.0]);
        assert!(matrix.to_f32_vec().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_custom_identifier_column() {
        let artifacts = Artifacts::new(
            EncoderSet::new(),
            Scaler::new(vec![0.0], vec![1.0]),
            ["id"].into_iter().collect(),
        );
        let aligner = FeatureAligner::with_id_column(Arc::new(artifacts), "id");
        let matrix = aligner.align(&csv("id\n5\n")).unwrap();
        assert_eq!(matrix.row(0), &[MISSING_VALUE]);
    }
}
