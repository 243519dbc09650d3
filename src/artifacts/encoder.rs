//! Label encoders for categorical columns

use crate::sentinel::{MISSING_CATEGORY, UNSEEN_CATEGORY_CODE};
use crate::types::RawValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use thiserror::Error;

/// Lookup failure for a category the encoder was not fitted on
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("category '{0}' was not seen at fit time")]
pub struct Unseen(pub String);

/// Category value -> integer code for one column.
///
/// Codes are assigned to the sorted distinct values, starting at 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryEncoder {
    codes: BTreeMap<String, i64>,
}

impl CategoryEncoder {
    /// Fit on observed values; missing values count as the `missing` category
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a RawValue>,
    {
        let classes: BTreeSet<String> = values
            .into_iter()
            .map(|v| v.category_key().unwrap_or_else(|| MISSING_CATEGORY.to_string()))
            .collect();

        let codes = classes
            .into_iter()
            .enumerate()
            .map(|(code, class)| (class, code as i64))
            .collect();

        Self { codes }
    }

    /// Build from an explicit mapping
    pub fn from_codes(codes: BTreeMap<String, i64>) -> Self {
        Self { codes }
    }

    /// Look up one cell; missing cells are looked up as the `missing` category
    pub fn try_encode(&self, value: &RawValue) -> Result<i64, Unseen> {
        let key = value
            .category_key()
            .unwrap_or_else(|| MISSING_CATEGORY.to_string());
        self.codes.get(&key).copied().ok_or(Unseen(key))
    }

    /// `try_encode` with every failure folded into the unseen sentinel
    pub fn encode_or_sentinel(&self, value: &RawValue) -> i64 {
        self.try_encode(value).unwrap_or(UNSEEN_CATEGORY_CODE)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Codes must be non-negative and unique
    pub(crate) fn check_bijective(&self) -> Result<(), String> {
        let mut seen = HashSet::with_capacity(self.codes.len());
        for (class, &code) in &self.codes {
            if code < 0 {
                return Err(format!("category '{}' has negative code {}", class, code));
            }
            if !seen.insert(code) {
                return Err(format!("code {} is assigned to more than one category", code));
            }
        }
        Ok(())
    }
}

/// Encoders for every categorical column, keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncoderSet {
    encoders: BTreeMap<String, CategoryEncoder>,
}

impl EncoderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, encoder: CategoryEncoder) {
        self.encoders.insert(column.into(), encoder);
    }

    pub fn get(&self, column: &str) -> Option<&CategoryEncoder> {
        self.encoders.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.encoders.contains_key(column)
    }

    /// Iterate (column, encoder) pairs in column-name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CategoryEncoder)> {
        self.encoders.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }
}

impl FromIterator<(String, CategoryEncoder)> for EncoderSet {
    fn from_iter<T: IntoIterator<Item = (String, CategoryEncoder)>>(iter: T) -> Self {
        Self {
            encoders: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.to_string())
    }

    #[test]
    fn test_fit_assigns_sorted_codes() {
        let values = vec![text("visa"), text("amex"), RawValue::Missing, text("visa")];
        let encoder = CategoryEncoder::fit(&values);

        assert_eq!(encoder.len(), 3);
        assert_eq!(encoder.try_encode(&text("amex")), Ok(0));
        assert_eq!(encoder.try_encode(&RawValue::Missing), Ok(1));
        assert_eq!(encoder.try_encode(&text("visa")), Ok(2));
    }

    #[test]
    fn test_unseen_category_folds_to_sentinel() {
        let encoder = CategoryEncoder::from_codes(BTreeMap::from([
            ("US".to_string(), 0),
            ("UK".to_string(), 1),
        ]));

        assert_eq!(encoder.try_encode(&text("FR")), Err(Unseen("FR".to_string())));
        assert_eq!(encoder.encode_or_sentinel(&text("FR")), UNSEEN_CATEGORY_CODE);
        // Not fitted with a missing category either
        assert_eq!(encoder.encode_or_sentinel(&RawValue::Missing), UNSEEN_CATEGORY_CODE);
        assert_eq!(encoder.encode_or_sentinel(&text("UK")), 1);
    }

    #[test]
    fn test_numeric_values_use_display_text() {
        let encoder = CategoryEncoder::fit(&[text("100"), text("150")]);
        assert_eq!(encoder.try_encode(&RawValue::Number(150.0)), Ok(1));
        assert!(encoder.try_encode(&RawValue::Number(150.5)).is_err());
    }

    #[test]
    fn test_bijective_check() {
        let ok = CategoryEncoder::from_codes(BTreeMap::from([("a".to_string(), 0), ("b".to_string(), 1)]));
        assert!(ok.check_bijective().is_ok());

        let duplicate =
            CategoryEncoder::from_codes(BTreeMap::from([("a".to_string(), 0), ("b".to_string(), 0)]));
        assert!(duplicate.check_bijective().is_err());

        let negative = CategoryEncoder::from_codes(BTreeMap::from([("a".to_string(), -1)]));
        assert!(negative.check_bijective().is_err());
    }

    #[test]
    fn test_encoder_set_serializes_as_nested_map() {
        let mut set = EncoderSet::new();
        set.insert("country", CategoryEncoder::fit(&[text("US"), text("UK")]));

        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json, serde_json::json!({"country": {"UK": 0, "US": 1}}));
    }
}
