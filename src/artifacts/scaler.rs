//! Standard scaler and canonical feature order

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Canonical column sequence fixed at training time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureOrder(Vec<String>);

impl FeatureOrder {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    pub(crate) fn first_duplicate(&self) -> Option<&str> {
        let mut seen = HashSet::with_capacity(self.0.len());
        self.0
            .iter()
            .find(|name| !seen.insert(name.as_str()))
            .map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for FeatureOrder {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Per-column standardisation: `(value - mean) / scale`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl Scaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Self {
        Self { mean, scale }
    }

    /// Fit on a column-major matrix. Zero-variance columns get scale 1.
    pub fn fit(columns: &[Vec<f64>]) -> Self {
        let mut mean = Vec::with_capacity(columns.len());
        let mut scale = Vec::with_capacity(columns.len());

        for column in columns {
            let n = column.len() as f64;
            if column.is_empty() {
                mean.push(0.0);
                scale.push(1.0);
                continue;
            }
            let m = column.iter().sum::<f64>() / n;
            let variance = column.iter().map(|&x| (x - m).powi(2)).sum::<f64>() / n;
            let std_dev = variance.sqrt();

            mean.push(m);
            scale.push(if std_dev == 0.0 || !std_dev.is_finite() { 1.0 } else { std_dev });
        }

        Self { mean, scale }
    }

    /// Number of columns the scaler was fitted on
    pub fn width(&self) -> usize {
        self.mean.len()
    }

    /// Scale one value of column `index`
    #[inline]
    pub fn transform_value(&self, index: usize, value: f64) -> f64 {
        (value - self.mean[index]) / self.scale[index]
    }

    /// Structural problems that make the scaler unusable
    pub(crate) fn check(&self) -> Result<(), String> {
        if self.mean.len() != self.scale.len() {
            return Err(format!(
                "scaler mean has {} entries but scale has {}",
                self.mean.len(),
                self.scale.len()
            ));
        }
        if let Some(i) = self.mean.iter().position(|m| !m.is_finite()) {
            return Err(format!("scaler mean[{}] is not finite", i));
        }
        if let Some(i) = self.scale.iter().position(|s| !s.is_finite() || *s == 0.0) {
            return Err(format!("scaler scale[{}] must be finite and non-zero", i));
        }
        Ok(())
    }
}
