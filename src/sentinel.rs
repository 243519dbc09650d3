//! Reserved values shared by the artifact fitter and the feature aligner.
//!
//! The model was trained against these exact values. Changing any of them
//! invalidates every previously fitted artifact set.

/// Code emitted for a categorical value the encoder never saw, and for a
/// categorical column absent from the input.
pub const UNSEEN_CATEGORY_CODE: i64 = -1;

/// Fill for any cell still missing after categorical encoding.
pub const MISSING_VALUE: f64 = -999.0;

/// Category substituted for missing cells in encoder-tracked columns.
pub const MISSING_CATEGORY: &str = "missing";

/// Default row identifier column; stripped before alignment.
pub const IDENTIFIER_COLUMN: &str = "TransactionID";

/// Default training label column.
pub const LABEL_COLUMN: &str = "isFraud";

/// Cell texts read as missing, matching the NA tokens pandas recognises by default.
pub const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Returns true if `text` is one of the recognised NA tokens.
pub fn is_na_token(text: &str) -> bool {
    NA_TOKENS.contains(&text)
}
