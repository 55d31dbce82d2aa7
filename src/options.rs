//! Preprocessing options: a closed, validated configuration record.
//!
//! Raw configuration arrives as a JSON object (`serde_json::Map`). Every key must be
//! known, every value must be in range, and missing keys take their defaults.
//! The validated [`PreprocessingOptions`] value is immutable and serialises back to
//! the same mapping, so a job's options snapshot can be persisted and reloaded.
//!
//! ```
//! use flowprep::options::{validate_options, ScalingMethod};
//! use serde_json::json;
//!
//! let raw = json!({ "scaling_method": "standard", "random_state": 7 });
//! let options = validate_options(raw.as_object().unwrap())?;
//! assert_eq!(options.scaling_method, ScalingMethod::Standard);
//! assert_eq!(options.test_size, 0.2);
//! # Ok::<(), flowprep::error::FlowprepError>(())
//! ```

use crate::error::{FlowprepError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const DEFAULT_TEST_SIZE: f64 = 0.2;

/// A closed set of named values accepted by one option field.
pub trait Choice: Sized + Copy + 'static {
    /// Every accepted value, in display order.
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == s)
    }

    fn allowed() -> String {
        Self::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

macro_rules! choice_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? } default $default:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $(
                #[doc = concat!("`", $text, "`")]
                $variant,
            )+
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl Choice for $name {
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

choice_enum! {
    /// How missing values are handled.
    ImputationMethod { Mean => "mean", Median => "median", Mode => "mode", Drop => "drop" } default Mean
}

choice_enum! {
    /// How numeric columns are rescaled.
    ScalingMethod { None => "none", MinMax => "minmax", Standard => "standard", Robust => "robust" } default MinMax
}

choice_enum! {
    /// How categorical columns are turned into numbers.
    EncodingMethod { None => "none", OneHot => "onehot", Label => "label" } default OneHot
}

choice_enum! {
    /// Row-wise outlier rule, only consulted when outlier removal is enabled.
    OutlierMethod { Iqr => "iqr", ZScore => "zscore" } default Iqr
}

choice_enum! {
    /// File format used when results are exported.
    OutputFormat { Csv => "csv", Json => "json", Parquet => "parquet" } default Csv
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        self.as_str()
    }
}

/// Validated, immutable configuration for one preprocessing run.
///
/// `outlier_method` is kept even when `remove_outliers` is false; in that case it is
/// a documented no-op rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct PreprocessingOptions {
    pub imputation_method: ImputationMethod,
    pub scaling_method: ScalingMethod,
    pub encoding_method: EncodingMethod,
    pub remove_outliers: bool,
    pub outlier_method: OutlierMethod,
    pub test_size: f64,
    pub random_state: Option<u64>,
    pub output_format: OutputFormat,
}

impl Default for PreprocessingOptions {
    fn default() -> Self {
        Self {
            imputation_method: ImputationMethod::default(),
            scaling_method: ScalingMethod::default(),
            encoding_method: EncodingMethod::default(),
            remove_outliers: false,
            outlier_method: OutlierMethod::default(),
            test_size: DEFAULT_TEST_SIZE,
            random_state: None,
            output_format: OutputFormat::default(),
        }
    }
}

/// Keys accepted by [`validate_options`].
pub const OPTION_KEYS: &[&str] = &[
    "imputation_method",
    "scaling_method",
    "encoding_method",
    "remove_outliers",
    "outlier_method",
    "test_size",
    "random_state",
    "output_format",
];

/// Validate and normalise a raw configuration mapping.
///
/// # Errors
///
/// Returns [`FlowprepError::Configuration`] naming the first offending key when a
/// key is unknown, a value has the wrong type, an enumerated value is not one of
/// the allowed names, `test_size` lies outside (0, 1), or `random_state` is not a
/// non-negative integer.
pub fn validate_options(raw: &Map<String, Value>) -> Result<PreprocessingOptions> {
    if let Some(unknown) = raw.keys().find(|k| !OPTION_KEYS.contains(&k.as_str())) {
        return Err(FlowprepError::config(
            unknown.as_str(),
            format!("unknown option (allowed keys: {})", OPTION_KEYS.join(", ")),
        ));
    }

    let defaults = PreprocessingOptions::default();
    let options = PreprocessingOptions {
        imputation_method: choice_field(raw, "imputation_method", defaults.imputation_method)?,
        scaling_method: choice_field(raw, "scaling_method", defaults.scaling_method)?,
        encoding_method: choice_field(raw, "encoding_method", defaults.encoding_method)?,
        remove_outliers: bool_field(raw, "remove_outliers", defaults.remove_outliers)?,
        outlier_method: choice_field(raw, "outlier_method", defaults.outlier_method)?,
        test_size: test_size_field(raw)?,
        random_state: seed_field(raw)?,
        output_format: choice_field(raw, "output_format", defaults.output_format)?,
    };

    if !options.remove_outliers && raw.contains_key("outlier_method") {
        tracing::debug!(
            outlier_method = %options.outlier_method,
            "outlier_method ignored because remove_outliers is false"
        );
    }

    Ok(options)
}

impl PreprocessingOptions {
    /// Canonical mapping of primitive values; the inverse of [`validate_options`].
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("imputation_method".to_owned(), self.imputation_method.as_str().into());
        map.insert("scaling_method".to_owned(), self.scaling_method.as_str().into());
        map.insert("encoding_method".to_owned(), self.encoding_method.as_str().into());
        map.insert("remove_outliers".to_owned(), Value::Bool(self.remove_outliers));
        map.insert("outlier_method".to_owned(), self.outlier_method.as_str().into());
        map.insert("test_size".to_owned(), Value::from(self.test_size));
        map.insert(
            "random_state".to_owned(),
            self.random_state.map_or(Value::Null, Value::from),
        );
        map.insert("output_format".to_owned(), self.output_format.as_str().into());
        map
    }

    /// Parse options from a JSON document.
    ///
    /// # Errors
    ///
    /// Fails if the text is not a JSON object or does not validate.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        match value {
            Value::Object(map) => validate_options(&map),
            _ => Err(FlowprepError::config("options", "expected a JSON object")),
        }
    }

    /// # Errors
    ///
    /// Serialisation of a plain map cannot realistically fail; the error is passed on.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_map())?)
    }

    /// The outlier test to apply, or `None` when removal is off.
    pub fn outlier_filter(&self) -> Option<OutlierMethod> {
        self.remove_outliers.then_some(self.outlier_method)
    }
}

impl TryFrom<Map<String, Value>> for PreprocessingOptions {
    type Error = FlowprepError;

    fn try_from(map: Map<String, Value>) -> Result<Self> {
        validate_options(&map)
    }
}

impl From<PreprocessingOptions> for Map<String, Value> {
    fn from(options: PreprocessingOptions) -> Self {
        options.to_map()
    }
}

fn choice_field<T: Choice>(raw: &Map<String, Value>, key: &str, default: T) -> Result<T> {
    match raw.get(key) {
        None => Ok(default),
        Some(Value::String(s)) => T::parse(&s.to_lowercase()).ok_or_else(|| {
            FlowprepError::config(
                key,
                format!("unknown value '{s}' (allowed: {})", T::allowed()),
            )
        }),
        Some(other) => Err(FlowprepError::config(
            key,
            format!("expected a string, got {other} (allowed: {})", T::allowed()),
        )),
    }
}

fn bool_field(raw: &Map<String, Value>, key: &str, default: bool) -> Result<bool> {
    match raw.get(key) {
        None => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(FlowprepError::config(
            key,
            format!("expected true or false, got {other}"),
        )),
    }
}

fn test_size_field(raw: &Map<String, Value>) -> Result<f64> {
    let Some(value) = raw.get("test_size") else {
        return Ok(DEFAULT_TEST_SIZE);
    };
    let size = value.as_f64().ok_or_else(|| {
        FlowprepError::config("test_size", format!("expected a number, got {value}"))
    })?;
    if size > 0.0 && size < 1.0 {
        Ok(size)
    } else {
        Err(FlowprepError::config(
            "test_size",
            format!("{size} is outside the open interval (0, 1)"),
        ))
    }
}

fn seed_field(raw: &Map<String, Value>) -> Result<Option<u64>> {
    match raw.get("random_state") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            FlowprepError::config(
                "random_state",
                format!("expected a non-negative integer or null, got {value}"),
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    #![expect(clippy::unwrap_used)]
    use super::*;
    use crate::error::ErrorCategory;
    use serde_json::json;

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn field_of(err: FlowprepError) -> String {
        match err {
            FlowprepError::Configuration { field, .. } => field,
            other => panic!("expected configuration error, got {other}"),
        }
    }

    #[test]
    fn test_empty_map_yields_defaults() {
        let options = validate_options(&Map::new()).unwrap();
        assert_eq!(options, PreprocessingOptions::default());
        assert_eq!(options.imputation_method, ImputationMethod::Mean);
        assert_eq!(options.scaling_method, ScalingMethod::MinMax);
        assert_eq!(options.encoding_method, EncodingMethod::OneHot);
        assert_eq!(options.output_format, OutputFormat::Csv);
        assert!(options.random_state.is_none());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = validate_options(&raw(json!({ "feature_engineering": true }))).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(field_of(err), "feature_engineering");
    }

    #[test]
    fn test_unknown_enum_value_lists_allowed_values() {
        let err = validate_options(&raw(json!({ "scaling_method": "log" }))).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("minmax, standard, robust"), "{text}");
        assert_eq!(field_of(err), "scaling_method");
    }

    #[test]
    fn test_enum_values_are_case_insensitive() {
        let options = validate_options(&raw(json!({ "encoding_method": "OneHot" }))).unwrap();
        assert_eq!(options.encoding_method, EncodingMethod::OneHot);
    }

    #[test]
    fn test_test_size_bounds_are_exclusive() {
        for bad in [0.0, 1.0, -0.5, 1.5] {
            let err = validate_options(&raw(json!({ "test_size": bad }))).unwrap_err();
            assert_eq!(field_of(err), "test_size");
        }
        let ok = validate_options(&raw(json!({ "test_size": 0.5 }))).unwrap();
        assert!((ok.test_size - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_random_state_must_be_non_negative_integer() {
        let err = validate_options(&raw(json!({ "random_state": -1 }))).unwrap_err();
        assert_eq!(field_of(err), "random_state");
        let err = validate_options(&raw(json!({ "random_state": 1.5 }))).unwrap_err();
        assert_eq!(field_of(err), "random_state");
        let ok = validate_options(&raw(json!({ "random_state": null }))).unwrap();
        assert!(ok.random_state.is_none());
    }

    #[test]
    fn test_wrong_type_for_bool() {
        let err = validate_options(&raw(json!({ "remove_outliers": "yes" }))).unwrap_err();
        assert_eq!(field_of(err), "remove_outliers");
    }

    #[test]
    fn test_outlier_method_without_removal_is_a_no_op() {
        let options = validate_options(&raw(json!({
            "remove_outliers": false,
            "outlier_method": "zscore"
        })))
        .unwrap();
        assert_eq!(options.outlier_method, OutlierMethod::ZScore);
        assert!(options.outlier_filter().is_none());
    }

    #[test]
    fn test_map_round_trip() {
        let options = validate_options(&raw(json!({
            "imputation_method": "median",
            "scaling_method": "robust",
            "encoding_method": "label",
            "remove_outliers": true,
            "outlier_method": "zscore",
            "test_size": 0.3,
            "random_state": 42,
            "output_format": "parquet"
        })))
        .unwrap();
        let again = validate_options(&options.to_map()).unwrap();
        assert_eq!(options, again);
    }

    #[test]
    fn test_serde_goes_through_validation() {
        let options = PreprocessingOptions {
            random_state: Some(3),
            ..Default::default()
        };
        let json = serde_json::to_string(&options).unwrap();
        let back: PreprocessingOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);

        let bad = serde_json::from_str::<PreprocessingOptions>(r#"{"test_size": 2.0}"#);
        assert!(bad.is_err());
    }
}
