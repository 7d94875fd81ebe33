//! Declarative row schema and sampled validation
//!
//! Schemas are JSON documents in a small JSON-Schema dialect:
//!
//! ```json
//! {
//!   "required": ["date", "campaign_id"],
//!   "properties": {
//!     "date": { "type": "string", "format": "date" },
//!     "impressions": { "type": "integer", "minimum": 0 },
//!     "ctr": { "type": ["number", "null"], "minimum": 0, "maximum": 1 },
//!     "data_source": { "enum": ["google_ads", "google_lsa", "search_terms"] }
//!   }
//! }
//! ```
//!
//! Only `type`, `format: date`, `enum`, `minimum`, `maximum` and `required`
//! are understood; other keywords are ignored. Validation never fails an
//! operation: the report is logged and stored in the client state.

use std::collections::BTreeMap;
use std::path::Path;

use adsync_core::domain::{window::parse_date, ValidationReport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

// ============================================================================
// Schema model
// ============================================================================

/// JSON type names accepted in `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Null,
}

impl FieldType {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Null => value.is_null(),
        }
    }
}

/// `type` may be a single name or a list of alternatives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeSpec {
    One(FieldType),
    Any(Vec<FieldType>),
}

impl TypeSpec {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::One(t) => t.matches(value),
            Self::Any(types) => types.iter().any(|t| t.matches(value)),
        }
    }
}

/// Constraints for one field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TypeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

/// Row schema: required fields plus per-field rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSchema {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, FieldRule>,
}

impl DatasetSchema {
    /// Parse a schema document
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load the schema at `path`, or the built-in campaign schema if the
    /// file does not exist
    pub async fn load_or_builtin(path: &Path) -> anyhow::Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => {
                debug!(path = %path.display(), "using schema file");
                Self::from_json(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::campaign_v1()),
            Err(e) => Err(e.into()),
        }
    }

    /// Built-in schema for campaign rows, version 1
    #[must_use]
    pub fn campaign_v1() -> Self {
        let count = || FieldRule {
            kind: Some(TypeSpec::One(FieldType::Integer)),
            minimum: Some(0.0),
            ..FieldRule::default()
        };
        let amount = || FieldRule {
            kind: Some(TypeSpec::One(FieldType::Number)),
            minimum: Some(0.0),
            ..FieldRule::default()
        };
        let ratio = |max: Option<f64>| FieldRule {
            kind: Some(TypeSpec::Any(vec![FieldType::Number, FieldType::Null])),
            minimum: Some(0.0),
            maximum: max,
            ..FieldRule::default()
        };
        let text = || FieldRule {
            kind: Some(TypeSpec::One(FieldType::String)),
            ..FieldRule::default()
        };

        let mut properties = BTreeMap::new();
        properties.insert(
            "data_source".into(),
            FieldRule {
                allowed: Some(vec![
                    Value::from("google_ads"),
                    Value::from("google_lsa"),
                    Value::from("search_terms"),
                ]),
                ..FieldRule::default()
            },
        );
        properties.insert(
            "date".into(),
            FieldRule {
                format: Some("date".into()),
                ..text()
            },
        );
        properties.insert("campaign_id".into(), text());
        properties.insert("campaign_name".into(), text());
        properties.insert("campaign_status".into(), text());
        properties.insert("impressions".into(), count());
        properties.insert("clicks".into(), count());
        properties.insert("cost".into(), amount());
        properties.insert("conversions".into(), amount());
        properties.insert("conversions_value".into(), amount());
        properties.insert("all_conversions".into(), amount());
        properties.insert("view_through_conversions".into(), count());
        properties.insert("ctr".into(), ratio(Some(1.0)));
        properties.insert("avg_cpc".into(), ratio(None));
        properties.insert("cpa".into(), ratio(None));
        properties.insert("conv_rate".into(), ratio(None));
        properties.insert("currency_code".into(), text());
        properties.insert("schema_version".into(), count());

        Self {
            required: [
                "data_source",
                "date",
                "campaign_id",
                "impressions",
                "clicks",
                "cost",
                "conversions",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
            properties,
        }
    }

    /// Violations for one row, as messages
    fn check(&self, row: &Value) -> Vec<String> {
        let Some(object) = row.as_object() else {
            return vec!["row is not an object".to_string()];
        };

        let mut problems = Vec::new();
        for field in &self.required {
            if !object.contains_key(field) {
                problems.push(format!("'{field}' is a required property"));
            }
        }
        for (field, rule) in &self.properties {
            if let Some(value) = object.get(field) {
                if let Some(problem) = rule.check(field, value) {
                    problems.push(problem);
                }
            }
        }
        problems
    }
}

impl FieldRule {
    fn check(&self, field: &str, value: &Value) -> Option<String> {
        if let Some(kind) = &self.kind {
            if !kind.matches(value) {
                return Some(format!("'{field}': {value} has the wrong type"));
            }
        }
        if let Some(allowed) = &self.allowed {
            if !allowed.contains(value) {
                return Some(format!("'{field}': {value} is not one of the allowed values"));
            }
        }
        if self.format.as_deref() == Some("date") {
            if let Some(s) = value.as_str() {
                if parse_date(s).is_err() {
                    return Some(format!("'{field}': '{s}' is not a valid date"));
                }
            }
        }
        if let Some(n) = value.as_f64() {
            if let Some(min) = self.minimum {
                if n < min {
                    return Some(format!("'{field}': {n} is less than the minimum of {min}"));
                }
            }
            if let Some(max) = self.maximum {
                if n > max {
                    return Some(format!("'{field}': {n} is greater than the maximum of {max}"));
                }
            }
        }
        None
    }
}

// ============================================================================
// Sampled validation
// ============================================================================

/// Validate the first `sample_size` rows against `schema`
///
/// Collection stops after `max_errors` violations, with a trailing note.
pub fn validate<R: Serialize>(
    rows: &[R],
    schema: &DatasetSchema,
    sample_size: usize,
    max_errors: usize,
) -> ValidationReport {
    let sample = &rows[..rows.len().min(sample_size)];
    let mut errors = Vec::new();

    'rows: for (index, row) in sample.iter().enumerate() {
        let problems = match serde_json::to_value(row) {
            Ok(value) => schema.check(&value),
            Err(e) => vec![format!("cannot serialize row: {e}")],
        };
        for problem in problems {
            errors.push(format!("Row {index}: {problem}"));
            if errors.len() >= max_errors {
                errors.push(format!(
                    "... and potentially more errors (checked {} rows)",
                    sample.len()
                ));
                break 'rows;
            }
        }
    }

    let report = ValidationReport {
        ok: errors.is_empty(),
        rows_checked: sample.len(),
        errors,
    };
    if report.ok {
        debug!(rows_checked = report.rows_checked, "schema validation passed");
    } else {
        for error in &report.errors {
            warn!(%error, "schema violation");
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use adsync_core::domain::{CampaignRow, DataSource, DatasetRecord};
    use chrono::NaiveDate;

    fn row(impressions: u64, clicks: u64) -> CampaignRow {
        let mut row = CampaignRow::new(
            DataSource::GoogleAds,
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            "111",
            impressions,
            clicks,
            5.0,
            1.0,
        );
        row.enrich("USD", 1);
        row.recompute_derived();
        row
    }

    #[test]
    fn test_valid_rows_pass() {
        let rows = vec![row(100, 10), row(0, 0)];
        let report = validate(&rows, &DatasetSchema::campaign_v1(), 100, 10);
        assert!(report.ok, "{:?}", report.errors);
        assert_eq!(report.rows_checked, 2);
    }

    #[test]
    fn test_range_violation_reported_with_row_index() {
        // More clicks than impressions pushes ctr above 1
        let rows = vec![row(100, 10), row(10, 20)];
        let report = validate(&rows, &DatasetSchema::campaign_v1(), 100, 10);
        assert!(!report.ok);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("Row 1: 'ctr'"), "{}", report.errors[0]);
    }

    #[test]
    fn test_only_sample_is_checked() {
        let mut rows = vec![row(100, 10); 5];
        rows.push(row(10, 20));
        let report = validate(&rows, &DatasetSchema::campaign_v1(), 5, 10);
        assert!(report.ok);
        assert_eq!(report.rows_checked, 5);
    }

    #[test]
    fn test_error_collection_is_capped() {
        let rows = vec![row(10, 20); 20];
        let report = validate(&rows, &DatasetSchema::campaign_v1(), 100, 3);
        assert_eq!(report.errors.len(), 4);
        assert!(report.errors[3].starts_with("... and potentially more errors"));
    }

    #[test]
    fn test_schema_from_json_document() {
        let schema = DatasetSchema::from_json(
            r#"{
                "type": "object",
                "required": ["date", "region"],
                "properties": {
                    "date": { "type": "string", "format": "date" },
                    "clicks": { "type": "integer", "maximum": 5 }
                }
            }"#,
        )
        .unwrap();

        let report = validate(&[row(100, 10)], &schema, 100, 10);
        assert_eq!(
            report.errors,
            vec![
                "Row 0: 'region' is a required property".to_string(),
                "Row 0: 'clicks': 10 is greater than the maximum of 5".to_string(),
            ]
        );
    }

    #[test]
    fn test_invalid_date_and_enum() {
        let schema = DatasetSchema::campaign_v1();
        let value = serde_json::json!({
            "data_source": "bing",
            "date": "2025-02-30",
            "campaign_id": "1",
            "impressions": 1,
            "clicks": 0,
            "cost": 0.0,
            "conversions": 0.0
        });
        let problems = schema.check(&value);
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().any(|p| p.contains("not one of the allowed values")));
        assert!(problems.iter().any(|p| p.contains("not a valid date")));
    }

    #[tokio::test]
    async fn test_missing_schema_file_falls_back_to_builtin() {
        let dir = tempfile::TempDir::new().unwrap();
        let schema = DatasetSchema::load_or_builtin(&dir.path().join("none.schema.json"))
            .await
            .unwrap();
        assert_eq!(schema, DatasetSchema::campaign_v1());
    }
}
