use std::collections::BTreeMap;
use std::path::Path;

use graphseed_core::scalar::{DEFAULT_DATE_FORMAT, DEFAULT_DATE_TIME_FORMAT};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::{PlanError, Result};

/// Property rules keyed by property name.
pub type RuleSet = BTreeMap<String, PropertyRule>;

/// Declarative import plan (`plan.json` / `plan.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ImportPlan {
    /// chrono format for date-only values.
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// chrono format for date-time values.
    #[serde(default = "default_date_time_format")]
    pub date_time_format: String,
    /// Saves between opportunistic store flushes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flush_interval: Option<usize>,
    /// Per-type configuration keyed by type name.
    #[serde(default)]
    pub types: BTreeMap<String, TypePlan>,
}

impl Default for ImportPlan {
    fn default() -> Self {
        Self {
            date_format: default_date_format(),
            date_time_format: default_date_time_format(),
            flush_interval: None,
            types: BTreeMap::new(),
        }
    }
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

fn default_date_time_format() -> String {
    DEFAULT_DATE_TIME_FORMAT.to_string()
}

/// Configuration of one target type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TypePlan {
    /// Types that must be fully generated before this one, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: RuleSet,
}

/// How one property is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum PropertyRule {
    /// Parse by declared kind; nested rules apply to nested instances.
    Plain {
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        properties: RuleSet,
    },
    /// The cell is an expression resolved after the owner is saved.
    Expression,
    /// Resolve the value by matching rows of another type.
    Lookup(LookupRule),
}

impl PropertyRule {
    /// Nested rules used when building nested instances.
    pub fn nested_rules(&self) -> Option<&RuleSet> {
        match self {
            PropertyRule::Plain { properties } => Some(properties),
            _ => None,
        }
    }
}

/// Association resolved against stored rows of `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LookupRule {
    /// Type whose rows are searched.
    pub from: String,
    /// Criteria properties of `from`, in order.
    pub by: Vec<LookupKey>,
    /// Dotted path followed on the matched row before assignment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch: Option<String>,
}

/// One criterion of a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LookupKey {
    /// Property of the searched type.
    pub property: String,
    /// The property is an embedded value matched as a whole.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub composite: bool,
    /// The criterion value is itself resolved by a lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup: Option<Box<LookupRule>>,
    /// Rules for building a composite criterion value.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: RuleSet,
}

impl LookupKey {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            composite: false,
            lookup: None,
            properties: RuleSet::new(),
        }
    }
}

impl ImportPlan {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Load a plan, choosing the format by file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        match plan_format(path)? {
            PlanFormat::Json => Self::from_json_str(&contents),
            PlanFormat::Toml => Self::from_toml_str(&contents),
        }
    }

    pub fn type_plan(&self, type_name: &str) -> Option<&TypePlan> {
        self.types.get(type_name)
    }

    /// `type -> depends_on` for every configured type.
    pub fn dependency_map(&self) -> BTreeMap<String, Vec<String>> {
        self.types
            .iter()
            .map(|(name, type_plan)| (name.clone(), type_plan.depends_on.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlanFormat {
    Json,
    Toml,
}

pub(crate) fn plan_format(path: &Path) -> Result<PlanFormat> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(PlanFormat::Json),
        Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(PlanFormat::Toml),
        _ => Err(PlanError::Format(path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_plan() {
        let plan = ImportPlan::from_json_str("{}").expect("plan");
        assert_eq!(plan.date_format, "%d.%m.%Y");
        assert_eq!(plan.date_time_format, "%d.%m.%Y %H:%M:%S");
        assert!(plan.flush_interval.is_none());
        assert!(plan.types.is_empty());
    }

    #[test]
    fn parses_tagged_rules() {
        let plan = ImportPlan::from_json_str(
            r#"{
              "types": {
                "City": {
                  "depends_on": ["Country"],
                  "properties": {
                    "country": { "rule": "lookup", "from": "Country", "by": [ { "property": "code" } ] },
                    "self_ref": { "rule": "expression" },
                    "address": { "rule": "plain", "properties": { "street": { "rule": "plain" } } }
                  }
                }
              }
            }"#,
        )
        .expect("plan");

        let city = plan.type_plan("City").expect("city");
        assert_eq!(city.depends_on, vec!["Country".to_string()]);
        assert_eq!(
            city.properties.get("country"),
            Some(&PropertyRule::Lookup(LookupRule {
                from: "Country".to_string(),
                by: vec![LookupKey::new("code")],
                fetch: None,
            }))
        );
        assert_eq!(
            city.properties.get("self_ref"),
            Some(&PropertyRule::Expression)
        );
        let nested = city
            .properties
            .get("address")
            .and_then(PropertyRule::nested_rules)
            .expect("nested rules");
        assert!(nested.contains_key("street"));
    }

    #[test]
    fn parses_toml_plan() {
        let plan = ImportPlan::from_toml_str(
            r#"
date_format = "%Y-%m-%d"
flush_interval = 5

[types.City]
depends_on = ["Country"]

[types.City.properties.country]
rule = "lookup"
from = "Country"
by = [{ property = "code" }]
"#,
        )
        .expect("toml plan");

        assert_eq!(plan.date_format, "%Y-%m-%d");
        assert_eq!(plan.flush_interval, Some(5));
        assert!(matches!(
            plan.type_plan("City").and_then(|city| city.properties.get("country")),
            Some(PropertyRule::Lookup(_))
        ));
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = plan_format(Path::new("plan.yaml")).expect_err("yaml unsupported");
        assert!(matches!(err, PlanError::Format(_)));
    }
}
