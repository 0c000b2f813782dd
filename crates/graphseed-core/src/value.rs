use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use uuid::Uuid;

/// Populated property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Association with a persisted row.
    Ref(ObjectRef),
    /// Embedded value of an unmanaged type.
    Object(Box<Record>),
    /// Insertion-ordered set; see [`Value::insert_unique`].
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_ref_value(&self) -> Option<&ObjectRef> {
        match self {
            Value::Ref(reference) => Some(reference),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(i64::from(*value)),
            Value::Long(value) => Some(*value),
            _ => None,
        }
    }

    /// Push into a set value, ignoring duplicates. Non-set values are
    /// replaced by a one-element set.
    pub fn insert_unique(&mut self, item: Value) {
        match self {
            Value::Set(items) => {
                if !items.contains(&item) {
                    items.push(item);
                }
            }
            other => *other = Value::Set(vec![item]),
        }
    }

    /// Stable text key used to index identifiers.
    pub fn key(&self) -> String {
        match self {
            Value::Null => "<null>".to_string(),
            Value::Bool(value) => value.to_string(),
            Value::Int(value) => value.to_string(),
            Value::Long(value) => value.to_string(),
            Value::Float(value) => value.to_string(),
            Value::Text(value) => value.clone(),
            Value::Uuid(value) => value.to_string(),
            Value::Date(value) => value.format("%Y-%m-%d").to_string(),
            Value::DateTime(value) => value.format("%Y-%m-%dT%H:%M:%S").to_string(),
            Value::Ref(reference) => format!("{}#{}", reference.type_name, reference.id.key()),
            Value::Object(record) => record.to_string(),
            Value::Set(items) => {
                let keys: Vec<String> = items.iter().map(Value::key).collect();
                format!("[{}]", keys.join(","))
            }
            Value::Map(pairs) => {
                let keys: Vec<String> = pairs
                    .iter()
                    .map(|(key, value)| format!("{}={}", key.key(), value.key()))
                    .collect();
                format!("{{{}}}", keys.join(","))
            }
        }
    }

    /// Render the value for a CSV cell.
    pub fn to_csv(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Ref(reference) => reference.id.key(),
            other => other.key(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Identity of a persisted row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectRef {
    pub type_name: String,
    pub id: Box<Value>,
}

impl ObjectRef {
    pub fn new(type_name: impl Into<String>, id: Value) -> Self {
        Self {
            type_name: type_name.into(),
            id: Box::new(id),
        }
    }
}

/// Instance of a target type under construction or loaded from a store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    type_name: String,
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.fields.get(property)
    }

    pub fn get_mut(&mut self, property: &str) -> Option<&mut Value> {
        self.fields.get_mut(property)
    }

    /// Assign a property. `Null` clears it.
    pub fn set(&mut self, property: impl Into<String>, value: Value) {
        let property = property.into();
        if value.is_null() {
            self.fields.remove(&property);
        } else {
            self.fields.insert(property, value);
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether every criterion matches this record. Set criteria match when
    /// the property equals any of their items.
    pub fn matches(&self, criteria: &Criteria) -> bool {
        criteria.iter().all(|(property, expected)| {
            let actual = self.get(property).unwrap_or(&Value::Null);
            match expected {
                Value::Set(items) if !matches!(actual, Value::Set(_)) => items.contains(actual),
                expected => actual == expected,
            }
        })
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.type_name)?;
        for (idx, (name, value)) in self.fields.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str("}")
    }
}

/// Property-to-value criteria for store lookups.
pub type Criteria = BTreeMap<String, Value>;

/// Render criteria for diagnostics, e.g. `{code=DE}`.
pub fn describe_criteria(criteria: &Criteria) -> String {
    let parts: Vec<String> = criteria
        .iter()
        .map(|(property, value)| format!("{property}={value}"))
        .collect();
    format!("{{{}}}", parts.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_null_clears_property() {
        let mut record = Record::new("City");
        record.set("name", Value::Text("Berlin".to_string()));
        record.set("name", Value::Null);
        assert!(record.get("name").is_none());
        assert!(record.is_empty());
    }

    #[test]
    fn insert_unique_skips_duplicates() {
        let mut set = Value::Set(Vec::new());
        set.insert_unique(Value::Int(1));
        set.insert_unique(Value::Int(1));
        set.insert_unique(Value::Int(2));
        assert_eq!(set, Value::Set(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn matches_treats_set_criteria_as_membership() {
        let mut record = Record::new("Country");
        record.set("code", Value::Text("DE".to_string()));

        let mut criteria = Criteria::new();
        criteria.insert(
            "code".to_string(),
            Value::Set(vec![
                Value::Text("AT".to_string()),
                Value::Text("DE".to_string()),
            ]),
        );
        assert!(record.matches(&criteria));

        criteria.insert("code".to_string(), Value::Text("FR".to_string()));
        assert!(!record.matches(&criteria));
    }

    #[test]
    fn describes_criteria_in_key_order() {
        let mut criteria = Criteria::new();
        criteria.insert("region".to_string(), Value::Text("EU".to_string()));
        criteria.insert("code".to_string(), Value::Text("DE".to_string()));
        assert_eq!(describe_criteria(&criteria), "{code=DE,region=EU}");
    }
}
