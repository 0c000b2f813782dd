use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ParseError, Result};
use crate::validation::validate_model;
use crate::value::{ObjectRef, Record, Value};

/// Serialized form of the type model (`model.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ModelDocument {
    /// Target types in declaration order.
    pub types: Vec<TypeDef>,
}

/// Target type that records are materialized into.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TypeDef {
    pub name: String,
    /// Persisted independently by the store. Unmanaged types are plain values
    /// embedded into their owner.
    #[serde(default = "default_managed")]
    pub managed: bool,
    /// Identifier property of a managed type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<IdentifierDef>,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
}

fn default_managed() -> bool {
    true
}

/// Identifier declaration for a managed type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IdentifierDef {
    pub property: String,
    pub kind: ScalarKind,
}

/// Typed accessor for one property of a target type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PropertyDef {
    pub name: String,
    pub kind: PropertyKind,
}

/// Declared value kind of a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    /// Text-parseable value.
    Scalar(ScalarKind),
    /// To-one association with another type (managed or embedded).
    Reference(String),
    /// Multi-valued property.
    Set(Box<PropertyKind>),
    /// Keyed property; keys are scalars or managed references.
    Map {
        key: Box<PropertyKind>,
        value: Box<PropertyKind>,
    },
}

/// Primitive value kinds parsed straight from record text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Text,
    Int,
    Long,
    Float,
    Bool,
    Date,
    DateTime,
    Uuid,
}

impl ScalarKind {
    /// Kinds usable as store identifiers.
    pub fn is_identifier_kind(self) -> bool {
        matches!(
            self,
            ScalarKind::Text | ScalarKind::Int | ScalarKind::Long | ScalarKind::Uuid
        )
    }

    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ScalarKind::Text, Value::Text(_))
                | (ScalarKind::Int, Value::Int(_))
                | (ScalarKind::Long, Value::Long(_))
                | (ScalarKind::Float, Value::Float(_))
                | (ScalarKind::Bool, Value::Bool(_))
                | (ScalarKind::Date, Value::Date(_))
                | (ScalarKind::DateTime, Value::DateTime(_))
                | (ScalarKind::Uuid, Value::Uuid(_))
        )
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Text => "text",
            ScalarKind::Int => "int",
            ScalarKind::Long => "long",
            ScalarKind::Float => "float",
            ScalarKind::Bool => "bool",
            ScalarKind::Date => "date",
            ScalarKind::DateTime => "date_time",
            ScalarKind::Uuid => "uuid",
        };
        f.write_str(name)
    }
}

impl PropertyKind {
    /// Whether `value` may be stored in a property of this kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (PropertyKind::Scalar(kind), value) => kind.accepts(value),
            (PropertyKind::Reference(target), Value::Ref(reference)) => {
                reference.type_name == *target
            }
            (PropertyKind::Reference(target), Value::Object(record)) => {
                record.type_name() == target.as_str()
            }
            (PropertyKind::Set(element), Value::Set(items)) => {
                items.iter().all(|item| element.accepts(item))
            }
            (PropertyKind::Map { key, value }, Value::Map(pairs)) => pairs
                .iter()
                .all(|(k, v)| key.accepts(k) && value.accepts(v)),
            _ => false,
        }
    }

    /// Referenced type name for reference kinds.
    pub fn referenced_type(&self) -> Option<&str> {
        match self {
            PropertyKind::Reference(name) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            PropertyKind::Scalar(kind) => kind.to_string(),
            PropertyKind::Reference(name) => format!("reference to {name}"),
            PropertyKind::Set(element) => format!("set of {}", element.describe()),
            PropertyKind::Map { key, value } => {
                format!("map of {} to {}", key.describe(), value.describe())
            }
        }
    }
}

impl PropertyDef {
    pub fn get<'r>(&self, record: &'r Record) -> Option<&'r Value> {
        record.get(&self.name)
    }

    /// Assign `value`, rejecting values that do not fit the declared kind.
    pub fn set(&self, record: &mut Record, value: Value) -> std::result::Result<(), ParseError> {
        if !self.kind.accepts(&value) {
            return Err(ParseError::UnexpectedShape {
                property: self.name.clone(),
                expected: "a value matching its declared kind",
            });
        }
        record.set(self.name.clone(), value);
        Ok(())
    }
}

impl TypeDef {
    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|property| property.name == name)
    }

    pub fn identifier_kind(&self) -> Option<ScalarKind> {
        self.identifier.as_ref().map(|identifier| identifier.kind)
    }
}

/// Validated type model, indexed by type name.
#[derive(Debug, Clone, Default)]
pub struct TypeModel {
    types: BTreeMap<String, TypeDef>,
    order: Vec<String>,
}

impl TypeModel {
    /// Validate a document and index its types.
    ///
    /// Identifier properties that are not declared explicitly are added as
    /// scalar properties of the identifier kind.
    pub fn from_document(document: ModelDocument) -> Result<Self> {
        validate_model(&document)?;

        let mut types = BTreeMap::new();
        let mut order = Vec::with_capacity(document.types.len());
        for mut type_def in document.types {
            if let Some(identifier) = type_def.identifier.clone() {
                if type_def.property(&identifier.property).is_none() {
                    type_def.properties.insert(
                        0,
                        PropertyDef {
                            name: identifier.property,
                            kind: PropertyKind::Scalar(identifier.kind),
                        },
                    );
                }
            }
            order.push(type_def.name.clone());
            types.insert(type_def.name.clone(), type_def);
        }

        Ok(Self { types, order })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: ModelDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Look up a type, failing with [`Error::UnknownType`].
    pub fn require(&self, name: &str) -> Result<&TypeDef> {
        self.type_def(name)
            .ok_or_else(|| Error::UnknownType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn is_managed(&self, name: &str) -> bool {
        self.type_def(name).is_some_and(|type_def| type_def.managed)
    }

    /// Types in declaration order.
    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.order.iter().filter_map(|name| self.types.get(name))
    }

    /// Identity of a persisted record, when its identifier is set.
    pub fn reference_of(&self, record: &Record) -> Option<ObjectRef> {
        let identifier = self.type_def(record.type_name())?.identifier.as_ref()?;
        let id = record.get(&identifier.property)?;
        if id.is_null() {
            return None;
        }
        Some(ObjectRef::new(record.type_name(), id.clone()))
    }
}
