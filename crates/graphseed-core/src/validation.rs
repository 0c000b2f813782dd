use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::model::{ModelDocument, PropertyKind, TypeDef};

/// Validate internal consistency of a type model document.
///
/// This checks:
/// - duplicate types/properties
/// - managed types declare an identifier of an identifier kind
/// - identifier properties are declared with the identifier kind
/// - referenced types exist and map keys are scalars or managed references
pub fn validate_model(document: &ModelDocument) -> Result<()> {
    let mut names = BTreeSet::new();
    for type_def in &document.types {
        if type_def.name.trim().is_empty() {
            return Err(Error::InvalidModel("type name must not be empty".to_string()));
        }
        if !names.insert(type_def.name.as_str()) {
            return Err(Error::InvalidModel(format!(
                "duplicate type name: {}",
                type_def.name
            )));
        }
    }

    for type_def in &document.types {
        validate_type(type_def, document)?;
    }

    Ok(())
}

fn validate_type(type_def: &TypeDef, document: &ModelDocument) -> Result<()> {
    let mut properties = BTreeSet::new();
    for property in &type_def.properties {
        if !properties.insert(property.name.as_str()) {
            return Err(Error::InvalidModel(format!(
                "duplicate property name: {}.{}",
                type_def.name, property.name
            )));
        }
        validate_kind(
            &property.kind,
            &format!("{}.{}", type_def.name, property.name),
            document,
        )?;
    }

    match (&type_def.identifier, type_def.managed) {
        (None, true) => {
            return Err(Error::InvalidModel(format!(
                "managed type {} has no identifier",
                type_def.name
            )));
        }
        (Some(identifier), _) => {
            if !identifier.kind.is_identifier_kind() {
                return Err(Error::InvalidModel(format!(
                    "identifier {}.{} must be text, int, long or uuid",
                    type_def.name, identifier.property
                )));
            }
            if let Some(declared) = type_def.property(&identifier.property) {
                if declared.kind != PropertyKind::Scalar(identifier.kind) {
                    return Err(Error::InvalidModel(format!(
                        "identifier {}.{} is declared as {}",
                        type_def.name,
                        identifier.property,
                        declared.kind.describe()
                    )));
                }
            }
        }
        (None, false) => {}
    }

    Ok(())
}

fn validate_kind(kind: &PropertyKind, path: &str, document: &ModelDocument) -> Result<()> {
    match kind {
        PropertyKind::Scalar(_) => Ok(()),
        PropertyKind::Reference(target) => {
            if find_type(document, target).is_none() {
                return Err(Error::InvalidModel(format!(
                    "{path} references missing type {target}"
                )));
            }
            Ok(())
        }
        PropertyKind::Set(element) => {
            if matches!(element.as_ref(), PropertyKind::Set(_) | PropertyKind::Map { .. }) {
                return Err(Error::InvalidModel(format!(
                    "{path} nests a collection inside a set"
                )));
            }
            validate_kind(element, path, document)
        }
        PropertyKind::Map { key, value } => {
            match key.as_ref() {
                PropertyKind::Scalar(_) => {}
                PropertyKind::Reference(target) => {
                    let managed = find_type(document, target).map(|type_def| type_def.managed);
                    if managed != Some(true) {
                        return Err(Error::InvalidModel(format!(
                            "{path} map key must reference a managed type, got {target}"
                        )));
                    }
                }
                other => {
                    return Err(Error::InvalidModel(format!(
                        "{path} map key cannot be a {}",
                        other.describe()
                    )));
                }
            }
            validate_kind(value, path, document)
        }
    }
}

fn find_type<'a>(document: &'a ModelDocument, name: &str) -> Option<&'a TypeDef> {
    document.types.iter().find(|type_def| type_def.name == name)
}
