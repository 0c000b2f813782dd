use std::path::Path;

use chrono::format::{Item, StrftimeItems};
use graphseed_core::{PropertyKind, TypeDef, TypeModel, build_dependency_report};
use jsonschema::JSONSchema;
use serde_json::Value;

use crate::errors::{PlanError, ValidationIssue, ValidationReport};
use crate::model::{ImportPlan, LookupRule, PlanFormat, PropertyRule, RuleSet, plan_format};

/// Validated plan with accumulated warnings.
#[derive(Debug, Clone)]
pub struct ValidatedPlan {
    pub plan: ImportPlan,
    pub warnings: Vec<ValidationIssue>,
}

/// Read a plan file as a JSON value; TOML plans are converted.
pub fn load_plan_value(path: &Path) -> Result<Value, PlanError> {
    let contents = std::fs::read_to_string(path)?;
    let value = match plan_format(path)? {
        PlanFormat::Json => serde_json::from_str(&contents)?,
        PlanFormat::Toml => toml::from_str(&contents)?,
    };
    Ok(value)
}

/// Validate a plan JSON document against the plan JSON Schema.
pub fn validate_plan_json(
    plan_json: &Value,
    plan_schema: &Value,
) -> Result<ValidationReport, PlanError> {
    let compiled =
        JSONSchema::compile(plan_schema).map_err(|err| PlanError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();

    if let Err(errors) = compiled.validate(plan_json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push(ValidationIssue::error(
                "schema_violation",
                path,
                error.to_string(),
            ));
        }
    }

    Ok(report)
}

/// Validate a parsed plan against the type model.
pub fn validate_plan_against_model(plan: &ImportPlan, model: &TypeModel) -> ValidationReport {
    let mut report = ValidationReport::default();

    validate_formats(plan, &mut report);
    validate_dependencies(plan, model, &mut report);

    for (type_name, type_plan) in &plan.types {
        let path = format!("/types/{type_name}");
        let Some(type_def) = model.type_def(type_name) else {
            report.push(
                ValidationIssue::error(
                    "unknown_type",
                    path,
                    format!("type '{type_name}' is not declared in the model"),
                )
                .with_hint("add the type to model.json or remove it from the plan"),
            );
            continue;
        };

        if !type_def.managed && !type_plan.depends_on.is_empty() {
            report.push(ValidationIssue::warning(
                "unmanaged_dependencies",
                format!("{path}/depends_on"),
                format!("type '{type_name}' is not managed; its dependencies are never generated"),
            ));
        }

        validate_rules(
            &type_plan.properties,
            type_def,
            model,
            &format!("{path}/properties"),
            &mut report,
        );
    }

    report
}

/// Validate the plan end-to-end, returning structured issues on failure.
pub fn validate_plan(
    plan_json: &Value,
    plan_schema: &Value,
    model: &TypeModel,
) -> Result<ValidatedPlan, ValidationReport> {
    let structural = match validate_plan_json(plan_json, plan_schema) {
        Ok(report) => report,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push(ValidationIssue::error(
                "schema_validation_error",
                "/",
                err.to_string(),
            ));
            return Err(report);
        }
    };

    if !structural.is_ok() {
        return Err(structural);
    }

    let plan: ImportPlan = match serde_json::from_value(plan_json.clone()) {
        Ok(plan) => plan,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push(ValidationIssue::error(
                "invalid_plan_json",
                "/",
                err.to_string(),
            ));
            return Err(report);
        }
    };

    let model_report = validate_plan_against_model(&plan, model);
    if !model_report.is_ok() {
        return Err(model_report);
    }

    Ok(ValidatedPlan {
        plan,
        warnings: model_report.warnings,
    })
}

fn validate_formats(plan: &ImportPlan, report: &mut ValidationReport) {
    for (field, format) in [
        ("date_format", &plan.date_format),
        ("date_time_format", &plan.date_time_format),
    ] {
        if format.is_empty() || StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            report.push(
                ValidationIssue::error(
                    "invalid_format",
                    format!("/{field}"),
                    format!("'{format}' is not a valid chrono format string"),
                )
                .with_hint("use strftime specifiers such as %d.%m.%Y"),
            );
        }
    }

    if plan.flush_interval == Some(0) {
        report.push(ValidationIssue::error(
            "flush_interval_zero",
            "/flush_interval",
            "flush_interval must be greater than zero",
        ));
    }
}

fn validate_dependencies(plan: &ImportPlan, model: &TypeModel, report: &mut ValidationReport) {
    for (type_name, type_plan) in &plan.types {
        for (idx, dependency) in type_plan.depends_on.iter().enumerate() {
            let path = format!("/types/{type_name}/depends_on/{idx}");
            if dependency == type_name {
                report.push(ValidationIssue::error(
                    "self_dependency",
                    path,
                    format!("type '{type_name}' depends on itself"),
                ));
            } else if !model.contains(dependency) {
                report.push(ValidationIssue::error(
                    "unknown_dependency",
                    path,
                    format!("dependency '{dependency}' is not declared in the model"),
                ));
            }
        }
    }

    let dependency_report = build_dependency_report(&plan.dependency_map());
    if let Some(cycle) = dependency_report.cycle {
        report.push(
            ValidationIssue::error(
                "dependency_cycle",
                "/types",
                format!("dependency cycle between: {}", cycle.join(", ")),
            )
            .with_hint("remove one of the depends_on entries"),
        );
    }
}

fn validate_rules(
    rules: &RuleSet,
    type_def: &TypeDef,
    model: &TypeModel,
    base_path: &str,
    report: &mut ValidationReport,
) {
    for (property_name, rule) in rules {
        let path = format!("{base_path}/{property_name}");
        let Some(property) = type_def.property(property_name) else {
            report.push(ValidationIssue::error(
                "unknown_property",
                path,
                format!(
                    "type '{}' has no property '{property_name}'",
                    type_def.name
                ),
            ));
            continue;
        };

        match rule {
            PropertyRule::Expression => {}
            PropertyRule::Plain { properties } => {
                if properties.is_empty() {
                    continue;
                }
                match nested_type(&property.kind).and_then(|name| model.type_def(name)) {
                    Some(nested) => validate_rules(
                        properties,
                        nested,
                        model,
                        &format!("{path}/properties"),
                        report,
                    ),
                    None => report.push(ValidationIssue::error(
                        "nested_rules_on_scalar",
                        path,
                        format!(
                            "property '{property_name}' is {} and takes no nested rules",
                            property.kind.describe()
                        ),
                    )),
                }
            }
            PropertyRule::Lookup(lookup) => {
                if lookup.fetch.is_none() {
                    let target = match &property.kind {
                        PropertyKind::Set(element) => element.referenced_type(),
                        other => other.referenced_type(),
                    };
                    if target != Some(lookup.from.as_str()) {
                        report.push(ValidationIssue::warning(
                            "lookup_target_mismatch",
                            path.clone(),
                            format!(
                                "lookup on '{}' assigns to {}",
                                lookup.from,
                                property.kind.describe()
                            ),
                        ));
                    }
                }
                validate_lookup(lookup, model, &path, report);
            }
        }
    }
}

fn validate_lookup(
    lookup: &LookupRule,
    model: &TypeModel,
    path: &str,
    report: &mut ValidationReport,
) {
    let Some(from) = model.type_def(&lookup.from) else {
        report.push(ValidationIssue::error(
            "unknown_lookup_type",
            format!("{path}/from"),
            format!("lookup type '{}' is not declared in the model", lookup.from),
        ));
        return;
    };

    if !from.managed {
        report.push(ValidationIssue::error(
            "unmanaged_lookup_type",
            format!("{path}/from"),
            format!("lookup type '{}' is not persisted by the store", lookup.from),
        ));
    }

    if lookup.by.is_empty() {
        report.push(
            ValidationIssue::error(
                "lookup_keys_empty",
                format!("{path}/by"),
                "lookup requires at least one key",
            )
            .with_hint("add a key such as { \"property\": \"code\" }"),
        );
    }

    for (idx, key) in lookup.by.iter().enumerate() {
        let key_path = format!("{path}/by/{idx}");
        let Some(property) = from.property(&key.property) else {
            report.push(ValidationIssue::error(
                "unknown_lookup_property",
                key_path,
                format!("type '{}' has no property '{}'", from.name, key.property),
            ));
            continue;
        };

        if let Some(nested) = &key.lookup {
            validate_lookup(nested, model, &format!("{key_path}/lookup"), report);
        } else if key.composite {
            let embedded = property
                .kind
                .referenced_type()
                .and_then(|name| model.type_def(name))
                .filter(|type_def| !type_def.managed);
            match embedded {
                Some(embedded) => validate_rules(
                    &key.properties,
                    embedded,
                    model,
                    &format!("{key_path}/properties"),
                    report,
                ),
                None => report.push(ValidationIssue::error(
                    "composite_key_not_embedded",
                    key_path,
                    format!(
                        "composite key '{}' must reference an unmanaged type",
                        key.property
                    ),
                )),
            }
        } else if matches!(
            property.kind,
            PropertyKind::Set(_) | PropertyKind::Map { .. }
        ) {
            report.push(ValidationIssue::error(
                "lookup_key_not_scalar",
                key_path,
                format!(
                    "key '{}' is {} and cannot be matched from text",
                    key.property,
                    property.kind.describe()
                ),
            ));
        }
    }
}

fn nested_type(kind: &PropertyKind) -> Option<&str> {
    match kind {
        PropertyKind::Reference(name) => Some(name.as_str()),
        PropertyKind::Set(element) => nested_type(element),
        PropertyKind::Map { value, .. } => nested_type(value),
        PropertyKind::Scalar(_) => None,
    }
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> TypeModel {
        TypeModel::from_json_str(
            r#"{
              "types": [
                {
                  "name": "Country",
                  "identifier": { "property": "id", "kind": "long" },
                  "properties": [ { "name": "code", "kind": { "scalar": "text" } } ]
                },
                {
                  "name": "City",
                  "identifier": { "property": "id", "kind": "long" },
                  "properties": [
                    { "name": "name", "kind": { "scalar": "text" } },
                    { "name": "country", "kind": { "reference": "Country" } }
                  ]
                }
              ]
            }"#,
        )
        .expect("model")
    }

    #[test]
    fn reports_unknown_properties_and_lookup_keys() {
        let plan = ImportPlan::from_json_str(
            r#"{
              "types": {
                "City": {
                  "depends_on": ["Country"],
                  "properties": {
                    "mayor": { "rule": "expression" },
                    "country": { "rule": "lookup", "from": "Country", "by": [ { "property": "iso" } ] }
                  }
                }
              }
            }"#,
        )
        .expect("plan");

        let report = validate_plan_against_model(&plan, &model());
        let codes = report.codes();
        assert!(codes.contains(&"unknown_property"));
        assert!(codes.contains(&"unknown_lookup_property"));
    }

    #[test]
    fn reports_dependency_cycles() {
        let plan = ImportPlan::from_json_str(
            r#"{ "types": {
                "City": { "depends_on": ["Country"] },
                "Country": { "depends_on": ["City"] }
            } }"#,
        )
        .expect("plan");

        let report = validate_plan_against_model(&plan, &model());
        assert_eq!(report.codes(), vec!["dependency_cycle"]);
    }

    #[test]
    fn rejects_invalid_formats() {
        let plan = ImportPlan {
            date_format: "%Q".to_string(),
            flush_interval: Some(0),
            ..ImportPlan::default()
        };
        let report = validate_plan_against_model(&plan, &model());
        let codes = report.codes();
        assert!(codes.contains(&"invalid_format"));
        assert!(codes.contains(&"flush_interval_zero"));
    }
}
