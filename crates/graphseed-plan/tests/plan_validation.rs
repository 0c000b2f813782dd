use std::path::{Path, PathBuf};

use graphseed_core::TypeModel;
use graphseed_plan::{
    ImportPlan, SchemaProvider, load_plan_value, plan_json_schema, validate_plan,
    validate_plan_json,
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures/geo")
        .join(name)
}

fn plan_schema() -> serde_json::Value {
    serde_json::to_value(plan_json_schema()).expect("serialize plan schema")
}

#[test]
fn geo_plan_validates_against_model() {
    let model = TypeModel::from_path(&fixture("model.json")).expect("load model");
    let plan_json = load_plan_value(&fixture("plan.json")).expect("load plan");

    let structural = validate_plan_json(&plan_json, &plan_schema()).expect("compile schema");
    assert!(structural.is_ok(), "structural errors: {:?}", structural.errors);

    let validated =
        validate_plan(&plan_json, &plan_schema(), &model).expect("plan validation should pass");
    assert!(validated.warnings.is_empty(), "unexpected warnings");
    assert_eq!(validated.plan.dependencies("City"), ["Country".to_string()]);
}

#[test]
fn toml_plan_matches_json_plan() {
    let json_plan = ImportPlan::from_path(&fixture("plan.json")).expect("json plan");
    let toml_plan = ImportPlan::from_path(&fixture("plan.toml")).expect("toml plan");

    assert_eq!(
        serde_json::to_value(&json_plan).expect("json"),
        serde_json::to_value(&toml_plan).expect("json")
    );
}

#[test]
fn structural_validation_rejects_unknown_rule() {
    let plan_json = serde_json::json!({
        "types": {
            "City": { "properties": { "country": { "rule": "guess" } } }
        }
    });

    let report = validate_plan_json(&plan_json, &plan_schema()).expect("compile schema");
    assert!(!report.is_ok());
    assert!(report.codes().iter().all(|code| *code == "schema_violation"));
}

#[test]
fn semantic_validation_rejects_unknown_type() {
    let model = TypeModel::from_path(&fixture("model.json")).expect("load model");
    let plan_json = serde_json::json!({
        "types": { "Street": { "depends_on": ["City"] } }
    });

    let report = validate_plan(&plan_json, &plan_schema(), &model).expect_err("unknown type");
    assert_eq!(report.codes(), vec!["unknown_type"]);
    assert_eq!(report.errors[0].path, "/types/Street");
}
