use graphseed_core::{ModelDocument, PropertyKind, ScalarKind, TypeModel, model_json_schema};

const MODEL: &str = r#"{
  "types": [
    {
      "name": "Country",
      "identifier": { "property": "code", "kind": "text" },
      "properties": [ { "name": "name", "kind": { "scalar": "text" } } ]
    },
    {
      "name": "City",
      "identifier": { "property": "id", "kind": "long" },
      "properties": [
        { "name": "name", "kind": { "scalar": "text" } },
        { "name": "country", "kind": { "reference": "Country" } },
        {
          "name": "population",
          "kind": { "map": { "key": { "scalar": "int" }, "value": { "scalar": "long" } } }
        }
      ]
    }
  ]
}"#;

#[test]
fn model_document_serializes_with_tagged_kinds() {
    let document: ModelDocument = serde_json::from_str(MODEL).expect("parse model");
    let json = serde_json::to_value(&document).expect("serialize model");

    let city = &json["types"][1];
    assert_eq!(city["managed"], serde_json::json!(true));
    assert_eq!(
        city["properties"][1]["kind"],
        serde_json::json!({ "reference": "Country" })
    );
    assert_eq!(
        city["properties"][2]["kind"]["map"]["key"],
        serde_json::json!({ "scalar": "int" })
    );
}

#[test]
fn type_model_keeps_declaration_order() {
    let model = TypeModel::from_json_str(MODEL).expect("model");
    let names: Vec<&str> = model.types().map(|type_def| type_def.name.as_str()).collect();
    assert_eq!(names, vec!["Country", "City"]);

    let country = model.require("Country").expect("country");
    assert_eq!(country.identifier_kind(), Some(ScalarKind::Text));
    assert_eq!(
        country.property("code").map(|property| &property.kind),
        Some(&PropertyKind::Scalar(ScalarKind::Text))
    );
    assert!(model.require("Street").is_err());
}

#[test]
fn model_json_schema_describes_types() {
    let schema = model_json_schema();
    let json = serde_json::to_value(&schema).expect("serialize schema");
    assert!(json["properties"]["types"].is_object());
    assert!(json["definitions"]["PropertyKind"].is_object());
    assert!(json["definitions"]["ScalarKind"].is_object());
}
