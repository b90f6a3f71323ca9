use varia_ir::eval::bind_constraints;
use varia_ir::{parse_model, ConstraintKind, ModelError, ParseError, Value};

#[test]
fn test_parse_model_from_file() {
    let json_str = include_str!("fixtures/server_matrix.json");
    let model = parse_model(json_str).unwrap();
    assert_eq!(model.parameters.len(), 4);
    assert_eq!(model.constraints.len(), 3);
    assert_eq!(model.default_tag, Some(Value::Str("positive".into())));
    assert_eq!(model.exhaustive_count(), 3 * 3 * 3 * 2);

    let memory = model.parameter("Memory").unwrap();
    assert_eq!(memory.get_at(0).unwrap().weight, 1.0);
    assert_eq!(memory.get_at(1).unwrap().weight, 3.0);
    assert_eq!(memory.get_at(1).unwrap().value, Value::Int(4096));

    let browser = model.parameter("Browser").unwrap();
    assert_eq!(
        browser.get_at(2).unwrap().tag,
        Some(Value::Str("negative".into()))
    );
    assert!(browser.has_distinguishing_tags(model.default_tag.as_ref()));

    assert_eq!(model.constraints[0].name.as_deref(), Some("ie_only_on_windows"));
    assert!(matches!(model.constraints[1].kind, ConstraintKind::Predicate { .. }));
    assert!(matches!(model.constraints[2].kind, ConstraintKind::IfThenElse { .. }));
}

#[test]
fn test_bound_constraints_from_file() {
    let model = parse_model(include_str!("fixtures/server_matrix.json")).unwrap();
    let bound = bind_constraints(&model).unwrap();
    assert_eq!(bound[0].parameters, vec![0, 2]);
    assert_eq!(bound[1].parameters, vec![1, 3]);
    assert_eq!(bound[2].parameters, vec![0, 2]);
    assert_eq!(bound[1].label, "#1");
}

#[test]
fn test_parse_invalid_json() {
    let result = parse_model("not json at all");
    assert!(matches!(result, Err(ParseError::Json(_))));
}

#[test]
fn test_parse_rejects_unknown_constraint_parameter() {
    let json = r#"{
        "parameters": [ { "name": "A", "values": [0, 1] } ],
        "constraints": [
            { "type": "predicate", "condition": { "compare": { "parameter": "B", "op": "eq", "value": 0 } } }
        ]
    }"#;
    match parse_model(json) {
        Err(ParseError::Model(ModelError::UnknownParameter { parameter, .. })) => {
            assert_eq!(parameter, "B");
        }
        other => panic!("expected unknown parameter error, got {other:?}"),
    }
}

#[test]
fn test_parse_minimal_model() {
    let json = r#"{ "parameters": [ { "name": "Flag", "values": [true, false] } ] }"#;
    let model = parse_model(json).unwrap();
    assert!(model.constraints.is_empty());
    assert!(model.default_tag.is_none());
    assert_eq!(model.parameters[0].count(), 2);
}
