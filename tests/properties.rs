use proptest::prelude::*;
use serde_json::{Value, json};
use tagplan::{EnumValue, Plan, SumTypeDecl, assemble, decode, encode};

fn plan(tagging: Value) -> Plan {
    let decl = SumTypeDecl::from_json_value(json!({
        "name": "Shape",
        "tagging": tagging,
        "cases": [
            { "name": "circle", "fields": [{ "name": "radius", "type": "Double" }] },
            { "name": "rect", "fields": [
                { "name": "width", "type": "Double" },
                { "name": "height", "type": "Double" },
                { "name": "label", "type": "String?" }
            ] },
            { "name": "tags", "fields": [{ "name": "names", "type": "[String]" }] },
            { "name": "dot" }
        ]
    }))
    .unwrap();
    assemble(&decl).into_result("Shape").unwrap()
}

fn arb_shape() -> impl Strategy<Value = EnumValue> {
    let finite = -1.0e6f64..1.0e6;
    prop_oneof![
        finite.clone().prop_map(|r| EnumValue::new("circle").with("radius", r)),
        (finite.clone(), finite, proptest::option::of("[a-z ]{0,12}")).prop_map(|(w, h, label)| {
            EnumValue::new("rect").with("width", w).with("height", h).with("label", label.map_or(Value::Null, Value::from))
        }),
        proptest::collection::vec("[a-z]{1,6}", 0..4).prop_map(|names| EnumValue::new("tags").with("names", names)),
        Just(EnumValue::new("dot")),
    ]
}

/// Keys a value is expected to occupy on the wire.
fn present_keys(value: &EnumValue) -> Vec<String> {
    let mut keys: Vec<String> = value.fields.iter().filter(|(_, v)| !v.is_null()).map(|(k, _)| k.clone()).collect();
    keys.sort();
    keys
}

fn sorted_keys(value: &Value) -> Vec<String> {
    let mut keys: Vec<String> = value.as_object().map(|m| m.keys().cloned().collect()).unwrap_or_default();
    keys.sort();
    keys
}

proptest! {
    #[test]
    fn adjacent_round_trip_and_shape(value in arb_shape()) {
        let plan = plan(json!({ "style": "adjacent", "tag": ["type"], "content": ["payload"] }));
        let doc = encode(&plan, &value).unwrap();
        prop_assert_eq!(sorted_keys(&doc), ["payload", "type"]);
        prop_assert_eq!(&doc["type"], &json!(value.case));
        prop_assert_eq!(sorted_keys(&doc["payload"]), present_keys(&value));
        prop_assert_eq!(decode(&plan, &doc).unwrap(), value);
    }

    #[test]
    fn internal_round_trip_and_shape(value in arb_shape()) {
        let plan = plan(json!({ "style": "internal", "identifier": ["type"] }));
        let doc = encode(&plan, &value).unwrap();
        let mut expected = present_keys(&value);
        expected.push("type".to_string());
        expected.sort();
        prop_assert_eq!(sorted_keys(&doc), expected);
        prop_assert!(doc.as_object().unwrap().iter().all(|(k, v)| k == "type" || !v.is_object()));
        prop_assert_eq!(decode(&plan, &doc).unwrap(), value);
    }
}

#[test]
fn assembly_is_deterministic() {
    let tagging = json!({ "style": "internal", "identifier": ["meta", "type"] });
    let first = plan(tagging.clone());
    let second = plan(tagging);
    assert_eq!(first, second);
    assert_eq!(first.to_string(), second.to_string());
    let cases: Vec<_> = first.encode.arms.iter().map(|arm| arm.case.as_str()).collect();
    assert_eq!(cases, ["circle", "rect", "tags", "dot"]);
}
