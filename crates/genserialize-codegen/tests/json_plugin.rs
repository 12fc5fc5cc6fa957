//! Integration tests for the built-in JSON plugin.

use genserialize_codegen::{
    CodeGenerator, FormatPlugin, GenerateError, JsonFormatPlugin, PluginRegistry,
};
use genserialize_sast::{
    Access, BaseRef, SastField, SastNode, SastType, SerializationPolicy, link, NodeMap,
};
use std::sync::Arc;

fn generate(node: &SastNode) -> String {
    JsonFormatPlugin::new().generate_code(node).unwrap()
}

/// The four routines, in emission order.
fn routines(code: &str) -> Vec<&str> {
    code.split("\n\n").collect()
}

/// Panics unless every needle occurs in `haystack`, each after the previous one.
fn assert_in_order(haystack: &str, needles: &[&str]) {
    let mut from = 0;
    for needle in needles {
        match haystack[from..].find(needle) {
            Some(pos) => from += pos + needle.len(),
            None => panic!("`{needle}` not found in order in:\n{haystack}"),
        }
    }
}

fn element(ty: SastType, type_name: &str) -> Box<SastField> {
    Box::new(SastField::element(ty, type_name))
}

fn point() -> Arc<SastNode> {
    Arc::new(
        SastNode::new("Point")
            .with_policy(SerializationPolicy::Pod)
            .with_field(SastField::new("x", SastType::Float).with_type_name("float"))
            .with_field(SastField::new("y", SastType::Float).with_type_name("float")),
    )
}

fn pod_field(name: &str, pod: &Arc<SastNode>) -> SastField {
    SastField::new(name, SastType::Pod)
        .with_type_name(pod.name.clone())
        .with_object_node(Arc::clone(pod))
}

// === Snapshot ===

#[test]
fn simple_type() {
    let node = SastNode::new("TestType")
        .with_format("JSON")
        .with_field(SastField::new("value", SastType::Int).with_type_name("int"));
    let code = generate(&node);
    insta::assert_snapshot!("simple_type", code);
}

// === Containers ===

#[test]
fn vector_of_int_in_all_routines() {
    let node = SastNode::new("Numbers").with_field(SastField::new(
        "values",
        SastType::Vector {
            element: element(SastType::Int, "int"),
        },
    ));
    let code = generate(&node);
    let routines = routines(&code);
    assert_eq!(routines.len(), 4);

    for serialize in [routines[0], routines[2]] {
        assert_in_order(
            serialize,
            &[
                "JSONArray arr_0;",
                "for (const auto& item_0 : objSource.values)",
                "arr_0.AddItem(JSONNumber(static_cast<double>(item_0)));",
                ".AddMember(\"values\", arr_0);",
            ],
        );
    }
    for deserialize in [routines[1], routines[3]] {
        assert_in_order(
            deserialize,
            &[
                ".GetMember(\"values\").as<JSONArray>();",
                "objReceiver.values.clear();",
                "for (const auto& item_0 : arr_0.GetItems())",
                "auto&& elem_0 = objReceiver.values.emplace_back();",
                "elem_0 = static_cast<int>(item_0.as<JSONNumber>().value);",
            ],
        );
    }
}

#[test]
fn nested_vectors_use_depth_suffixes() {
    let node = SastNode::new("Grid").with_field(SastField::new(
        "cells",
        SastType::Vector {
            element: element(
                SastType::Vector {
                    element: element(SastType::Int, "int"),
                },
                "std::vector<int>",
            ),
        },
    ));
    let code = generate(&node);
    assert_in_order(
        &code,
        &[
            "for (const auto& item_0 : objSource.cells)",
            "JSONArray arr_1;",
            "for (const auto& item_1 : item_0)",
            "arr_1.AddItem(JSONNumber(static_cast<double>(item_1)));",
            "arr_0.AddItem(arr_1);",
        ],
    );
    assert_in_order(
        &code,
        &[
            "auto&& elem_0 = objReceiver.cells.emplace_back();",
            "const JSONArray& arr_1 = item_0.as<JSONArray>();",
            "elem_0.clear();",
            "auto&& elem_1 = elem_0.emplace_back();",
            "elem_1 = static_cast<int>(item_1.as<JSONNumber>().value);",
        ],
    );
}

#[test]
fn static_array_two_dimensions() {
    let node = SastNode::new("Matrix").with_field(SastField::new(
        "m",
        SastType::StaticArray {
            element: element(
                SastType::StaticArray {
                    element: element(SastType::Double, "double"),
                },
                "double[4]",
            ),
        },
    ));
    let code = generate(&node);
    assert!(code.contains(
        "for (std::size_t i_0 = 0; i_0 < sizeof(objSource.m) / sizeof(objSource.m[0]); ++i_0)"
    ));
    assert!(code.contains(
        "for (std::size_t i_1 = 0; i_1 < sizeof(objSource.m[i_0]) / sizeof(objSource.m[i_0][0]); ++i_1)"
    ));
    assert!(code.contains(
        "objReceiver.m[i_0][i_1] = static_cast<double>(arr_1.GetItems()[i_1].as<JSONNumber>().value);"
    ));
}

#[test]
fn dynamic_array_updates_length() {
    let node = SastNode::new("Samples")
        .with_field(SastField::new("sample_count", SastType::Int).with_type_name("int"))
        .with_field(SastField::new(
            "samples",
            SastType::DynamicArray {
                element: element(SastType::Double, "double"),
                length_var: "sample_count".to_string(),
            },
        ));
    let code = generate(&node);
    assert!(code.contains(
        "for (std::size_t i_0 = 0; i_0 < static_cast<std::size_t>(objSource.sample_count); ++i_0)"
    ));
    assert_in_order(
        &code,
        &[
            "delete[] objReceiver.samples;",
            "objReceiver.sample_count = static_cast<std::decay_t<decltype(objReceiver.sample_count)>>(arr_0.GetItems().size());",
            "objReceiver.samples = new std::remove_pointer_t<std::decay_t<decltype(objReceiver.samples)>>[arr_0.GetItems().size()];",
            "objReceiver.samples[i_0] = static_cast<double>(arr_0.GetItems()[i_0].as<JSONNumber>().value);",
        ],
    );
}

#[test]
fn set_inserts_temporary_elements() {
    let node = SastNode::new("Tags").with_field(SastField::new(
        "tags",
        SastType::UnorderedSet {
            element: element(SastType::String, "std::string"),
        },
    ));
    let code = generate(&node);
    assert_in_order(
        &code,
        &[
            "objReceiver.tags.clear();",
            "std::decay_t<decltype(objReceiver.tags)>::value_type elem_0{};",
            "elem_0 = item_0.as<JSONString>().value;",
            "objReceiver.tags.insert(std::move(elem_0));",
        ],
    );
}

// === Maps ===

#[test]
fn unordered_map_of_pod_values() {
    let point = point();
    let node = SastNode::new("Layout").with_field(SastField::new(
        "anchors",
        SastType::UnorderedMap {
            key: element(SastType::Int, "int"),
            value: Box::new(pod_field("", &point)),
        },
    ));
    let code = generate(&node);
    let routines = routines(&code);

    assert_in_order(
        routines[0],
        &[
            "JSONObject map_0;",
            "for (const auto& [key_0, value_0] : objSource.anchors)",
            "JSONObject obj_1;",
            "obj_1.AddMember(\"x\", JSONNumber(static_cast<double>(value_0.x)));",
            "obj_1.AddMember(\"y\", JSONNumber(static_cast<double>(value_0.y)));",
            "map_0.AddMember(std::to_string(key_0), obj_1);",
            "jsonReceiver.AddMember(\"anchors\", map_0);",
        ],
    );
    assert_in_order(
        routines[1],
        &[
            "const JSONObject& map_0 = jsonSource.GetMember(\"anchors\").as<JSONObject>();",
            "objReceiver.anchors.clear();",
            "for (const auto& [key_0, value_0] : map_0.GetMembers())",
            "std::decay_t<decltype(objReceiver.anchors)>::mapped_type elem_0{};",
            "const JSONObject& obj_1 = value_0.as<JSONObject>();",
            "elem_0.x = static_cast<float>(obj_1.GetMember(\"x\").as<JSONNumber>().value);",
            "elem_0.y = static_cast<float>(obj_1.GetMember(\"y\").as<JSONNumber>().value);",
            "objReceiver.anchors.emplace(static_cast<std::decay_t<decltype(objReceiver.anchors)>::key_type>(std::stoll(key_0)), std::move(elem_0));",
        ],
    );
}

#[test]
fn map_key_conversions() {
    let map = |name: &str, key: SastType| {
        SastField::new(
            name,
            SastType::Map {
                key: element(key, ""),
                value: element(SastType::Int, "int"),
            },
        )
    };
    let node = SastNode::new("Keys")
        .with_field(map("by_name", SastType::String))
        .with_field(map("by_weight", SastType::Double))
        .with_field(map("by_ratio", SastType::Float))
        .with_field(map("by_flag", SastType::Bool));
    let code = generate(&node);

    assert!(code.contains("map_0.AddMember(key_0, JSONNumber(static_cast<double>(value_0)));"));
    assert!(code.contains("objReceiver.by_name.emplace(key_0, std::move(elem_0));"));
    assert!(code.contains("map_0.AddMember(std::format(\"{}\", key_0), "));
    assert!(code.contains("objReceiver.by_weight.emplace(std::stod(key_0), std::move(elem_0));"));
    assert!(code.contains("objReceiver.by_ratio.emplace(std::stof(key_0), std::move(elem_0));"));
    assert!(code.contains("map_0.AddMember(std::string(key_0 ? \"true\" : \"false\"), "));
    assert!(code.contains("objReceiver.by_flag.emplace(key_0 == \"true\", std::move(elem_0));"));
}

// === Records ===

#[test]
fn object_fields_delegate() {
    let node = SastNode::new("Outer").with_field(
        SastField::new("inner", SastType::Object).with_type_name("Inner"),
    );
    let code = generate(&node);
    assert_in_order(
        &code,
        &[
            "JSONObject obj_0;",
            "JSONSerialize(obj_0, objSource.inner);",
            "jsonReceiver.AddMember(\"inner\", obj_0);",
            "JSONDeserialize(objReceiver.inner, jsonSource.GetMember(\"inner\").as<JSONObject>());",
        ],
    );
}

#[test]
fn pod_fields_are_inlined_with_dotted_names() {
    let point = point();
    let segment = Arc::new(
        SastNode::new("Segment")
            .with_policy(SerializationPolicy::Pod)
            .with_field(pod_field("start", &point))
            .with_field(pod_field("end", &point)),
    );
    let node = SastNode::new("Shape")
        .with_field(pod_field("origin", &point))
        .with_field(pod_field("edge", &segment));
    let code = generate(&node);

    assert!(!code.contains("JSONObject obj_"));
    assert_in_order(
        &code,
        &[
            "jsonReceiver.AddMember(\"origin.x\", JSONNumber(static_cast<double>(objSource.origin.x)));",
            "jsonReceiver.AddMember(\"origin.y\", JSONNumber(static_cast<double>(objSource.origin.y)));",
            "jsonReceiver.AddMember(\"edge.start.x\", JSONNumber(static_cast<double>(objSource.edge.start.x)));",
            "jsonReceiver.AddMember(\"edge.end.y\", JSONNumber(static_cast<double>(objSource.edge.end.y)));",
        ],
    );
    assert!(code.contains(
        "objReceiver.edge.end.x = static_cast<float>(jsonSource.GetMember(\"edge.end.x\").as<JSONNumber>().value);"
    ));
}

#[test]
fn inherited_fields_come_first_without_private() {
    let entity = Arc::new(
        SastNode::new("Entity")
            .with_format("JSON")
            .with_field(SastField::new("id", SastType::Int).with_type_name("int"))
            .with_field(
                SastField::new("secret", SastType::String).with_access(Access::Private),
            )
            .with_field(SastField::new("tag", SastType::String).with_access(Access::Protected)),
    );
    let player = Arc::new(
        SastNode::new("Player")
            .with_format("JSON")
            .with_base(BaseRef::new("Entity"))
            .with_field(SastField::new("score", SastType::Int).with_type_name("int")),
    );
    let map: NodeMap = [
        ("Entity".to_string(), Arc::clone(&entity)),
        ("Player".to_string(), Arc::clone(&player)),
    ]
    .into_iter()
    .collect();
    link(std::slice::from_ref(&player), &map);

    let code = generate(&player);
    assert!(!code.contains("secret"));
    for routine in routines(&code) {
        assert_in_order(routine, &["\"id\"", "\"tag\"", "\"score\""]);
    }
}

// === Errors ===

#[test]
fn recursive_pod_is_an_error() {
    let looped = Arc::new(
        SastNode::new("Loop")
            .with_policy(SerializationPolicy::Pod)
            .with_field(SastField::new("next", SastType::Pod).with_type_name("Loop")),
    );
    looped.fields[0].object_node.resolve(Arc::clone(&looped));
    let node = SastNode::new("Holder").with_field(pod_field("head", &looped));

    let err = JsonFormatPlugin::new().generate_code(&node).unwrap_err();
    assert!(matches!(err, GenerateError::RecursivePod(name) if name == "Loop"));
}

#[test]
fn unresolved_pod_is_an_error() {
    let node = SastNode::new("Holder")
        .with_field(SastField::new("origin", SastType::Pod).with_type_name("Missing"));
    let err = JsonFormatPlugin::new().generate_code(&node).unwrap_err();
    assert!(matches!(
        err,
        GenerateError::UnresolvedPod { field, type_name } if field == "origin" && type_name == "Missing"
    ));
}

#[test]
fn failing_type_does_not_block_others() {
    let registry = PluginRegistry::with_builtin();
    let nodes = vec![
        Arc::new(
            SastNode::new("Bad")
                .with_format("JSON")
                .with_field(SastField::new("p", SastType::Pod).with_type_name("Missing")),
        ),
        Arc::new(
            SastNode::new("Good")
                .with_format("JSON")
                .with_field(SastField::new("ok", SastType::Bool)),
        ),
    ];
    let code = CodeGenerator::new(&registry).generate(&nodes);
    assert_eq!(code.issues.len(), 1);
    assert!(code.code("Good", "JSON").is_some());
    assert!(code.code("Bad", "JSON").is_none());
    assert!(code.includes.contains("<JSONStructure.h>"));
}

// === Registry ===

#[test]
fn higher_priority_json_plugin_wins() {
    let mut registry = PluginRegistry::new();
    registry.register_plugin(Arc::new(JsonFormatPlugin::with_priority(0)));
    registry.register_plugin(Arc::new(JsonFormatPlugin::with_priority(1)));
    assert_eq!(registry.get("JSON").unwrap().priority(), 1);
    assert_eq!(registry.priority_of("JSON"), Some(1));
}
