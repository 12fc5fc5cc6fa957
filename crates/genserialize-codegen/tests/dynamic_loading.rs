//! Loading the JSON plugin cdylib through the plugin ABI.

use genserialize_codegen::loader::plugin_file_name;
use genserialize_codegen::{FormatPlugin, JsonFormatPlugin, PluginLoader, PluginRegistry};
use genserialize_sast::{NodeMap, SastField, SastNode, SastType, SerializationPolicy, link};
use std::path::PathBuf;
use std::sync::Arc;

fn plugin_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/plugins")
}

#[test]
fn loaded_json_plugin_overrides_builtin() {
    let dir = plugin_dir();
    let library = dir.join(plugin_file_name("genserialize-plugin-json"));
    if !library.exists() {
        eprintln!("Skipping: run `cargo xtask build-plugins` first");
        return;
    }

    let mut registry = PluginRegistry::with_builtin();
    let mut loader = PluginLoader::new();
    loader
        .load_file(&library, &mut registry)
        .expect("plugin should load");
    assert_eq!(registry.priority_of("JSON"), Some(1));

    let point = Arc::new(
        SastNode::new("Point")
            .with_policy(SerializationPolicy::Pod)
            .with_field(SastField::new("x", SastType::Int).with_type_name("int")),
    );
    let node = Arc::new(
        SastNode::new("Track")
            .with_format("JSON")
            .with_field(SastField::new(
                "points",
                SastType::Vector {
                    element: Box::new(SastField::element(SastType::Pod, "Point")),
                },
            )),
    );
    let map: NodeMap = [("Point".to_string(), Arc::clone(&point))]
        .into_iter()
        .collect();
    link(std::slice::from_ref(&node), &map);

    // Dropping the loader must not unload the library under the plugin.
    let plugin = registry.get("JSON").unwrap();
    drop(loader);

    let loaded = plugin.generate_code(&node).unwrap();
    let builtin = JsonFormatPlugin::new().generate_code(&node).unwrap();
    assert_eq!(loaded, builtin);
    assert_eq!(plugin.required_includes(), JsonFormatPlugin::new().required_includes());
}
