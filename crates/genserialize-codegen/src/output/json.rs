//! JSON format plugin.
//!
//! Emits four C++ routines per type against the `JSONStructure.h` value
//! library:
//!
//! - `JSONSerialize(JSONObject&, const T&)` / `JSONDeserialize(T&, const JSONObject&)`
//!   fill or read an object value; nested records delegate to these.
//! - `JSONSerialize(std::ostream&, const T&)` / `JSONDeserialize(T&, std::istream&)`
//!   wrap the same field code around a `JSONStructure` document.
//!
//! POD fields are inlined under dotted names (`origin.x`), containers become
//! JSON arrays, and maps become JSON objects with stringified keys.

use crate::emit::{CodeWriter, c_string_literal, flatten_fields, scoped};
use crate::error::GenerateError;
use crate::traits::FormatPlugin;
use genserialize_sast::{SastField, SastNode, SastType};

/// Format name requested by annotated types.
pub const FORMAT_NAME: &str = "JSON";

/// Built-in JSON code generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatPlugin {
    priority: u8,
}

impl JsonFormatPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_priority(priority: u8) -> Self {
        Self { priority }
    }
}

impl FormatPlugin for JsonFormatPlugin {
    fn format_name(&self) -> &str {
        FORMAT_NAME
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn required_includes(&self) -> Vec<String> {
        ["<format>", "<istream>", "<ostream>", "<string>", "<type_traits>", "<JSONStructure.h>"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn generate_code(&self, node: &SastNode) -> Result<String, GenerateError> {
        if node.is_pod() {
            return Err(GenerateError::PodNode(node.name.clone()));
        }
        let fields = flatten_fields(node);
        let ty = &node.name;
        let mut e = Emitter::default();

        e.out.line(format!(
            "static void JSONSerialize(JSONObject& jsonReceiver, const {ty}& objSource)"
        ));
        e.out.open();
        e.serialize_fields(&fields, "objSource", "jsonReceiver")?;
        e.out.close();
        e.out.blank();

        e.out.line(format!(
            "static void JSONDeserialize({ty}& objReceiver, const JSONObject& jsonSource)"
        ));
        e.out.open();
        e.deserialize_fields(&fields, "objReceiver", "jsonSource")?;
        e.out.close();
        e.out.blank();

        e.out.line(format!(
            "static void JSONSerialize(std::ostream& osReceiver, const {ty}& objSource)"
        ));
        e.out.open();
        e.out.line("JSONStructure jsonRep;");
        e.serialize_fields(&fields, "objSource", "jsonRep")?;
        e.out.line("osReceiver << jsonRep.Stringify();");
        e.out.close();
        e.out.blank();

        e.out.line(format!(
            "static void JSONDeserialize({ty}& objReceiver, std::istream& isSource)"
        ));
        e.out.open();
        e.out.line("JSONStructure jsonRep = JSONStructure::Parse(isSource);");
        e.deserialize_fields(&fields, "objReceiver", "jsonRep")?;
        e.out.close();

        Ok(e.out.finish())
    }
}

/// Where a serialized value goes.
enum Sink<'a> {
    /// `object.AddMember(key, value)`; `key` is a C++ string expression.
    Member { object: &'a str, key: String },
    /// `array.AddItem(value)`.
    Item { array: &'a str },
}

impl Sink<'_> {
    fn store(&self, value: &str) -> String {
        match self {
            Sink::Member { object, key } => format!("{object}.AddMember({key}, {value});"),
            Sink::Item { array } => format!("{array}.AddItem({value});"),
        }
    }
}

#[derive(Default)]
struct Emitter<'n> {
    out: CodeWriter,
    /// POD types being inlined, outermost first.
    pods: Vec<&'n str>,
    /// Serialized name of the top-level field being emitted, for errors.
    current: String,
}

impl<'n> Emitter<'n> {
    fn serialize_fields(
        &mut self,
        fields: &[&'n SastField],
        object: &str,
        receiver: &str,
    ) -> Result<(), GenerateError> {
        for field in fields {
            self.current = field.serialized_name().to_string();
            self.serialize_field(field, object, receiver, "", 0)?;
        }
        Ok(())
    }

    fn deserialize_fields(
        &mut self,
        fields: &[&'n SastField],
        object: &str,
        source: &str,
    ) -> Result<(), GenerateError> {
        for field in fields {
            self.current = field.serialized_name().to_string();
            self.deserialize_field(field, object, source, "", 0)?;
        }
        Ok(())
    }

    /// Serialize a named member of `object` into the JSON object `receiver`.
    fn serialize_field(
        &mut self,
        field: &'n SastField,
        object: &str,
        receiver: &str,
        prefix: &str,
        depth: usize,
    ) -> Result<(), GenerateError> {
        let access = format!("{object}.{}", field.name);
        let key = dotted(prefix, field.serialized_name());

        if let SastType::Pod = field.ty {
            let pod_fields = self.enter_pod(field)?;
            for sub in pod_fields {
                self.serialize_field(sub, &access, receiver, &key, depth)?;
            }
            self.pods.pop();
            return Ok(());
        }

        let sink = Sink::Member {
            object: receiver,
            key: c_string_literal(&key),
        };
        self.serialize_value(field, &access, &sink, Some(object), depth)
    }

    fn serialize_value(
        &mut self,
        field: &'n SastField,
        access: &str,
        sink: &Sink<'_>,
        owner: Option<&str>,
        depth: usize,
    ) -> Result<(), GenerateError> {
        match &field.ty {
            SastType::Int | SastType::Float | SastType::Double => {
                self.out.line(sink.store(&format!(
                    "JSONNumber(static_cast<double>({access}))"
                )));
            }
            SastType::Bool => self.out.line(sink.store(&format!("JSONBool({access})"))),
            SastType::String => self.out.line(sink.store(&format!("JSONString({access})"))),
            SastType::Object => {
                let obj = scoped("obj", depth);
                self.out.open();
                self.out.line(format!("JSONObject {obj};"));
                self.out.line(format!("JSONSerialize({obj}, {access});"));
                self.out.line(sink.store(&obj));
                self.out.close();
            }
            SastType::Pod => {
                let obj = scoped("obj", depth);
                let pod_fields = self.enter_pod(field)?;
                self.out.open();
                self.out.line(format!("JSONObject {obj};"));
                for sub in pod_fields {
                    self.serialize_field(sub, access, &obj, "", depth + 1)?;
                }
                self.out.line(sink.store(&obj));
                self.out.close();
                self.pods.pop();
            }
            SastType::StaticArray { element } => {
                let arr = scoped("arr", depth);
                let i = scoped("i", depth);
                self.out.open();
                self.out.line(format!("JSONArray {arr};"));
                self.out.line(format!(
                    "for (std::size_t {i} = 0; {i} < sizeof({access}) / sizeof({access}[0]); ++{i})"
                ));
                self.out.open();
                self.serialize_value(
                    element,
                    &format!("{access}[{i}]"),
                    &Sink::Item { array: &arr },
                    None,
                    depth + 1,
                )?;
                self.out.close();
                self.out.line(sink.store(&arr));
                self.out.close();
            }
            SastType::DynamicArray {
                element,
                length_var,
            } => {
                let owner = owner.ok_or_else(|| self.dynamic_array_without_owner())?;
                let arr = scoped("arr", depth);
                let i = scoped("i", depth);
                self.out.open();
                self.out.line(format!("JSONArray {arr};"));
                self.out.line(format!(
                    "for (std::size_t {i} = 0; {i} < static_cast<std::size_t>({owner}.{length_var}); ++{i})"
                ));
                self.out.open();
                self.serialize_value(
                    element,
                    &format!("{access}[{i}]"),
                    &Sink::Item { array: &arr },
                    None,
                    depth + 1,
                )?;
                self.out.close();
                self.out.line(sink.store(&arr));
                self.out.close();
            }
            SastType::Vector { element }
            | SastType::Set { element }
            | SastType::UnorderedSet { element } => {
                let arr = scoped("arr", depth);
                let item = scoped("item", depth);
                self.out.open();
                self.out.line(format!("JSONArray {arr};"));
                self.out.line(format!("for (const auto& {item} : {access})"));
                self.out.open();
                self.serialize_value(element, &item, &Sink::Item { array: &arr }, None, depth + 1)?;
                self.out.close();
                self.out.line(sink.store(&arr));
                self.out.close();
            }
            SastType::Map { key, value } | SastType::UnorderedMap { key, value } => {
                let map = scoped("map", depth);
                let key_var = scoped("key", depth);
                let value_var = scoped("value", depth);
                let key_text = self.key_to_string(key, &key_var)?;
                self.out.open();
                self.out.line(format!("JSONObject {map};"));
                self.out.line(format!(
                    "for (const auto& [{key_var}, {value_var}] : {access})"
                ));
                self.out.open();
                self.serialize_value(
                    value,
                    &value_var,
                    &Sink::Member {
                        object: &map,
                        key: key_text,
                    },
                    None,
                    depth + 1,
                )?;
                self.out.close();
                self.out.line(sink.store(&map));
                self.out.close();
            }
        }
        Ok(())
    }

    /// Read the named member of `object` from the JSON object `source`.
    fn deserialize_field(
        &mut self,
        field: &'n SastField,
        object: &str,
        source: &str,
        prefix: &str,
        depth: usize,
    ) -> Result<(), GenerateError> {
        let target = format!("{object}.{}", field.name);
        let key = dotted(prefix, field.serialized_name());

        if let SastType::Pod = field.ty {
            let pod_fields = self.enter_pod(field)?;
            for sub in pod_fields {
                self.deserialize_field(sub, &target, source, &key, depth)?;
            }
            self.pods.pop();
            return Ok(());
        }

        let value = format!("{source}.GetMember({})", c_string_literal(&key));
        self.deserialize_value(field, &target, &value, Some(object), depth)
    }

    fn deserialize_value(
        &mut self,
        field: &'n SastField,
        target: &str,
        value: &str,
        owner: Option<&str>,
        depth: usize,
    ) -> Result<(), GenerateError> {
        match &field.ty {
            SastType::Int | SastType::Float | SastType::Double => {
                let ty = declared_type(field, target);
                self.out.line(format!(
                    "{target} = static_cast<{ty}>({value}.as<JSONNumber>().value);"
                ));
            }
            SastType::Bool => {
                self.out
                    .line(format!("{target} = {value}.as<JSONBool>().value;"));
            }
            SastType::String => {
                self.out
                    .line(format!("{target} = {value}.as<JSONString>().value;"));
            }
            SastType::Object => {
                self.out.line(format!(
                    "JSONDeserialize({target}, {value}.as<JSONObject>());"
                ));
            }
            SastType::Pod => {
                let obj = scoped("obj", depth);
                let pod_fields = self.enter_pod(field)?;
                self.out.open();
                self.out
                    .line(format!("const JSONObject& {obj} = {value}.as<JSONObject>();"));
                for sub in pod_fields {
                    self.deserialize_field(sub, target, &obj, "", depth + 1)?;
                }
                self.out.close();
                self.pods.pop();
            }
            SastType::StaticArray { element } => {
                let arr = scoped("arr", depth);
                let i = scoped("i", depth);
                self.out.open();
                self.out
                    .line(format!("const JSONArray& {arr} = {value}.as<JSONArray>();"));
                self.out.line(format!(
                    "for (std::size_t {i} = 0; {i} < sizeof({target}) / sizeof({target}[0]) && {i} < {arr}.GetItems().size(); ++{i})"
                ));
                self.out.open();
                self.deserialize_value(
                    element,
                    &format!("{target}[{i}]"),
                    &format!("{arr}.GetItems()[{i}]"),
                    None,
                    depth + 1,
                )?;
                self.out.close();
                self.out.close();
            }
            SastType::DynamicArray {
                element,
                length_var,
            } => {
                let owner = owner.ok_or_else(|| self.dynamic_array_without_owner())?;
                let arr = scoped("arr", depth);
                let i = scoped("i", depth);
                let length = format!("{owner}.{length_var}");
                self.out.open();
                self.out
                    .line(format!("const JSONArray& {arr} = {value}.as<JSONArray>();"));
                self.out.line(format!("delete[] {target};"));
                self.out.line(format!(
                    "{length} = static_cast<std::decay_t<decltype({length})>>({arr}.GetItems().size());"
                ));
                self.out.line(format!(
                    "{target} = new std::remove_pointer_t<std::decay_t<decltype({target})>>[{arr}.GetItems().size()];"
                ));
                self.out.line(format!(
                    "for (std::size_t {i} = 0; {i} < {arr}.GetItems().size(); ++{i})"
                ));
                self.out.open();
                self.deserialize_value(
                    element,
                    &format!("{target}[{i}]"),
                    &format!("{arr}.GetItems()[{i}]"),
                    None,
                    depth + 1,
                )?;
                self.out.close();
                self.out.close();
            }
            SastType::Vector { element } => {
                let arr = scoped("arr", depth);
                let item = scoped("item", depth);
                let elem = scoped("elem", depth);
                self.out.open();
                self.out
                    .line(format!("const JSONArray& {arr} = {value}.as<JSONArray>();"));
                self.out.line(format!("{target}.clear();"));
                self.out.line(format!("for (const auto& {item} : {arr}.GetItems())"));
                self.out.open();
                self.out
                    .line(format!("auto&& {elem} = {target}.emplace_back();"));
                self.deserialize_value(element, &elem, &item, None, depth + 1)?;
                self.out.close();
                self.out.close();
            }
            SastType::Set { element } | SastType::UnorderedSet { element } => {
                let arr = scoped("arr", depth);
                let item = scoped("item", depth);
                let elem = scoped("elem", depth);
                self.out.open();
                self.out
                    .line(format!("const JSONArray& {arr} = {value}.as<JSONArray>();"));
                self.out.line(format!("{target}.clear();"));
                self.out.line(format!("for (const auto& {item} : {arr}.GetItems())"));
                self.out.open();
                self.out.line(format!(
                    "std::decay_t<decltype({target})>::value_type {elem}{{}};"
                ));
                self.deserialize_value(element, &elem, &item, None, depth + 1)?;
                self.out.line(format!("{target}.insert(std::move({elem}));"));
                self.out.close();
                self.out.close();
            }
            SastType::Map { key, value: mapped } | SastType::UnorderedMap { key, value: mapped } => {
                let map = scoped("map", depth);
                let key_var = scoped("key", depth);
                let value_var = scoped("value", depth);
                let elem = scoped("elem", depth);
                let key_value = self.key_from_string(key, &key_var, target)?;
                self.out.open();
                self.out
                    .line(format!("const JSONObject& {map} = {value}.as<JSONObject>();"));
                self.out.line(format!("{target}.clear();"));
                self.out.line(format!(
                    "for (const auto& [{key_var}, {value_var}] : {map}.GetMembers())"
                ));
                self.out.open();
                self.out.line(format!(
                    "std::decay_t<decltype({target})>::mapped_type {elem}{{}};"
                ));
                self.deserialize_value(mapped, &elem, &value_var, None, depth + 1)?;
                self.out
                    .line(format!("{target}.emplace({key_value}, std::move({elem}));"));
                self.out.close();
                self.out.close();
            }
        }
        Ok(())
    }

    /// Resolve a POD reference and push it on the inlining stack.
    ///
    /// Callers pop the stack once the POD's fields are emitted.
    fn enter_pod(&mut self, field: &'n SastField) -> Result<Vec<&'n SastField>, GenerateError> {
        let node = field
            .object_node
            .get()
            .ok_or_else(|| GenerateError::UnresolvedPod {
                field: self.current.clone(),
                type_name: field.original_type_name.clone(),
            })?;
        if self.pods.contains(&node.name.as_str()) {
            return Err(GenerateError::RecursivePod(node.name.clone()));
        }
        self.pods.push(node.name.as_str());
        Ok(flatten_fields(node))
    }

    fn key_to_string(&self, key: &SastField, var: &str) -> Result<String, GenerateError> {
        match key.ty {
            SastType::Int => Ok(format!("std::to_string({var})")),
            SastType::Float | SastType::Double => Ok(format!("std::format(\"{{}}\", {var})")),
            SastType::Bool => Ok(format!("std::string({var} ? \"true\" : \"false\")")),
            SastType::String => Ok(var.to_string()),
            ref other => Err(self.unsupported_key(other)),
        }
    }

    fn key_from_string(
        &self,
        key: &SastField,
        var: &str,
        map: &str,
    ) -> Result<String, GenerateError> {
        match key.ty {
            SastType::Int => Ok(format!(
                "static_cast<std::decay_t<decltype({map})>::key_type>(std::stoll({var}))"
            )),
            SastType::Float => Ok(format!("std::stof({var})")),
            SastType::Double => Ok(format!("std::stod({var})")),
            SastType::Bool => Ok(format!("{var} == \"true\"")),
            SastType::String => Ok(var.to_string()),
            ref other => Err(self.unsupported_key(other)),
        }
    }

    fn unsupported_key(&self, ty: &SastType) -> GenerateError {
        GenerateError::unsupported(
            self.current.clone(),
            format!("map keys of kind `{}` are not supported", ty.kind_name()),
        )
    }

    fn dynamic_array_without_owner(&self) -> GenerateError {
        GenerateError::unsupported(
            self.current.clone(),
            "dynamic arrays are only supported as direct members of a record",
        )
    }
}

fn dotted(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// C++ type a number is cast back to on read.
fn declared_type(field: &SastField, target: &str) -> String {
    if field.original_type_name.is_empty() {
        format!("std::decay_t<decltype({target})>")
    } else {
        field.original_type_name.clone()
    }
}
