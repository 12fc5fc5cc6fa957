//! Format-independent helpers for field emission.
//!
//! Every plugin walks the same flattened field list ([`flatten_fields`]) and
//! writes nested blocks through a [`CodeWriter`]. Temporaries are named with
//! [`scoped`], which appends the recursion depth so loops nested inside loops
//! never shadow each other.

use genserialize_sast::{Access, SastField, SastNode};

/// Fields serialized for `node`: inherited ones first, then its own.
///
/// Bases are walked depth-first in declaration order (a base's own bases
/// before the base itself). Private fields of any base are left out. Bases
/// that are unresolved, or already on the current path, are skipped.
pub fn flatten_fields(node: &SastNode) -> Vec<&SastField> {
    let mut fields = Vec::new();
    let mut path = vec![node.name.as_str()];
    collect_bases(node, &mut fields, &mut path);
    fields.extend(node.fields.iter());
    fields
}

fn collect_bases<'a>(node: &'a SastNode, out: &mut Vec<&'a SastField>, path: &mut Vec<&'a str>) {
    for base in &node.bases {
        let Some(base_node) = base.node.get() else {
            tracing::warn!(node = %node.name, base = %base.name, "skipping unresolved base type");
            continue;
        };
        if path.contains(&base_node.name.as_str()) {
            tracing::warn!(node = %node.name, base = %base_node.name, "skipping cyclic base type");
            continue;
        }
        path.push(base_node.name.as_str());
        collect_bases(base_node, out, path);
        path.pop();
        out.extend(
            base_node
                .fields
                .iter()
                .filter(|field| field.access != Access::Private),
        );
    }
}

/// Name of a generated temporary for the given nesting depth.
pub fn scoped(role: &str, depth: usize) -> String {
    format!("{role}_{depth}")
}

/// Quote `text` as a C/C++ string literal.
pub fn c_string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Line-oriented text buffer with block indentation.
#[derive(Debug, Default)]
pub struct CodeWriter {
    buf: String,
    indent: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.indent {
            self.buf.push('\t');
        }
        self.buf.push_str(text.as_ref());
        self.buf.push('\n');
    }

    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    /// Write `{` and indent what follows.
    pub fn open(&mut self) {
        self.line("{");
        self.indent += 1;
    }

    /// Dedent and write `}`.
    pub fn close(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.line("}");
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genserialize_sast::{BaseRef, SastType};
    use std::sync::Arc;

    #[test]
    fn test_bases_first_private_excluded() {
        let root = Arc::new(
            SastNode::new("Root")
                .with_field(SastField::new("root_id", SastType::Int))
                .with_field(SastField::new("root_secret", SastType::Int).with_access(Access::Private)),
        );
        let base = Arc::new(
            SastNode::new("Base")
                .with_base(BaseRef::resolved(Arc::clone(&root)))
                .with_field(SastField::new("base_pub", SastType::Int))
                .with_field(SastField::new("base_prot", SastType::Int).with_access(Access::Protected))
                .with_field(SastField::new("base_priv", SastType::Int).with_access(Access::Private)),
        );
        let node = SastNode::new("Derived")
            .with_base(BaseRef::resolved(base))
            .with_field(SastField::new("own_priv", SastType::Int).with_access(Access::Private))
            .with_field(SastField::new("own", SastType::String));

        let names: Vec<_> = flatten_fields(&node).iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["root_id", "base_pub", "base_prot", "own_priv", "own"]);
    }

    #[test]
    fn test_multiple_bases_keep_declaration_order() {
        let a = Arc::new(SastNode::new("A").with_field(SastField::new("a", SastType::Int)));
        let b = Arc::new(SastNode::new("B").with_field(SastField::new("b", SastType::Int)));
        let node = SastNode::new("C")
            .with_base(BaseRef::resolved(a))
            .with_base(BaseRef::resolved(b))
            .with_base(BaseRef::new("Unknown"))
            .with_field(SastField::new("c", SastType::Int));
        let names: Vec<_> = flatten_fields(&node).iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_code_writer_blocks() {
        let mut out = CodeWriter::new();
        out.line("void f()");
        out.open();
        out.line("x();");
        out.open();
        out.line("y();");
        out.close();
        out.close();
        assert_eq!(out.finish(), "void f()\n{\n\tx();\n\t{\n\t\ty();\n\t}\n}\n");
    }

    #[test]
    fn test_c_string_literal_escapes() {
        assert_eq!(c_string_literal("pos.x"), "\"pos.x\"");
        assert_eq!(c_string_literal("a\"b\\c"), "\"a\\\"b\\\\c\"");
        assert_eq!(scoped("item", 3), "item_3");
    }
}
