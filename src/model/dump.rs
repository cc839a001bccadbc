//! Human-readable and JSON views of a group tree.

use std::fmt::Write;

use serde_json::{json, Map, Value};

use super::group::Group;
use super::variable::Variable;

const INDENT: &str = "  ";

impl Group {
    /// CDL-like listing of this group and everything below it.
    ///
    /// ```text
    /// group: / {
    ///   dimensions:
    ///     time = UNLIMITED ; // (3 currently)
    ///   variables:
    ///     double t(time) ;
    ///       t:units = "K" ;
    ///   // group attributes:
    ///     :title = "demo" ;
    /// }
    /// ```
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, depth: usize) {
        let pad = INDENT.repeat(depth);
        let label = if self.is_root() { "/" } else { self.name() };
        let _ = writeln!(out, "{}group: {} {{", pad, label);

        let dims = self.own_dimensions();
        if !dims.is_empty() {
            let _ = writeln!(out, "{}{}dimensions:", pad, INDENT);
            for dim in &dims {
                let _ = writeln!(out, "{}{}{}{}", pad, INDENT, INDENT, dim);
            }
        }

        let vars = self.variables();
        if !vars.is_empty() {
            let _ = writeln!(out, "{}{}variables:", pad, INDENT);
            for var in &vars {
                let kind = if var.is_complex() { "complex " } else { "" };
                let _ = writeln!(
                    out,
                    "{}{}{}{}{} {}({}) ;",
                    pad,
                    INDENT,
                    INDENT,
                    kind,
                    var.scalar_type(),
                    var.name(),
                    var.dimension_names().join(", ")
                );
                for (key, value) in var.attributes().user_entries() {
                    let _ = writeln!(out, "{}{}{}{}{}:{} = {} ;", pad, INDENT, INDENT, INDENT, var.name(), key, value);
                }
            }
        }

        let attrs = self.attributes();
        if !attrs.is_empty() {
            let _ = writeln!(out, "{}{}// group attributes:", pad, INDENT);
            for (key, value) in attrs.iter() {
                let _ = writeln!(out, "{}{}{}:{} = {} ;", pad, INDENT, INDENT, key, value);
            }
        }

        for child in self.children() {
            out.push('\n');
            child.dump_into(out, depth + 1);
        }
        let _ = writeln!(out, "{}}}", pad);
    }

    /// Structure of this group and its subtree as JSON.
    pub fn summary(&self) -> Value {
        let dimensions: Vec<Value> = self
            .own_dimensions()
            .iter()
            .map(|d| {
                json!({
                    "name": d.name(),
                    "length": d.length().fixed(),
                    "growable": d.is_growable(),
                    "current": d.len(),
                })
            })
            .collect();
        let variables: Vec<Value> = self.variables().iter().map(variable_summary).collect();
        let attributes: Map<String, Value> = self
            .attributes()
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::to_value(v).unwrap_or(Value::Null)))
            .collect();
        let groups: Vec<Value> = self.children().iter().map(Group::summary).collect();

        json!({
            "name": self.name(),
            "path": self.path(),
            "dimensions": dimensions,
            "variables": variables,
            "attributes": attributes,
            "groups": groups,
        })
    }
}

fn variable_summary(var: &Variable) -> Value {
    let attributes: Map<String, Value> = var
        .attributes()
        .user_entries()
        .map(|(k, v)| (k.to_string(), serde_json::to_value(v).unwrap_or(Value::Null)))
        .collect();
    json!({
        "name": var.name(),
        "type": var.scalar_type().name(),
        "complex": var.is_complex(),
        "dimensions": var.dimension_names(),
        "shape": var.shape().sizes(),
        "attributes": attributes,
    })
}
