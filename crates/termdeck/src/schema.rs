//! JSON Schema export for the stdio protocol.
//!
//! schemars emits draft-2020-12. Hosts written against draft-07 validators
//! choke on `$defs` and on `anyOf` nullable unions, so the exported schema is
//! rewritten:
//! - `$defs` becomes `definitions` and every `#/$defs/` reference follows
//! - a two-way `anyOf` with a bare `{"type": "null"}` collapses to the
//!   non-null branch

use schemars::schema_for;
use serde_json::{json, Map, Value};

use crate::protocol::{Inbound, Outbound};

/// Schemas for both line directions, draft-07 compatible.
pub fn protocol_schema() -> Value {
    json!({
        "inbound": SchemaTransformer::transform(schema_for!(Inbound).to_value()),
        "outbound": SchemaTransformer::transform(schema_for!(Outbound).to_value()),
    })
}

/// Draft-2020-12 to draft-07 rewriting.
pub struct SchemaTransformer;

impl SchemaTransformer {
    /// Apply every rewrite to `schema`.
    pub fn transform(mut schema: Value) -> Value {
        if let Some(root) = schema.as_object_mut() {
            if let Some(defs) = root.remove("$defs") {
                root.insert("definitions".to_string(), defs);
            }
        }
        Self::visit(&mut schema);
        schema
    }

    fn visit(value: &mut Value) {
        match value {
            Value::Object(object) => {
                Self::collapse_nullable(object);
                Self::rewrite_reference(object);
                for nested in object.values_mut() {
                    Self::visit(nested);
                }
            }
            Value::Array(items) => {
                for item in items {
                    Self::visit(item);
                }
            }
            _ => {}
        }
    }

    fn rewrite_reference(object: &mut Map<String, Value>) {
        let Some(Value::String(reference)) = object.get_mut("$ref") else {
            return;
        };
        let rewritten = reference
            .strip_prefix("#/$defs/")
            .map(|name| format!("#/definitions/{}", name));
        if let Some(rewritten) = rewritten {
            *reference = rewritten;
        }
    }

    fn collapse_nullable(object: &mut Map<String, Value>) {
        let Some(Value::Array(branches)) = object.get("anyOf") else {
            return;
        };
        let [first, second] = branches.as_slice() else {
            return;
        };

        let kept = if is_bare_null(second) {
            first.clone()
        } else if is_bare_null(first) {
            second.clone()
        } else {
            return;
        };
        let Value::Object(kept) = kept else {
            return;
        };

        object.remove("anyOf");
        for (key, value) in kept {
            object.insert(key, value);
        }
    }
}

/// `{"type": "null"}` with nothing else attached.
fn is_bare_null(schema: &Value) -> bool {
    schema
        .as_object()
        .map_or(false, |o| o.len() == 1 && o.get("type") == Some(&json!("null")))
}
