//! Visitor-driven construction of a [`Value`].

use keel_format::Visitor;

use crate::{Object, Value};

/// In-progress container on the builder's stack.
enum Scope {
    Object {
        entries: Object,
        pending_key: Option<String>,
    },
    Array {
        items: Vec<Value>,
    },
}

/// Visitor implementation that materializes the dynamic document.
///
/// Each container-begin callback pushes a scope; each container-end pops the
/// completed container into its parent. Feeding it the event stream of one
/// well-formed document (what any `FormatParser` produces) always leaves it
/// complete.
///
/// [`finish`](DocumentBuilder::finish) is valid only once the top-level value
/// has completed; calling it earlier is a programming error in the driving
/// code, not a format error, and panics.
#[derive(Default)]
pub struct DocumentBuilder {
    stack: Vec<Scope>,
    result: Option<Value>,
}

impl DocumentBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        DocumentBuilder::default()
    }

    /// Whether a complete top-level value has been built.
    pub fn is_complete(&self) -> bool {
        self.result.is_some() && self.stack.is_empty()
    }

    /// Take the completed document.
    ///
    /// # Panics
    ///
    /// Panics if the top-level value has not completed yet.
    pub fn finish(self) -> Value {
        match self.result {
            Some(value) if self.stack.is_empty() => value,
            _ => panic!("DocumentBuilder::finish called before the document completed"),
        }
    }

    fn push_value(&mut self, value: Value) {
        match self.stack.last_mut() {
            Some(Scope::Object {
                entries,
                pending_key,
            }) => {
                let key = pending_key
                    .take()
                    .expect("value fed to an object scope without a preceding key");
                entries.insert(key, value);
            }
            Some(Scope::Array { items }) => items.push(value),
            None => {
                debug_assert!(self.result.is_none(), "second top-level value fed");
                self.result = Some(value);
            }
        }
    }
}

impl Visitor for DocumentBuilder {
    fn begin_object(&mut self) {
        self.stack.push(Scope::Object {
            entries: Object::new(),
            pending_key: None,
        });
    }

    fn end_object(&mut self) {
        match self.stack.pop() {
            Some(Scope::Object { entries, .. }) => self.push_value(Value::Object(entries)),
            _ => panic!("end_object without a matching begin_object"),
        }
    }

    fn begin_array(&mut self) {
        self.stack.push(Scope::Array { items: Vec::new() });
    }

    fn end_array(&mut self) {
        match self.stack.pop() {
            Some(Scope::Array { items }) => self.push_value(Value::Array(items)),
            _ => panic!("end_array without a matching begin_array"),
        }
    }

    fn key(&mut self, name: &str) {
        match self.stack.last_mut() {
            Some(Scope::Object { pending_key, .. }) => *pending_key = Some(name.to_owned()),
            _ => panic!("key fed outside an object scope"),
        }
    }

    fn string_value(&mut self, value: &str) {
        self.push_value(Value::Str(value.to_owned()));
    }

    fn bytes_value(&mut self, value: &[u8]) {
        self.push_value(Value::Bytes(value.to_owned()));
    }

    fn int_value(&mut self, value: i64) {
        self.push_value(Value::Int(value));
    }

    fn uint_value(&mut self, value: u64) {
        self.push_value(Value::Uint(value));
    }

    fn bignum_value(&mut self, value: &str) {
        self.push_value(Value::BigNum(value.to_owned()));
    }

    fn double_value(&mut self, value: f64) {
        self.push_value(Value::Double(value));
    }

    fn bool_value(&mut self, value: bool) {
        self.push_value(Value::Bool(value));
    }

    fn null_value(&mut self) {
        self.push_value(Value::Null);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_document() {
        let mut builder = DocumentBuilder::new();
        builder.begin_object();
        builder.key("a");
        builder.int_value(1);
        builder.key("b");
        builder.begin_array();
        builder.bool_value(true);
        builder.null_value();
        builder.end_array();
        builder.end_object();

        assert!(builder.is_complete());
        let value = builder.finish();
        assert_eq!(value["a"], Value::Int(1));
        assert_eq!(
            value["b"],
            Value::Array(vec![Value::Bool(true), Value::Null])
        );
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["a", "b"]);
    }

    #[test]
    fn duplicate_keys_keep_position_last_value_wins() {
        let mut builder = DocumentBuilder::new();
        builder.begin_object();
        builder.key("x");
        builder.int_value(1);
        builder.key("y");
        builder.int_value(2);
        builder.key("x");
        builder.int_value(3);
        builder.end_object();

        let value = builder.finish();
        let entries: Vec<_> = value
            .as_object()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        assert_eq!(
            entries,
            [("x", Value::Int(3)), ("y", Value::Int(2))]
        );
    }

    #[test]
    #[should_panic(expected = "before the document completed")]
    fn finish_before_completion_is_a_caller_bug() {
        let mut builder = DocumentBuilder::new();
        builder.begin_array();
        builder.finish();
    }
}
