use crate::Value;

/// Insertion-ordered name/value store exchanged between collect, construct
/// and populate hooks.
///
/// Field order is load-bearing: the wire format emits entries in the order
/// they were inserted, and re-encoding an unchanged graph must reproduce
/// byte-identical output.
#[derive(Debug, Clone, Default)]
pub struct FieldBag {
    entries: Vec<(String, Value)>,
}

impl FieldBag {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Appends a field, or overwrites in place if the name is already present
    /// (preserving its original position).
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        for entry in &mut self.entries {
            if entry.0 == name {
                entry.1 = value;
                return;
            }
        }
        self.entries.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(entry_name, _)| entry_name == name)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScalarValue;

    #[test]
    fn insertion_order_is_preserved() {
        let mut bag = FieldBag::new();
        bag.insert("name", Value::from("abc"));
        bag.insert("age", Value::from(5i32));
        let names: Vec<&str> = bag.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["name", "age"]);
    }

    #[test]
    fn overwrite_keeps_original_position() {
        let mut bag = FieldBag::new();
        bag.insert("a", Value::from(1i32));
        bag.insert("b", Value::from(2i32));
        bag.insert("a", Value::from(3i32));
        let names: Vec<&str> = bag.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(
            bag.get("a").and_then(Value::as_scalar),
            Some(ScalarValue::I32(3))
        );
        assert_eq!(bag.len(), 2);
    }
}
