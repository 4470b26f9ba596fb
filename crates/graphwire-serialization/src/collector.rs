use ahash::AHashMap;
use graphwire_structures::{
    FieldBag, GraphWireError, GraphWireResult, ObjectHandle, Value,
};
use tracing::trace;

use crate::classifier::{Classifier, Strategy};
use crate::node::{
    ElementEntry, EntryValue, FieldEntry, NodeBody, NodeId, NodeKind, NodeMap, NodeRecord,
};

/// Walks a root value depth-first, assigns node ids in first-visit order,
/// breaks cycles through identity memoization and produces the flat node map
/// one encode call operates on.
///
/// A collector run and its node map exist only for the duration of a single
/// serialize call.
pub struct GraphCollector<'a> {
    classifier: &'a Classifier,
    nodes: NodeMap,
    /// Reference identity -> assigned node id. Keyed on the handle's
    /// allocation pointer so lookups are O(1).
    seen: AHashMap<usize, NodeId>,
}

impl<'a> GraphCollector<'a> {
    pub fn new(classifier: &'a Classifier) -> Self {
        Self {
            classifier,
            nodes: NodeMap::new(),
            seen: AHashMap::new(),
        }
    }

    /// Collects the graph reachable from `root`. Any classification or
    /// traversal failure aborts the whole run; no partial map escapes.
    pub fn collect(mut self, root: &Value) -> GraphWireResult<NodeMap> {
        match root {
            // Inline kinds get a node only in root position.
            Value::Null => self.nodes.push(NodeRecord {
                id: 0,
                kind: NodeKind::Null,
                type_name: String::new(),
                body: NodeBody::Null,
            }),
            Value::Scalar(scalar) => self.nodes.push(NodeRecord {
                id: 0,
                kind: NodeKind::Scalar,
                type_name: scalar.kind().to_string(),
                body: NodeBody::Scalar(*scalar),
            }),
            Value::Str(text) => self.nodes.push(NodeRecord {
                id: 0,
                kind: NodeKind::String,
                type_name: "string".to_string(),
                body: NodeBody::Str(text.clone()),
            }),
            Value::Enum(enum_value) => self.nodes.push(NodeRecord {
                id: 0,
                kind: NodeKind::Enum,
                type_name: enum_value.type_name().to_string(),
                body: NodeBody::Enum(enum_value.clone()),
            }),
            Value::Object(_) | Value::Array(_) => {
                self.visit_reference(root)?;
            }
        }
        Ok(self.nodes)
    }

    /// Resolves one field/element position: inline kinds are embedded,
    /// reference kinds recurse into node collection.
    fn visit_value(&mut self, value: &Value) -> GraphWireResult<EntryValue> {
        match value {
            Value::Null => Ok(EntryValue::Null),
            Value::Scalar(scalar) => Ok(EntryValue::Scalar(*scalar)),
            Value::Str(text) => Ok(EntryValue::Str(text.clone())),
            // Enums travel inline as their underlying integer; the receiving
            // field's setter restores the domain type.
            Value::Enum(enum_value) => Ok(EntryValue::Scalar(enum_value.underlying())),
            Value::Object(_) | Value::Array(_) => {
                Ok(EntryValue::Reference(self.visit_reference(value)?))
            }
        }
    }

    /// Visits a reference-kind value exactly once. The id mapping and a
    /// placeholder record are inserted before recursing into children, so a
    /// cyclic reference back to an ancestor resolves to an already-assigned
    /// id instead of recursing forever.
    fn visit_reference(&mut self, value: &Value) -> GraphWireResult<NodeId> {
        let identity = match value {
            Value::Object(handle) => handle.identity(),
            Value::Array(handle) => handle.identity(),
            _ => {
                return Err(GraphWireError::BadArgument(
                    "visit_reference requires an object or array value!".into(),
                ))
            }
        };
        if let Some(existing) = self.seen.get(&identity) {
            return Ok(*existing);
        }
        let id = self.nodes.len() as NodeId;
        self.seen.insert(identity, id);

        match value {
            Value::Object(handle) => {
                let descriptor = self
                    .classifier
                    .classify(handle.concrete_type_id())?;
                self.nodes.push(NodeRecord {
                    id,
                    kind: NodeKind::Object,
                    type_name: descriptor.type_name().to_string(),
                    body: NodeBody::Object { fields: Vec::new() },
                });
                trace!(id, type_name = descriptor.type_name(), "collected object node");

                let bag = self.collect_object_state(handle, &descriptor)?;
                let mut fields = Vec::with_capacity(bag.len());
                for (name, field_value) in bag.iter() {
                    fields.push(FieldEntry {
                        name: name.to_string(),
                        value: self.visit_value(field_value)?,
                    });
                }
                self.nodes.replace(
                    id,
                    NodeRecord {
                        id,
                        kind: NodeKind::Object,
                        type_name: descriptor.type_name().to_string(),
                        body: NodeBody::Object { fields },
                    },
                );
            }
            Value::Array(handle) => {
                let (type_name, extents, elements) = {
                    let array = handle.borrow();
                    (
                        array.element_type().to_string(),
                        array.extents().to_vec(),
                        array.elements().to_vec(),
                    )
                };
                self.nodes.push(NodeRecord {
                    id,
                    kind: NodeKind::Array,
                    type_name: type_name.clone(),
                    body: NodeBody::Array {
                        extents: extents.clone(),
                        entries: Vec::new(),
                    },
                });
                trace!(id, element_type = type_name.as_str(), "collected array node");

                // Sparse body: null elements are omitted and restored as
                // defaults on decode.
                let mut entries = Vec::new();
                let mut index_tuple = vec![0u32; extents.len()];
                for element in &elements {
                    if !matches!(element, Value::Null) {
                        entries.push(ElementEntry {
                            index: index_tuple.clone(),
                            value: self.visit_value(element)?,
                        });
                    }
                    Self::advance_index(&mut index_tuple, &extents);
                }
                self.nodes.replace(
                    id,
                    NodeRecord {
                        id,
                        kind: NodeKind::Array,
                        type_name,
                        body: NodeBody::Array { extents, entries },
                    },
                );
            }
            _ => unreachable!(),
        }
        Ok(id)
    }

    /// Gathers an object's serializable state into a field bag according to
    /// its classified strategy.
    fn collect_object_state(
        &self,
        handle: &ObjectHandle,
        descriptor: &crate::classifier::TypeDescriptor,
    ) -> GraphWireResult<FieldBag> {
        match descriptor.strategy() {
            Strategy::SelfDescribing => {
                let schema = descriptor.schema().ok_or_else(|| {
                    GraphWireError::BadArgument("Self-describing type lost its schema!".into())
                })?;
                handle.with(|instance| schema.collect_state(instance))
            }
            Strategy::ValueAggregate | Strategy::DeclaredField => {
                let schema = descriptor.schema().ok_or_else(|| {
                    GraphWireError::BadArgument("Field-mapped type lost its schema!".into())
                })?;
                let version = descriptor.declared_version().unwrap_or(0);
                let mut bag = FieldBag::with_capacity(schema.fields().len());
                for field in schema.fields() {
                    if let Some(span) = field.version_span() {
                        if !span.contains(version) {
                            continue;
                        }
                    }
                    let field_value = handle.with(|instance| field.read(instance))?;
                    bag.insert(field.name(), field_value);
                }
                Ok(bag)
            }
            Strategy::DeclaredContract => {
                let schema = descriptor.schema().ok_or_else(|| {
                    GraphWireError::BadArgument("Contract type lost its schema!".into())
                })?;
                let mut bag = FieldBag::with_capacity(schema.contract_members().len());
                for member in schema.contract_members() {
                    let member_value = handle.with(|instance| member.read(instance))?;
                    bag.insert(member.name(), member_value);
                }
                Ok(bag)
            }
            Strategy::Collection => {
                let schema = descriptor.schema().ok_or_else(|| {
                    GraphWireError::BadArgument("Collection type lost its schema!".into())
                })?;
                let spec = schema.collection().ok_or_else(|| {
                    GraphWireError::BadArgument("Collection type lost its hooks!".into())
                })?;
                let elements = handle.with(|instance| spec.enumerate(instance))?;
                let mut bag = FieldBag::with_capacity(elements.len());
                for (position, element) in elements.into_iter().enumerate() {
                    bag.insert(position.to_string(), element);
                }
                Ok(bag)
            }
            Strategy::Surrogate(index) => {
                let surrogate = self.classifier.surrogates().get(index).ok_or_else(|| {
                    GraphWireError::BadArgument("Surrogate index out of range!".into())
                })?;
                handle.with(|instance| surrogate.collect(instance))
            }
        }
    }

    /// Advances a row-major index tuple by one position.
    fn advance_index(index_tuple: &mut [u32], extents: &[u32]) {
        for dimension in (0..index_tuple.len()).rev() {
            index_tuple[dimension] += 1;
            if index_tuple[dimension] < extents[dimension] {
                return;
            }
            index_tuple[dimension] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surrogate::SurrogateRegistry;
    use graphwire_structures::{
        getter_of, setter_of, ScalarValue, TypeRegistry, TypeSchema,
    };

    #[derive(Default)]
    struct Pair {
        left: Option<ObjectHandle>,
        right: Option<ObjectHandle>,
    }

    #[derive(Default)]
    struct Leaf {
        tag: i32,
    }

    fn handle_field(slot: &Option<ObjectHandle>) -> Value {
        match slot {
            Some(handle) => Value::Object(handle.clone()),
            None => Value::Null,
        }
    }

    fn test_classifier() -> Classifier {
        let mut registry = TypeRegistry::new();
        registry
            .register(
                TypeSchema::builder::<Pair>("Pair")
                    .field(
                        "left",
                        getter_of::<Pair>(|p| handle_field(&p.left)),
                        setter_of::<Pair>(|p, v| {
                            p.left = v.as_object().cloned();
                            Ok(())
                        }),
                    )
                    .field(
                        "right",
                        getter_of::<Pair>(|p| handle_field(&p.right)),
                        setter_of::<Pair>(|p, v| {
                            p.right = v.as_object().cloned();
                            Ok(())
                        }),
                    )
                    .build(),
            )
            .unwrap();
        registry
            .register(
                TypeSchema::builder::<Leaf>("Leaf")
                    .field(
                        "tag",
                        getter_of::<Leaf>(|l| Value::from(l.tag)),
                        setter_of::<Leaf>(|l, v| {
                            if let Some(ScalarValue::I32(tag)) = v.as_scalar() {
                                l.tag = tag;
                            }
                            Ok(())
                        }),
                    )
                    .build(),
            )
            .unwrap();
        Classifier::new(registry, SurrogateRegistry::empty())
    }

    #[test]
    fn ids_follow_first_visit_order() {
        let classifier = test_classifier();
        let leaf = ObjectHandle::new(Leaf { tag: 1 });
        let root = ObjectHandle::new(Pair {
            left: Some(leaf.clone()),
            right: None,
        });
        let map = GraphCollector::new(&classifier)
            .collect(&Value::Object(root))
            .unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(0).unwrap().type_name, "Pair");
        assert_eq!(map.get(1).unwrap().type_name, "Leaf");
    }

    #[test]
    fn shared_object_is_collected_once() {
        let classifier = test_classifier();
        let shared = ObjectHandle::new(Leaf { tag: 9 });
        let root = ObjectHandle::new(Pair {
            left: Some(shared.clone()),
            right: Some(shared),
        });
        let map = GraphCollector::new(&classifier)
            .collect(&Value::Object(root))
            .unwrap();
        assert_eq!(map.len(), 2);
        let NodeBody::Object { fields } = &map.get(0).unwrap().body else {
            panic!("root must be an object node");
        };
        assert_eq!(fields[0].value, EntryValue::Reference(1));
        assert_eq!(fields[1].value, EntryValue::Reference(1));
    }

    #[test]
    fn self_reference_terminates() {
        let classifier = test_classifier();
        let root = ObjectHandle::new(Pair::default());
        root.map_as_mut(|pair: &mut Pair| {
            pair.left = Some(root.clone());
        })
        .unwrap();
        let map = GraphCollector::new(&classifier)
            .collect(&Value::Object(root))
            .unwrap();
        assert_eq!(map.len(), 1);
        let NodeBody::Object { fields } = &map.get(0).unwrap().body else {
            panic!("root must be an object node");
        };
        assert_eq!(fields[0].value, EntryValue::Reference(0));
        assert_eq!(fields[1].value, EntryValue::Null);
    }

    #[test]
    fn unsupported_member_aborts_collection() {
        let classifier = test_classifier();
        struct Unregistered;
        let root = ObjectHandle::new(Pair {
            left: Some(ObjectHandle::new(Unregistered)),
            right: None,
        });
        let result = GraphCollector::new(&classifier).collect(&Value::Object(root));
        assert!(matches!(result, Err(GraphWireError::UnsupportedType(_))));
    }
}
