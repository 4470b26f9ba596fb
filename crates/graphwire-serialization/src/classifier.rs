use std::any::TypeId;
use std::sync::Arc;

use ahash::AHashMap;
use graphwire_structures::{GraphWireError, GraphWireResult, TypeRegistry, TypeSchema};
use parking_lot::RwLock;
use tracing::trace;

use crate::surrogate::SurrogateRegistry;

/// The closed set of (de)serialization strategies. One is chosen per
/// concrete type, in fixed priority order, and cached for the lifetime of
/// the codec instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The type collects its own state and supplies its own reconstruction
    /// entry point; overrides all generic handling.
    SelfDescribing,
    /// Plain value type copied field-by-field with no construction step.
    ValueAggregate,
    /// Individually tagged fields, optionally version-gated; reconstruction
    /// by designated constructor or shell + field assignment.
    DeclaredField,
    /// Individually tagged members without a version scheme; every member
    /// must be both readable and writable.
    DeclaredContract,
    /// Countable/enumerable collection: encode count + elements, rebuild by
    /// adding elements back in order.
    Collection,
    /// Registered surrogate at the given registry index.
    Surrogate(usize),
}

/// Memoized classification outcome for one concrete type.
pub struct TypeDescriptor {
    strategy: Strategy,
    /// Absent for surrogate-handled types with no schema of their own.
    schema: Option<Arc<TypeSchema>>,
    type_name: String,
    declared_version: Option<i32>,
}

impl TypeDescriptor {
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn schema(&self) -> Option<&Arc<TypeSchema>> {
        self.schema.as_ref()
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn declared_version(&self) -> Option<i32> {
        self.declared_version
    }
}

/// Picks exactly one strategy per concrete type and caches the decision.
///
/// The cache is the only state shared across calls on one codec instance:
/// many concurrent lookups take the read lock, a first-time classification
/// takes the write lock for its insert.
pub struct Classifier {
    registry: TypeRegistry,
    surrogates: SurrogateRegistry,
    cache: RwLock<AHashMap<TypeId, Arc<TypeDescriptor>>>,
}

impl Classifier {
    pub fn new(registry: TypeRegistry, surrogates: SurrogateRegistry) -> Self {
        Self {
            registry,
            surrogates,
            cache: RwLock::new(AHashMap::new()),
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn surrogates(&self) -> &SurrogateRegistry {
        &self.surrogates
    }

    /// Registers a type schema. Invalidates cached decisions, since a type
    /// previously classified as surrogate-handled or unsupported may now
    /// resolve differently.
    pub fn register_type(&mut self, schema: TypeSchema) -> GraphWireResult<()> {
        self.registry.register(schema)?;
        self.cache.get_mut().clear();
        Ok(())
    }

    pub fn register_surrogate(&mut self, surrogate: crate::surrogate::Surrogate) {
        self.surrogates.register(surrogate);
        self.cache.get_mut().clear();
    }

    /// Classifies the concrete type behind `type_id`. First match in the
    /// fixed priority order wins; the decision is cached. Scalars, strings,
    /// enums and arrays never reach the classifier - they are structural
    /// kinds of the value model.
    pub fn classify(&self, type_id: TypeId) -> GraphWireResult<Arc<TypeDescriptor>> {
        if let Some(descriptor) = self.cache.read().get(&type_id) {
            return Ok(Arc::clone(descriptor));
        }
        let descriptor = Arc::new(self.classify_uncached(type_id)?);
        trace!(
            type_name = descriptor.type_name.as_str(),
            strategy = ?descriptor.strategy,
            "classified type"
        );
        self.cache
            .write()
            .insert(type_id, Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Decode-side classification: resolves the wire type identifier to a
    /// registered schema or surrogate, then classifies as usual.
    pub fn classify_named(&self, type_name: &str) -> GraphWireResult<Arc<TypeDescriptor>> {
        if let Some(schema) = self.registry.schema_named(type_name) {
            return self.classify(schema.type_id());
        }
        if let Some((_, surrogate)) = self.surrogates.find_named(type_name) {
            return self.classify(surrogate.type_id());
        }
        Err(GraphWireError::UnsupportedType(type_name.to_string()))
    }

    fn classify_uncached(&self, type_id: TypeId) -> GraphWireResult<TypeDescriptor> {
        if let Some(schema) = self.registry.schema_of(type_id) {
            // 1. Self-describing overrides everything else.
            if let Some(spec) = schema.self_describing() {
                if !spec.has_reconstruct() {
                    return Err(GraphWireError::MissingConstructionPath(
                        schema.type_name().to_string(),
                    ));
                }
                return Ok(Self::descriptor_from_schema(Strategy::SelfDescribing, schema));
            }
            // 2. Plain value aggregate, copied field-by-field.
            if schema.is_value_aggregate() {
                return Ok(Self::descriptor_from_schema(Strategy::ValueAggregate, schema));
            }
            // 3. Declared fields with optional version gating.
            if !schema.fields().is_empty() {
                return Ok(Self::descriptor_from_schema(Strategy::DeclaredField, schema));
            }
            // 4. Declared contract; every member must be readable and writable.
            if !schema.contract_members().is_empty() {
                for member in schema.contract_members() {
                    if !member.is_complete() {
                        return Err(GraphWireError::ContractViolation(format!(
                            "Member '{}' of type '{}' must be both readable and writable!",
                            member.name(),
                            schema.type_name()
                        )));
                    }
                }
                return Ok(Self::descriptor_from_schema(
                    Strategy::DeclaredContract,
                    schema,
                ));
            }
            // 7. Countable/enumerable collection. (5 and 6, inline kinds and
            // arrays, are structural and never reach this cascade.)
            if schema.collection().is_some() {
                return Ok(Self::descriptor_from_schema(Strategy::Collection, schema));
            }
            // A schema with no usable facet still falls through to the
            // surrogate registry below.
        }
        // 8. First registered surrogate with an exactly equal target type.
        if let Some((index, surrogate)) = self.surrogates.find(type_id) {
            return Ok(TypeDescriptor {
                strategy: Strategy::Surrogate(index),
                schema: None,
                type_name: surrogate.type_name().to_string(),
                declared_version: None,
            });
        }
        // 9. Nothing applies.
        let type_name = self
            .registry
            .schema_of(type_id)
            .map(|schema| schema.type_name().to_string())
            .unwrap_or_else(|| format!("{:?}", type_id));
        Err(GraphWireError::UnsupportedType(type_name))
    }

    fn descriptor_from_schema(strategy: Strategy, schema: Arc<TypeSchema>) -> TypeDescriptor {
        TypeDescriptor {
            strategy,
            type_name: schema.type_name().to_string(),
            declared_version: schema.declared_version(),
            schema: Some(schema),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphwire_structures::{getter_of, setter_of, FieldBag, Value};

    #[derive(Default)]
    struct Plain {
        x: i32,
    }

    #[derive(Default)]
    struct Named;

    fn classifier_with(schema: TypeSchema) -> Classifier {
        let mut registry = TypeRegistry::new();
        registry.register(schema).unwrap();
        Classifier::new(registry, SurrogateRegistry::empty())
    }

    fn plain_field_schema() -> TypeSchema {
        TypeSchema::builder::<Plain>("Plain")
            .field(
                "x",
                getter_of::<Plain>(|p| Value::from(p.x)),
                setter_of::<Plain>(|_, _| Ok(())),
            )
            .build()
    }

    #[test]
    fn self_describing_outranks_declared_fields() {
        let schema = TypeSchema::builder::<Plain>("Plain")
            .self_describing(
                Box::new(|_, _: &mut FieldBag| Ok(())),
                Some(Box::new(|_| Ok(Box::new(Plain::default())))),
            )
            .field(
                "x",
                getter_of::<Plain>(|p| Value::from(p.x)),
                setter_of::<Plain>(|_, _| Ok(())),
            )
            .build();
        let classifier = classifier_with(schema);
        let descriptor = classifier.classify(TypeId::of::<Plain>()).unwrap();
        assert_eq!(descriptor.strategy(), Strategy::SelfDescribing);
    }

    #[test]
    fn missing_reconstruction_path_fails_classification() {
        let schema = TypeSchema::builder::<Plain>("Plain")
            .self_describing(Box::new(|_, _: &mut FieldBag| Ok(())), None)
            .build();
        let classifier = classifier_with(schema);
        assert!(matches!(
            classifier.classify(TypeId::of::<Plain>()),
            Err(GraphWireError::MissingConstructionPath(_))
        ));
    }

    #[test]
    fn incomplete_contract_member_fails_classification() {
        let schema = TypeSchema::builder::<Plain>("Plain")
            .contract_member(
                "x",
                Some(getter_of::<Plain>(|p| Value::from(p.x))),
                None,
            )
            .build();
        let classifier = classifier_with(schema);
        assert!(matches!(
            classifier.classify(TypeId::of::<Plain>()),
            Err(GraphWireError::ContractViolation(_))
        ));
    }

    #[test]
    fn unregistered_type_is_unsupported() {
        let classifier = Classifier::new(TypeRegistry::new(), SurrogateRegistry::empty());
        assert!(matches!(
            classifier.classify(TypeId::of::<Named>()),
            Err(GraphWireError::UnsupportedType(_))
        ));
        assert!(matches!(
            classifier.classify_named("Named"),
            Err(GraphWireError::UnsupportedType(_))
        ));
    }

    #[test]
    fn decision_is_cached_per_concrete_type() {
        let classifier = classifier_with(plain_field_schema());
        let first = classifier.classify(TypeId::of::<Plain>()).unwrap();
        let second = classifier.classify(TypeId::of::<Plain>()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
