use std::any::{Any, TypeId};
use std::sync::Arc;

use ahash::AHashMap;

use crate::{FieldBag, GraphWireError, GraphWireResult, Value};

//region Accessor Aliases

/// Reads one field off a concrete instance.
pub type GetterFn = Box<dyn Fn(&dyn Any) -> GraphWireResult<Value> + Send + Sync>;
/// Writes one field on a concrete instance.
pub type SetterFn = Box<dyn Fn(&mut dyn Any, Value) -> GraphWireResult<()> + Send + Sync>;
/// Allocates an unpopulated shell instance.
pub type ShellFn = Box<dyn Fn() -> Box<dyn Any> + Send + Sync>;
/// Builds an instance from a collected field bag.
pub type ConstructFn = Box<dyn Fn(&FieldBag) -> GraphWireResult<Box<dyn Any>> + Send + Sync>;
/// Collects an instance's state into a field bag.
pub type CollectFn = Box<dyn Fn(&dyn Any, &mut FieldBag) -> GraphWireResult<()> + Send + Sync>;
/// Appends one element to a collection instance.
pub type PushFn = Box<dyn Fn(&mut dyn Any, Value) -> GraphWireResult<()> + Send + Sync>;
/// Enumerates a collection instance's elements in order.
pub type EnumerateFn = Box<dyn Fn(&dyn Any) -> GraphWireResult<Vec<Value>> + Send + Sync>;

/// Wraps a typed getter closure into a [`GetterFn`], failing if the instance
/// is not of the expected concrete type.
pub fn getter_of<T: Any>(
    read: impl Fn(&T) -> Value + Send + Sync + 'static,
) -> GetterFn {
    Box::new(move |instance| match instance.downcast_ref::<T>() {
        Some(concrete) => Ok(read(concrete)),
        None => Err(GraphWireError::BadArgument(
            "Field getter invoked against an instance of the wrong concrete type!".into(),
        )),
    })
}

/// Wraps a typed setter closure into a [`SetterFn`], failing if the instance
/// is not of the expected concrete type.
pub fn setter_of<T: Any>(
    write: impl Fn(&mut T, Value) -> GraphWireResult<()> + Send + Sync + 'static,
) -> SetterFn {
    Box::new(move |instance, value| match instance.downcast_mut::<T>() {
        Some(concrete) => write(concrete, value),
        None => Err(GraphWireError::BadArgument(
            "Field setter invoked against an instance of the wrong concrete type!".into(),
        )),
    })
}

//endregion

//region Version Span

/// Inclusive range of type versions for which a field is present on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionSpan {
    pub added_in: i32,
    pub removed_after: i32,
}

impl VersionSpan {
    pub fn new(added_in: i32, removed_after: i32) -> Self {
        Self {
            added_in,
            removed_after,
        }
    }

    pub fn contains(&self, version: i32) -> bool {
        version >= self.added_in && version <= self.removed_after
    }
}

//endregion

//region Field And Member Specs

/// One serializable field of a declared-field or value-aggregate type.
pub struct FieldSpec {
    pub(crate) name: String,
    pub(crate) getter: GetterFn,
    pub(crate) setter: SetterFn,
    /// Present only for version-gated fields. A field without a span is
    /// required in decoded data; a span makes it optional.
    pub(crate) version_span: Option<VersionSpan>,
}

impl FieldSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version_span(&self) -> Option<VersionSpan> {
        self.version_span
    }

    pub fn read(&self, instance: &dyn Any) -> GraphWireResult<Value> {
        (self.getter)(instance)
    }

    pub fn write(&self, instance: &mut dyn Any, value: Value) -> GraphWireResult<()> {
        (self.setter)(instance, value)
    }
}

/// One tagged member of a declared-contract type. Classification requires
/// both accessors; a half-specified member is a contract violation.
pub struct ContractMemberSpec {
    pub(crate) name: String,
    pub(crate) getter: Option<GetterFn>,
    pub(crate) setter: Option<SetterFn>,
}

impl ContractMemberSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_complete(&self) -> bool {
        self.getter.is_some() && self.setter.is_some()
    }

    pub fn read(&self, instance: &dyn Any) -> GraphWireResult<Value> {
        match &self.getter {
            Some(getter) => getter(instance),
            None => Err(GraphWireError::ContractViolation(format!(
                "Member '{}' is not readable!",
                self.name
            ))),
        }
    }

    pub fn write(&self, instance: &mut dyn Any, value: Value) -> GraphWireResult<()> {
        match &self.setter {
            Some(setter) => setter(instance, value),
            None => Err(GraphWireError::ContractViolation(format!(
                "Member '{}' is not writable!",
                self.name
            ))),
        }
    }
}

/// Hooks for a countable/enumerable collection type: create empty, append
/// one, enumerate all.
pub struct CollectionSpec {
    pub(crate) enumerate: EnumerateFn,
    pub(crate) push: PushFn,
}

impl CollectionSpec {
    pub fn enumerate(&self, instance: &dyn Any) -> GraphWireResult<Vec<Value>> {
        (self.enumerate)(instance)
    }

    pub fn push(&self, instance: &mut dyn Any, element: Value) -> GraphWireResult<()> {
        (self.push)(instance, element)
    }
}

/// Hooks for a self-describing type: it collects its own state and supplies
/// its own reconstruction entry point.
pub struct SelfDescribingSpec {
    pub(crate) collect: CollectFn,
    pub(crate) reconstruct: Option<ConstructFn>,
}

impl SelfDescribingSpec {
    pub fn has_reconstruct(&self) -> bool {
        self.reconstruct.is_some()
    }

    /// Builds an instance from a collected field bag, or fails if the type
    /// never registered its reconstruction entry point.
    pub fn reconstruct(&self, bag: &FieldBag) -> GraphWireResult<Box<dyn Any>> {
        match &self.reconstruct {
            Some(construct) => construct(bag),
            None => Err(GraphWireError::MissingConstructionPath(
                "self-describing type has no reconstruction entry point".into(),
            )),
        }
    }
}

//endregion

//region Type Schema

/// Registration-time descriptor for one concrete type.
///
/// Which facets are populated determines which strategy the classifier picks
/// (in its fixed priority order). The schema is immutable once registered
/// and shared behind an `Arc` for the registry's lifetime.
pub struct TypeSchema {
    type_id: TypeId,
    type_name: String,
    declared_version: Option<i32>,
    shell: ShellFn,
    self_describing: Option<SelfDescribingSpec>,
    value_aggregate: bool,
    fields: Vec<FieldSpec>,
    versioned: bool,
    reconstruct_ctor: Option<ConstructFn>,
    contract_members: Vec<ContractMemberSpec>,
    collection: Option<CollectionSpec>,
}

impl TypeSchema {
    /// Starts a schema for `T` using `T::default()` as the shell constructor.
    pub fn builder<T: Any + Default>(type_name: impl Into<String>) -> TypeSchemaBuilder {
        Self::builder_with_shell::<T>(type_name, || Box::new(T::default()))
    }

    /// Starts a schema for `T` with an explicit shell constructor, for types
    /// without a usable `Default`.
    pub fn builder_with_shell<T: Any>(
        type_name: impl Into<String>,
        shell: impl Fn() -> Box<dyn Any> + Send + Sync + 'static,
    ) -> TypeSchemaBuilder {
        TypeSchemaBuilder {
            schema: TypeSchema {
                type_id: TypeId::of::<T>(),
                type_name: type_name.into(),
                declared_version: None,
                shell: Box::new(shell),
                self_describing: None,
                value_aggregate: false,
                fields: Vec::new(),
                versioned: false,
                reconstruct_ctor: None,
                contract_members: Vec::new(),
                collection: None,
            },
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn declared_version(&self) -> Option<i32> {
        self.declared_version
    }

    /// Allocates an unpopulated shell instance of this type.
    pub fn make_shell(&self) -> Box<dyn Any> {
        (self.shell)()
    }

    pub fn self_describing(&self) -> Option<&SelfDescribingSpec> {
        self.self_describing.as_ref()
    }

    pub fn is_value_aggregate(&self) -> bool {
        self.value_aggregate
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn is_versioned(&self) -> bool {
        self.versioned
    }

    pub fn reconstruct_ctor(&self) -> Option<&ConstructFn> {
        self.reconstruct_ctor.as_ref()
    }

    pub fn contract_members(&self) -> &[ContractMemberSpec] {
        &self.contract_members
    }

    pub fn collection(&self) -> Option<&CollectionSpec> {
        self.collection.as_ref()
    }

    /// Runs the self-describing collect hook against an instance.
    pub fn collect_state(&self, instance: &dyn Any) -> GraphWireResult<FieldBag> {
        let spec = self.self_describing.as_ref().ok_or_else(|| {
            GraphWireError::BadArgument(format!(
                "Type '{}' is not self-describing!",
                self.type_name
            ))
        })?;
        let mut bag = FieldBag::new();
        (spec.collect)(instance, &mut bag)?;
        Ok(bag)
    }
}

//endregion

//region Type Schema Builder

pub struct TypeSchemaBuilder {
    schema: TypeSchema,
}

impl TypeSchemaBuilder {
    /// Declares the type's current version, enabling per-field version spans.
    pub fn version(mut self, version: i32) -> Self {
        self.schema.declared_version = Some(version);
        self.schema.versioned = true;
        self
    }

    /// Marks the type as a plain value aggregate: every field is copied
    /// directly with no construction step.
    pub fn value_aggregate(mut self) -> Self {
        self.schema.value_aggregate = true;
        self
    }

    /// Tags one field for inclusion.
    pub fn field(mut self, name: impl Into<String>, getter: GetterFn, setter: SetterFn) -> Self {
        self.schema.fields.push(FieldSpec {
            name: name.into(),
            getter,
            setter,
            version_span: None,
        });
        self
    }

    /// Tags one field for inclusion within an inclusive version span.
    pub fn versioned_field(
        mut self,
        name: impl Into<String>,
        span: VersionSpan,
        getter: GetterFn,
        setter: SetterFn,
    ) -> Self {
        self.schema.fields.push(FieldSpec {
            name: name.into(),
            getter,
            setter,
            version_span: Some(span),
        });
        self
    }

    /// Installs the self-describing collect hook and reconstruction entry
    /// point. Passing `None` for `reconstruct` models a type that collects
    /// state but forgot its construction path; classification of such a type
    /// fails with a missing-construction-path error.
    pub fn self_describing(
        mut self,
        collect: CollectFn,
        reconstruct: Option<ConstructFn>,
    ) -> Self {
        self.schema.self_describing = Some(SelfDescribingSpec {
            collect,
            reconstruct,
        });
        self
    }

    /// Designates an explicit reconstruction constructor for declared-field
    /// decoding (used instead of the shell + field assignment default).
    pub fn reconstruct_with(mut self, ctor: ConstructFn) -> Self {
        self.schema.reconstruct_ctor = Some(ctor);
        self
    }

    /// Tags one declared-contract member. Both accessors must be supplied
    /// for classification to succeed.
    pub fn contract_member(
        mut self,
        name: impl Into<String>,
        getter: Option<GetterFn>,
        setter: Option<SetterFn>,
    ) -> Self {
        self.schema.contract_members.push(ContractMemberSpec {
            name: name.into(),
            getter,
            setter,
        });
        self
    }

    /// Installs countable-collection hooks: enumerate-all and add-one.
    pub fn collection(mut self, enumerate: EnumerateFn, push: PushFn) -> Self {
        self.schema.collection = Some(CollectionSpec { enumerate, push });
        self
    }

    pub fn build(self) -> TypeSchema {
        self.schema
    }
}

//endregion

//region Type Registry

/// All registered type schemas, indexed by `TypeId` (encode side) and by
/// type-name string (decode side).
#[derive(Default)]
pub struct TypeRegistry {
    by_type: AHashMap<TypeId, Arc<TypeSchema>>,
    by_name: AHashMap<String, Arc<TypeSchema>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: TypeSchema) -> GraphWireResult<()> {
        if schema.type_name.is_empty() {
            return Err(GraphWireError::BadArgument(
                "Type name must not be empty!".into(),
            ));
        }
        if self.by_type.contains_key(&schema.type_id) {
            return Err(GraphWireError::BadArgument(format!(
                "A schema for type '{}' is already registered!",
                schema.type_name
            )));
        }
        if self.by_name.contains_key(&schema.type_name) {
            return Err(GraphWireError::BadArgument(format!(
                "Type name '{}' is already registered!",
                schema.type_name
            )));
        }
        let schema = Arc::new(schema);
        self.by_type.insert(schema.type_id, Arc::clone(&schema));
        self.by_name
            .insert(schema.type_name.clone(), schema);
        Ok(())
    }

    pub fn schema_of(&self, type_id: TypeId) -> Option<Arc<TypeSchema>> {
        self.by_type.get(&type_id).cloned()
    }

    pub fn schema_named(&self, type_name: &str) -> Option<Arc<TypeSchema>> {
        self.by_name.get(type_name).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

//endregion

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScalarValue;

    #[derive(Default)]
    struct Sample {
        count: i32,
    }

    fn sample_schema() -> TypeSchema {
        TypeSchema::builder::<Sample>("Sample")
            .field(
                "count",
                getter_of::<Sample>(|s| Value::from(s.count)),
                setter_of::<Sample>(|s, v| {
                    s.count = match v.as_scalar() {
                        Some(ScalarValue::I32(i)) => i,
                        _ => return Err(GraphWireError::BadArgument("expected i32".into())),
                    };
                    Ok(())
                }),
            )
            .build()
    }

    #[test]
    fn registry_indexes_by_type_and_name() {
        let mut registry = TypeRegistry::new();
        registry.register(sample_schema()).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.schema_of(TypeId::of::<Sample>()).is_some());
        assert!(registry.schema_named("Sample").is_some());
        assert!(registry.schema_named("Missing").is_none());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = TypeRegistry::new();
        registry.register(sample_schema()).unwrap();
        assert!(registry.register(sample_schema()).is_err());
    }

    #[test]
    fn accessors_round_trip_through_any() {
        let schema = sample_schema();
        let mut instance = Sample { count: 7 };
        let read = schema.fields()[0].read(&instance).unwrap();
        assert_eq!(read.as_scalar(), Some(ScalarValue::I32(7)));
        schema.fields()[0]
            .write(&mut instance, Value::from(11i32))
            .unwrap();
        assert_eq!(instance.count, 11);
    }

    #[test]
    fn version_span_is_inclusive() {
        let span = VersionSpan::new(2, 4);
        assert!(!span.contains(1));
        assert!(span.contains(2));
        assert!(span.contains(4));
        assert!(!span.contains(5));
    }
}
