//! # Graphwire Structures
//!
//! Foundation crate for the graphwire object-graph serialization engine. It
//! defines the dynamic value model ([`Value`] and friends), the field bag
//! exchanged between collect/construct/populate hooks, the registration-time
//! type schemas that replace runtime reflection, and the shared error type.
//!
//! ## Core Components
//!
//! - **[`Value`]** - One dynamic value: null, scalar, string, enum, object
//!   reference or array reference
//! - **[`ObjectHandle`] / [`ArrayHandle`]** - Identity-carrying handles to
//!   reference-kind values; reference identity is the dedup key of the
//!   whole engine
//! - **[`TypeSchema`] / [`TypeRegistry`]** - Per-type descriptor tables
//!   declaring how a concrete type participates in serialization
//! - **[`GraphWireError`]** - Common error taxonomy for every layer

mod error;
mod field_bag;
mod schema;
mod value;

pub use error::{GraphWireError, GraphWireResult};
pub use field_bag::FieldBag;
pub use schema::{
    getter_of, setter_of, CollectFn, CollectionSpec, ConstructFn, ContractMemberSpec,
    EnumerateFn, FieldSpec, GetterFn, PushFn, SelfDescribingSpec, SetterFn, ShellFn,
    TypeRegistry, TypeSchema, TypeSchemaBuilder, VersionSpan,
};
pub use value::{
    ArrayHandle, ArrayValue, EnumValue, ObjectHandle, PrimitiveKind, ScalarValue, Value,
};
