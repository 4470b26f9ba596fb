use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

use crate::{GraphWireError, GraphWireResult};

//region Primitive Kind

/// Wire subtype tag for the fixed-width primitive set.
///
/// The numeric values appear on the wire (byte 1 of a node's type tag and
/// the subtype byte of inline field payloads) and must never be reordered.
#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum PrimitiveKind {
    Bool = 1u8,
    I8 = 2u8,
    U8 = 3u8,
    I16 = 4u8,
    U16 = 5u8,
    I32 = 6u8,
    U32 = 7u8,
    I64 = 8u8,
    U64 = 9u8,
    F32 = 10u8,
    F64 = 11u8,
    /// A single UTF-16 code unit
    Char = 12u8,
}

impl PrimitiveKind {
    /// Encoded width in bytes of a value of this kind.
    pub fn byte_width(&self) -> usize {
        match self {
            PrimitiveKind::Bool | PrimitiveKind::I8 | PrimitiveKind::U8 => 1,
            PrimitiveKind::I16 | PrimitiveKind::U16 | PrimitiveKind::Char => 2,
            PrimitiveKind::I32 | PrimitiveKind::U32 | PrimitiveKind::F32 => 4,
            PrimitiveKind::I64 | PrimitiveKind::U64 | PrimitiveKind::F64 => 8,
        }
    }

    /// Whether this kind is a legal underlying representation for an enum.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::I8
                | PrimitiveKind::U8
                | PrimitiveKind::I16
                | PrimitiveKind::U16
                | PrimitiveKind::I32
                | PrimitiveKind::U32
                | PrimitiveKind::I64
                | PrimitiveKind::U64
        )
    }
}

impl From<PrimitiveKind> for u8 {
    fn from(value: PrimitiveKind) -> u8 {
        value as u8
    }
}

impl TryFrom<u8> for PrimitiveKind {
    type Error = GraphWireError;
    fn try_from(value: u8) -> Result<Self, GraphWireError> {
        match value {
            1 => Ok(PrimitiveKind::Bool),
            2 => Ok(PrimitiveKind::I8),
            3 => Ok(PrimitiveKind::U8),
            4 => Ok(PrimitiveKind::I16),
            5 => Ok(PrimitiveKind::U16),
            6 => Ok(PrimitiveKind::I32),
            7 => Ok(PrimitiveKind::U32),
            8 => Ok(PrimitiveKind::I64),
            9 => Ok(PrimitiveKind::U64),
            10 => Ok(PrimitiveKind::F32),
            11 => Ok(PrimitiveKind::F64),
            12 => Ok(PrimitiveKind::Char),
            _ => Err(GraphWireError::MalformedFrame(format!(
                "Unknown primitive subtype tag {}",
                value
            ))),
        }
    }
}

impl Display for PrimitiveKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::U16 => "u16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::U32 => "u32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
            PrimitiveKind::Char => "char",
        };
        write!(f, "{name}")
    }
}

//endregion

//region Scalar Value

/// One inline fixed-width primitive value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    /// A single UTF-16 code unit
    Char(u16),
}

impl ScalarValue {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            ScalarValue::Bool(_) => PrimitiveKind::Bool,
            ScalarValue::I8(_) => PrimitiveKind::I8,
            ScalarValue::U8(_) => PrimitiveKind::U8,
            ScalarValue::I16(_) => PrimitiveKind::I16,
            ScalarValue::U16(_) => PrimitiveKind::U16,
            ScalarValue::I32(_) => PrimitiveKind::I32,
            ScalarValue::U32(_) => PrimitiveKind::U32,
            ScalarValue::I64(_) => PrimitiveKind::I64,
            ScalarValue::U64(_) => PrimitiveKind::U64,
            ScalarValue::F32(_) => PrimitiveKind::F32,
            ScalarValue::F64(_) => PrimitiveKind::F64,
            ScalarValue::Char(_) => PrimitiveKind::Char,
        }
    }
}

impl Display for ScalarValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarValue::Bool(v) => write!(f, "{v}"),
            ScalarValue::I8(v) => write!(f, "{v}"),
            ScalarValue::U8(v) => write!(f, "{v}"),
            ScalarValue::I16(v) => write!(f, "{v}"),
            ScalarValue::U16(v) => write!(f, "{v}"),
            ScalarValue::I32(v) => write!(f, "{v}"),
            ScalarValue::U32(v) => write!(f, "{v}"),
            ScalarValue::I64(v) => write!(f, "{v}"),
            ScalarValue::U64(v) => write!(f, "{v}"),
            ScalarValue::F32(v) => write!(f, "{v}"),
            ScalarValue::F64(v) => write!(f, "{v}"),
            ScalarValue::Char(v) => write!(f, "\\u{v:04x}"),
        }
    }
}

//endregion

//region Enum Value

/// An enum constant: the declaring type's identifier plus the constant's
/// underlying integer representation.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    type_name: String,
    underlying: ScalarValue,
}

impl EnumValue {
    pub fn new(type_name: impl Into<String>, underlying: ScalarValue) -> GraphWireResult<Self> {
        if !underlying.kind().is_integer() {
            return Err(GraphWireError::BadArgument(format!(
                "Enum underlying representation must be an integer subtype, got {}!",
                underlying.kind()
            )));
        }
        Ok(Self {
            type_name: type_name.into(),
            underlying,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn underlying(&self) -> ScalarValue {
        self.underlying
    }
}

//endregion

//region Object Handle

/// A shared, identity-carrying handle to one reference-kind object.
///
/// Reference identity (the dedup key of the graph collector, and the thing
/// the decoder's shell pass preserves) is the `Rc` allocation itself. The
/// boxed contents may be replaced in place during the decode value pass
/// without disturbing any outstanding reference to this handle.
#[derive(Clone)]
pub struct ObjectHandle {
    cell: Rc<RefCell<Box<dyn Any>>>,
}

impl ObjectHandle {
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            cell: Rc::new(RefCell::new(Box::new(value))),
        }
    }

    pub fn from_boxed(boxed: Box<dyn Any>) -> Self {
        Self {
            cell: Rc::new(RefCell::new(boxed)),
        }
    }

    /// Stable identity of the referenced allocation, valid for the handle's
    /// lifetime. Two handles to the same object compare equal.
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.cell) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &ObjectHandle) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    /// `TypeId` of the concrete value currently held behind the handle.
    pub fn concrete_type_id(&self) -> TypeId {
        let contents = self.cell.borrow();
        (**contents).type_id()
    }

    /// Runs `f` against the held value.
    pub fn with<R>(&self, f: impl FnOnce(&dyn Any) -> R) -> R {
        let contents = self.cell.borrow();
        f(&**contents)
    }

    /// Runs `f` against the held value mutably.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut dyn Any) -> R) -> R {
        let mut contents = self.cell.borrow_mut();
        f(&mut **contents)
    }

    /// Runs `f` against the held value downcast to `T`, or returns `None` if
    /// the handle holds some other concrete type.
    pub fn map_as<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let contents = self.cell.borrow();
        contents.downcast_ref::<T>().map(f)
    }

    /// Mutable counterpart of [`ObjectHandle::map_as`].
    pub fn map_as_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut contents = self.cell.borrow_mut();
        contents.downcast_mut::<T>().map(f)
    }

    /// Replaces the held value, preserving the handle's identity. This is the
    /// decode-side construction step: shells are allocated first so cyclic
    /// references resolve, then contents are swapped in.
    pub fn replace(&self, boxed: Box<dyn Any>) {
        *self.cell.borrow_mut() = boxed;
    }
}

impl Debug for ObjectHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectHandle(0x{:x})", self.identity())
    }
}

//endregion

//region Array Value

/// A multi-dimensional array of [`Value`] elements with a declared
/// element-type identifier, stored row-major.
#[derive(Debug)]
pub struct ArrayValue {
    element_type: String,
    extents: Vec<u32>,
    elements: Vec<Value>,
}

impl ArrayValue {
    pub fn new(element_type: impl Into<String>, extents: Vec<u32>) -> GraphWireResult<Self> {
        if extents.is_empty() {
            return Err(GraphWireError::BadArgument(
                "Array rank must be at least 1!".into(),
            ));
        }
        let mut total: usize = 1;
        for extent in &extents {
            total = total.checked_mul(*extent as usize).ok_or_else(|| {
                GraphWireError::BadArgument("Array extents overflow addressable size!".into())
            })?;
        }
        // The element vector itself must stay addressable; without this check
        // Vec::with_capacity aborts instead of reporting the bad extents.
        let footprint = total
            .checked_mul(std::mem::size_of::<Value>())
            .filter(|bytes| *bytes <= isize::MAX as usize);
        if footprint.is_none() {
            return Err(GraphWireError::BadArgument(
                "Array extents overflow addressable size!".into(),
            ));
        }
        let mut elements = Vec::with_capacity(total);
        elements.resize_with(total, || Value::Null);
        Ok(Self {
            element_type: element_type.into(),
            extents,
            elements,
        })
    }

    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    pub fn extents(&self) -> &[u32] {
        &self.extents
    }

    /// Total number of element slots across all dimensions.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    /// Converts a multi-dimensional index tuple into the row-major flat index.
    pub fn flat_index(&self, index: &[u32]) -> GraphWireResult<usize> {
        if index.len() != self.extents.len() {
            return Err(GraphWireError::BadArgument(format!(
                "Index tuple of rank {} given for array of rank {}!",
                index.len(),
                self.extents.len()
            )));
        }
        let mut flat: usize = 0;
        for (position, extent) in index.iter().zip(&self.extents) {
            if position >= extent {
                return Err(GraphWireError::BadArgument(format!(
                    "Index {} out of bounds for extent {}!",
                    position, extent
                )));
            }
            flat = flat * (*extent as usize) + (*position as usize);
        }
        Ok(flat)
    }

    /// Converts a row-major flat index back into its index tuple.
    pub fn index_tuple(&self, mut flat: usize) -> Vec<u32> {
        let mut tuple = vec![0u32; self.extents.len()];
        for dimension in (0..self.extents.len()).rev() {
            let extent = self.extents[dimension] as usize;
            tuple[dimension] = (flat % extent) as u32;
            flat /= extent;
        }
        tuple
    }

    pub fn get(&self, index: &[u32]) -> GraphWireResult<&Value> {
        let flat = self.flat_index(index)?;
        Ok(&self.elements[flat])
    }

    pub fn set(&mut self, index: &[u32], value: Value) -> GraphWireResult<()> {
        let flat = self.flat_index(index)?;
        self.elements[flat] = value;
        Ok(())
    }

    pub fn set_flat(&mut self, flat: usize, value: Value) -> GraphWireResult<()> {
        if flat >= self.elements.len() {
            return Err(GraphWireError::BadArgument(format!(
                "Flat index {} out of bounds for array of {} elements!",
                flat,
                self.elements.len()
            )));
        }
        self.elements[flat] = value;
        Ok(())
    }
}

/// Shared, identity-carrying handle to an [`ArrayValue`].
#[derive(Clone, Debug)]
pub struct ArrayHandle {
    cell: Rc<RefCell<ArrayValue>>,
}

impl ArrayHandle {
    pub fn new(array: ArrayValue) -> Self {
        Self {
            cell: Rc::new(RefCell::new(array)),
        }
    }

    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.cell) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &ArrayHandle) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    pub fn borrow(&self) -> Ref<'_, ArrayValue> {
        self.cell.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, ArrayValue> {
        self.cell.borrow_mut()
    }
}

//endregion

//region Value

/// One dynamic value in an object graph.
///
/// `Null`, `Object` and `Array` are reference kinds: the graph collector
/// assigns them node records of their own. Scalars, strings and enums are
/// inline kinds, embedded directly in whichever field or element holds them.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Scalar(ScalarValue),
    Str(String),
    Enum(EnumValue),
    Object(ObjectHandle),
    Array(ArrayHandle),
}

impl Value {
    /// Whether this value is addressed through a node record of its own
    /// rather than inlined into its containing entry.
    pub fn is_reference_kind(&self) -> bool {
        matches!(self, Value::Null | Value::Object(_) | Value::Array(_))
    }

    pub fn object<T: Any>(value: T) -> Value {
        Value::Object(ObjectHandle::new(value))
    }

    pub fn array(array: ArrayValue) -> Value {
        Value::Array(ArrayHandle::new(array))
    }

    pub fn as_scalar(&self) -> Option<ScalarValue> {
        match self {
            Value::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectHandle> {
        match self {
            Value::Object(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayHandle> {
        match self {
            Value::Array(handle) => Some(handle),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Scalar(ScalarValue::Bool(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Value {
        Value::Scalar(ScalarValue::I32(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Scalar(ScalarValue::I64(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Value {
        Value::Scalar(ScalarValue::U32(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Value {
        Value::Scalar(ScalarValue::U64(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Value {
        Value::Scalar(ScalarValue::F32(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Scalar(ScalarValue::F64(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Str(v)
    }
}

//endregion

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_kind_tags_round_trip() {
        for tag in 1u8..=12u8 {
            let kind = PrimitiveKind::try_from(tag).unwrap();
            assert_eq!(u8::from(kind), tag);
        }
        assert!(PrimitiveKind::try_from(0).is_err());
        assert!(PrimitiveKind::try_from(13).is_err());
    }

    #[test]
    fn enum_value_rejects_non_integer_underlying() {
        assert!(EnumValue::new("Color", ScalarValue::F32(1.0)).is_err());
        assert!(EnumValue::new("Color", ScalarValue::I32(1)).is_ok());
    }

    #[test]
    fn object_handle_identity_tracks_allocation() {
        let first = ObjectHandle::new(5i32);
        let alias = first.clone();
        let other = ObjectHandle::new(5i32);
        assert!(first.ptr_eq(&alias));
        assert_eq!(first.identity(), alias.identity());
        assert_ne!(first.identity(), other.identity());
    }

    #[test]
    fn object_handle_replace_preserves_identity() {
        let handle = ObjectHandle::new(1i32);
        let before = handle.identity();
        handle.replace(Box::new("swapped".to_string()));
        assert_eq!(handle.identity(), before);
        assert_eq!(
            handle.map_as(|s: &String| s.clone()),
            Some("swapped".to_string())
        );
    }

    #[test]
    fn array_flat_indexing_is_row_major() {
        let array = ArrayValue::new("i32", vec![2, 3]).unwrap();
        assert_eq!(array.flat_index(&[0, 0]).unwrap(), 0);
        assert_eq!(array.flat_index(&[0, 2]).unwrap(), 2);
        assert_eq!(array.flat_index(&[1, 0]).unwrap(), 3);
        assert_eq!(array.flat_index(&[1, 2]).unwrap(), 5);
        assert_eq!(array.index_tuple(4), vec![1, 1]);
        assert!(array.flat_index(&[2, 0]).is_err());
        assert!(array.flat_index(&[0]).is_err());
    }

    #[test]
    fn array_rejects_zero_rank() {
        assert!(ArrayValue::new("i32", vec![]).is_err());
    }

    #[test]
    fn array_rejects_unaddressable_extents() {
        // The slot count squeaks past a usize product check but the element
        // vector's byte footprint does not; this must fail, not abort.
        assert!(matches!(
            ArrayValue::new("i32", vec![u32::MAX, u32::MAX]),
            Err(GraphWireError::BadArgument(_))
        ));
        assert!(matches!(
            ArrayValue::new("i32", vec![u32::MAX, u32::MAX, u32::MAX]),
            Err(GraphWireError::BadArgument(_))
        ));
    }
}
