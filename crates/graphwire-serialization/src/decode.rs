use std::sync::Arc;

use graphwire_structures::{
    ArrayHandle, ArrayValue, EnumValue, FieldBag, GraphWireError, GraphWireResult, ObjectHandle,
    PrimitiveKind, TypeSchema, Value,
};
use tracing::debug;

use crate::byte_cursor::ByteCursor;
use crate::classifier::{Classifier, Strategy, TypeDescriptor};
use crate::frame::{FrameHeader, ProtocolVersion};
use crate::node::{
    ElementEntry, EntryValue, FieldEntry, NodeBody, NodeKind, NodeRecord, ENTRY_TAG_NULL,
    ENTRY_TAG_REFERENCE, ENTRY_TAG_SCALAR, ENTRY_TAG_STRING,
};

/// Upper bound on the dense element slots one decoded array shell may hold.
/// Extents beyond this are treated as hostile input, not a large array.
const MAX_ARRAY_SHELL_ELEMENTS: u64 = 1 << 24;

/// Decodes one complete frame held in memory.
pub fn decode_frame(
    bytes: &[u8],
    classifier: &Classifier,
    supported: ProtocolVersion,
) -> GraphWireResult<Value> {
    let mut cursor = ByteCursor::new(bytes);
    let header = FrameHeader::read_from(&mut cursor)?;
    header.verify_version(supported)?;
    let body = cursor.take(header.body_length as usize)?;
    if !cursor.is_exhausted() {
        return Err(GraphWireError::MalformedFrame(format!(
            "{} trailing bytes after the frame body!",
            cursor.remaining()
        )));
    }
    decode_body(&header, body, classifier)
}

/// Parses a frame body's node records and reconstructs the graph in two
/// phases: allocate every shell first, then populate - value aggregates
/// before all remaining nodes. Cyclic references resolve because a
/// referenced shell already exists even while still unpopulated.
pub fn decode_body(
    header: &FrameHeader,
    body: &[u8],
    classifier: &Classifier,
) -> GraphWireResult<Value> {
    let records = parse_records(body)?;
    if records.is_empty() {
        return Err(GraphWireError::MalformedFrame(
            "Frame contains no node records!".into(),
        ));
    }
    debug!(
        package_id = header.package_id,
        nodes = records.len(),
        "decoding frame body"
    );

    // Shell pass: one placeholder per node, inline kinds settled immediately.
    let mut descriptors: Vec<Option<Arc<TypeDescriptor>>> = Vec::with_capacity(records.len());
    let mut shells: Vec<Value> = Vec::with_capacity(records.len());
    for record in &records {
        let (shell, descriptor) = allocate_shell(record, classifier)?;
        shells.push(shell);
        descriptors.push(descriptor);
    }

    // Value pass, twice: aggregates carry no construction step and must be
    // fully settled before any reference-node construction logic runs.
    for round in 0..2 {
        for (position, record) in records.iter().enumerate() {
            let is_aggregate = matches!(
                descriptors[position].as_deref().map(TypeDescriptor::strategy),
                Some(Strategy::ValueAggregate)
            );
            if (round == 0) != is_aggregate {
                continue;
            }
            populate_node(record, &shells[position], descriptors[position].as_deref(), &shells, classifier)?;
        }
    }

    Ok(shells[0].clone())
}

//region Record Parsing

fn parse_records(body: &[u8]) -> GraphWireResult<Vec<NodeRecord>> {
    let mut cursor = ByteCursor::new(body);
    let mut records: Vec<NodeRecord> = Vec::new();
    while !cursor.is_exhausted() {
        let id = cursor.read_u32()?;
        if id as usize != records.len() {
            return Err(GraphWireError::MalformedFrame(format!(
                "Node id {} out of order; expected {}!",
                id,
                records.len()
            )));
        }
        let kind = NodeKind::try_from(cursor.read_u8()?)?;
        let subtype = cursor.read_u8()?;
        let _reserved = (cursor.read_u8()?, cursor.read_u8()?);
        let type_name = cursor.read_string()?;
        let body_length = cursor.read_u32()? as usize;
        let node_bytes = cursor.take(body_length)?;
        let mut node_cursor = ByteCursor::new(node_bytes);

        let node_body = match kind {
            NodeKind::Null => NodeBody::Null,
            NodeKind::Object => {
                let field_count = node_cursor.read_u32()? as usize;
                // Wire-supplied counts only size the pre-allocation up to
                // what the remaining bytes could actually hold (a field is
                // at least a length prefix plus a tag byte).
                let mut fields =
                    Vec::with_capacity(field_count.min(node_cursor.remaining() / 5));
                for _ in 0..field_count {
                    let name = node_cursor.read_string()?;
                    let value = read_entry_value(&mut node_cursor)?;
                    fields.push(FieldEntry { name, value });
                }
                NodeBody::Object { fields }
            }
            NodeKind::Array => {
                let rank = node_cursor.read_u32()? as usize;
                if rank == 0 {
                    return Err(GraphWireError::MalformedFrame(
                        "Array node declares rank 0!".into(),
                    ));
                }
                let mut extents = Vec::with_capacity(rank.min(node_cursor.remaining() / 4));
                for _ in 0..rank {
                    extents.push(node_cursor.read_u32()?);
                }
                let entry_count = node_cursor.read_u32()? as usize;
                let mut entries =
                    Vec::with_capacity(entry_count.min(node_cursor.remaining() / 5));
                for _ in 0..entry_count {
                    let mut index = Vec::with_capacity(rank);
                    for _ in 0..rank {
                        index.push(node_cursor.read_u32()?);
                    }
                    let value = read_entry_value(&mut node_cursor)?;
                    entries.push(ElementEntry { index, value });
                }
                NodeBody::Array { extents, entries }
            }
            NodeKind::Scalar => {
                let scalar_kind = PrimitiveKind::try_from(subtype)?;
                NodeBody::Scalar(node_cursor.read_scalar(scalar_kind)?)
            }
            NodeKind::Enum => {
                let scalar_kind = PrimitiveKind::try_from(subtype)?;
                let underlying = node_cursor.read_scalar(scalar_kind)?;
                NodeBody::Enum(
                    EnumValue::new(type_name.clone(), underlying)
                        .map_err(|error| GraphWireError::MalformedFrame(error.to_string()))?,
                )
            }
            NodeKind::String => {
                let raw = node_cursor.take(body_length)?;
                NodeBody::Str(String::from_utf8(raw.to_vec()).map_err(|_| {
                    GraphWireError::MalformedFrame("String node is not valid UTF-8!".into())
                })?)
            }
        };
        if !node_cursor.is_exhausted() {
            return Err(GraphWireError::MalformedFrame(format!(
                "Node {} declares a {} byte body but {} bytes were not consumed!",
                id,
                body_length,
                node_cursor.remaining()
            )));
        }
        records.push(NodeRecord {
            id,
            kind,
            type_name,
            body: node_body,
        });
    }
    Ok(records)
}

fn read_entry_value(cursor: &mut ByteCursor<'_>) -> GraphWireResult<EntryValue> {
    let tag = cursor.read_u8()?;
    match tag {
        ENTRY_TAG_NULL => Ok(EntryValue::Null),
        ENTRY_TAG_REFERENCE => Ok(EntryValue::Reference(cursor.read_u32()?)),
        ENTRY_TAG_SCALAR => {
            let kind = PrimitiveKind::try_from(cursor.read_u8()?)?;
            Ok(EntryValue::Scalar(cursor.read_scalar(kind)?))
        }
        ENTRY_TAG_STRING => Ok(EntryValue::Str(cursor.read_string()?)),
        other => Err(GraphWireError::MalformedFrame(format!(
            "Unknown entry value tag {}!",
            other
        ))),
    }
}

//endregion

//region Shell Pass

fn allocate_shell(
    record: &NodeRecord,
    classifier: &Classifier,
) -> GraphWireResult<(Value, Option<Arc<TypeDescriptor>>)> {
    match &record.body {
        NodeBody::Null => Ok((Value::Null, None)),
        NodeBody::Scalar(scalar) => Ok((Value::Scalar(*scalar), None)),
        NodeBody::Enum(enum_value) => Ok((Value::Enum(enum_value.clone()), None)),
        NodeBody::Str(text) => Ok((Value::Str(text.clone()), None)),
        NodeBody::Array { extents, .. } => {
            // Array bodies are sparse, so the declared extents alone decide
            // how large the dense shell gets. Wire-supplied extents must not
            // be trusted with an unbounded allocation.
            let mut total: u64 = 1;
            for extent in extents {
                total = total.saturating_mul(*extent as u64);
            }
            if total > MAX_ARRAY_SHELL_ELEMENTS {
                return Err(GraphWireError::MalformedFrame(format!(
                    "Array node {} declares {} element slots; at most {} are decodable!",
                    record.id, total, MAX_ARRAY_SHELL_ELEMENTS
                )));
            }
            let array = ArrayValue::new(record.type_name.clone(), extents.clone())
                .map_err(|error| GraphWireError::MalformedFrame(error.to_string()))?;
            Ok((Value::Array(ArrayHandle::new(array)), None))
        }
        NodeBody::Object { .. } => {
            let descriptor = classifier.classify_named(&record.type_name)?;
            let shell = match descriptor.strategy() {
                Strategy::Surrogate(index) => classifier
                    .surrogates()
                    .get(index)
                    .ok_or_else(|| {
                        GraphWireError::BadArgument("Surrogate index out of range!".into())
                    })?
                    .make_shell(),
                _ => descriptor
                    .schema()
                    .ok_or_else(|| {
                        GraphWireError::BadArgument(format!(
                            "Type '{}' classified without a schema!",
                            record.type_name
                        ))
                    })?
                    .make_shell(),
            };
            Ok((
                Value::Object(ObjectHandle::from_boxed(shell)),
                Some(descriptor),
            ))
        }
    }
}

//endregion

//region Value Pass

fn resolve_entry(entry: &EntryValue, shells: &[Value]) -> GraphWireResult<Value> {
    match entry {
        EntryValue::Null => Ok(Value::Null),
        EntryValue::Scalar(scalar) => Ok(Value::Scalar(*scalar)),
        EntryValue::Str(text) => Ok(Value::Str(text.clone())),
        EntryValue::Reference(id) => shells.get(*id as usize).cloned().ok_or_else(|| {
            GraphWireError::MalformedFrame(format!("Reference to unknown node id {}!", id))
        }),
    }
}

fn populate_node(
    record: &NodeRecord,
    shell: &Value,
    descriptor: Option<&TypeDescriptor>,
    shells: &[Value],
    classifier: &Classifier,
) -> GraphWireResult<()> {
    match (&record.body, shell) {
        (NodeBody::Array { entries, .. }, Value::Array(handle)) => {
            let mut array = handle.borrow_mut();
            for entry in entries {
                let element = resolve_entry(&entry.value, shells)?;
                array
                    .set(&entry.index, element)
                    .map_err(|error| GraphWireError::MalformedFrame(error.to_string()))?;
            }
            Ok(())
        }
        (NodeBody::Object { fields }, Value::Object(handle)) => {
            let descriptor = descriptor.ok_or_else(|| {
                GraphWireError::BadArgument("Object node lost its descriptor!".into())
            })?;
            let mut bag = FieldBag::with_capacity(fields.len());
            for field in fields {
                bag.insert(field.name.clone(), resolve_entry(&field.value, shells)?);
            }
            populate_object(record, descriptor, handle, &bag, classifier)
        }
        // Inline kinds and nulls were settled during the shell pass.
        _ => Ok(()),
    }
}

fn populate_object(
    record: &NodeRecord,
    descriptor: &TypeDescriptor,
    handle: &ObjectHandle,
    bag: &FieldBag,
    classifier: &Classifier,
) -> GraphWireResult<()> {
    match descriptor.strategy() {
        Strategy::SelfDescribing => {
            let schema = schema_of(descriptor, record)?;
            let spec = schema.self_describing().ok_or_else(|| {
                GraphWireError::MissingConstructionPath(record.type_name.clone())
            })?;
            handle.replace(spec.reconstruct(bag)?);
            Ok(())
        }
        Strategy::ValueAggregate => {
            // No construction step: the shell is the value, fields are
            // copied straight in.
            assign_declared_fields(schema_of(descriptor, record)?.as_ref(), handle, bag)
        }
        Strategy::DeclaredField => {
            let schema = schema_of(descriptor, record)?;
            if let Some(construct) = schema.reconstruct_ctor() {
                handle.replace(construct(bag)?);
                Ok(())
            } else {
                assign_declared_fields(schema.as_ref(), handle, bag)
            }
        }
        Strategy::DeclaredContract => {
            let schema = schema_of(descriptor, record)?;
            for member in schema.contract_members() {
                let value = bag.get(member.name()).ok_or_else(|| {
                    GraphWireError::ContractViolation(format!(
                        "Member '{}' of type '{}' is absent from decoded data!",
                        member.name(),
                        record.type_name
                    ))
                })?;
                let value = value.clone();
                handle.with_mut(|instance| member.write(instance, value))?;
            }
            Ok(())
        }
        Strategy::Collection => {
            let schema = schema_of(descriptor, record)?;
            let spec = schema.collection().ok_or_else(|| {
                GraphWireError::BadArgument("Collection type lost its hooks!".into())
            })?;
            // Elements are re-added in enumeration order; entry names are
            // just decimal positions and carry no information.
            for (_, element) in bag.iter() {
                let element = element.clone();
                handle.with_mut(|instance| spec.push(instance, element))?;
            }
            Ok(())
        }
        Strategy::Surrogate(index) => {
            let surrogate = classifier.surrogates().get(index).ok_or_else(|| {
                GraphWireError::BadArgument("Surrogate index out of range!".into())
            })?;
            handle.with_mut(|instance| surrogate.populate(instance, bag))
        }
    }
}

fn schema_of<'a>(
    descriptor: &'a TypeDescriptor,
    record: &NodeRecord,
) -> GraphWireResult<&'a Arc<TypeSchema>> {
    descriptor.schema().ok_or_else(|| {
        GraphWireError::BadArgument(format!(
            "Type '{}' classified without a schema!",
            record.type_name
        ))
    })
}

/// Writes every decoded field through the schema's setters. A field absent
/// from the data is left at its shell default when version-gated, and is a
/// contract violation otherwise.
fn assign_declared_fields(
    schema: &TypeSchema,
    handle: &ObjectHandle,
    bag: &FieldBag,
) -> GraphWireResult<()> {
    for field in schema.fields() {
        match bag.get(field.name()) {
            Some(value) => {
                let value = value.clone();
                handle.with_mut(|instance| field.write(instance, value))?;
            }
            None => {
                if field.version_span().is_none() {
                    return Err(GraphWireError::ContractViolation(format!(
                        "Required declared field '{}' of type '{}' is absent from decoded data!",
                        field.name(),
                        schema.type_name()
                    )));
                }
            }
        }
    }
    Ok(())
}

//endregion
