use graphwire_structures::GraphWireResult;
use tracing::debug;

use crate::byte_cursor::{put_scalar, put_string, put_u32, put_u8};
use crate::frame::{FrameHeader, ProtocolVersion};
use crate::node::{EntryValue, NodeBody, NodeMap, NodeRecord};

/// Encodes a collected node map into one complete frame.
///
/// The whole frame is built in memory before any byte reaches a caller's
/// stream, so a failing encode leaves the stream untouched.
pub fn encode_frame(
    map: &NodeMap,
    package_id: u32,
    version: ProtocolVersion,
) -> GraphWireResult<Vec<u8>> {
    let mut body = Vec::new();
    for record in map.iter() {
        encode_node(&mut body, record);
    }

    let header = FrameHeader::single_part(body.len() as u32, package_id, version);
    let mut frame = Vec::with_capacity(crate::frame::FRAME_HEADER_BYTE_COUNT + body.len());
    header.write_to(&mut frame);
    frame.extend_from_slice(&body);
    debug!(
        package_id,
        nodes = map.len(),
        frame_bytes = frame.len(),
        "encoded frame"
    );
    Ok(frame)
}

/// Node layout: id(4) · type tag(4: byte0 major kind, byte1 subtype, bytes
/// 2-3 reserved zero) · type identifier(4+N) · body length(4) · body.
fn encode_node(out: &mut Vec<u8>, record: &NodeRecord) {
    put_u32(out, record.id);
    put_u8(out, record.kind.into());
    put_u8(out, record.subtype_tag());
    put_u8(out, 0);
    put_u8(out, 0);
    put_string(out, &record.type_name);

    let mut body = Vec::new();
    encode_body(&mut body, record);
    put_u32(out, body.len() as u32);
    out.extend_from_slice(&body);
}

fn encode_body(out: &mut Vec<u8>, record: &NodeRecord) {
    match &record.body {
        NodeBody::Null => {}
        NodeBody::Object { fields } => {
            put_u32(out, fields.len() as u32);
            for field in fields {
                put_string(out, &field.name);
                encode_entry_value(out, &field.value);
            }
        }
        NodeBody::Array { extents, entries } => {
            put_u32(out, extents.len() as u32);
            for extent in extents {
                put_u32(out, *extent);
            }
            put_u32(out, entries.len() as u32);
            for entry in entries {
                for position in &entry.index {
                    put_u32(out, *position);
                }
                encode_entry_value(out, &entry.value);
            }
        }
        // Inline roots carry their raw value directly; the subtype already
        // sits in the node's type tag.
        NodeBody::Scalar(scalar) => put_scalar(out, *scalar),
        NodeBody::Enum(enum_value) => put_scalar(out, enum_value.underlying()),
        NodeBody::Str(text) => out.extend_from_slice(text.as_bytes()),
    }
}

/// Entry layout: tag(1) then nothing (null), node id(4) (reference),
/// subtype(1) + fixed-width value (scalar/enum), or 4+N UTF-8 (string).
fn encode_entry_value(out: &mut Vec<u8>, value: &EntryValue) {
    put_u8(out, value.tag());
    match value {
        EntryValue::Null => {}
        EntryValue::Reference(id) => put_u32(out, *id),
        EntryValue::Scalar(scalar) => {
            put_u8(out, scalar.kind().into());
            put_scalar(out, *scalar);
        }
        EntryValue::Str(text) => put_string(out, text),
    }
}
