use std::io::{ErrorKind, Read, Write};

use graphwire_structures::{
    GraphWireError, GraphWireResult, TypeRegistry, TypeSchema, Value,
};
use tracing::debug;

use crate::classifier::Classifier;
use crate::collector::GraphCollector;
use crate::decode::decode_frame;
use crate::encode::encode_frame;
use crate::frame::{ProtocolVersion, FRAME_HEADER_BYTE_COUNT};
use crate::surrogate::{Surrogate, SurrogateRegistry};

/// The object-graph serialization engine.
///
/// One codec instance owns a type registry, a surrogate registry and the
/// memoized strategy cache; the cache persists across calls while every
/// serialize/deserialize call is otherwise self-contained. Both directions
/// are synchronous and deterministic - node ids appear on the wire, so
/// traversal order is part of the format.
pub struct GraphCodec {
    classifier: Classifier,
    supported_version: ProtocolVersion,
}

impl GraphCodec {
    /// A codec with an empty type registry and the built-in surrogates.
    pub fn new() -> Self {
        Self::with_registry(TypeRegistry::new())
    }

    /// A codec over a pre-populated type registry, with built-in surrogates.
    pub fn with_registry(registry: TypeRegistry) -> Self {
        Self {
            classifier: Classifier::new(registry, SurrogateRegistry::with_builtins()),
            supported_version: ProtocolVersion::SUPPORTED,
        }
    }

    pub fn supported_version(&self) -> ProtocolVersion {
        self.supported_version
    }

    /// Registers a type schema for classification.
    pub fn register_type(&mut self, schema: TypeSchema) -> GraphWireResult<()> {
        self.classifier.register_type(schema)
    }

    /// Appends a surrogate to the registry; earlier registrations win on a
    /// target-type tie.
    pub fn register_surrogate(&mut self, surrogate: Surrogate) {
        self.classifier.register_surrogate(surrogate);
    }

    /// Encodes `root` into a single frame with package id 0. Re-encoding an
    /// unchanged graph reproduces byte-identical output.
    pub fn encode_to_vec(&self, root: &Value) -> GraphWireResult<Vec<u8>> {
        self.encode_package(root, 0)
    }

    /// Encodes `root` with a caller-chosen logical package id.
    pub fn encode_package(&self, root: &Value, package_id: u32) -> GraphWireResult<Vec<u8>> {
        let map = GraphCollector::new(&self.classifier).collect(root)?;
        encode_frame(&map, package_id, self.supported_version)
    }

    /// Decodes one complete frame held in memory.
    pub fn decode_from_slice(&self, bytes: &[u8]) -> GraphWireResult<Value> {
        decode_frame(bytes, &self.classifier, self.supported_version)
    }

    /// Serializes `root` onto `writer`. On failure nothing is written: the
    /// frame is fully built in memory first.
    pub fn serialize(&self, writer: &mut impl Write, root: &Value) -> GraphWireResult<()> {
        let frame = self.encode_to_vec(root)?;
        writer
            .write_all(&frame)
            .map_err(|error| GraphWireError::StreamFailure(error.to_string()))?;
        debug!(frame_bytes = frame.len(), "serialized graph to stream");
        Ok(())
    }

    /// Reads and decodes exactly one frame from `reader`.
    pub fn deserialize(&self, reader: &mut impl Read) -> GraphWireResult<Value> {
        let mut header_bytes = [0u8; FRAME_HEADER_BYTE_COUNT];
        read_exact(reader, &mut header_bytes)?;
        let mut cursor = crate::byte_cursor::ByteCursor::new(&header_bytes);
        let header = crate::frame::FrameHeader::read_from(&mut cursor)?;
        header.verify_version(self.supported_version)?;

        let mut frame = Vec::with_capacity(FRAME_HEADER_BYTE_COUNT + header.body_length as usize);
        frame.extend_from_slice(&header_bytes);
        frame.resize(FRAME_HEADER_BYTE_COUNT + header.body_length as usize, 0);
        read_exact(reader, &mut frame[FRAME_HEADER_BYTE_COUNT..])?;
        self.decode_from_slice(&frame)
    }

    /// Non-throwing serialize: true on success, false (and an untouched
    /// stream) on any failure.
    pub fn try_serialize(&self, writer: &mut impl Write, root: &Value) -> bool {
        self.serialize(writer, root).is_ok()
    }

    /// Non-throwing deserialize: `None` on any failure.
    pub fn try_deserialize(&self, reader: &mut impl Read) -> Option<Value> {
        self.deserialize(reader).ok()
    }
}

impl Default for GraphCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Fails immediately when fewer bytes are available than requested rather
/// than surfacing a short read.
fn read_exact(reader: &mut impl Read, buffer: &mut [u8]) -> GraphWireResult<()> {
    reader.read_exact(buffer).map_err(|error| {
        if error.kind() == ErrorKind::UnexpectedEof {
            GraphWireError::MalformedFrame(format!(
                "Stream ended before {} requested bytes were available!",
                buffer.len()
            ))
        } else {
            GraphWireError::StreamFailure(error.to_string())
        }
    })
}
