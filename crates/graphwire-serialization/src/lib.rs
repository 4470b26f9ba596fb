//! # Graphwire Serialization
//!
//! Converts an arbitrary, possibly cyclic object graph into a compact
//! self-describing binary frame and reconstructs an equivalent graph from
//! that frame, preserving reference identity throughout.
//!
//! ## Core Components
//!
//! - **[`GraphCodec`]** - Public serialize/deserialize surface, one strategy
//!   cache per instance
//! - **[`Classifier`]** - Picks exactly one [`Strategy`] per concrete type,
//!   in fixed priority order, and caches the decision
//! - **[`SurrogateRegistry`]** - Ordered exact-type collect/populate
//!   fallbacks for types that cannot describe themselves
//! - **[`GraphCollector`]** - Depth-first single-visit traversal producing
//!   the flat id-ordered [`NodeMap`] one frame encodes
//! - **[`FrameHeader`]** / encode / decode - The bit-exact little-endian
//!   wire format and its two-phase shell-then-populate reconstruction
//!
//! ## Basic Usage
//!
//! ```rust
//! use graphwire_serialization::GraphCodec;
//! use graphwire_structures::Value;
//!
//! let codec = GraphCodec::new();
//! let frame = codec.encode_to_vec(&Value::from("hello")).unwrap();
//! let decoded = codec.decode_from_slice(&frame).unwrap();
//! assert_eq!(decoded.as_str(), Some("hello"));
//! ```

mod byte_cursor;
mod classifier;
mod codec;
mod collector;
mod decode;
mod encode;
mod frame;
mod node;
mod surrogate;

pub use byte_cursor::ByteCursor;
pub use classifier::{Classifier, Strategy, TypeDescriptor};
pub use codec::GraphCodec;
pub use collector::GraphCollector;
pub use decode::{decode_body, decode_frame};
pub use encode::encode_frame;
pub use frame::{FrameHeader, ProtocolVersion, FRAME_HEADER_BYTE_COUNT, FRAME_MAGIC};
pub use node::{
    ElementEntry, EntryValue, FieldEntry, NodeBody, NodeId, NodeKind, NodeMap, NodeRecord,
};
pub use surrogate::{PopulateFn, Surrogate, SurrogateRegistry};
