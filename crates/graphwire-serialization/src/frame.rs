use std::fmt::{Display, Formatter};

use graphwire_structures::{GraphWireError, GraphWireResult};

use crate::byte_cursor::{put_i32, put_u32, ByteCursor};

/// Fixed sentinel opening every frame.
pub const FRAME_MAGIC: [u8; 4] = *b"GWF1";

/// Total header size: magic(4) + body length(4) + package id(4) + part id(4)
/// + part count(4) + protocol version(16).
pub const FRAME_HEADER_BYTE_COUNT: usize = 36;

//region Protocol Version

/// Four-component wire protocol version. Decoding requires an exact match
/// against the codec's supported version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: i32,
    pub minor: i32,
    pub build: i32,
    pub revision: i32,
}

impl ProtocolVersion {
    pub const SUPPORTED: ProtocolVersion = ProtocolVersion {
        major: 1,
        minor: 0,
        build: 0,
        revision: 0,
    };
}

impl Display for ProtocolVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

//endregion

//region Frame Header

/// The parsed fixed-size frame header. Part id/count allow a payload to be
/// split across frames, but only single-part frames are ever produced and no
/// reassembly is performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub body_length: u32,
    pub package_id: u32,
    pub part_id: u32,
    pub part_count: u32,
    pub version: ProtocolVersion,
}

impl FrameHeader {
    /// Header for the single-part frame every encode call produces.
    pub fn single_part(body_length: u32, package_id: u32, version: ProtocolVersion) -> Self {
        Self {
            body_length,
            package_id,
            part_id: 0,
            part_count: 1,
            version,
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&FRAME_MAGIC);
        put_i32(out, self.body_length as i32);
        put_u32(out, self.package_id);
        put_u32(out, self.part_id);
        put_u32(out, self.part_count);
        put_i32(out, self.version.major);
        put_i32(out, self.version.minor);
        put_i32(out, self.version.build);
        put_i32(out, self.version.revision);
    }

    /// Parses and structurally validates a header. Protocol version equality
    /// is checked separately via [`FrameHeader::verify_version`].
    pub fn read_from(cursor: &mut ByteCursor<'_>) -> GraphWireResult<Self> {
        let magic = cursor.take(4)?;
        if magic != FRAME_MAGIC {
            return Err(GraphWireError::MalformedFrame(format!(
                "Bad magic {:02x?}; expected {:02x?}!",
                magic, FRAME_MAGIC
            )));
        }
        let body_length = cursor.read_i32()?;
        if body_length < 0 {
            return Err(GraphWireError::MalformedFrame(format!(
                "Negative body length {}!",
                body_length
            )));
        }
        let package_id = cursor.read_u32()?;
        let part_id = cursor.read_u32()?;
        let part_count = cursor.read_u32()?;
        if part_count == 0 || part_id >= part_count {
            return Err(GraphWireError::MalformedFrame(format!(
                "Part id {} is inconsistent with part count {}!",
                part_id, part_count
            )));
        }
        let version = ProtocolVersion {
            major: cursor.read_i32()?,
            minor: cursor.read_i32()?,
            build: cursor.read_i32()?,
            revision: cursor.read_i32()?,
        };
        Ok(Self {
            body_length: body_length as u32,
            package_id,
            part_id,
            part_count,
            version,
        })
    }

    /// Fails fast unless the header's version exactly equals `supported`.
    pub fn verify_version(&self, supported: ProtocolVersion) -> GraphWireResult<()> {
        if self.version != supported {
            return Err(GraphWireError::ProtocolVersionMismatch {
                found: self.version.to_string(),
                supported: supported.to_string(),
            });
        }
        Ok(())
    }
}

//endregion

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = FrameHeader::single_part(120, 7, ProtocolVersion::SUPPORTED);
        let mut out = Vec::new();
        header.write_to(&mut out);
        assert_eq!(out.len(), FRAME_HEADER_BYTE_COUNT);
        let mut cursor = ByteCursor::new(&out);
        let parsed = FrameHeader::read_from(&mut cursor).unwrap();
        assert_eq!(parsed, header);
        assert!(parsed.verify_version(ProtocolVersion::SUPPORTED).is_ok());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let header = FrameHeader::single_part(0, 0, ProtocolVersion::SUPPORTED);
        let mut out = Vec::new();
        header.write_to(&mut out);
        out[0] = b'X';
        let mut cursor = ByteCursor::new(&out);
        assert!(matches!(
            FrameHeader::read_from(&mut cursor),
            Err(GraphWireError::MalformedFrame(_))
        ));
    }

    #[test]
    fn inconsistent_parts_are_rejected() {
        let mut header = FrameHeader::single_part(0, 0, ProtocolVersion::SUPPORTED);
        header.part_id = 2;
        header.part_count = 2;
        let mut out = Vec::new();
        header.write_to(&mut out);
        let mut cursor = ByteCursor::new(&out);
        assert!(matches!(
            FrameHeader::read_from(&mut cursor),
            Err(GraphWireError::MalformedFrame(_))
        ));
    }

    #[test]
    fn version_mismatch_is_its_own_error() {
        let version = ProtocolVersion {
            major: 9,
            ..ProtocolVersion::SUPPORTED
        };
        let header = FrameHeader::single_part(0, 0, version);
        let mut out = Vec::new();
        header.write_to(&mut out);
        let mut cursor = ByteCursor::new(&out);
        let parsed = FrameHeader::read_from(&mut cursor).unwrap();
        assert!(matches!(
            parsed.verify_version(ProtocolVersion::SUPPORTED),
            Err(GraphWireError::ProtocolVersionMismatch { .. })
        ));
    }
}
