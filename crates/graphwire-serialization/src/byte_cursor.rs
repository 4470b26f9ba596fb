use byteorder::{ByteOrder, LittleEndian};
use graphwire_structures::{GraphWireError, GraphWireResult, PrimitiveKind, ScalarValue};

//region Reading

/// Forward-only reader over a byte slice. Every read checks the remaining
/// length first and fails with a malformed-frame error rather than returning
/// a short read.
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    pub fn take(&mut self, count: usize) -> GraphWireResult<&'a [u8]> {
        if self.remaining() < count {
            return Err(GraphWireError::MalformedFrame(format!(
                "Needed {} more bytes at position {} but only {} remain!",
                count,
                self.position,
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> GraphWireResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u32(&mut self) -> GraphWireResult<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_i32(&mut self) -> GraphWireResult<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    /// Reads a 4-byte length prefix followed by that many UTF-8 bytes.
    pub fn read_string(&mut self) -> GraphWireResult<String> {
        let length = self.read_u32()? as usize;
        let raw = self.take(length)?;
        String::from_utf8(raw.to_vec()).map_err(|_| {
            GraphWireError::MalformedFrame("String payload is not valid UTF-8!".into())
        })
    }

    /// Reads one fixed-width scalar of the given subtype.
    pub fn read_scalar(&mut self, kind: PrimitiveKind) -> GraphWireResult<ScalarValue> {
        let raw = self.take(kind.byte_width())?;
        Ok(match kind {
            PrimitiveKind::Bool => match raw[0] {
                0 => ScalarValue::Bool(false),
                1 => ScalarValue::Bool(true),
                other => {
                    return Err(GraphWireError::MalformedFrame(format!(
                        "Bool payload must be 0 or 1, got {}!",
                        other
                    )))
                }
            },
            PrimitiveKind::I8 => ScalarValue::I8(raw[0] as i8),
            PrimitiveKind::U8 => ScalarValue::U8(raw[0]),
            PrimitiveKind::I16 => ScalarValue::I16(LittleEndian::read_i16(raw)),
            PrimitiveKind::U16 => ScalarValue::U16(LittleEndian::read_u16(raw)),
            PrimitiveKind::I32 => ScalarValue::I32(LittleEndian::read_i32(raw)),
            PrimitiveKind::U32 => ScalarValue::U32(LittleEndian::read_u32(raw)),
            PrimitiveKind::I64 => ScalarValue::I64(LittleEndian::read_i64(raw)),
            PrimitiveKind::U64 => ScalarValue::U64(LittleEndian::read_u64(raw)),
            PrimitiveKind::F32 => ScalarValue::F32(LittleEndian::read_f32(raw)),
            PrimitiveKind::F64 => ScalarValue::F64(LittleEndian::read_f64(raw)),
            PrimitiveKind::Char => ScalarValue::Char(LittleEndian::read_u16(raw)),
        })
    }
}

//endregion

//region Writing

pub fn put_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

pub fn put_u32(out: &mut Vec<u8>, value: u32) {
    let mut raw = [0u8; 4];
    LittleEndian::write_u32(&mut raw, value);
    out.extend_from_slice(&raw);
}

pub fn put_i32(out: &mut Vec<u8>, value: i32) {
    let mut raw = [0u8; 4];
    LittleEndian::write_i32(&mut raw, value);
    out.extend_from_slice(&raw);
}

/// Writes a 4-byte length prefix followed by the UTF-8 bytes.
pub fn put_string(out: &mut Vec<u8>, value: &str) {
    put_u32(out, value.len() as u32);
    out.extend_from_slice(value.as_bytes());
}

/// Writes one fixed-width scalar (no subtype byte; callers emit that where
/// the layout asks for it).
pub fn put_scalar(out: &mut Vec<u8>, value: ScalarValue) {
    match value {
        ScalarValue::Bool(v) => out.push(u8::from(v)),
        ScalarValue::I8(v) => out.push(v as u8),
        ScalarValue::U8(v) => out.push(v),
        ScalarValue::I16(v) => {
            let mut raw = [0u8; 2];
            LittleEndian::write_i16(&mut raw, v);
            out.extend_from_slice(&raw);
        }
        ScalarValue::U16(v) | ScalarValue::Char(v) => {
            let mut raw = [0u8; 2];
            LittleEndian::write_u16(&mut raw, v);
            out.extend_from_slice(&raw);
        }
        ScalarValue::I32(v) => put_i32(out, v),
        ScalarValue::U32(v) => put_u32(out, v),
        ScalarValue::I64(v) => {
            let mut raw = [0u8; 8];
            LittleEndian::write_i64(&mut raw, v);
            out.extend_from_slice(&raw);
        }
        ScalarValue::U64(v) => {
            let mut raw = [0u8; 8];
            LittleEndian::write_u64(&mut raw, v);
            out.extend_from_slice(&raw);
        }
        ScalarValue::F32(v) => {
            let mut raw = [0u8; 4];
            LittleEndian::write_f32(&mut raw, v);
            out.extend_from_slice(&raw);
        }
        ScalarValue::F64(v) => {
            let mut raw = [0u8; 8];
            LittleEndian::write_f64(&mut raw, v);
            out.extend_from_slice(&raw);
        }
    }
}

//endregion

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_read_fails_instead_of_truncating() {
        let mut cursor = ByteCursor::new(&[1, 2, 3]);
        assert!(matches!(
            cursor.read_u32(),
            Err(GraphWireError::MalformedFrame(_))
        ));
    }

    #[test]
    fn strings_round_trip() {
        let mut out = Vec::new();
        put_string(&mut out, "abc");
        assert_eq!(out, vec![3, 0, 0, 0, b'a', b'b', b'c']);
        let mut cursor = ByteCursor::new(&out);
        assert_eq!(cursor.read_string().unwrap(), "abc");
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn scalars_round_trip_little_endian() {
        let samples = [
            ScalarValue::Bool(true),
            ScalarValue::I8(-5),
            ScalarValue::U16(0xBEEF),
            ScalarValue::I32(-123456),
            ScalarValue::U64(u64::MAX),
            ScalarValue::F64(3.5),
            ScalarValue::Char(0x263A),
        ];
        for sample in samples {
            let mut out = Vec::new();
            put_scalar(&mut out, sample);
            assert_eq!(out.len(), sample.kind().byte_width());
            let mut cursor = ByteCursor::new(&out);
            assert_eq!(cursor.read_scalar(sample.kind()).unwrap(), sample);
        }
    }

    #[test]
    fn bool_payload_is_strict() {
        let mut cursor = ByteCursor::new(&[2]);
        assert!(cursor.read_scalar(PrimitiveKind::Bool).is_err());
    }

    #[test]
    fn u32_is_little_endian() {
        let mut out = Vec::new();
        put_u32(&mut out, 0x0403_0201);
        assert_eq!(out, vec![1, 2, 3, 4]);
    }
}
