use thiserror::Error;

use crate::{Heap, HeapError, Object, Value};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("message truncated at byte {0}")]
    Truncated(usize),
    #[error("unknown tag {tag:#04x} at byte {at}")]
    UnknownTag { tag: u8, at: usize },
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
    #[error("invalid utf-8 in string at byte {0}")]
    InvalidUtf8(usize),
    #[error("cannot encode {0}")]
    Unencodable(&'static str),
    #[error(transparent)]
    Heap(#[from] HeapError),
}

/// Turns an object graph into bytes and back inside a target heap.
///
/// Payloads are copies: nothing decoded refers to the sender's heap.
pub trait MessageCodec: Send + Sync {
    fn encode(&self, heap: &Heap, value: Value) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, data: &[u8], heap: &mut Heap) -> Result<Value, CodecError>;
}

const TAG_NULL: u8 = 0x00;
const TAG_FALSE: u8 = 0x01;
const TAG_TRUE: u8 = 0x02;
const TAG_SMI: u8 = 0x03;
const TAG_STRING: u8 = 0x04;
const TAG_BYTES: u8 = 0x05;
const TAG_ARRAY: u8 = 0x06;

/// Arrays nested deeper than this are rejected, which also stops cycles.
pub const MAX_DEPTH: usize = 64;

/// Tagged little-endian format for null, booleans, small integers, strings,
/// byte arrays and arrays of those.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotCodec;

impl SnapshotCodec {
    fn write(
        heap: &Heap,
        value: Value,
        depth: usize,
        out: &mut Vec<u8>,
    ) -> Result<(), CodecError> {
        if depth > MAX_DEPTH {
            return Err(CodecError::Unencodable("nesting deeper than MAX_DEPTH"));
        }
        match value {
            Value::Null => out.push(TAG_NULL),
            Value::Bool(false) => out.push(TAG_FALSE),
            Value::Bool(true) => out.push(TAG_TRUE),
            Value::Smi(i) => {
                out.push(TAG_SMI);
                out.extend_from_slice(&i.to_le_bytes());
            }
            Value::Ref(r) => match heap.get(r) {
                Some(Object::String(s)) => {
                    out.push(TAG_STRING);
                    write_len(out, s.len())?;
                    out.extend_from_slice(s.as_bytes());
                }
                Some(Object::Bytes(b)) => {
                    out.push(TAG_BYTES);
                    write_len(out, b.len())?;
                    out.extend_from_slice(b);
                }
                Some(Object::Array(values)) => {
                    out.push(TAG_ARRAY);
                    write_len(out, values.len())?;
                    for &v in values {
                        Self::write(heap, v, depth + 1, out)?;
                    }
                }
                Some(Object::Instance { .. }) => {
                    return Err(CodecError::Unencodable("instance"));
                }
                Some(Object::Class { .. }) => {
                    return Err(CodecError::Unencodable("class"));
                }
                None => return Err(CodecError::Unencodable("dangling reference")),
            },
        }
        Ok(())
    }
}

fn write_len(out: &mut Vec<u8>, len: usize) -> Result<(), CodecError> {
    let len = u32::try_from(len)
        .map_err(|_| CodecError::Unencodable("length over u32::MAX"))?;
    out.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(CodecError::Truncated(self.data.len()))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn read_len(&mut self) -> Result<usize, CodecError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize)
    }

    fn value(&mut self, heap: &mut Heap, depth: usize) -> Result<Value, CodecError> {
        if depth > MAX_DEPTH {
            return Err(CodecError::Unencodable("nesting deeper than MAX_DEPTH"));
        }
        let at = self.pos;
        let value = match self.u8()? {
            TAG_NULL => Value::Null,
            TAG_FALSE => Value::Bool(false),
            TAG_TRUE => Value::Bool(true),
            TAG_SMI => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(self.take(8)?);
                Value::Smi(i64::from_le_bytes(buf))
            }
            TAG_STRING => {
                let len = self.read_len()?;
                let start = self.pos;
                let s = std::str::from_utf8(self.take(len)?)
                    .map_err(|_| CodecError::InvalidUtf8(start))?;
                Value::Ref(heap.allocate_string(s)?)
            }
            TAG_BYTES => {
                let len = self.read_len()?;
                let bytes = self.take(len)?.to_vec();
                Value::Ref(heap.allocate(Object::Bytes(bytes))?)
            }
            TAG_ARRAY => {
                let len = self.read_len()?;
                // each element is at least one byte
                if len > self.data.len() - self.pos {
                    return Err(CodecError::Truncated(self.data.len()));
                }
                let mut values = Vec::with_capacity(len);
                for _ in 0..len {
                    values.push(self.value(heap, depth + 1)?);
                }
                Value::Ref(heap.allocate(Object::Array(values))?)
            }
            tag => return Err(CodecError::UnknownTag { tag, at }),
        };
        Ok(value)
    }
}

impl MessageCodec for SnapshotCodec {
    fn encode(&self, heap: &Heap, value: Value) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        Self::write(heap, value, 0, &mut out)?;
        Ok(out)
    }

    fn decode(&self, data: &[u8], heap: &mut Heap) -> Result<Value, CodecError> {
        let mut reader = Reader { data, pos: 0 };
        let value = reader.value(heap, 0)?;
        let rest = data.len() - reader.pos;
        if rest != 0 {
            return Err(CodecError::TrailingBytes(rest));
        }
        Ok(value)
    }
}
