//! Low-level MessagePack byte reader producing [`Value`] trees.

use instar_core::{ArrayKey, VArray, Value};

use crate::error::UnpackError;

// MsgPack format constants
const MSGPACK_NIL: u8 = 0xc0;
const MSGPACK_FALSE: u8 = 0xc2;
const MSGPACK_TRUE: u8 = 0xc3;
const MSGPACK_BIN8: u8 = 0xc4;
const MSGPACK_BIN16: u8 = 0xc5;
const MSGPACK_BIN32: u8 = 0xc6;
const MSGPACK_FLOAT32: u8 = 0xca;
const MSGPACK_FLOAT64: u8 = 0xcb;
const MSGPACK_UINT8: u8 = 0xcc;
const MSGPACK_UINT16: u8 = 0xcd;
const MSGPACK_UINT32: u8 = 0xce;
const MSGPACK_UINT64: u8 = 0xcf;
const MSGPACK_INT8: u8 = 0xd0;
const MSGPACK_INT16: u8 = 0xd1;
const MSGPACK_INT32: u8 = 0xd2;
const MSGPACK_INT64: u8 = 0xd3;
const MSGPACK_EXT_FIRST: u8 = 0xc7;
const MSGPACK_EXT_LAST: u8 = 0xc9;
const MSGPACK_FIXEXT_FIRST: u8 = 0xd4;
const MSGPACK_FIXEXT_LAST: u8 = 0xd8;
const MSGPACK_STR8: u8 = 0xd9;
const MSGPACK_STR16: u8 = 0xda;
const MSGPACK_STR32: u8 = 0xdb;
const MSGPACK_ARRAY16: u8 = 0xdc;
const MSGPACK_ARRAY32: u8 = 0xdd;
const MSGPACK_MAP16: u8 = 0xde;
const MSGPACK_MAP32: u8 = 0xdf;

const MSGPACK_POSFIXINT_MAX: u8 = 0x7f;
const MSGPACK_FIXMAP_MIN: u8 = 0x80;
const MSGPACK_FIXMAP_MAX: u8 = 0x8f;
const MSGPACK_FIXARRAY_MIN: u8 = 0x90;
const MSGPACK_FIXARRAY_MAX: u8 = 0x9f;
const MSGPACK_FIXSTR_MIN: u8 = 0xa0;
const MSGPACK_FIXSTR_MAX: u8 = 0xbf;
const MSGPACK_NEGFIXINT_MIN: u8 = 0xe0;

/// Containers nested deeper than this are treated as malformed input.
const MAX_NESTING: usize = 128;

/// Decodes MessagePack bytes into [`Value`] trees.
///
/// Instances never come out of a reader; a decoded instance body is a
/// plain array of tags and values until the deserializer types it.
pub struct MsgPackReader<'de> {
    input: &'de [u8],
    pos: usize,
}

impl<'de> MsgPackReader<'de> {
    /// Creates a reader over `input`.
    pub const fn new(input: &'de [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    /// Reads one complete value.
    pub fn read_value(&mut self) -> Result<Value, UnpackError> {
        self.read_value_at(0)
    }

    fn read_value_at(&mut self, nesting: usize) -> Result<Value, UnpackError> {
        if nesting > MAX_NESTING {
            return Err(UnpackError::NestingTooDeep);
        }

        let byte = self.read_byte()?;
        match byte {
            0..=MSGPACK_POSFIXINT_MAX => Ok(Value::Int(i64::from(byte))),
            MSGPACK_FIXMAP_MIN..=MSGPACK_FIXMAP_MAX => {
                self.read_map(usize::from(byte & 0x0f), nesting)
            }
            MSGPACK_FIXARRAY_MIN..=MSGPACK_FIXARRAY_MAX => {
                self.read_array(usize::from(byte & 0x0f), nesting)
            }
            MSGPACK_FIXSTR_MIN..=MSGPACK_FIXSTR_MAX => self.read_str(usize::from(byte & 0x1f)),
            MSGPACK_NIL => Ok(Value::Null),
            MSGPACK_FALSE => Ok(Value::Bool(false)),
            MSGPACK_TRUE => Ok(Value::Bool(true)),
            MSGPACK_BIN8 => {
                let len = usize::from(self.read_byte()?);
                self.read_str(len)
            }
            MSGPACK_BIN16 => {
                let len = usize::from(self.read_u16()?);
                self.read_str(len)
            }
            MSGPACK_BIN32 => {
                let len = self.read_u32()? as usize;
                self.read_str(len)
            }
            MSGPACK_FLOAT32 => {
                let bytes = self.read_bytes(4)?;
                let n = f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                Ok(Value::Float(f64::from(n)))
            }
            MSGPACK_FLOAT64 => {
                let bytes = self.read_bytes(8)?;
                let n = f64::from_be_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
                ]);
                Ok(Value::Float(n))
            }
            MSGPACK_UINT8 => Ok(Value::Int(i64::from(self.read_byte()?))),
            MSGPACK_UINT16 => Ok(Value::Int(i64::from(self.read_u16()?))),
            MSGPACK_UINT32 => Ok(Value::Int(i64::from(self.read_u32()?))),
            MSGPACK_UINT64 => {
                let n = self.read_u64()?;
                i64::try_from(n)
                    .map(Value::Int)
                    .map_err(|_| UnpackError::IntOverflow)
            }
            MSGPACK_INT8 => Ok(Value::Int(i64::from(self.read_byte()? as i8))),
            MSGPACK_INT16 => {
                let bytes = self.read_bytes(2)?;
                Ok(Value::Int(i64::from(i16::from_be_bytes([
                    bytes[0], bytes[1],
                ]))))
            }
            MSGPACK_INT32 => {
                let bytes = self.read_bytes(4)?;
                Ok(Value::Int(i64::from(i32::from_be_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3],
                ]))))
            }
            MSGPACK_INT64 => {
                let bytes = self.read_bytes(8)?;
                Ok(Value::Int(i64::from_be_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
                ])))
            }
            MSGPACK_STR8 => {
                let len = usize::from(self.read_byte()?);
                self.read_str(len)
            }
            MSGPACK_STR16 => {
                let len = usize::from(self.read_u16()?);
                self.read_str(len)
            }
            MSGPACK_STR32 => {
                let len = self.read_u32()? as usize;
                self.read_str(len)
            }
            MSGPACK_ARRAY16 => {
                let len = usize::from(self.read_u16()?);
                self.read_array(len, nesting)
            }
            MSGPACK_ARRAY32 => {
                let len = self.read_u32()? as usize;
                self.read_array(len, nesting)
            }
            MSGPACK_MAP16 => {
                let len = usize::from(self.read_u16()?);
                self.read_map(len, nesting)
            }
            MSGPACK_MAP32 => {
                let len = self.read_u32()? as usize;
                self.read_map(len, nesting)
            }
            MSGPACK_EXT_FIRST..=MSGPACK_EXT_LAST | MSGPACK_FIXEXT_FIRST..=MSGPACK_FIXEXT_LAST => {
                Err(UnpackError::ExtUnsupported)
            }
            MSGPACK_NEGFIXINT_MIN..=0xff => Ok(Value::Int(i64::from(byte as i8))),
            _ => Err(UnpackError::UnknownPrefix { byte }),
        }
    }

    fn read_array(&mut self, len: usize, nesting: usize) -> Result<Value, UnpackError> {
        let mut items = Vec::with_capacity(len.min(4096));
        for _ in 0..len {
            items.push(self.read_value_at(nesting + 1)?);
        }
        Ok(Value::Array(VArray::from_values(items)))
    }

    fn read_map(&mut self, len: usize, nesting: usize) -> Result<Value, UnpackError> {
        let mut arr = VArray::new();
        for _ in 0..len {
            let key = match self.read_value_at(nesting + 1)? {
                Value::Int(i) => ArrayKey::Int(i),
                Value::String(s) => ArrayKey::from_string(s),
                _ => return Err(UnpackError::BadMapKey),
            };
            let value = self.read_value_at(nesting + 1)?;
            arr.insert(key, value);
        }
        Ok(Value::Array(arr))
    }

    fn read_str(&mut self, len: usize) -> Result<Value, UnpackError> {
        let bytes = self.read_bytes(len)?;
        let s = std::str::from_utf8(bytes).map_err(|_| UnpackError::InvalidUtf8)?;
        Ok(Value::String(s.to_string()))
    }

    fn read_byte(&mut self) -> Result<u8, UnpackError> {
        let byte = self
            .input
            .get(self.pos)
            .copied()
            .ok_or(UnpackError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'de [u8], UnpackError> {
        if self.pos + n > self.input.len() {
            return Err(UnpackError::UnexpectedEof);
        }
        let slice = &self.input[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u16(&mut self) -> Result<u16, UnpackError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, UnpackError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&mut self) -> Result<u64, UnpackError> {
        let bytes = self.read_bytes(8)?;
        Ok(u64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }
}
