//! Low-level MessagePack byte writer.
//!
//! Element counts are always known up front here, so headers are written
//! directly instead of being patched in afterwards. Strings always use the
//! str family, never bin, matching the `FORCE_STR` packing of the original
//! runtime.

/// Appends MessagePack-encoded values to an output buffer.
#[derive(Debug, Default)]
pub struct MsgPackWriter {
    out: Vec<u8>,
}

impl MsgPackWriter {
    /// Creates an empty writer.
    pub const fn new() -> Self {
        Self { out: Vec::new() }
    }

    /// Consumes the writer and returns the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.out.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub(crate) fn write_nil(&mut self) {
        self.out.push(0xc0);
    }

    pub(crate) fn write_bool(&mut self, v: bool) {
        self.out.push(if v { 0xc3 } else { 0xc2 });
    }

    fn write_u64(&mut self, n: u64) {
        match n {
            0..=127 => {
                // positive fixint
                self.out.push(n as u8);
            }
            128..=255 => {
                // uint8
                self.out.push(0xcc);
                self.out.push(n as u8);
            }
            256..=65535 => {
                // uint16
                self.out.push(0xcd);
                self.out.extend_from_slice(&(n as u16).to_be_bytes());
            }
            65536..=4294967295 => {
                // uint32
                self.out.push(0xce);
                self.out.extend_from_slice(&(n as u32).to_be_bytes());
            }
            _ => {
                // uint64
                self.out.push(0xcf);
                self.out.extend_from_slice(&n.to_be_bytes());
            }
        }
    }

    /// Writes an integer using the smallest encoding that fits.
    pub fn write_i64(&mut self, n: i64) {
        match n {
            // Non-negative - use the unsigned encoding
            0..=i64::MAX => self.write_u64(n as u64),
            // Negative fixint (-32 to -1)
            -32..=-1 => {
                self.out.push(n as u8);
            }
            // int8 (-128 to -33)
            -128..=-33 => {
                self.out.push(0xd0);
                self.out.push(n as u8);
            }
            // int16
            -32768..=-129 => {
                self.out.push(0xd1);
                self.out.extend_from_slice(&(n as i16).to_be_bytes());
            }
            // int32
            -2147483648..=-32769 => {
                self.out.push(0xd2);
                self.out.extend_from_slice(&(n as i32).to_be_bytes());
            }
            // int64
            _ => {
                self.out.push(0xd3);
                self.out.extend_from_slice(&n.to_be_bytes());
            }
        }
    }

    pub(crate) fn write_f64(&mut self, n: f64) {
        self.out.push(0xcb);
        self.out.extend_from_slice(&n.to_be_bytes());
    }

    pub(crate) fn write_f32(&mut self, n: f32) {
        self.out.push(0xca);
        self.out.extend_from_slice(&n.to_be_bytes());
    }

    /// Writes a string using the str format family.
    pub fn write_str(&mut self, s: &str) {
        let bytes = s.as_bytes();
        let len = bytes.len();

        match len {
            0..=31 => {
                // fixstr
                self.out.push(0xa0 | len as u8);
            }
            32..=255 => {
                // str8
                self.out.push(0xd9);
                self.out.push(len as u8);
            }
            256..=65535 => {
                // str16
                self.out.push(0xda);
                self.out.extend_from_slice(&(len as u16).to_be_bytes());
            }
            _ => {
                // str32
                self.out.push(0xdb);
                self.out.extend_from_slice(&(len as u32).to_be_bytes());
            }
        }
        self.out.extend_from_slice(bytes);
    }

    /// Writes an array header announcing `len` elements.
    pub fn write_array_header(&mut self, len: usize) {
        match len {
            0..=15 => {
                // fixarray
                self.out.push(0x90 | len as u8);
            }
            16..=65535 => {
                // array16
                self.out.push(0xdc);
                self.out.extend_from_slice(&(len as u16).to_be_bytes());
            }
            _ => {
                // array32
                self.out.push(0xdd);
                self.out.extend_from_slice(&(len as u32).to_be_bytes());
            }
        }
    }

    pub(crate) fn write_map_header(&mut self, len: usize) {
        match len {
            0..=15 => {
                // fixmap
                self.out.push(0x80 | len as u8);
            }
            16..=65535 => {
                // map16
                self.out.push(0xde);
                self.out.extend_from_slice(&(len as u16).to_be_bytes());
            }
            _ => {
                // map32
                self.out.push(0xdf);
                self.out.extend_from_slice(&(len as u32).to_be_bytes());
            }
        }
    }
}
