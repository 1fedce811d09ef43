// ByteBuffer - Binary packet serialization/deserialization

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// A byte buffer for reading and writing binary packet data.
/// All multi-byte integers are little-endian, matching the datagram
/// framing. Reads are strict: running past the end is an error, never
/// a silent truncation.
#[derive(Debug, Clone, Default)]
pub struct ByteBuffer {
    data: Vec<u8>,
    read_pos: usize,
}

fn eof() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "ByteBuffer read past end")
}

impl ByteBuffer {
    /// Create a new empty ByteBuffer
    pub fn new() -> Self {
        ByteBuffer {
            data: Vec::new(),
            read_pos: 0,
        }
    }

    /// Create with a pre-allocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        ByteBuffer {
            data: Vec::with_capacity(capacity),
            read_pos: 0,
        }
    }

    /// Wrap received bytes for reading
    pub fn from_bytes(data: &[u8]) -> Self {
        ByteBuffer {
            data: data.to_vec(),
            read_pos: 0,
        }
    }

    /// Get the current size of the buffer
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of unread bytes
    pub fn remaining(&self) -> usize {
        self.data.len() - self.read_pos
    }

    /// Get a pointer to the raw contents
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer, returning the raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    // ---- Write operations (append) ----

    /// Append raw bytes
    pub fn append(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    /// Write a u8
    pub fn write_u8(&mut self, val: u8) {
        self.data.push(val);
    }

    /// Write a u16 (little-endian)
    pub fn write_u16(&mut self, val: u16) {
        self.data.write_u16::<LittleEndian>(val).unwrap();
    }

    /// Write a u32 (little-endian)
    pub fn write_u32(&mut self, val: u32) {
        self.data.write_u32::<LittleEndian>(val).unwrap();
    }

    /// Write a NUL-terminated string
    pub fn write_cstring(&mut self, val: &str) {
        self.data.extend_from_slice(val.as_bytes());
        self.data.push(0);
    }

    /// Write a byte field with a u16 little-endian length prefix
    pub fn write_blob(&mut self, val: &[u8]) {
        self.write_u16(val.len() as u16);
        self.data.extend_from_slice(val);
    }

    // ---- Read operations ----

    /// Read a u8
    pub fn read_u8(&mut self) -> Result<u8, std::io::Error> {
        if self.read_pos >= self.data.len() {
            return Err(eof());
        }
        let val = self.data[self.read_pos];
        self.read_pos += 1;
        Ok(val)
    }

    /// Read a u16 (little-endian)
    pub fn read_u16(&mut self) -> Result<u16, std::io::Error> {
        if self.read_pos + 2 > self.data.len() {
            return Err(eof());
        }
        let mut cursor = Cursor::new(&self.data[self.read_pos..]);
        let val = cursor.read_u16::<LittleEndian>()?;
        self.read_pos += 2;
        Ok(val)
    }

    /// Read a u32 (little-endian)
    pub fn read_u32(&mut self) -> Result<u32, std::io::Error> {
        if self.read_pos + 4 > self.data.len() {
            return Err(eof());
        }
        let mut cursor = Cursor::new(&self.data[self.read_pos..]);
        let val = cursor.read_u32::<LittleEndian>()?;
        self.read_pos += 4;
        Ok(val)
    }

    /// Read a NUL-terminated UTF-8 string of at most `max_raw` bytes
    /// including the terminator. Errors if the terminator is missing
    /// within that window or the bytes are not valid UTF-8.
    pub fn read_cstring(&mut self, max_raw: usize) -> Result<String, std::io::Error> {
        let window_end = self.data.len().min(self.read_pos + max_raw);
        let nul = self.data[self.read_pos..window_end]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "unterminated or over-long string",
                )
            })?;
        let bytes = &self.data[self.read_pos..self.read_pos + nul];
        let s = std::str::from_utf8(bytes)
            .map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, "string is not valid UTF-8")
            })?
            .to_string();
        self.read_pos += nul + 1;
        Ok(s)
    }

    /// Read a u16-length-prefixed byte field
    pub fn read_blob(&mut self) -> Result<Vec<u8>, std::io::Error> {
        let len = self.read_u16()? as usize;
        self.read_bytes(len)
    }

    /// Read N bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, std::io::Error> {
        if self.read_pos + count > self.data.len() {
            return Err(eof());
        }
        let bytes = self.data[self.read_pos..self.read_pos + count].to_vec();
        self.read_pos += count;
        Ok(bytes)
    }
}
