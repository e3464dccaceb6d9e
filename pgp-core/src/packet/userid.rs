//! User ID and User Attribute packets (RFC 4880 §5.11, §5.12).

use std::io::{self, Write};

use buffered_reader::BufferedReader;

use crate::error::Result;

/// A User ID packet: a UTF-8 string, conventionally `Name (Comment)
/// <email>`, but not required to follow that shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserID(Box<[u8]>);

impl UserID {
    /// Wraps raw bytes (User IDs are not guaranteed valid UTF-8 on
    /// the wire, though in practice they always are).
    pub fn from_bytes(bytes: &[u8]) -> UserID {
        UserID(bytes.to_vec().into_boxed_slice())
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// A lossy UTF-8 view, for display and regex matching.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    /// Parses a User ID packet body of `len` bytes.
    pub fn parse<C>(source: &mut dyn BufferedReader<C>, len: usize) -> Result<UserID> {
        let buf = source
            .data_consume_hard(len)
            .map_err(|e| anyhow::Error::new(crate::error::Error::Io(e)))?;
        Ok(UserID(buf[..len].to_vec().into_boxed_slice()))
    }

    /// Serializes the raw bytes (without any packet framing) to `w`.
    pub fn serialize(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(&self.0)
    }

    /// This packet's hash-input prefix for certification signatures:
    /// `0xB4 ‖ u32 len ‖ body` (RFC 4880 §5.2.4).
    pub fn hash_prefix(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(5 + self.0.len());
        out.push(0xB4);
        out.extend_from_slice(&(self.0.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.0);
        out
    }
}

/// A User Attribute packet: a sequence of subpackets, conventionally
/// a single JPEG image subpacket (RFC 4880 §5.12).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserAttribute(Box<[u8]>);

impl UserAttribute {
    /// Wraps the raw subpacket sequence.
    pub fn from_bytes(bytes: &[u8]) -> UserAttribute {
        UserAttribute(bytes.to_vec().into_boxed_slice())
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Parses a User Attribute packet body of `len` bytes.
    pub fn parse<C>(source: &mut dyn BufferedReader<C>, len: usize) -> Result<UserAttribute> {
        let buf = source
            .data_consume_hard(len)
            .map_err(|e| anyhow::Error::new(crate::error::Error::Io(e)))?;
        Ok(UserAttribute(buf[..len].to_vec().into_boxed_slice()))
    }

    /// Serializes the raw bytes to `w`.
    pub fn serialize(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(&self.0)
    }

    /// This packet's hash-input prefix for certification signatures:
    /// `0xD1 ‖ u32 len ‖ body` (RFC 4880 §5.2.4).
    pub fn hash_prefix(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(5 + self.0.len());
        out.push(0xD1);
        out.extend_from_slice(&(self.0.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.0);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_prefix_has_correct_tag_and_length() {
        let uid = UserID::from_bytes(b"Alice <alice@example.org>");
        let prefix = uid.hash_prefix();
        assert_eq!(prefix[0], 0xB4);
        assert_eq!(u32::from_be_bytes(prefix[1..5].try_into().unwrap()), uid.as_bytes().len() as u32);
    }
}
