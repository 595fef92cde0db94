//! Binary wire codec: [`NetworkString`] and the [`WireCodec`] trait.
//!
//! `NetworkString` wraps a [`BytesMut`]. Writers append big-endian
//! integers and length-prefixed strings with [`BufMut`]; readers consume
//! them in the same order through the non-panicking `try_get_*` side of
//! [`Buf`] and get a [`ProtocolError`] when the message is short.

use std::fmt;

use bytes::{Buf, BufMut, BytesMut};
use kartlobby_transport::HostId;

use crate::{LobbyEvent, ProtocolError};

/// A type that knows how to write itself into, and read itself out of,
/// a [`NetworkString`].
pub trait WireCodec: Sized {
    /// Appends the encoded value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::StringTooLong`] if a string field does not
    /// fit its length prefix.
    fn encode(&self, ns: &mut NetworkString) -> Result<(), ProtocolError>;

    /// Reads a value starting at the current cursor.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Truncated`] if the buffer ends early, or a
    /// string decoding error.
    fn decode(ns: &mut NetworkString) -> Result<Self, ProtocolError>;
}

// ---------------------------------------------------------------------------
// WideString
// ---------------------------------------------------------------------------

/// A display name stored as 16-bit code units.
///
/// Player names travel as opaque UTF-16 so they survive any locale
/// unchanged. Nothing here normalizes or validates the units; conversion
/// to `String` happens only for display, lossily.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WideString(Vec<u16>);

impl WideString {
    /// Wraps raw code units.
    pub fn from_units(units: Vec<u16>) -> Self {
        Self(units)
    }

    /// The raw code units.
    pub fn units(&self) -> &[u16] {
        &self.0
    }

    /// Number of code units (not characters).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lossy conversion for logs and UI.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.0)
    }

    /// Appends another wide string.
    pub fn push_wide(&mut self, other: &WideString) {
        self.0.extend_from_slice(&other.0);
    }
}

impl From<&str> for WideString {
    fn from(s: &str) -> Self {
        Self(s.encode_utf16().collect())
    }
}

impl From<String> for WideString {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl PartialEq<str> for WideString {
    fn eq(&self, other: &str) -> bool {
        self.0.iter().copied().eq(other.encode_utf16())
    }
}

impl PartialEq<&str> for WideString {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl WireCodec for WideString {
    fn encode(&self, ns: &mut NetworkString) -> Result<(), ProtocolError> {
        ns.encode_wstring(self)?;
        Ok(())
    }

    fn decode(ns: &mut NetworkString) -> Result<Self, ProtocolError> {
        ns.decode_wstring()
    }
}

impl fmt::Display for WideString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

// ---------------------------------------------------------------------------
// NetworkString
// ---------------------------------------------------------------------------

/// A lobby message under construction or being parsed.
///
/// Reads consume bytes from the front, so after parsing has started
/// [`as_bytes`](Self::as_bytes) returns only what is left.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkString {
    buf: BytesMut,
}

impl NetworkString {
    /// Longest narrow string a one-byte prefix can describe.
    pub const MAX_STRING_LEN: usize = u8::MAX as usize;
    /// Longest wide string a two-byte prefix can describe.
    pub const MAX_WSTRING_LEN: usize = u16::MAX as usize;

    /// Starts an outgoing message with the given opcode.
    pub fn new(event: LobbyEvent) -> Self {
        let mut buf = BytesMut::new();
        buf.put_u8(event.into());
        Self { buf }
    }

    /// Wraps received bytes for reading.
    pub fn from_bytes(data: impl AsRef<[u8]>) -> Self {
        Self {
            buf: BytesMut::from(data.as_ref()),
        }
    }

    /// Reads the opcode byte.
    ///
    /// # Errors
    /// [`ProtocolError::Empty`] for a zero-length message,
    /// [`ProtocolError::UnknownOpcode`] for an unrecognized first byte.
    pub fn read_event(&mut self) -> Result<LobbyEvent, ProtocolError> {
        if !self.buf.has_remaining() {
            return Err(ProtocolError::Empty);
        }
        LobbyEvent::try_from(self.get_u8()?)
    }

    /// The unread bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// The unread bytes, owned.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.to_vec()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes not yet consumed by reads.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    // -- writing --

    /// Appends one byte.
    pub fn add_u8(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    /// Appends `1` for `true`, `0` for `false`.
    pub fn add_bool(&mut self, value: bool) -> &mut Self {
        self.add_u8(u8::from(value))
    }

    /// Appends a big-endian `u16`.
    pub fn add_u16(&mut self, value: u16) -> &mut Self {
        self.buf.put_u16(value);
        self
    }

    /// Appends a big-endian `u32`.
    pub fn add_u32(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32(value);
        self
    }

    /// Appends a host id as a big-endian `u32`.
    pub fn add_host_id(&mut self, host: HostId) -> &mut Self {
        self.add_u32(host.to_wire())
    }

    /// Appends `[u8 len][utf-8 bytes]`.
    pub fn encode_string(&mut self, value: &str) -> Result<&mut Self, ProtocolError> {
        let len = value.len();
        if len > Self::MAX_STRING_LEN {
            return Err(ProtocolError::StringTooLong {
                len,
                max: Self::MAX_STRING_LEN,
            });
        }
        self.buf.put_u8(len as u8);
        self.buf.put_slice(value.as_bytes());
        Ok(self)
    }

    /// Appends `[u16 len][len x u16 code units]`, all big-endian.
    pub fn encode_wstring(&mut self, value: &WideString) -> Result<&mut Self, ProtocolError> {
        let len = value.len();
        if len > Self::MAX_WSTRING_LEN {
            return Err(ProtocolError::StringTooLong {
                len,
                max: Self::MAX_WSTRING_LEN,
            });
        }
        self.buf.reserve(2 + 2 * len);
        self.buf.put_u16(len as u16);
        for unit in value.units() {
            self.buf.put_u16(*unit);
        }
        Ok(self)
    }

    /// Appends any [`WireCodec`] value.
    pub fn encode<T: WireCodec>(&mut self, value: &T) -> Result<&mut Self, ProtocolError> {
        value.encode(self)?;
        Ok(self)
    }

    /// Appends `[u8 count]` followed by each item.
    pub fn encode_list<T: WireCodec>(&mut self, items: &[T]) -> Result<&mut Self, ProtocolError> {
        let count = u8::try_from(items.len()).map_err(|_| ProtocolError::ListTooLong {
            len: items.len(),
            max: usize::from(u8::MAX),
        })?;
        self.add_u8(count);
        for item in items {
            item.encode(self)?;
        }
        Ok(self)
    }

    // -- reading --

    fn ensure(&self, needed: usize) -> Result<(), ProtocolError> {
        let remaining = self.buf.remaining();
        if needed > remaining {
            return Err(ProtocolError::Truncated { needed, remaining });
        }
        Ok(())
    }

    /// Reads one byte.
    pub fn get_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.buf.try_get_u8()?)
    }

    /// Reads a byte as a flag: any non-zero value is `true`.
    pub fn get_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.get_u8()? != 0)
    }

    /// Reads a big-endian `u16`.
    pub fn get_u16(&mut self) -> Result<u16, ProtocolError> {
        Ok(self.buf.try_get_u16()?)
    }

    /// Reads a big-endian `u32`.
    pub fn get_u32(&mut self) -> Result<u32, ProtocolError> {
        Ok(self.buf.try_get_u32()?)
    }

    /// Reads a host id written by [`add_host_id`](Self::add_host_id).
    pub fn get_host_id(&mut self) -> Result<HostId, ProtocolError> {
        Ok(HostId::from_wire(self.get_u32()?))
    }

    /// Reads a string written by [`encode_string`](Self::encode_string).
    pub fn decode_string(&mut self) -> Result<String, ProtocolError> {
        let len = usize::from(self.get_u8()?);
        self.ensure(len)?;
        let bytes = self.buf.split_to(len);
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    /// Reads a wide string written by [`encode_wstring`](Self::encode_wstring).
    pub fn decode_wstring(&mut self) -> Result<WideString, ProtocolError> {
        let len = usize::from(self.get_u16()?);
        self.ensure(2 * len)?;
        let units = (0..len).map(|_| self.buf.get_u16()).collect();
        Ok(WideString::from_units(units))
    }

    /// Reads any [`WireCodec`] value.
    pub fn decode<T: WireCodec>(&mut self) -> Result<T, ProtocolError> {
        T::decode(self)
    }

    /// Reads a list written by [`encode_list`](Self::encode_list).
    pub fn decode_list<T: WireCodec>(&mut self) -> Result<Vec<T>, ProtocolError> {
        let count = usize::from(self.get_u8()?);
        (0..count).map(|_| T::decode(self)).collect()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_writes_opcode_first() {
        let ns = NetworkString::new(LobbyEvent::Vote);
        assert_eq!(ns.as_bytes(), &[16]);
    }

    #[test]
    fn test_string_layout_is_length_then_bytes() {
        let mut ns = NetworkString::default();
        ns.encode_string("abc").unwrap();
        assert_eq!(ns.as_bytes(), &[3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_wstring_layout_is_big_endian_units() {
        let mut ns = NetworkString::default();
        ns.encode_wstring(&WideString::from("Lé")).unwrap();
        // len = 2, 'L' = 0x004C, 'é' = 0x00E9
        assert_eq!(ns.as_bytes(), &[0, 2, 0x00, 0x4C, 0x00, 0xE9]);
    }

    #[test]
    fn test_wstring_keeps_surrogate_pairs_and_lone_units() {
        let name = WideString::from_units(vec![0xD83C, 0xDFCE, 0xD800]);
        let mut ns = NetworkString::default();
        ns.encode_wstring(&name).unwrap();
        let decoded = NetworkString::from_bytes(ns.into_bytes())
            .decode_wstring()
            .unwrap();
        assert_eq!(decoded, name);
    }

    #[test]
    fn test_integers_are_big_endian() {
        let mut ns = NetworkString::default();
        ns.add_u16(0x0102).add_u32(0x0A0B_0C0D);
        assert_eq!(ns.as_bytes(), &[1, 2, 0x0A, 0x0B, 0x0C, 0x0D]);
    }

    #[test]
    fn test_reads_follow_writes() {
        let mut ns = NetworkString::new(LobbyEvent::LoadWorld);
        ns.encode_string("hacienda")
            .unwrap()
            .add_u8(3)
            .add_bool(true)
            .add_host_id(HostId(1000));

        let mut rx = NetworkString::from_bytes(ns.into_bytes());
        assert_eq!(rx.read_event().unwrap(), LobbyEvent::LoadWorld);
        assert_eq!(rx.decode_string().unwrap(), "hacienda");
        assert_eq!(rx.get_u8().unwrap(), 3);
        assert!(rx.get_bool().unwrap());
        assert_eq!(rx.get_host_id().unwrap(), HostId(1000));
        assert_eq!(rx.remaining(), 0);
    }

    #[test]
    fn test_any_nonzero_byte_is_true() {
        let mut rx = NetworkString::from_bytes([0u8, 1, 7]);
        assert!(!rx.get_bool().unwrap());
        assert!(rx.get_bool().unwrap());
        assert!(rx.get_bool().unwrap());
    }

    #[test]
    fn test_truncated_reads_report_what_was_missing() {
        let mut rx = NetworkString::from_bytes(*b"\x05ab");
        match rx.decode_string() {
            Err(ProtocolError::Truncated { needed, remaining }) => {
                assert_eq!(needed, 5);
                assert_eq!(remaining, 2);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_wstring_fails() {
        // Claims 3 units, carries 1.
        let mut rx = NetworkString::from_bytes([0u8, 3, 0, 65]);
        assert!(matches!(
            rx.decode_wstring(),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_fails() {
        let mut rx = NetworkString::from_bytes([2u8, 0xC3, 0x28]);
        assert!(matches!(rx.decode_string(), Err(ProtocolError::InvalidUtf8(_))));
    }

    #[test]
    fn test_overlong_string_is_rejected() {
        let long = "x".repeat(256);
        let mut ns = NetworkString::default();
        assert!(matches!(
            ns.encode_string(&long),
            Err(ProtocolError::StringTooLong { len: 256, max: 255 })
        ));
        assert!(ns.is_empty());
    }

    #[test]
    fn test_read_event_on_empty_and_unknown() {
        assert!(matches!(
            NetworkString::from_bytes([0u8; 0]).read_event(),
            Err(ProtocolError::Empty)
        ));
        assert!(matches!(
            NetworkString::from_bytes([99u8]).read_event(),
            Err(ProtocolError::UnknownOpcode(99))
        ));
    }

    #[test]
    fn test_list_is_count_prefixed() {
        let names = vec![WideString::from("a"), WideString::from("bc")];
        let mut ns = NetworkString::default();
        ns.encode_list(&names).unwrap();
        assert_eq!(ns.as_bytes()[0], 2);

        let decoded: Vec<WideString> = NetworkString::from_bytes(ns.into_bytes())
            .decode_list()
            .unwrap();
        assert_eq!(decoded, names);
    }

    #[test]
    fn test_list_over_255_entries_is_rejected() {
        let names = vec![WideString::default(); 256];
        let mut ns = NetworkString::default();
        assert!(matches!(
            ns.encode_list(&names),
            Err(ProtocolError::ListTooLong { len: 256, max: 255 })
        ));
    }

    #[test]
    fn test_wide_string_compares_with_str() {
        let name = WideString::from("Léa");
        assert_eq!(name, "Léa");
        assert_eq!(name.len(), 3);
        assert_eq!(name.to_string(), "Léa");
    }

    #[test]
    fn test_short_integer_read_reports_requested_and_available() {
        let mut rx = NetworkString::from_bytes([0x01u8, 0x02]);
        match rx.get_u32() {
            Err(ProtocolError::Truncated { needed, remaining }) => {
                assert_eq!(needed, 4);
                assert_eq!(remaining, 2);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[test]
    fn test_reads_consume_from_the_front() {
        let mut rx = NetworkString::from_bytes([7u8, 0, 1, 9]);
        assert_eq!(rx.get_u8().unwrap(), 7);
        assert_eq!(rx.get_u16().unwrap(), 1);
        assert_eq!(rx.as_bytes(), &[9]);
        assert_eq!(rx.remaining(), 1);
    }
}
