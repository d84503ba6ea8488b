//! Binary packet framing for the switch channel.
//!
//! Every packet sent to the runtime target is a fixed 16-byte header,
//! a 255-byte zero-padded name field, then the raw payload bytes. The
//! target reads the header, the name, then exactly the declared number
//! of payload bytes.

use bytes::{BufMut, Bytes, BytesMut};

/// Size of the fixed packet header.
pub const HEADER_SIZE: usize = 16;

/// Size of the zero-padded script name field that follows the header.
pub const NAME_FIELD_SIZE: usize = 255;

/// Packet kinds understood by the runtime target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketKind {
    /// No-op; the target ignores it.
    None = 0x00,
    /// Script delivery: the target stores `payload` under `name`.
    Script = 0x01,
}

/// A framed unit bound for the switch channel.
///
/// Built once when an upload completes, then encoded and written exactly
/// once by the switch sender.
#[derive(Debug, Clone)]
pub struct Packet {
    pub kind: PacketKind,
    pub name: String,
    pub payload: Bytes,
}

impl Packet {
    /// Create a script packet from a completed upload.
    pub fn script(name: String, payload: Bytes) -> Self {
        Self {
            kind: PacketKind::Script,
            name,
            payload,
        }
    }

    /// Total encoded length: header, name field, payload.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + NAME_FIELD_SIZE + self.payload.len()
    }

    /// Serialize the packet for the wire.
    ///
    /// Never fails. A name whose UTF-8 encoding exceeds the name field is
    /// truncated to its first 255 bytes and the declared name length is
    /// capped to match; callers needing longer identifiers must
    /// pre-validate.
    pub fn encode(&self) -> Bytes {
        let name_bytes = self.name.as_bytes();
        let name_len = name_bytes.len().min(NAME_FIELD_SIZE);

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u8(self.kind as u8);
        buf.put_u8(name_len as u8);
        buf.put_u16(0); // reserved
        buf.put_u32(self.payload.len() as u32);
        buf.put_u64(0); // reserved
        buf.put_slice(&name_bytes[..name_len]);
        buf.put_bytes(0, NAME_FIELD_SIZE - name_len);
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_script_frame_layout() {
        let payload = Bytes::from_static(b"print(\"hi there\")");
        assert_eq!(payload.len(), 17);

        let packet = Packet::script("hello.ns".to_string(), payload.clone());
        let frame = packet.encode();

        assert_eq!(frame.len(), HEADER_SIZE + NAME_FIELD_SIZE + 17);
        assert_eq!(frame[0], 0x01);
        assert_eq!(frame[1], 8);
        assert_eq!(&frame[2..4], &[0, 0]);
        assert_eq!(u32::from_be_bytes(frame[4..8].try_into().unwrap()), 17);
        assert_eq!(&frame[8..16], &[0u8; 8]);
        assert_eq!(&frame[16..24], b"hello.ns");
        assert!(
            frame[24..HEADER_SIZE + NAME_FIELD_SIZE]
                .iter()
                .all(|&b| b == 0)
        );
        assert_eq!(&frame[HEADER_SIZE + NAME_FIELD_SIZE..], &payload[..]);
    }

    #[test]
    fn test_long_name_truncated_to_field_size() {
        let name = "x".repeat(300);
        let packet = Packet::script(name.clone(), Bytes::new());
        let frame = packet.encode();

        assert_eq!(frame.len(), HEADER_SIZE + NAME_FIELD_SIZE);
        assert_eq!(frame[1], 255);
        assert_eq!(
            &frame[HEADER_SIZE..HEADER_SIZE + NAME_FIELD_SIZE],
            &name.as_bytes()[..NAME_FIELD_SIZE]
        );
    }

    #[test]
    fn test_multibyte_name_truncates_on_bytes_not_chars() {
        // Two bytes per char in UTF-8, so 150 chars overflow the field by
        // 45 bytes and the cut lands mid-character. The wire carries raw
        // bytes, so that is fine.
        let name = "é".repeat(150);
        let packet = Packet::script(name.clone(), Bytes::new());
        let frame = packet.encode();

        assert_eq!(frame[1], 255);
        assert_eq!(
            &frame[HEADER_SIZE..HEADER_SIZE + NAME_FIELD_SIZE],
            &name.as_bytes()[..NAME_FIELD_SIZE]
        );
    }

    #[test]
    fn test_empty_name_and_payload() {
        let packet = Packet::script(String::new(), Bytes::new());
        let frame = packet.encode();

        assert_eq!(frame.len(), HEADER_SIZE + NAME_FIELD_SIZE);
        assert_eq!(frame[0], 0x01);
        assert_eq!(frame[1], 0);
        assert_eq!(u32::from_be_bytes(frame[4..8].try_into().unwrap()), 0);
        assert!(frame[HEADER_SIZE..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_payload_length_field_is_big_endian() {
        let payload = Bytes::from(vec![0xAB; 0x0102]);
        let packet = Packet::script("s".to_string(), payload);
        let frame = packet.encode();

        assert_eq!(&frame[4..8], &[0x00, 0x00, 0x01, 0x02]);
    }
}
