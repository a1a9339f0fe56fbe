//! Wire framing for the LCD panel.
//!
//! A screen update is a 42-byte message sent as six 8-byte interrupt packets:
//!
//! | offset | len | content                              |
//! |--------|-----|--------------------------------------|
//! | 0      | 32  | cells, row-major, space padded       |
//! | 32     | 3   | `0xFF` filler                        |
//! | 35     | 7   | [`END_PACKET`]                       |
//!
//! Packet `i` carries message bytes `7i..7i+7` followed by sequence byte `2i`.

/// Cell bytes per message.
pub const CELL_BYTES: usize = 32;
/// Full message length before packetising.
pub const MESSAGE_LEN: usize = 42;
/// Payload bytes per packet.
pub const PAYLOAD_LEN: usize = 7;
/// Packet length on the wire.
pub const PACKET_LEN: usize = PAYLOAD_LEN + 1;
/// Packets per message.
pub const PACKETS_PER_MESSAGE: usize = MESSAGE_LEN / PAYLOAD_LEN;

const FILLER: u8 = 0xFF;
const FILLER_RANGE: std::ops::Range<usize> = CELL_BYTES..END_OFFSET;
const END_OFFSET: usize = MESSAGE_LEN - PAYLOAD_LEN;

/// Fixed trailer that makes up the last packet of every message.
pub const END_PACKET: [u8; PAYLOAD_LEN] = [0x01, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF];

/// One interrupt transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub payload: [u8; PAYLOAD_LEN],
    pub sequence: u8,
}

impl Packet {
    /// Sequence byte of the message's final packet.
    pub const LAST_SEQUENCE: u8 = ((PACKETS_PER_MESSAGE - 1) * 2) as u8;

    pub fn to_bytes(&self) -> [u8; PACKET_LEN] {
        let mut out = [0u8; PACKET_LEN];
        out[..PAYLOAD_LEN].copy_from_slice(&self.payload);
        out[PAYLOAD_LEN] = self.sequence;
        out
    }

    /// Whether this packet completes a message.
    pub fn is_last(&self) -> bool {
        self.sequence == Self::LAST_SEQUENCE
    }
}

/// Lay out cell bytes as a full message. Input beyond 32 bytes is ignored.
pub fn encode_message(cells: &[u8]) -> [u8; MESSAGE_LEN] {
    let mut buf = [b' '; MESSAGE_LEN];
    let len = cells.len().min(CELL_BYTES);
    buf[..len].copy_from_slice(&cells[..len]);
    buf[FILLER_RANGE].fill(FILLER);
    buf[END_OFFSET..].copy_from_slice(&END_PACKET);
    buf
}

/// Split a message into its packets, in send order.
pub fn split_packets(message: &[u8; MESSAGE_LEN]) -> [Packet; PACKETS_PER_MESSAGE] {
    std::array::from_fn(|i| {
        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&message[i * PAYLOAD_LEN..(i + 1) * PAYLOAD_LEN]);
        Packet {
            payload,
            sequence: (i * 2) as u8,
        }
    })
}

/// Reassemble a message from packets in send order.
pub fn join_packets(packets: &[Packet; PACKETS_PER_MESSAGE]) -> [u8; MESSAGE_LEN] {
    let mut message = [0u8; MESSAGE_LEN];
    for (chunk, packet) in message.chunks_exact_mut(PAYLOAD_LEN).zip(packets) {
        chunk.copy_from_slice(&packet.payload);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_layout() {
        let cells: Vec<u8> = (0..32).map(|i| b'a' + (i % 26) as u8).collect();
        let message = encode_message(&cells);

        assert_eq!(&message[..32], &cells[..]);
        assert_eq!(&message[32..35], &[0xFF, 0xFF, 0xFF]);
        assert_eq!(&message[35..], &END_PACKET);
    }

    #[test]
    fn test_short_and_long_input() {
        let message = encode_message(b"Hi");
        assert_eq!(&message[..2], b"Hi");
        assert!(message[2..32].iter().all(|&b| b == b' '));

        let clear = encode_message(&[]);
        assert!(clear[..32].iter().all(|&b| b == b' '));

        let long = [b'x'; 40];
        let message = encode_message(&long);
        assert!(message[..32].iter().all(|&b| b == b'x'));
        assert_eq!(&message[32..35], &[0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_packet_split() {
        let message = encode_message(b"0123456789abcdefghijklmnopqrstuv");
        let packets = split_packets(&message);

        let sequences: Vec<u8> = packets.iter().map(|p| p.sequence).collect();
        assert_eq!(sequences, vec![0, 2, 4, 6, 8, 10]);
        assert_eq!(&packets[0].payload, b"0123456");
        assert_eq!(packets[4].payload, [b's', b't', b'u', b'v', 0xFF, 0xFF, 0xFF]);
        assert_eq!(packets[5].payload, END_PACKET);
        assert!(packets[5].is_last());
        assert!(packets[..5].iter().all(|p| !p.is_last()));

        assert_eq!(join_packets(&packets), message);
    }

    #[test]
    fn test_packet_bytes() {
        let packet = Packet {
            payload: [1, 2, 3, 4, 5, 6, 7],
            sequence: 8,
        };
        assert_eq!(packet.to_bytes(), [1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(!packet.is_last());
    }
}
