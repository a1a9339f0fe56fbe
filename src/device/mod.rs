//! Output path to the LCD panel: wire framing, transport and the bounded writer.

pub mod protocol;
pub mod transport;
pub mod usb;
pub mod writer;

pub use protocol::{encode_message, join_packets, split_packets, Packet, END_PACKET};
pub use transport::{Completion, EndpointTransport, PacketEndpoint, Transport};
pub use usb::{ImonLcd, IMON_PRODUCT, IMON_VENDOR};
pub use writer::{DeviceWriter, FrameSink, IN_FLIGHT_LIMIT, TRANSFER_TIMEOUT};
