pub mod address;
pub mod encoder;
pub mod head;
pub mod transport;

pub use address::{round_to, AddressMode, Axis};
pub use encoder::{
    animata_head, encode_skeleton, select_skeletons, EncodedSkeleton, OutboundMessage,
    OutboundPacket,
};
pub use head::decode_head;
pub use transport::{StreamTransport, DEFAULT_HOST};
