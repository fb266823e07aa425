//! TraceBuf2 packet codec.
//!
//! The binary, endian-polymorphic packet format used on Earthworm-style
//! rings: a 64-byte fixed-offset header whose byte order is self-described
//! by the `data_type` field, followed by an opaque sample payload.

mod data_type;
mod packet;

pub use data_type::{ByteOrder, DataType, SampleEncoding, SampleWidth};
pub use packet::{HEADER_SIZE, MAX_TRACEBUF_SIZE, TraceBuf2};
