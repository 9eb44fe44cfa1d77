//! Model artifact storage.
//!
//! [`native`] frames the artifact (header, checksum); [`payload`] defines the
//! serde types inside it.

mod convert;
pub mod native;
pub mod payload;

pub use native::{
    DeserializeError, FormatFlags, FormatHeader, NativeCodec, SerializeError, HEADER_SIZE, MAGIC,
};
pub use payload::{Payload, PayloadV1, TreePayload};
