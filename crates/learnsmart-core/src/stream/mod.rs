//! Response body consumption: stateful decoding and ordered fragment delivery.

pub mod consumer;
pub mod decoder;

pub use consumer::{StreamConsumer, StreamItem};
pub use decoder::Utf8StreamDecoder;
