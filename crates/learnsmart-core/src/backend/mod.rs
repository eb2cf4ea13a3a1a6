//! Backend access: the streaming prompt client and its transport types.

pub mod client;
pub mod shared;
pub mod trace;

pub use client::{BackendClient, BackendConfig};
pub use shared::{
    ByteStream, TransportError, TransportErrorKind, TransportResult, USER_AGENT,
    resolve_base_url, resolve_token,
};
pub use trace::DebugTrace;
