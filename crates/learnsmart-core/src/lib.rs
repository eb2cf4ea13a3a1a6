//! Core LearnSmart library (backend client, stream decoding, rendering, config).

pub mod backend;
pub mod config;
pub mod core;
pub mod logging;
pub mod render;
pub mod stream;
