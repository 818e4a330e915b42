//! Client-side engine for extensible binary wire protocols: request
//! encoding, reply layout computation, and request/reply correlation over
//! one shared duplex byte stream.
//!
//! The [`wire`] module is the pure codec layer (no I/O, no shared state);
//! the [`conn`] module owns sequence numbers, demultiplexing, and blocking
//! reply delivery on top of a caller-provided [`conn::Transport`].

pub mod conn;
pub mod constants;
pub mod utils;
pub mod wire;
