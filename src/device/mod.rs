//! Panel transfer: wire commands, the locked connection and the reset-then-frames protocol.
//!
//! Transfers never retry. A failed transfer reports how many frames were acknowledged; recovery is
//! a fresh transfer of the whole sequence, which starts with its own buffer reset.

/// Panel commands and their JSON wire form.
pub mod command;
/// Links and the mutex-guarded connection.
pub mod connection;
/// HTTP link to a real panel.
pub mod http;
/// In-memory recording link.
pub mod memory;
/// Transfer state machine.
pub mod transfer;
