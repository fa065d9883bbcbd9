//! Connection pumps: outbound writer and keepalive heartbeat.
//!
//! Reading is done inline by the driver, which needs the inbound frames
//! to advance its query state machine.

pub(crate) mod heartbeat;
pub(crate) mod write;
