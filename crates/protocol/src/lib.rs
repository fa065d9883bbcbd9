//! Wire protocol types for Lectern.
//!
//! Shared between the transfer engine (course material ingestion) and the
//! stream channel (persistent query connection to the backend).

pub mod constants;
pub mod envelope;
pub mod types;
