//! # modelstore-protocol
//!
//! Message types and codec for driving a model store from outside.
//!
//! This crate defines the JSON formats for update batches, scripts and run
//! reports, and turns decoded requests into store operations.

pub mod codec;
pub mod messages;

pub use codec::*;
pub use messages::*;
