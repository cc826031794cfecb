//! Wire-level encoding and decoding.
//!
//! Request heads are decoded incrementally by [`RequestDecoder`]; response
//! writing lives in [`crate::protocol::Output`] because its deferred header
//! flush keeps status and headers mutable until the first body byte, which
//! does not fit a one-shot encoder.

mod request_decoder;

pub use request_decoder::{RequestDecoder, RequestHead};
