#[macro_use]
extern crate serde_derive;

pub mod address;
pub mod envelope;
pub mod inscription;
pub mod inscription_id;
pub mod tag;

/// Push payload that opens every inscription envelope.
pub const PROTOCOL_ID: [u8; 3] = *b"ord";
