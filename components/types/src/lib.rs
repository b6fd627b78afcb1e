#[macro_use]
extern crate serde_derive;

mod chain;

pub use chain::*;
