//! AAC codec configuration handling.

mod parser;
mod types;

pub use types::*;
