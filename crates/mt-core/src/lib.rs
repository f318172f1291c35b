//! mt-core: Musical time spans and timeline conversion
//!
//! This crate provides the span types, the tempo/meter timeline, and the
//! conversion engine shared by the higher-level crates.

mod convert;
mod error;
mod tempo;
mod timespan;

pub use convert::*;
pub use error::*;
pub use tempo::*;
pub use timespan::*;
