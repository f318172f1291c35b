//! mt-quantize: Grid snapping built on the mt-core conversion engine
//!
//! Provides the policy-driven rounding primitive and the nearest-grid-point
//! search that snapping tools share.

mod grid;
mod round;

pub use grid::*;
pub use round::*;
