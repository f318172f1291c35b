//! Deferred binary-operation time span

use serde::{Deserialize, Serialize};

use super::TimeSpan;

/// Deferred arithmetic operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MathOperation {
    Add,
    Subtract,
}

impl std::fmt::Display for MathOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MathOperation::Add => f.write_str("+"),
            MathOperation::Subtract => f.write_str("-"),
        }
    }
}

/// Role assignment for the two operands of a deferred operation.
///
/// The first slot names the role of the left operand, the second the role
/// of the right one. A *Time* is anchored at tick 0; a *Length* needs an
/// anchor supplied at evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpanMode {
    /// Two absolute instants; representable but rejected at evaluation
    TimeTime,
    /// Time plus/minus a length; evaluates to a time
    TimeLength,
    /// Two lengths; evaluates to a length at a caller-supplied anchor
    LengthLength,
}

/// Unevaluated binary expression over two spans of possibly different
/// concrete types.
///
/// Built by cross-type Add/Subtract or explicitly for lazy combination;
/// never mutated, only consumed by the conversion engine. The operands are
/// themselves [`TimeSpan`]s, so expressions form a finite tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MathTimeSpan {
    pub lhs: Box<TimeSpan>,
    pub rhs: Box<TimeSpan>,
    pub operation: MathOperation,
    pub mode: SpanMode,
}

impl MathTimeSpan {
    pub fn new(lhs: TimeSpan, rhs: TimeSpan, operation: MathOperation, mode: SpanMode) -> Self {
        Self {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            operation,
            mode,
        }
    }

    /// Structural zero test: both operands recursively zero.
    ///
    /// Timeline-free by design, so `x - x` for non-zero `x` is *not*
    /// classified as zero.
    pub fn is_zero(&self) -> bool {
        self.lhs.is_zero() && self.rhs.is_zero()
    }
}

impl std::fmt::Display for MathTimeSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} {} {})", self.lhs, self.operation, self.rhs)
    }
}
