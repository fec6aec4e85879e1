//! Effect classification for call operators.
//!
//! The extractor receives the table as a constructor argument rather than
//! consulting a process-global registry, so alternative op sets can be
//! injected in tests and embedders.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a call operator interacts with program state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum CallEffect {
    /// Annotation nodes that disappear during lowering (`likely`, ...).
    ExprAnnotation,
    Pure,
    ReadState,
    UpdateState,
    Opaque,
}

impl CallEffect {
    /// Pure and annotation calls count as math functions; the rest do not.
    pub fn is_pure(self) -> bool {
        matches!(self, CallEffect::Pure | CallEffect::ExprAnnotation)
    }
}

/// Maps operator names to their effect kind.
#[derive(Debug, Clone, Default)]
pub struct OpEffectTable {
    effects: HashMap<String, CallEffect>,
}

impl OpEffectTable {
    pub fn new() -> Self {
        OpEffectTable::default()
    }

    /// A table covering the math intrinsics that survive lowering.
    pub fn builtin() -> Self {
        let mut table = OpEffectTable::new();
        for op in [
            "exp", "exp2", "exp10", "log", "log2", "log10", "log1p", "sqrt", "rsqrt", "pow",
            "sin", "sinh", "asin", "cos", "cosh", "acos", "tan", "tanh", "atan", "sigmoid",
            "erf", "fabs", "floor", "ceil", "round", "trunc", "nearbyint", "fmod", "hypot",
            "ldexp", "clz", "popcount", "fma",
        ] {
            table.register(op, CallEffect::Pure);
        }
        table.register("likely", CallEffect::ExprAnnotation);
        table.register("if_then_else", CallEffect::ExprAnnotation);
        table.register("call_extern", CallEffect::Opaque);
        table.register("call_packed", CallEffect::Opaque);
        table.register("access_ptr", CallEffect::ReadState);
        table.register("prefetch", CallEffect::ReadState);
        table
    }

    pub fn register(&mut self, op: impl Into<String>, effect: CallEffect) {
        self.effects.insert(op.into(), effect);
    }

    /// `None` when the operator has no registered effect, which the
    /// extractor treats as fatal for the enclosing program.
    pub fn effect(&self, op: &str) -> Option<CallEffect> {
        self.effects.get(op).copied()
    }
}
