//! External collaborators of the parser and logic roles.
//!
//! Translation of natural language into logic and evaluation of formulas
//! happen outside the mesh. These traits are the seams; the pass-through
//! implementations keep a node useful without them.

use async_trait::async_trait;

use crate::error::Result;
use crate::payload::PayloadKind;

/// Turns natural-language input into a logic formula.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, kind: PayloadKind, text: &str) -> Result<String>;
}

/// Evaluates a formula and produces a human-readable answer.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, kind: PayloadKind, formula: &str) -> Result<String>;
}

/// Treats the input as already being a formula.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughTranslator;

#[async_trait]
impl Translator for PassThroughTranslator {
    async fn translate(&self, _kind: PayloadKind, text: &str) -> Result<String> {
        Ok(text.trim().to_string())
    }
}

/// Acknowledges formulas without evaluating them.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoEvaluator;

#[async_trait]
impl Evaluator for EchoEvaluator {
    async fn evaluate(&self, kind: PayloadKind, formula: &str) -> Result<String> {
        Ok(match kind {
            PayloadKind::Fact => format!("✅ Fact stored: {}", formula),
            PayloadKind::Query => format!("🔎 Query accepted: {}", formula),
        })
    }
}
