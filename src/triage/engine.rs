//! Triage engine: classifies items through the injected generator and
//! degrades to a safe default on any failure.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::llm::TextGenerator;

use super::types::{Classification, TriageInput};

/// Classifies inbound items. Never returns an error to its caller.
#[derive(Clone)]
pub struct TriageEngine {
    generator: Arc<dyn TextGenerator>,
}

impl TriageEngine {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Classify one item. A generation failure or incomplete reply yields
    /// [`Classification::fallback`].
    pub async fn classify(&self, input: &TriageInput) -> Classification {
        match self.generator.classify(input).await {
            Ok(classification) if classification.is_complete() => classification,
            Ok(_) => {
                warn!(sender = %input.sender, "Incomplete classification, using fallback");
                Classification::fallback(input)
            }
            Err(e) => {
                warn!(
                    sender = %input.sender,
                    error = %e,
                    "Classification failed, using fallback"
                );
                Classification::fallback(input)
            }
        }
    }

    /// Classify a batch concurrently. Results are returned in input order and
    /// one item's failure never affects the others.
    pub async fn classify_batch(&self, inputs: &[TriageInput]) -> Vec<Classification> {
        info!(count = inputs.len(), "Classifying batch");
        join_all(inputs.iter().map(|input| self.classify(input))).await
    }
}
