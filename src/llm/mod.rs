//! Text generation for AgentCEO.
//!
//! Supports:
//! - **Anthropic**: Messages API over reqwest
//! - **Mock**: deterministic rules and templates, no network
//!
//! [`create_generator`] picks the backend from configuration once at startup
//! and wraps it in [`InstrumentedGenerator`] so every call is measured.

mod anthropic;
pub mod generator;
pub mod instrumented;
pub mod mock;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use generator::{ChatContext, LlmTextGenerator, TextGenerator};
pub use instrumented::InstrumentedGenerator;
pub use mock::MockTextGenerator;
pub use provider::*;

use std::sync::Arc;

use crate::config::GenerationBackend;
use crate::telemetry::Telemetry;

/// Build the configured generator, instrumented with telemetry.
pub fn create_generator(
    backend: &GenerationBackend,
    telemetry: Arc<Telemetry>,
) -> Arc<dyn TextGenerator> {
    let inner: Arc<dyn TextGenerator> = match backend {
        GenerationBackend::Anthropic {
            api_key,
            base_url,
            model,
        } => {
            tracing::info!("Using Anthropic (model: {})", model);
            let provider = AnthropicProvider::new(api_key.clone(), base_url.clone(), model.clone());
            Arc::new(LlmTextGenerator::new(Arc::new(provider)))
        }
        GenerationBackend::Mock => {
            tracing::info!("Using mock text generator");
            Arc::new(MockTextGenerator::new())
        }
    };
    Arc::new(InstrumentedGenerator::new(inner, telemetry))
}
