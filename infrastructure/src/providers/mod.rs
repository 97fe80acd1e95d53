//! Model caller adapters
//!
//! - [`OpenAiCompatibleGateway`]: one chat-completions call over HTTP
//! - [`FallbackGateway`]: per-call deadline plus a single retry against the
//!   fallback model, wrapping any other gateway

mod fallback;
mod openai;

pub use fallback::FallbackGateway;
pub use openai::OpenAiCompatibleGateway;
