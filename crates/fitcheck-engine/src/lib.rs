pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod gemini;
pub mod prompts;
pub mod retry;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use client::GenerationClient;
pub use config::{ConfigError, EngineConfig};
pub use error::GenerationError;
pub use export::{compose_styleboard, save_outfit_image, Styleboard, StyleboardLayout};
pub use gemini::GeminiTransport;
pub use retry::RetryPolicy;
pub use session::{SessionController, SessionError, SessionPhase, SessionSnapshot};
pub use transport::ModelTransport;
