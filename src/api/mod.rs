pub mod camara;
pub mod client;
pub mod deserializers;
pub mod gemini;
pub mod http_client;
pub mod types;

pub use camara::CamaraClient;
pub use client::{ClientConfig, CouncilSource, DEFAULT_BASE_URL, DEFAULT_USER_AGENT};
pub use gemini::GeminiClient;
