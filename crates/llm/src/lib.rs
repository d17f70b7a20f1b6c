pub mod backends;
pub mod json_extract;
pub mod provider;
pub mod registry;
pub mod router;

pub use json_extract::{extract_json, extract_or_default};
pub use provider::{ChatRequest, ChatResponse, LlmProvider, Message, ProviderError, Role, RoutingLabel};
pub use router::Router;
