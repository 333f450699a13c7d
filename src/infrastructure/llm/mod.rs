//! Provider client implementations

mod factory;
mod google_ai;
mod http_client;
mod openrouter;

pub use factory::{ProviderFactory, StaticProviderResolver};
pub use google_ai::GoogleAiProvider;
pub use http_client::{HttpClient, HttpClientTrait, HttpError};
pub use openrouter::OpenRouterProvider;
