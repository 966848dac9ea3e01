pub mod credential;
pub mod error;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod service;
pub mod template;

pub use credential::Credential;
pub use error::{DispatchError, ProviderError};
pub use provider::{CallParams, Provider};
pub use registry::{Brain, BrainRegistry};
pub use service::{DispatchRequest, DispatchService, DispatchSettings};
