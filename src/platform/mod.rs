pub mod config;
pub mod context;
pub mod runtime;
pub mod service;
pub mod telemetry;

pub use config::LydianSettings;
pub use context::AgentContext;
pub use runtime::{AgentPlatform, AgentRuntime};
pub use service::ServiceRegistration;
