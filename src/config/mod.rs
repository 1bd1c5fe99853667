//! Dynamic config store (§4.7): compiled defaults, the legacy config file,
//! and a persisted sqlite table layered with typed get/set and subscriber
//! notification. Distinct from [`crate::platform::LydianSettings`], the
//! static bootstrap layer read once at process start.

pub mod defaults;
pub mod error;
pub mod file;
pub mod store;

pub use error::ConfigError;
pub use store::{ConfigStore, ConfigValue};
