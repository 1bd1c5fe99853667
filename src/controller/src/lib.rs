//! Traffic controller - rule ingestion, endpoint resolution, task lifecycle (§4.5, §4.4)
//!
//! Translates an incoming rule into local action: resolve `src`/`dst`
//! against the discovery crate's endpoint→target map, fill the derived
//! `*_target`/`*_host` fields, start whichever of a client/server task is
//! locally relevant, and persist through the rules store. Owns the
//! resume-on-boot scan that re-adds tasks for every rule still marked
//! ACTIVE after a restart.

pub mod controller;
pub mod error;
pub mod manager;

pub use controller::TrafficController;
pub use error::ControllerError;
pub use manager::{ClientManager, ServerManager};
