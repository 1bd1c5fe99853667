//! Rules store - crash-safe persistence for traffic rules (§4.6)
//!
//! A keyed set of `TrafficRule`s backed by sqlite, mirrored by an in-memory
//! cache that becomes the authority for reads once `load_from_db` has run at
//! boot. `Add`/`Enable`/`Disable`/`Delete` all write through to sqlite before
//! updating the cache, so a crash between the two steps still leaves the
//! change recoverable on the next `load_from_db`.

pub mod error;
pub mod store;

pub use error::RulesError;
pub use store::RulesStore;
