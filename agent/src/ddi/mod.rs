//! Device integration API client
//!
//! [`client::DdiClient`] owns all protocol state; the other modules are
//! the steps it runs on every tick.

pub mod client;
pub mod config_data;
pub mod feedback;
pub mod identity;
pub mod links;
pub mod poll;
