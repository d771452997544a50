//! Deployment module

pub mod cancel;
pub mod executor;
pub mod fetcher;
pub mod fsm;
