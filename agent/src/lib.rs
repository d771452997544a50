//! DDI Agent Library
//!
//! Device-side client for the hawkBit direct device integration API.

pub mod app;
pub mod ddi;
pub mod deploy;
pub mod errors;
pub mod http;
pub mod installer;
pub mod logs;
pub mod models;
pub mod storage;
pub mod telemetry;
pub mod utils;
pub mod workers;
