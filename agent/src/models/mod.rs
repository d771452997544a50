//! Wire models for the device integration API

pub mod controller;
pub mod deployment;
pub mod feedback;
