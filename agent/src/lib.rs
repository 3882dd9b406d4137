//! Otagent Library
//!
//! Core modules for the otagent OTA update agent: a device-side client of a
//! polling deployment server. Each check-in cycle classifies the pending
//! action, downloads and verifies update artifacts, drives the installation
//! engine and reports the outcome back upstream.

pub mod app;
pub mod channel;
pub mod context;
pub mod ddi;
pub mod engine;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod state;
pub mod storage;
pub mod update;
pub mod utils;
pub mod workers;
