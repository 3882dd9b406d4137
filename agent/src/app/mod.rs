//! Application wiring: options, state construction, and the run loop

pub mod options;
pub mod run;
pub mod state;
