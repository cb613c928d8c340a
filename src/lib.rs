//! Lock Dashboard
//!
//! Supervises the frequency-lock channels of a laser lock server: a channel
//! store reconciled from status polls, command acknowledgments and server
//! streams, plus the terminal front end driving it.

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod paths;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod view;
