//! AquaTrack library
//!
//! This library exposes the hydration tracking core for the binary, for
//! testing and for other front ends.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
