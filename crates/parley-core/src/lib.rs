//! Core types, config, errors, and session model for Parley.

pub mod config;
pub mod error;
pub mod locks;
pub mod persona;
pub mod session;
pub mod session_store;
pub mod types;
