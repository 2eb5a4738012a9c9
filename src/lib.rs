//! Renderforged - template video render orchestration
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod probe;
pub mod render;
pub mod server;
pub mod state;
