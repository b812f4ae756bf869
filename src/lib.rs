// ABOUTME: Library root for mora - the deployment engine and its building blocks.
// ABOUTME: The main binary is in main.rs.

pub mod cancel;
pub mod cluster;
pub mod config;
pub mod deploy;
pub mod error;
pub mod expr;
pub mod function;
pub mod output;
pub mod plan;
pub mod resource;
pub mod state;
pub mod store;
pub mod types;
pub mod wingman;
