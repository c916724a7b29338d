//! Core business logic modules.

pub mod action_log;
pub mod catalog;
pub mod config_store;
pub mod context;
pub mod credstore;
pub mod definitions;
pub mod error;
pub mod file_lock;
pub mod lifecycle;
pub mod reconciler;
pub mod system;
#[cfg(test)]
pub mod testing;
pub mod unit_dir;
