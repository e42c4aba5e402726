pub mod ask;
pub mod classify;
pub mod config;
pub mod keys;
