pub mod classify;
pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod exit;
pub mod handlers;
pub mod order;
pub mod recommend;
pub mod rules;
pub mod snapshot;
pub mod store;
pub mod ui;
