#![doc = include_str!("../README.md")]

pub mod command;
pub mod config;
pub mod error;
pub mod handler;
pub mod server;
pub mod store;
pub mod telemetry;
