// src/lib.rs

pub mod config;
pub mod corpus;
pub mod dispatch;
pub mod engine;
pub mod filter;
pub mod platform;
pub mod queue;
pub mod scheduler;
