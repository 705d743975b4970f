//! wiki-graph library
//!
//! Shortest link paths between wiki pages, computed by queue-driven workers.
//! This module exports the core components for testing and integration.

pub mod bfs;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod links;
pub mod logging;
pub mod queue;
pub mod server;
pub mod service;
pub mod types;
