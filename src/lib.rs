//! emudb - a small relational database emulator
//!
//! This crate interprets a constrained SQL dialect against in-memory tables:
//! - SQL parsing (script splitting, lexer, parser, AST)
//! - Query planning and execution over a fixed operator pipeline
//! - NOT NULL / UNIQUE / FOREIGN KEY enforcement on insert
//! - Whole-state JSON snapshots through a pluggable storage trait

pub mod config;
pub mod error;
pub mod sql;
pub mod storage;

pub use config::Config;
pub use sql::engine::{Engine, QueryResult, Session};
