//! SQL processing module
//!
//! This module provides:
//! - `parser`: statement splitting, SQL lexer and parser
//! - `types`: SQL data types and scalar values
//! - `schema`: database, table and column definitions
//! - `plan`: operator tree and diagnostic execution plan
//! - `executor`: query and mutation execution
//! - `constraint`: row admission checks
//! - `engine`: database registry, sessions and persistence

pub mod constraint;
pub mod engine;
pub mod executor;
pub mod parser;
pub mod plan;
pub mod schema;
pub mod types;
