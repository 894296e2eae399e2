//! Row structs and insert DTOs.
//!
//! Each submodule holds a `FromRow` entity matching the table and, where
//! rows are created from application code, a plain input struct for the
//! insert.

pub mod audit;
pub mod order;
pub mod pos_connection;
pub mod review_session;
pub mod store;
pub mod webhook_event;
