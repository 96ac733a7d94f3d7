//! penny-core - Core library for Penny
//!
//! This crate contains the shared models, local database layer, and the
//! sync engine that reconciles a device's records with the penny API.

pub mod db;
pub mod error;
pub mod models;
pub mod sync;

pub use error::{Error, Result};
pub use models::{Category, CategoryId, Expense, ExpenseId};
