//! Core domain types and logic.

pub mod instrument;
pub mod dedupe;
pub mod ranking;
pub mod returns;
pub mod cumulative;
pub mod date_validation;
pub mod session;
pub mod basket;
pub mod strategy;
pub mod comparison;
pub mod config_validation;
pub mod error;
