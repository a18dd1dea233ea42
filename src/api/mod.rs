//! API layer for the invoice gateway.
//!
//! REST endpoints plus the structured error taxonomy they respond with.

pub mod error;
mod rest;

pub use rest::*;
