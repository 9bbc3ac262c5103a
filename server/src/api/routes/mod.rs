//! API route handlers

pub mod dashboard;
pub mod health;
pub mod services;
pub mod sync;
pub mod traces;
