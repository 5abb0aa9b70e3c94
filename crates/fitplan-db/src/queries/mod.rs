//! Query functions, one module per table.

pub mod saved_plans;
