//! Pricing & discount engine
//!
//! Pure, deterministic functions with no I/O. All arithmetic runs through
//! `rust_decimal` and results are rounded to 2 decimal places half-up
//! before leaving the module.

pub mod discount;
pub mod line;

pub use discount::apply_discount;
pub use line::{compute_line_price, price_item, subtotal};
