//! Request handlers

mod bids;
mod health;
mod leases;

pub use bids::*;
pub use health::*;
pub use leases::*;
