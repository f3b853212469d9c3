//! Budget and rate governance for the verification stage.
//!
//! [`BudgetGovernor`] owns the check-and-increment of cumulative spend, [`RateGovernor`]
//! spaces calls to the external service. Both are shared across Stage 3 workers.

pub mod budget;
pub mod cost;
pub mod rate;

#[cfg(test)]
mod tests;

pub use budget::{Admission, BudgetGovernor, BudgetPermit};
pub use cost::Cost;
pub use rate::RateGovernor;
