// 8.0: collateral manager. builds, unwinds and liquidates positions against each market's open
// interest ledger, folding due settlement windows at the top of every call.
// no background work and no I/O beyond the balance ledger and price feed it is handed.

mod build;
mod config;
mod core;
mod liquidate;
mod results;
mod settlement;
mod unwind;

#[cfg(test)]
mod test_support;

pub use config::ManagerConfig;
pub use core::CollateralManager;
pub use results::{BuildResult, LiquidationResult, ManagerError, UnwindResult};
