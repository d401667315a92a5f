//! Banking domain module (strict bank account, event-sourced).
//!
//! This crate contains business rules for a single bank account (deposits,
//! withdrawals, management fees), implemented purely as deterministic domain
//! logic (no IO, no HTTP, no storage).

pub mod account;

pub use account::{
    Account, AccountCommand, AccountEvent, AccountHolder, AccountId, AccountOpened,
    ChargeManagementFees, Deposit, FeeSchedule, FundsDeposited, FundsWithdrawn,
    ManagementFeesCharged, OpenAccount, Withdraw,
};
