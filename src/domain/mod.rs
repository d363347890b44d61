pub mod account;
pub mod ledger;
pub mod money;
pub mod payout;
pub mod ports;
pub mod session;
