pub mod locks;
pub mod payouts;
pub mod settlement;
