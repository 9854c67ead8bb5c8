pub mod transactions;
pub mod wallet;
