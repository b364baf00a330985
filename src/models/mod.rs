pub mod account;
pub mod discount;
