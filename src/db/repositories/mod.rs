pub mod account;
pub mod discount;
pub mod registration;
pub mod role;
