pub mod prelude;

pub mod accounts;
pub mod discounts;
pub mod pending_registrations;
pub mod roles;
