pub use super::accounts::Entity as Accounts;
pub use super::discounts::Entity as Discounts;
pub use super::pending_registrations::Entity as PendingRegistrations;
pub use super::roles::Entity as Roles;
