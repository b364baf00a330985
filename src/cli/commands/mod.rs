mod account;
mod housekeeping;
mod payment;

pub use account::cmd_create_account;
pub use housekeeping::{cmd_housekeeping, cmd_seed_roles};
pub use payment::cmd_payment_url;
