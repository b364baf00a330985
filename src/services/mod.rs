pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AccountInfo, AuthError, AuthService, LoginResult};
pub use auth_service_impl::SeaOrmAuthService;

pub mod housekeeping;
pub use housekeeping::{HousekeepingReport, HousekeepingService};

pub mod scheduler;
pub use scheduler::Scheduler;
