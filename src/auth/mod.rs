//! Authentication and authorization pipeline.
//!
//! Two entry paths converge on the same token issuance:
//!
//! - password login: [`resolver::IdentityResolver`] finds the account,
//!   [`password::PasswordEncoder`] checks the secret, and
//!   [`authenticator::CredentialAuthenticator`] applies account-state rules;
//! - federated login: [`oauth::OAuth2LinkingHandler`] finds or creates the
//!   account for a provider assertion.
//!
//! Both produce a [`Principal`], which [`token::TokenIssuer`] turns into an
//! access/refresh pair that [`session::SessionTransport`] hands to the caller.

pub mod authenticator;
pub mod error;
pub mod oauth;
pub mod password;
pub mod principal;
pub mod resolver;
pub mod session;
pub mod token;

pub use authenticator::CredentialAuthenticator;
pub use error::AuthError;
pub use oauth::{FederatedAssertion, OAuth2LinkingHandler};
pub use password::{Argon2PasswordEncoder, PasswordEncoder};
pub use principal::Principal;
pub use resolver::{IdentityResolver, LookupStrategy};
pub use session::SessionTransport;
pub use token::{IssuedTokens, JwtTokenIssuer, TokenIssuer, TokenKind};
