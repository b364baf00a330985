//! Payment gateway helpers. Only request signing lives here; redirect
//! handling and order bookkeeping belong to the callers.

pub mod vnpay;

use thiserror::Error;

pub use vnpay::{PaymentSigner, SignedPayment, order_params};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment amount must be a positive integer")]
    InvalidAmount,

    #[error("Payment gateway is not configured: {0}")]
    Config(String),
}
