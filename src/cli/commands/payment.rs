//! Payment URL command handler

use crate::config::Config;
use crate::payment::{PaymentSigner, order_params};

pub fn cmd_payment_url(
    config: &Config,
    amount: u64,
    order_id: &str,
    order_info: Option<&str>,
) -> anyhow::Result<()> {
    let signer = PaymentSigner::new(config.payment.clone());
    let params = order_params(amount, order_id, order_info, "127.0.0.1")?;

    println!("{}", signer.payment_url(&params)?);
    Ok(())
}
