use chrono::{DateTime, FixedOffset, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use std::collections::BTreeMap;
use url::form_urlencoded;

use crate::config::VnPayConfig;
use crate::payment::PaymentError;

type HmacSha512 = Hmac<Sha512>;

pub const AMOUNT: &str = "vnp_Amount";
pub const SECURE_HASH: &str = "vnp_SecureHash";
pub const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";

/// Gateway amounts are the VND value times 100.
const AMOUNT_SCALE: u64 = 100;

/// VNPay timestamps are wall-clock time in GMT+7.
const VNPAY_OFFSET_SECONDS: i32 = 7 * 3600;
const VNPAY_DATE_FORMAT: &str = "%Y%m%d%H%M%S";

/// A canonicalized, signed parameter set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayment {
    /// Sorted, encoded `key=value` pairs joined by `&`. Also the query string minus the hash.
    pub hash_data: String,
    /// Lowercase hex HMAC-SHA512 of `hash_data`
    pub secure_hash: String,
}

impl SignedPayment {
    #[must_use]
    pub fn query_string(&self) -> String {
        format!("{}&{SECURE_HASH}={}", self.hash_data, self.secure_hash)
    }
}

/// Signs payment requests with the merchant secret it was built with.
pub struct PaymentSigner {
    config: VnPayConfig,
}

impl PaymentSigner {
    #[must_use]
    pub const fn new(config: VnPayConfig) -> Self {
        Self { config }
    }

    /// Signed query string ready to append to the pay URL.
    pub fn sign(&self, params: &BTreeMap<String, String>) -> Result<String, PaymentError> {
        Ok(self.sign_at(params, Utc::now())?.query_string())
    }

    /// Full redirect URL for the gateway.
    pub fn payment_url(&self, params: &BTreeMap<String, String>) -> Result<String, PaymentError> {
        Ok(format!("{}?{}", self.config.pay_url, self.sign(params)?))
    }

    pub fn sign_at(
        &self,
        params: &BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<SignedPayment, PaymentError> {
        self.ensure_configured()?;

        let mut fields = params.clone();
        validate_amount(fields.get(AMOUNT))?;

        let local_now = now.with_timezone(&vnpay_offset()?);
        let expires = local_now + chrono::Duration::minutes(self.config.expire_minutes);

        fields.insert("vnp_Version".to_string(), self.config.version.clone());
        fields.insert("vnp_Command".to_string(), self.config.command.clone());
        fields.insert("vnp_TmnCode".to_string(), self.config.tmn_code.clone());
        fields.insert("vnp_CurrCode".to_string(), self.config.currency.clone());
        fields.insert("vnp_Locale".to_string(), self.config.locale.clone());
        fields.insert(
            "vnp_CreateDate".to_string(),
            local_now.format(VNPAY_DATE_FORMAT).to_string(),
        );
        fields
            .entry("vnp_ReturnUrl".to_string())
            .or_insert_with(|| self.config.return_url.clone());
        fields
            .entry("vnp_OrderType".to_string())
            .or_insert_with(|| self.config.order_type.clone());
        fields
            .entry("vnp_ExpireDate".to_string())
            .or_insert_with(|| expires.format(VNPAY_DATE_FORMAT).to_string());

        // Callers must not smuggle in their own signature
        fields.remove(SECURE_HASH);
        fields.remove(SECURE_HASH_TYPE);

        let hash_data = canonicalize(&fields);
        let secure_hash = hex::encode(self.mac(&hash_data)?.finalize().into_bytes());

        Ok(SignedPayment {
            hash_data,
            secure_hash,
        })
    }

    /// Check the signature on a gateway callback (return URL or IPN).
    pub fn verify(&self, params: &BTreeMap<String, String>) -> Result<bool, PaymentError> {
        self.ensure_configured()?;

        let Some(provided) = params.get(SECURE_HASH) else {
            return Ok(false);
        };
        let Ok(provided) = hex::decode(provided) else {
            return Ok(false);
        };

        let mut fields = params.clone();
        fields.remove(SECURE_HASH);
        fields.remove(SECURE_HASH_TYPE);

        let mac = self.mac(&canonicalize(&fields))?;
        Ok(mac.verify_slice(&provided).is_ok())
    }

    fn mac(&self, data: &str) -> Result<HmacSha512, PaymentError> {
        let mut mac = HmacSha512::new_from_slice(self.config.hash_secret.as_bytes())
            .map_err(|e| PaymentError::Config(e.to_string()))?;
        mac.update(data.as_bytes());
        Ok(mac)
    }

    fn ensure_configured(&self) -> Result<(), PaymentError> {
        if self.config.tmn_code.is_empty() {
            return Err(PaymentError::Config("tmn_code is empty".to_string()));
        }
        if self.config.hash_secret.is_empty() {
            return Err(PaymentError::Config("hash_secret is empty".to_string()));
        }
        Ok(())
    }
}

/// Caller-side parameters for a single order payment.
pub fn order_params(
    amount_vnd: u64,
    order_id: &str,
    order_info: Option<&str>,
    client_ip: &str,
) -> Result<BTreeMap<String, String>, PaymentError> {
    let amount = amount_vnd
        .checked_mul(AMOUNT_SCALE)
        .ok_or(PaymentError::InvalidAmount)?;

    let mut params = BTreeMap::new();
    params.insert(AMOUNT.to_string(), amount.to_string());
    params.insert("vnp_TxnRef".to_string(), order_id.to_string());
    params.insert(
        "vnp_OrderInfo".to_string(),
        order_info.map_or_else(|| format!("Payment for order {order_id}"), str::to_string),
    );
    params.insert("vnp_IpAddr".to_string(), client_ip.to_string());
    Ok(params)
}

fn vnpay_offset() -> Result<FixedOffset, PaymentError> {
    FixedOffset::east_opt(VNPAY_OFFSET_SECONDS)
        .ok_or_else(|| PaymentError::Config("invalid gateway timezone offset".to_string()))
}

fn validate_amount(amount: Option<&String>) -> Result<(), PaymentError> {
    match amount.map(|a| a.trim().parse::<u64>()) {
        Some(Ok(value)) if value > 0 => Ok(()),
        _ => Err(PaymentError::InvalidAmount),
    }
}

/// `application/x-www-form-urlencoded` serialization of both keys and values,
/// in key order, skipping empty values. Alphanumerics and `*-._` pass through,
/// space becomes `+`, everything else is percent-encoded.
fn canonicalize(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| {
            format!(
                "{}={}",
                form_urlencoded::byte_serialize(key.as_bytes()).collect::<String>(),
                form_urlencoded::byte_serialize(value.as_bytes()).collect::<String>()
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn signer() -> PaymentSigner {
        PaymentSigner::new(VnPayConfig {
            tmn_code: "BISTRO01".to_string(),
            hash_secret: "TESTSECRETKEY".to_string(),
            return_url: "https://bistro.test/pay/return".to_string(),
            ..VnPayConfig::default()
        })
    }

    fn caller_params(amount: Option<&str>) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        if let Some(amount) = amount {
            params.insert(AMOUNT.to_string(), amount.to_string());
        }
        params.insert("vnp_TxnRef".to_string(), "ORD-42".to_string());
        params.insert(
            "vnp_OrderInfo".to_string(),
            "Thanh toan don hang 42".to_string(),
        );
        params.insert("vnp_IpAddr".to_string(), "127.0.0.1".to_string());
        params
    }

    /// 2026-03-15 14:30:00 in GMT+7
    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 7, 30, 0).unwrap()
    }

    #[test]
    fn signature_matches_known_vector() {
        let signed = signer()
            .sign_at(&caller_params(Some("10000000")), fixed_now())
            .unwrap();

        assert_eq!(
            signed.hash_data,
            "vnp_Amount=10000000&vnp_Command=pay&vnp_CreateDate=20260315143000\
             &vnp_CurrCode=VND&vnp_ExpireDate=20260315144500&vnp_IpAddr=127.0.0.1\
             &vnp_Locale=vn&vnp_OrderInfo=Thanh+toan+don+hang+42&vnp_OrderType=other\
             &vnp_ReturnUrl=https%3A%2F%2Fbistro.test%2Fpay%2Freturn&vnp_TmnCode=BISTRO01\
             &vnp_TxnRef=ORD-42&vnp_Version=2.1.0"
        );
        assert_eq!(
            signed.secure_hash,
            "9720862cf9e1083be1e6e9d5722a738751fb24aaf51edfd4c1febfbf2a6fc5f9\
             cc6669c541f2f7fb4067041ede4b02c7d5ae979dc38ba1e3bfd61d7f1fc105ce"
        );
    }

    #[test]
    fn query_is_sorted_and_hash_is_reproducible() {
        let mut params = BTreeMap::new();
        params.insert(AMOUNT.to_string(), "100000".to_string());
        let query = signer().sign(&params).unwrap();

        let (hash_data, hash) = query.rsplit_once(&format!("&{SECURE_HASH}=")).unwrap();

        let keys: Vec<&str> = hash_data
            .split('&')
            .map(|pair| pair.split_once('=').unwrap().0)
            .collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);
        assert!(keys.contains(&"vnp_TmnCode"));
        assert!(keys.contains(&"vnp_CreateDate"));

        let mut mac = HmacSha512::new_from_slice(b"TESTSECRETKEY").unwrap();
        mac.update(hash_data.as_bytes());
        assert_eq!(hex::encode(mac.finalize().into_bytes()), hash);
    }

    #[test]
    fn zero_missing_and_garbage_amounts_are_rejected() {
        for amount in [Some("0"), None, Some("-5"), Some("12.5"), Some("abc"), Some("")] {
            assert!(
                matches!(
                    signer().sign_at(&caller_params(amount), fixed_now()),
                    Err(PaymentError::InvalidAmount)
                ),
                "amount {amount:?} was accepted"
            );
        }
    }

    #[test]
    fn fixed_fields_override_caller_values() {
        let mut params = caller_params(Some("5000"));
        params.insert("vnp_TmnCode".to_string(), "EVIL".to_string());
        params.insert(SECURE_HASH.to_string(), "deadbeef".to_string());

        let signed = signer().sign_at(&params, fixed_now()).unwrap();
        assert!(signed.hash_data.contains("vnp_TmnCode=BISTRO01"));
        assert!(!signed.hash_data.contains("EVIL"));
        assert!(!signed.hash_data.contains("deadbeef"));
    }

    #[test]
    fn reserved_characters_are_encoded_in_keys_and_values() {
        let mut fields = BTreeMap::new();
        fields.insert("a b".to_string(), "x&y=z".to_string());
        fields.insert("safe".to_string(), "A-z_0.9*".to_string());
        fields.insert("skip".to_string(), String::new());

        assert_eq!(canonicalize(&fields), "a+b=x%26y%3Dz&safe=A-z_0.9*");
    }

    #[test]
    fn callback_signature_verifies_and_tampering_is_detected() {
        let signer = signer();
        let query = signer.sign(&caller_params(Some("250000"))).unwrap();

        let mut callback: BTreeMap<String, String> = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        callback.insert(SECURE_HASH_TYPE.to_string(), "HmacSHA512".to_string());
        assert!(signer.verify(&callback).unwrap());

        callback.insert(AMOUNT.to_string(), "1".to_string());
        assert!(!signer.verify(&callback).unwrap());

        callback.remove(SECURE_HASH);
        assert!(!signer.verify(&callback).unwrap());
    }

    #[test]
    fn unconfigured_signer_refuses_to_sign() {
        let signer = PaymentSigner::new(VnPayConfig::default());
        assert!(matches!(
            signer.sign(&caller_params(Some("1000"))),
            Err(PaymentError::Config(_))
        ));
    }

    #[test]
    fn order_params_scale_amount_and_default_order_info() {
        let params = order_params(125_000, "ORD-7", None, "10.0.0.2").unwrap();
        assert_eq!(params[AMOUNT], "12500000");
        assert_eq!(params["vnp_OrderInfo"], "Payment for order ORD-7");

        assert!(matches!(
            order_params(u64::MAX, "ORD-8", None, "10.0.0.2"),
            Err(PaymentError::InvalidAmount)
        ));
    }

    #[test]
    fn payment_url_prefixes_gateway() {
        let url = signer().payment_url(&caller_params(Some("1000"))).unwrap();
        assert!(url.starts_with("https://sandbox.vnpayment.vn/paymentv2/vpcpay.html?vnp_Amount=1000&"));
        assert!(url.contains("&vnp_SecureHash="));
    }
}
