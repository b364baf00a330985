use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::auth::CurrentPrincipal;
use super::{ApiError, ApiResponse, AppState};
use crate::payment::order_params;

const VNPAY_SUCCESS_CODE: &str = "00";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    /// Amount in VND
    pub amount: u64,
    pub order_id: String,
    #[serde(default)]
    pub order_info: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentResponse {
    pub payment_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReturnResponse {
    pub valid: bool,
    pub paid: bool,
    pub order_id: Option<String>,
    pub response_code: Option<String>,
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or("127.0.0.1")
        .to_string()
}

/// POST /payments/vnpay
pub async fn create_vnpay_payment(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<Json<ApiResponse<CreatePaymentResponse>>, ApiError> {
    if payload.order_id.trim().is_empty() {
        return Err(ApiError::validation("orderId is required"));
    }

    let params = order_params(
        payload.amount,
        &payload.order_id,
        payload.order_info.as_deref(),
        &client_ip(&headers),
    )?;

    let payment_url = state.payments().payment_url(&params)?;
    tracing::info!(
        event = "payment_url_issued",
        account_id = principal.account_id,
        order_id = %payload.order_id,
        "Issued VNPay payment URL"
    );

    Ok(Json(ApiResponse::success(CreatePaymentResponse {
        payment_url,
    })))
}

/// GET /payments/vnpay/return
/// Browser lands here after the gateway; the signature decides trust.
pub async fn vnpay_return(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<ApiResponse<PaymentReturnResponse>>, ApiError> {
    let valid = state.payments().verify(&params)?;
    let response_code = params.get("vnp_ResponseCode").cloned();

    if !valid {
        tracing::warn!(event = "payment_signature_invalid", "Rejected VNPay return with bad signature");
    }

    Ok(Json(ApiResponse::success(PaymentReturnResponse {
        valid,
        paid: valid && response_code.as_deref() == Some(VNPAY_SUCCESS_CODE),
        order_id: params.get("vnp_TxnRef").cloned(),
        response_code,
    })))
}
