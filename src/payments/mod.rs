/// Stripe Checkout integration
///
/// Talks to the Stripe REST API directly (form-encoded requests over
/// reqwest) and verifies webhook signatures. Order creation from
/// completed sessions lives in the payment API handlers.
use crate::error::{ApiError, ApiResult};
use crate::orders::ShippingAddress;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Accepted clock skew for webhook signature timestamps, in seconds
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// A checkout line item as submitted by the storefront client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutItem {
    /// Product reference; clients send either `product` or `id`
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

fn default_quantity() -> i64 {
    1
}

impl CheckoutItem {
    pub fn product_ref(&self) -> Option<String> {
        self.product.clone().or_else(|| self.id.clone())
    }
}

/// Snapshot of a checkout item stored in the session metadata, so the
/// webhook can recover product references the provider does not keep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataItem {
    pub product: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Customer details Stripe attaches to a completed session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPrice {
    pub unit_amount: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLineItem {
    pub description: Option<String>,
    pub quantity: Option<i64>,
    pub price: Option<SessionPrice>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionLineItems {
    #[serde(default)]
    pub data: Vec<SessionLineItem>,
}

/// A Stripe Checkout session, as returned by create/retrieve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub payment_status: Option<String>,
    pub payment_intent: Option<String>,
    pub amount_total: Option<i64>,
    pub customer_email: Option<String>,
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub line_items: Option<SessionLineItems>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: Option<StripeErrorBody>,
}

/// Webhook event envelope
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: CheckoutSession,
}

/// Minimal Stripe REST client
#[derive(Clone)]
pub struct StripeClient {
    http_client: reqwest::Client,
    secret_key: String,
}

impl StripeClient {
    pub fn new(secret_key: String) -> ApiResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            secret_key,
        })
    }

    /// Create a Checkout session for the given items.
    ///
    /// The shipping address, user reference, and an item snapshot (with
    /// product ids) are carried in session metadata so the webhook can
    /// build the order without re-asking the client.
    pub async fn create_checkout_session(
        &self,
        items: &[CheckoutItem],
        shipping_address: &ShippingAddress,
        origin: &str,
        user_id: Option<&str>,
    ) -> ApiResult<CheckoutSession> {
        let params = session_form_params(items, shipping_address, origin, user_id)?;

        let response = self
            .http_client
            .post(format!("{}/checkout/sessions", STRIPE_API_BASE))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&params)
            .send()
            .await
            .map_err(|e| ApiError::Payment(format!("Stripe request failed: {}", e)))?;

        Self::parse_session_response(response).await
    }

    /// Retrieve a session, optionally expanding its line items
    pub async fn retrieve_session(
        &self,
        session_id: &str,
        expand_line_items: bool,
    ) -> ApiResult<CheckoutSession> {
        let mut request = self
            .http_client
            .get(format!("{}/checkout/sessions/{}", STRIPE_API_BASE, session_id))
            .basic_auth(&self.secret_key, None::<&str>);

        if expand_line_items {
            request = request.query(&[("expand[]", "line_items")]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Payment(format!("Stripe request failed: {}", e)))?;

        Self::parse_session_response(response).await
    }

    async fn parse_session_response(response: reqwest::Response) -> ApiResult<CheckoutSession> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Payment(format!("Failed to read Stripe response: {}", e)))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<StripeErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("Stripe returned status {}", status));
            return Err(ApiError::Payment(detail));
        }

        serde_json::from_str(&body)
            .map_err(|e| ApiError::Payment(format!("Unexpected Stripe response: {}", e)))
    }
}

/// Build the form-encoded parameter list for a Checkout session
fn session_form_params(
    items: &[CheckoutItem],
    shipping_address: &ShippingAddress,
    origin: &str,
    user_id: Option<&str>,
) -> ApiResult<Vec<(String, String)>> {
    let mut params: Vec<(String, String)> = vec![
        ("mode".to_string(), "payment".to_string()),
        (
            "payment_method_types[0]".to_string(),
            "card".to_string(),
        ),
        (
            "success_url".to_string(),
            format!("{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}", origin),
        ),
        ("cancel_url".to_string(), format!("{}/checkout", origin)),
        (
            "customer_email".to_string(),
            shipping_address.email.clone(),
        ),
    ];

    for (index, item) in items.iter().enumerate() {
        let prefix = format!("line_items[{}]", index);
        params.push((
            format!("{}[price_data][currency]", prefix),
            "pkr".to_string(),
        ));
        params.push((
            format!("{}[price_data][product_data][name]", prefix),
            item.name.clone(),
        ));
        // Image URLs are skipped; Stripe caps them at 2048 characters
        params.push((
            format!("{}[price_data][product_data][description]", prefix),
            format!(
                "Size: {}, Color: {}",
                item.size.as_deref().unwrap_or("N/A"),
                item.color.as_deref().unwrap_or("N/A")
            ),
        ));
        params.push((
            format!("{}[price_data][unit_amount]", prefix),
            ((item.price * 100.0).round() as i64).to_string(),
        ));
        params.push((format!("{}[quantity]", prefix), item.quantity.to_string()));
    }

    let metadata_items: Vec<MetadataItem> = items
        .iter()
        .map(|item| MetadataItem {
            product: item.product_ref(),
            name: Some(item.name.clone()),
            price: item.price,
            quantity: item.quantity,
            size: item.size.clone(),
            color: item.color.clone(),
        })
        .collect();

    params.push((
        "metadata[shippingAddress]".to_string(),
        serde_json::to_string(shipping_address)
            .map_err(|e| ApiError::Internal(format!("Failed to encode address: {}", e)))?,
    ));
    params.push((
        "metadata[userId]".to_string(),
        user_id.unwrap_or("guest").to_string(),
    ));
    params.push((
        "metadata[items]".to_string(),
        serde_json::to_string(&metadata_items)
            .map_err(|e| ApiError::Internal(format!("Failed to encode items: {}", e)))?,
    ));

    Ok(params)
}

/// Verify a `Stripe-Signature` header against the raw payload.
///
/// The header carries a timestamp and one or more `v1` signatures; a
/// signature is valid when HMAC-SHA256(secret, "{t}.{payload}") matches
/// any of them and the timestamp is within tolerance.
pub fn verify_stripe_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
) -> Result<(), ApiError> {
    verify_stripe_signature_at(payload, signature_header, secret, chrono::Utc::now().timestamp())
}

fn verify_stripe_signature_at(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    now: i64,
) -> Result<(), ApiError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        ApiError::Authentication("Malformed webhook signature header".to_string())
    })?;

    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(ApiError::Authentication(
            "Webhook signature timestamp out of tolerance".to_string(),
        ));
    }

    if signatures.is_empty() {
        return Err(ApiError::Authentication(
            "Missing webhook signature".to_string(),
        ));
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::Internal(format!("HMAC init failed: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    if signatures.iter().any(|sig| *sig == expected) {
        Ok(())
    } else {
        Err(ApiError::Authentication(
            "Webhook signature verification failed".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Amira Khan".to_string(),
            email: "amira@example.com".to_string(),
            phone: None,
            address: "12 Mall Road".to_string(),
            city: "Lahore".to_string(),
            postal: "54000".to_string(),
            country: "PK".to_string(),
        }
    }

    fn sample_items() -> Vec<CheckoutItem> {
        vec![CheckoutItem {
            product: Some("prod-1".to_string()),
            id: None,
            name: "Wool Shawl".to_string(),
            price: 2500.5,
            quantity: 2,
            size: Some("M".to_string()),
            color: None,
        }]
    }

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(payload);
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_session_params_include_line_items_and_metadata() {
        let params =
            session_form_params(&sample_items(), &sample_address(), "http://localhost:5173", None)
                .unwrap();

        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("customer_email"), Some("amira@example.com"));
        assert_eq!(
            get("line_items[0][price_data][currency]"),
            Some("pkr")
        );
        // Price is converted to the smallest unit
        assert_eq!(
            get("line_items[0][price_data][unit_amount]"),
            Some("250050")
        );
        assert_eq!(get("line_items[0][quantity]"), Some("2"));
        assert_eq!(get("metadata[userId]"), Some("guest"));
        assert_eq!(
            get("success_url"),
            Some("http://localhost:5173/checkout/success?session_id={CHECKOUT_SESSION_ID}")
        );

        let items: Vec<MetadataItem> =
            serde_json::from_str(get("metadata[items]").unwrap()).unwrap();
        assert_eq!(items[0].product.as_deref(), Some("prod-1"));
        assert_eq!(items[0].quantity, 2);
    }

    #[test]
    fn test_item_product_ref_falls_back_to_id() {
        let item = CheckoutItem {
            product: None,
            id: Some("prod-9".to_string()),
            name: "Cap".to_string(),
            price: 100.0,
            quantity: 1,
            size: None,
            color: None,
        };
        assert_eq!(item.product_ref().as_deref(), Some("prod-9"));
    }

    #[test]
    fn test_signature_round_trip() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let now = 1_700_000_000;
        let header = sign(payload, "whsec_test", now);

        assert!(verify_stripe_signature_at(payload, &header, "whsec_test", now).is_ok());
    }

    #[test]
    fn test_signature_wrong_secret_rejected() {
        let payload = b"{}";
        let now = 1_700_000_000;
        let header = sign(payload, "whsec_test", now);

        assert!(verify_stripe_signature_at(payload, &header, "whsec_other", now).is_err());
    }

    #[test]
    fn test_signature_tampered_payload_rejected() {
        let now = 1_700_000_000;
        let header = sign(b"{}", "whsec_test", now);

        assert!(verify_stripe_signature_at(b"{ }", &header, "whsec_test", now).is_err());
    }

    #[test]
    fn test_signature_stale_timestamp_rejected() {
        let payload = b"{}";
        let then = 1_700_000_000;
        let header = sign(payload, "whsec_test", then);

        let err =
            verify_stripe_signature_at(payload, &header, "whsec_test", then + 301).unwrap_err();
        assert!(matches!(err, ApiError::Authentication(_)));
    }

    #[test]
    fn test_malformed_header_rejected() {
        assert!(verify_stripe_signature_at(b"{}", "v1=abcdef", "whsec_test", 0).is_err());
        assert!(verify_stripe_signature_at(b"{}", "t=100", "whsec_test", 100).is_err());
    }

    #[test]
    fn test_webhook_event_parses() {
        let raw = r#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_test_1",
                    "url": null,
                    "payment_status": "paid",
                    "payment_intent": "pi_1",
                    "amount_total": 510000,
                    "customer_email": null,
                    "customer_details": { "email": "amira@example.com", "name": "Amira", "phone": null },
                    "metadata": { "userId": "guest", "items": "[]" },
                    "line_items": null
                }
            }
        }"#;

        let event: WebhookEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.event_type, "checkout.session.completed");
        assert_eq!(event.data.object.amount_total, Some(510_000));
        assert_eq!(event.data.object.metadata.get("userId").map(String::as_str), Some("guest"));
    }
}
