//! Payment Gateway Adapter: the outbound contract with the aipay bridge.

pub mod client;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use client::AipayClient;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("gateway returned HTTP {0}")]
    Status(u16),
    #[error("gateway rejected the request: code {code}, {msg}")]
    Rejected { code: i64, msg: String },
    #[error("invalid response from gateway: {0}")]
    InvalidResponse(String),
    #[error("circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
    #[error("payment gateway is not configured")]
    NotConfigured,
}

/// A recharge the gateway should turn into a request packet.
#[derive(Debug, Clone)]
pub struct RechargeOrder {
    pub order_id: String,
    pub amount: BigDecimal,
    /// Account the gateway bills against.
    pub payer_account: String,
}

/// Response envelope shared by both gateway endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEnvelope<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

/// Confirmation of an asynchronous payment notification.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NotifyResult {
    #[serde(rename = "signPayNotifyMsg", default)]
    pub sign_pay_notify_msg: String,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub result: i64,
}

impl NotifyResult {
    pub fn succeeded(&self) -> bool {
        self.result == 0
    }
}

pub type NotifyEnvelope = GatewayEnvelope<NotifyResult>;

/// What the caller posts to the payment page to continue a recharge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRedirect {
    pub aiurl: String,
    pub method: String,
    pub payloads: Vec<Payload>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payload {
    pub name: String,
    pub value: String,
}

impl PaymentRedirect {
    pub fn new(aiurl: &str, request_packet: String) -> Self {
        Self {
            aiurl: aiurl.to_string(),
            method: "POST".to_string(),
            payloads: vec![Payload {
                name: "requestPacket".to_string(),
                value: request_packet,
            }],
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Submits a recharge and returns the opaque request packet.
    async fn request_packet(&self, order: &RechargeOrder) -> Result<String, GatewayError>;

    /// Forwards a raw notification upstream and returns its decoded verdict.
    async fn confirm_notification(&self, body: &[u8]) -> Result<NotifyEnvelope, GatewayError>;
}

/// `data` is normally the packet string; anything else is passed through as JSON.
/// Stand-in for operator commands that never reach the gateway.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn request_packet(&self, _order: &RechargeOrder) -> Result<String, GatewayError> {
        Err(GatewayError::NotConfigured)
    }

    async fn confirm_notification(&self, _body: &[u8]) -> Result<NotifyEnvelope, GatewayError> {
        Err(GatewayError::NotConfigured)
    }
}

pub(crate) fn packet_from_data(data: Option<Value>) -> Result<String, GatewayError> {
    match data {
        Some(Value::String(packet)) => Ok(packet),
        Some(Value::Null) | None => Err(GatewayError::InvalidResponse(
            "missing request packet".to_string(),
        )),
        Some(other) => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_envelope_decodes_with_missing_fields() {
        let envelope: NotifyEnvelope = serde_json::from_str(
            r#"{"code":0,"data":{"signPayNotifyMsg":"SIGNED","order_id":"TX1","result":0}}"#,
        )
        .unwrap();
        let data = envelope.data.unwrap();
        assert_eq!(data.sign_pay_notify_msg, "SIGNED");
        assert!(data.succeeded());

        let bare: NotifyEnvelope = serde_json::from_str(r#"{"code":1001,"msg":"bad sign"}"#).unwrap();
        assert_eq!(bare.code, 1001);
        assert!(bare.data.is_none());
    }

    #[test]
    fn test_packet_from_data() {
        assert_eq!(
            packet_from_data(Some(Value::String("<xml/>".into()))).unwrap(),
            "<xml/>"
        );
        assert_eq!(
            packet_from_data(Some(serde_json::json!({"k": 1}))).unwrap(),
            r#"{"k":1}"#
        );
        assert!(packet_from_data(None).is_err());
    }

    #[test]
    fn test_redirect_shape() {
        let redirect = PaymentRedirect::new("https://pay.example", "PKT".to_string());
        let json = serde_json::to_value(&redirect).unwrap();
        assert_eq!(json["method"], "POST");
        assert_eq!(json["payloads"][0]["name"], "requestPacket");
        assert_eq!(json["payloads"][0]["value"], "PKT");
    }
}
