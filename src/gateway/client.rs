use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

use super::{packet_from_data, GatewayEnvelope, GatewayError, NotifyEnvelope, PaymentGateway, RechargeOrder};

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

#[derive(Debug, Serialize)]
struct RechargeSubmission<'a> {
    order_id: &'a str,
    amount: f64,
    #[serde(rename = "returnUrl")]
    return_url: &'a str,
}

/// HTTP client for the aipay bridge (`JAVA_AIPAY_REQUESTPACKET_URL`).
#[derive(Clone)]
pub struct AipayClient {
    client: Client,
    base_url: String,
    return_url: String,
    circuit_breaker: Breaker,
}

impl AipayClient {
    pub fn new(base_url: String, return_url: String, timeout: Duration) -> Self {
        Self::with_circuit_breaker(base_url, return_url, timeout, 5, 30)
    }

    pub fn with_circuit_breaker(
        base_url: String,
        return_url: String,
        timeout: Duration,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            return_url,
            circuit_breaker,
        }
    }

    async fn guarded<T, F>(&self, call: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        match self.circuit_breaker.call(call).await {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitBreakerOpen(
                "aipay circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

#[async_trait]
impl PaymentGateway for AipayClient {
    async fn request_packet(&self, order: &RechargeOrder) -> Result<String, GatewayError> {
        let url = format!("{}/bill/{}/recharge", self.base_url, order.payer_account);
        let amount = order
            .amount
            .to_string()
            .parse::<f64>()
            .map_err(|e| GatewayError::InvalidResponse(format!("amount not representable: {}", e)))?;
        let body = RechargeSubmission {
            order_id: &order.order_id,
            amount,
            return_url: &self.return_url,
        };
        let request = self.client.put(&url).json(&body);

        self.guarded(async move {
            let response = request.send().await?;
            if response.status() != StatusCode::OK {
                return Err(GatewayError::Status(response.status().as_u16()));
            }

            let envelope = response
                .json::<GatewayEnvelope<Value>>()
                .await
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
            if envelope.code != 0 {
                return Err(GatewayError::Rejected {
                    code: envelope.code,
                    msg: envelope.msg,
                });
            }

            packet_from_data(envelope.data)
        })
        .await
    }

    async fn confirm_notification(&self, body: &[u8]) -> Result<NotifyEnvelope, GatewayError> {
        let url = format!("{}/payconfirm/message", self.base_url);
        let request = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_vec());

        self.guarded(async move {
            let response = request.send().await?;
            if response.status() != StatusCode::OK {
                return Err(GatewayError::Status(response.status().as_u16()));
            }

            response
                .json::<NotifyEnvelope>()
                .await
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
        })
        .await
    }
}
