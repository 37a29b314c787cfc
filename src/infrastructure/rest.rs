use crate::domain::card::SavedCard;
use crate::domain::money::{Amount, PointsBalance};
use crate::domain::ports::{BackendAck, CardCharge, PaymentBackend, PointsPayment};
use crate::domain::slot::Slot;
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// [`PaymentBackend`] over the parking REST API.
#[derive(Debug, Clone)]
pub struct RestPaymentBackend {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CardChargeBody<'a> {
    user_id: &'a str,
    vehicle_identifier: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    card_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PointsPaymentBody<'a> {
    user_id: &'a str,
    vehicle_identifier: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TopUpBody<'a> {
    user_id: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceBody {
    points_balance: PointsBalance,
}

#[derive(Serialize)]
struct BookSlotBody<'a> {
    slot_id: u32,
    vehicle_plate: &'a str,
}

#[derive(Serialize)]
struct ClearSlotBody {
    slot_id: u32,
    #[serde(with = "rust_decimal::serde::float")]
    rate_per_hour: Decimal,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct AckBody {
    ok: Option<bool>,
    message: Option<String>,
}

impl RestPaymentBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .user_agent(format!("parkpay/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, BackendError> {
        debug!("request: GET {path} {query:?}");
        let response = self.client.get(self.url(path)).query(query).send().await?;
        let response = Self::check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let response = self.send_post(path, body).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    /// Posts and reads the `{ok, message?}` acknowledgement. An empty or
    /// non-JSON 2xx body counts as a plain acknowledgement.
    async fn post_ack<B: Serialize>(&self, path: &str, body: &B) -> Result<BackendAck, BackendError> {
        let bytes = self.send_post(path, body).await?.bytes().await?;
        let ack = match serde_json::from_slice::<AckBody>(&bytes) {
            Ok(ack) => ack,
            Err(err) => {
                debug!("acknowledgement of {path} is not JSON: {err}");
                AckBody::default()
            }
        };
        if ack.ok == Some(false) {
            return Err(BackendError::Rejected(
                ack.message.unwrap_or_else(|| "Request rejected".to_string()),
            ));
        }
        Ok(BackendAck {
            message: ack.message,
        })
    }

    async fn send_post<B: Serialize>(&self, path: &str, body: &B) -> Result<Response, BackendError> {
        debug!("request: POST {path}");
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::check_status(response).await
    }

    async fn check_status(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(Self::status_error(response, status).await)
    }

    async fn status_error(response: Response, status: StatusCode) -> BackendError {
        let message = match response.json::<Value>().await {
            Ok(body) => error_message(&body),
            Err(err) => {
                debug!("error body is not JSON: {err}");
                None
            }
        };
        BackendError::Status {
            status: status.as_u16(),
            message: message.unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            }),
        }
    }
}

/// `message`, then FastAPI's `detail`, then `error`.
fn error_message(body: &Value) -> Option<String> {
    ["message", "detail", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

#[async_trait]
impl PaymentBackend for RestPaymentBackend {
    async fn charge_card(&self, charge: &CardCharge) -> Result<BackendAck, BackendError> {
        let body = CardChargeBody {
            user_id: &charge.user_id,
            vehicle_identifier: &charge.vehicle_id,
            amount: charge.amount.value(),
            card_id: &charge.card_id,
        };
        self.post_ack("/pay/card", &body).await
    }

    async fn pay_points(&self, payment: &PointsPayment) -> Result<BackendAck, BackendError> {
        let body = PointsPaymentBody {
            user_id: &payment.user_id,
            vehicle_identifier: &payment.vehicle_id,
            amount: payment.amount.value(),
        };
        self.post_ack("/pay/points", &body).await
    }

    async fn top_up_points(
        &self,
        user_id: &str,
        amount: Amount,
    ) -> Result<PointsBalance, BackendError> {
        let body = TopUpBody {
            user_id,
            amount: amount.value(),
        };
        let reply: BalanceBody = self.post("/topup/points", &body).await?;
        Ok(reply.points_balance)
    }

    async fn points_balance(&self, user_id: &str) -> Result<PointsBalance, BackendError> {
        let reply: BalanceBody = self.get("/points", &[("userId", user_id)]).await?;
        Ok(reply.points_balance)
    }

    async fn saved_cards(&self, user_id: &str) -> Result<Vec<SavedCard>, BackendError> {
        self.get("/cards", &[("userId", user_id)]).await
    }

    async fn slots(&self) -> Result<Vec<Slot>, BackendError> {
        self.get("/slots", &[]).await
    }

    async fn book_slot(&self, slot_id: u32, plate: &str) -> Result<BackendAck, BackendError> {
        let body = BookSlotBody {
            slot_id,
            vehicle_plate: plate,
        };
        self.post_ack("/slots/book", &body).await
    }

    async fn clear_slot(
        &self,
        slot_id: u32,
        rate_per_hour: Decimal,
    ) -> Result<BackendAck, BackendError> {
        let body = ClearSlotBody {
            slot_id,
            rate_per_hour,
        };
        self.post_ack("/slots/clear", &body).await
    }
}
