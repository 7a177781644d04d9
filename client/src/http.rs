//! reqwest implementation of [`ReservationGateway`].

use crate::config::ClientConfig;
use ryfty_booking::credentials::CredentialProvider;
use ryfty_booking::error::GatewayError;
use ryfty_booking::gateway::{GatewayFuture, ReservationGateway};
use ryfty_booking::types::{
    CheckinReply, DeviceInfo, ReservationId, ReservationReceipt, ReservationRequest,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Reservation body as the backend expects it: numbers travel as strings
#[derive(Debug, Serialize)]
struct ReservationBody {
    slot_id: String,
    experience_id: String,
    amount: String,
    total_amount: String,
    num_people: String,
    mpesa_number: String,
    is_bnpl: bool,
    remaining_amount: String,
}

impl From<&ReservationRequest> for ReservationBody {
    fn from(request: &ReservationRequest) -> Self {
        Self {
            slot_id: request.slot_id.to_string(),
            experience_id: request.experience_id.to_string(),
            amount: request.amount.to_decimal_string(),
            total_amount: request.total_amount.to_decimal_string(),
            num_people: request.party_size.to_string(),
            mpesa_number: request.payment_account.as_str().to_owned(),
            is_bnpl: request.deposit,
            remaining_amount: request.remaining_amount.to_decimal_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CheckinBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    number_of_guests: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// HTTP gateway to the ryfty backend
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    config: ClientConfig,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpGateway {
    /// Create a gateway; user calls take their bearer token from `credentials`
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        config: ClientConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    async fn send(request: RequestBuilder) -> Result<Response, GatewayError> {
        request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))
    }

    async fn decode<T: DeserializeOwned + Default>(response: Response) -> Result<T, GatewayError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    /// Map a non-success response onto the error taxonomy
    async fn failure(response: Response) -> GatewayError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let message = parsed.error.or(parsed.message).unwrap_or_default();

        tracing::debug!(status = status.as_u16(), message = %message, "backend returned an error");

        match status {
            StatusCode::UNAUTHORIZED => GatewayError::Unauthorized,
            s if s.is_client_error() => GatewayError::Rejected {
                status: s.as_u16(),
                message,
            },
            s if s.is_server_error() => GatewayError::Server {
                status: s.as_u16(),
                message,
            },
            s => GatewayError::UnexpectedStatus(s.as_u16()),
        }
    }
}

impl ReservationGateway for HttpGateway {
    fn create_reservation(&self, request: ReservationRequest) -> GatewayFuture<ReservationReceipt> {
        let url = self.config.url("/public/reservations_request");
        let token = self.credentials.auth_token();
        let client = self.client.clone();

        Box::pin(async move {
            let token = token.ok_or(GatewayError::Unauthorized)?;
            let body = ReservationBody::from(&request);

            tracing::debug!(slot_id = %request.slot_id, url = %url, "creating reservation");
            let response = Self::send(client.post(&url).bearer_auth(token).json(&body)).await?;

            if response.status().is_success() {
                Self::decode(response).await
            } else {
                Err(Self::failure(response).await)
            }
        })
    }

    fn checkin(
        &self,
        device_token: String,
        reservation_id: ReservationId,
    ) -> GatewayFuture<CheckinReply> {
        let url = self.config.url(&self.config.checkin_path);
        let client = self.client.clone();

        Box::pin(async move {
            let body = serde_json::json!({ "reservation_id": reservation_id });
            let response = Self::send(client.post(&url).bearer_auth(device_token).json(&body)).await?;

            match response.status() {
                StatusCode::OK | StatusCode::CREATED => {
                    let body: CheckinBody = Self::decode(response).await?;
                    Ok(CheckinReply::Success {
                        message: body.message,
                        number_of_guests: body.number_of_guests,
                    })
                },
                StatusCode::BAD_REQUEST => Ok(CheckinReply::AlreadyCheckedIn),
                StatusCode::NOT_FOUND => Ok(CheckinReply::NotFound),
                _ => Err(Self::failure(response).await),
            }
        })
    }

    fn verify_device(&self, device_token: String) -> GatewayFuture<DeviceInfo> {
        let url = self.config.url(&self.config.verify_path);
        let client = self.client.clone();

        Box::pin(async move {
            let body = serde_json::json!({ "token": device_token });
            let response = Self::send(client.post(&url).json(&body)).await?;

            if response.status().is_success() {
                Self::decode(response).await
            } else {
                Err(Self::failure(response).await)
            }
        })
    }
}
