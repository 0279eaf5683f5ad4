//! Pacifica REST API client implementation.
//!
//! The [`PacificaApiClient`] signs every trading request with its
//! [`Signer`](crate::sign::Signer) and submits it over HTTPS.
//!
//! # Example
//!
//! ```rust,ignore
//! use pacifica_sdk::api::{PacificaApiClient, CreateMarketOrderRequest, OrderSide};
//! use pacifica_sdk::sign::Signer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let signer = Signer::new("<base58 private key>", "<account>")?;
//!     let client = PacificaApiClient::new(signer, None)?;
//!
//!     let response = client
//!         .create_market_order(
//!             CreateMarketOrderRequest {
//!                 symbol: "BTC".to_string(),
//!                 amount: "0.1".to_string(),
//!                 side: OrderSide::Bid,
//!                 slippage_percent: "0.5".to_string(),
//!                 reduce_only: false,
//!                 client_order_id: String::new(),
//!                 take_profit: None,
//!                 stop_loss: None,
//!             },
//!             None,
//!         )
//!         .await?;
//!     println!("order id {}", response.order_id);
//!
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::api::types::*;
use crate::network::DEFAULT_API_URL;
use crate::sign::{SignError, Signer};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Retry configuration for the API client.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = disabled)
    pub max_retries: u32,
    /// Base delay before first retry (ms)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (ms)
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 100,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with the given max retries.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Set the base delay in milliseconds.
    pub fn with_base_delay_ms(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    /// Set the maximum delay in milliseconds.
    pub fn with_max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    /// Calculate delay for a given attempt with exponential backoff and jitter.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp_delay = self.base_delay_ms.saturating_mul(1 << attempt.min(10));
        let capped_delay = exp_delay.min(self.max_delay_ms);
        // Add jitter: 75-100% of calculated delay
        let jitter_range = capped_delay / 4;
        let jitter = rand::random::<u64>() % (jitter_range + 1);
        Duration::from_millis(capped_delay - jitter_range + jitter)
    }
}

/// Builder for configuring [`PacificaApiClient`].
#[derive(Debug, Clone)]
pub struct PacificaApiClientBuilder {
    signer: Signer,
    base_url: String,
    timeout: Duration,
    default_headers: Vec<(String, String)>,
    retry_config: RetryConfig,
}

impl PacificaApiClientBuilder {
    /// Create a new builder with the given signer; `None` for the base URL
    /// selects the mainnet endpoint.
    pub fn new(signer: Signer, base_url: Option<&str>) -> Self {
        Self {
            signer,
            base_url: base_url
                .unwrap_or(DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            default_headers: Vec::new(),
            retry_config: RetryConfig::default(),
        }
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the timeout in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Add a default header to all requests.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Enable retries with exponential backoff.
    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Build the client.
    pub fn build(self) -> ApiResult<PacificaApiClient> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        for (name, value) in self.default_headers {
            let header_name =
                reqwest::header::HeaderName::try_from(name.as_str()).map_err(|e| {
                    ApiError::InvalidParameter(format!("Invalid header name '{}': {}", name, e))
                })?;
            let header_value = reqwest::header::HeaderValue::from_str(&value).map_err(|e| {
                ApiError::InvalidParameter(format!("Invalid header value for '{}': {}", name, e))
            })?;
            headers.insert(header_name, header_value);
        }

        let http_client = Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(10)
            .default_headers(headers)
            .build()?;

        Ok(PacificaApiClient {
            http_client,
            base_url: self.base_url,
            retry_config: self.retry_config,
            signer: self.signer,
        })
    }
}

/// Pacifica REST API client.
///
/// Cheap to clone; clones share the HTTP connection pool.
#[derive(Debug, Clone)]
pub struct PacificaApiClient {
    http_client: Client,
    base_url: String,
    retry_config: RetryConfig,
    signer: Signer,
}

impl PacificaApiClient {
    /// Create a new client with default settings (30s timeout, connection
    /// pooling, no retries). `None` for the base URL selects the mainnet
    /// endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(signer: Signer, base_url: Option<&str>) -> ApiResult<Self> {
        PacificaApiClientBuilder::new(signer, base_url).build()
    }

    /// Create a new client builder for custom configuration.
    pub fn builder(signer: Signer, base_url: Option<&str>) -> PacificaApiClientBuilder {
        PacificaApiClientBuilder::new(signer, base_url)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The account this client signs for.
    pub fn account(&self) -> &str {
        self.signer.account()
    }

    // =========================================================================
    // Order endpoints
    // =========================================================================

    /// Place a limit order.
    ///
    /// The operation data is signed as `create_order` and posted to
    /// `/orders/create`.
    pub async fn create_limit_order(
        &self,
        request: CreateLimitOrderRequest,
        options: Option<RequestOptions>,
    ) -> ApiResult<CreateOrderResponse> {
        request.validate()?;
        let body = self.signed_body("create_order", &request, options.as_ref())?;
        let url = format!("{}/orders/create", self.base_url);
        self.post(&url, &body).await
    }

    /// Place a market order.
    ///
    /// The operation data is signed as `create_market_order` and posted to
    /// `/orders/create_market`.
    pub async fn create_market_order(
        &self,
        request: CreateMarketOrderRequest,
        options: Option<RequestOptions>,
    ) -> ApiResult<CreateOrderResponse> {
        request.validate()?;
        let body = self.signed_body("create_market_order", &request, options.as_ref())?;
        let url = format!("{}/orders/create_market", self.base_url);
        self.post(&url, &body).await
    }

    /// Cancel an order by venue id or client id.
    ///
    /// The operation data is signed as `cancel_order` and posted to
    /// `/orders/cancel`.
    pub async fn cancel_order(
        &self,
        request: CancelOrderRequest,
        options: Option<RequestOptions>,
    ) -> ApiResult<CancelOrderResponse> {
        request.validate()?;
        let request = request.normalized();
        let body = self.signed_body("cancel_order", &request, options.as_ref())?;
        let url = format!("{}/orders/cancel", self.base_url);
        self.post(&url, &body).await
    }

    // =========================================================================
    // Market endpoints
    // =========================================================================

    /// Get metadata for every tradable symbol.
    ///
    /// Unsigned; fetched from `GET /info`.
    pub async fn get_market_info(&self) -> ApiResult<Vec<SymbolInfo>> {
        let url = format!("{}/info", self.base_url);
        let response: MarketInfoResponse = self.get(&url).await?;
        if !response.success {
            let text = match response.error {
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => "unknown error".to_string(),
            };
            return Err(ApiError::Api(ErrorResponse::from_text(text)));
        }
        Ok(response.data)
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    /// Sign an operation and flatten it into the request body.
    ///
    /// An `agent_wallet` override from the options replaces the signer's
    /// public key after signing; the signature itself never covers it.
    fn signed_body<T: serde::Serialize>(
        &self,
        operation_type: &str,
        operation_data: &T,
        options: Option<&RequestOptions>,
    ) -> ApiResult<Value> {
        let data = serde_json::to_value(operation_data)
            .map_err(|e| SignError::Serialize(e.to_string()))?;
        let expiry_window = options.map(|o| o.expiry_window).unwrap_or(0);

        let mut body = self
            .signer
            .build_signed_request(operation_type, &data, expiry_window)?;

        if let Some(wallet) = options.and_then(|o| o.agent_wallet.as_ref()) {
            body.insert("agent_wallet".to_string(), Value::String(wallet.clone()));
        }

        Ok(Value::Object(body))
    }

    /// Execute a GET request with optional retry logic.
    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        self.execute_with_retry(|| self.http_client.get(url).send())
            .await
    }

    /// Execute a POST request with JSON body and optional retry logic.
    async fn post<T: serde::de::DeserializeOwned>(&self, url: &str, body: &Value) -> ApiResult<T> {
        self.execute_with_retry(|| self.http_client.post(url).json(body).send())
            .await
    }

    /// Execute a request with retry logic.
    async fn execute_with_retry<T, F, Fut>(&self, request_fn: F) -> ApiResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
        T: serde::de::DeserializeOwned,
    {
        let mut attempt = 0;

        loop {
            let result = request_fn().await;

            match result {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response.json::<T>().await.map_err(|e| {
                            ApiError::Deserialize(format!("Failed to deserialize response: {}", e))
                        });
                    }

                    let error = self.parse_error_response(response).await;

                    if attempt < self.retry_config.max_retries && Self::is_retryable_status(status)
                    {
                        let delay = self.retry_config.delay_for_attempt(attempt);
                        tracing::debug!(
                            attempt = attempt + 1,
                            max_retries = self.retry_config.max_retries,
                            delay_ms = delay.as_millis(),
                            status = %status,
                            "Retrying request after error"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(error);
                }
                Err(e) => {
                    let is_retryable = e.is_connect() || e.is_timeout() || e.is_request();

                    if attempt < self.retry_config.max_retries && is_retryable {
                        let delay = self.retry_config.delay_for_attempt(attempt);
                        tracing::debug!(
                            attempt = attempt + 1,
                            max_retries = self.retry_config.max_retries,
                            delay_ms = delay.as_millis(),
                            error = %e,
                            "Retrying request after network error"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(ApiError::Http(e));
                }
            }
        }
    }

    /// Parse an error response into an ApiError.
    async fn parse_error_response(&self, response: reqwest::Response) -> ApiError {
        let status = response.status();
        let error_text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Failed to read error response body: {}", e);
                return Self::map_status_error(
                    status,
                    ErrorResponse::from_text(format!("HTTP {} (body unreadable: {})", status, e)),
                );
            }
        };

        let error_response = serde_json::from_str::<ErrorResponse>(&error_text)
            .unwrap_or_else(|_| ErrorResponse::from_text(error_text));

        Self::map_status_error(status, error_response)
    }

    /// Map HTTP status code to ApiError.
    fn map_status_error(status: StatusCode, response: ErrorResponse) -> ApiError {
        match status {
            StatusCode::BAD_REQUEST => ApiError::BadRequest(response),
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited(response),
            _ if status.is_server_error() => ApiError::ServerError(response),
            _ => ApiError::UnexpectedStatus(status.as_u16(), response),
        }
    }

    /// Check if a status code is retryable.
    fn is_retryable_status(status: StatusCode) -> bool {
        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
    }
}
