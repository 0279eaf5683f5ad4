//! REST API client module for Pacifica.
//!
//! Type-safe HTTP client for the Pacifica trading API: signed order
//! placement and cancellation, plus public market metadata.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use pacifica_sdk::api::{CreateLimitOrderRequest, OrderSide, PacificaApiClient, TimeInForce};
//! use pacifica_sdk::sign::Signer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let signer = Signer::new("<base58 private key>", "<account>")?;
//!     let client = PacificaApiClient::new(signer, None)?;
//!
//!     let response = client
//!         .create_limit_order(
//!             CreateLimitOrderRequest {
//!                 symbol: "BTC".to_string(),
//!                 price: "50000".to_string(),
//!                 amount: "0.1".to_string(),
//!                 side: OrderSide::Bid,
//!                 tif: TimeInForce::Gtc,
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
//!
//! # Error Handling
//!
//! All methods return `ApiResult<T>`, an alias for `Result<T, ApiError>`:
//!
//! ```rust,ignore
//! use pacifica_sdk::api::ApiError;
//!
//! match client.create_limit_order(request, None).await {
//!     Ok(response) => println!("order id {}", response.order_id),
//!     Err(ApiError::BadRequest(body)) => println!("rejected: {}", body),
//!     Err(e) => println!("other error: {}", e),
//! }
//! ```

pub mod client;
pub mod error;
pub mod types;

// Re-export main types for convenience
pub use client::{PacificaApiClient, PacificaApiClientBuilder, RetryConfig};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use types::*;
