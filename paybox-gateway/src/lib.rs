//! Paybox Gateway: signed requests and verified responses for the Paybox
//! payment processor.
//!
//! The crate builds the two kinds of Paybox requests and checks what comes back:
//!
//! - **Paybox System**: a hosted payment form posted by the customer's browser,
//!   signed with an HMAC-SHA512 `PBX_HMAC` field
//! - **Paybox Direct**: server-to-server capture, cancellation and refund
//! - **Callbacks (IPN)**: signature, source address and amount checks
//!
//! Paybox runs a primary and backup servers per product. Requests target a single
//! server chosen by the [`ServerSelector`](server::ServerSelector); after a
//! transport failure or a "repeat" response code the caller picks another one
//! with [`find_from`](server::ServerSelector::find_from).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  builders   ┌────────────────┐   URL    ┌────────────────┐
//! │ PayboxGateway│────────────▶│ Authorization  │◀─────────│ ServerSelector │
//! │  (config)    │             │ DirectRequest  │          └────────────────┘
//! └──────────────┘             └───────┬────────┘
//!                                      │ ParameterMap
//!                    ┌─────────────────┼──────────────────┐
//!                    ▼                                    ▼
//!          ┌───────────────────┐               ┌────────────────────┐
//!          │ HmacHashGenerator │               │ Transport (reqwest)│
//!          │   + SecretStore   │               └─────────┬──────────┘
//!          └───────────────────┘                         ▼
//!                                               ┌────────────────────┐
//!                                               │  DirectResponse    │
//!                                               └────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## 1. Authorize a payment
//!
//! ```rust,no_run
//! use paybox_gateway::{
//!     PayboxGateway, config::PayboxConfig, requests::CaptureMode, signing::EnvSecretStore,
//! };
//! use rust_decimal::Decimal;
//!
//! # fn example() -> paybox_gateway::error::Result<()> {
//! // hmac_key = "PAYBOX_HMAC_KEY" names the environment variable holding the key
//! let config = PayboxConfig::from_file("paybox.toml")?;
//! let gateway = PayboxGateway::with_http(config, EnvSecretStore)?;
//!
//! let form = gateway
//!     .authorization(CaptureMode::WithoutCapture)
//!     .set_amount(Decimal::new(4990, 2), gateway.config().currency)?
//!     .set_payment_number("order-42")
//!     .set_customer_email("customer@example.com")
//!     .set_url()?
//!     .sign()?;
//!
//! // Render `form.params` as hidden inputs posting to `form.url`.
//! # Ok(())
//! # }
//! ```
//!
//! ## 2. Capture it, retrying on the other server
//!
//! ```rust,no_run
//! use paybox_gateway::{PayboxGateway, signing::EnvSecretStore, transport::HttpTransport};
//! use rust_decimal::Decimal;
//! use url::Url;
//!
//! # async fn example(
//! #     gateway: &PayboxGateway<HttpTransport, EnvSecretStore>,
//! #     authorization_url: &Url,
//! # ) -> paybox_gateway::error::Result<()> {
//! let capture = gateway
//!     .capture()
//!     .set_amount(Decimal::new(4990, 2), gateway.config().currency)?
//!     .set_payment_number("order-42")
//!     .set_day_request_number(17)?
//!     .set_paybox_call_number("0000783458")
//!     .set_paybox_transaction_number("0000571234");
//!
//! let first = capture.set_url_from(authorization_url, false)?;
//! let response = match first.send(None).await {
//!     Ok(response) if !response.should_be_repeated() => response,
//!     Err(e) if !e.is_retryable() => return Err(e),
//!     _ => {
//!         let retry_from = first.url().cloned().unwrap_or_else(|| authorization_url.clone());
//!         first.set_url_from(&retry_from, true)?.send(None).await?
//!     }
//! };
//! println!("capture: {}", response.response_code());
//! # Ok(())
//! # }
//! ```
//!
//! ## 3. Verify a callback
//!
//! ```rust,no_run
//! use paybox_gateway::{PayboxGateway, signing::EnvSecretStore, transport::HttpTransport};
//!
//! # fn example(gateway: &PayboxGateway<HttpTransport, EnvSecretStore>, query: &str) {
//! let notification = gateway.verifier().verify_query(query);
//! if notification.is_verified() && notification.is_success() {
//!     println!("paid: {:?}", notification.order_number());
//! }
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`amount`]: currencies and minor-unit formatting
//! - [`params`]: ordered protocol fields
//! - [`signing`]: HMAC generation and secret stores
//! - [`server`]: endpoints and failover selection
//! - [`requests`]: Paybox System and Paybox Direct builders
//! - [`transport`]: HTTP POST abstraction
//! - [`response`]: Paybox Direct reply decoding
//! - [`notification`]: callback verification
//! - [`config`]: TOML merchant configuration
//!
//! # Security Considerations
//!
//! - The HMAC key is read from a [`SecretStore`](signing::SecretStore) for each
//!   signature and held in a zeroizing buffer only for that call.
//! - Transports and configured URLs are HTTPS-only; loopback hosts are refused.
//! - A failed callback verification is a `false`, never an error, so hostile
//!   input cannot surface as a server fault.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![allow(clippy::multiple_crate_versions, reason = "transitive dependencies from reqwest")]

pub mod amount;
pub mod config;
pub mod error;
pub mod gateway;
pub mod notification;
pub mod params;
pub mod requests;
pub mod response;
pub mod server;
pub mod signing;
pub mod transport;

pub use error::{PayboxError, Result};
pub use gateway::PayboxGateway;
