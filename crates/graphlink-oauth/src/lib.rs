//! # graphlink-oauth
//!
//! `OAuth2` public client for the Microsoft identity platform.
//!
//! ## Features
//!
//! - **Authorization flows**: Authorization Code Flow with PKCE and a loopback
//!   redirect listener, and Device Flow for hosts without a browser
//! - **Token management**: refresh, expiration checking, ID token claims
//! - **Account cache**: in-memory accounts and tokens for silent acquisition
//! - **Public client app**: silent-then-interactive acquisition building blocks
//!
//! ## Quick Start
//!
//! ```ignore
//! use graphlink_oauth::{Provider, PublicClientApp, SilentAcquisition};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = PublicClientApp::builder("your_client_id", Provider::microsoft()?).build()?;
//!     let scopes = vec!["User.Read".to_string()];
//!
//!     let accounts = app.accounts().await;
//!     let result = match app.acquire_token_silent(&scopes, accounts.first()).await {
//!         SilentAcquisition::Silent(result) => result,
//!         SilentAcquisition::InteractionRequired(_) => {
//!             app.acquire_token_interactive(&scopes).await?
//!         }
//!         SilentAcquisition::Failed(e) => return Err(e.into()),
//!     };
//!
//!     println!("Signed in as {}", result.account.username);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod app;
pub mod cache;
mod error;
pub mod flow;
pub mod provider;
pub mod token;

pub use app::{
    AuthenticationResult, InteractiveMethod, PublicClientApp, PublicClientAppBuilder,
    SilentAcquisition,
};
pub use cache::{Account, TokenCache};
pub use error::{Error, Result};
pub use flow::{AuthorizationCodeFlow, DeviceAuthorization, DeviceFlow, OAuthClient, PkceChallenge};
pub use provider::Provider;
pub use token::Token;
