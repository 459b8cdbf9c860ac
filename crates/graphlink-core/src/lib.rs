//! # graphlink-core
//!
//! Authenticated Microsoft Graph access for the `graphlink` desktop app.
//!
//! This crate provides:
//! - **Token Provider**: silent acquisition with a single interactive fallback
//! - **Request authentication**: bearer token on every request, fail closed
//! - **Graph client**: `/me`, `sendMail` and OneDrive simple upload
//! - **Actions**: sign in, send mail and upload file, reported as status lines
//! - **Configuration**: JSON config file with an environment override

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod actions;
pub mod auth;
pub mod config;
mod error;
pub mod graph;

pub use actions::{ActionOutcome, AppContext, NOT_INITIALIZED};
pub use auth::{
    IdentityClient, InteractiveFallbackProvider, RequestAuthenticator, TokenProvider,
    bearer_header,
};
pub use config::{Config, SignInMethod};
pub use error::{Error, ErrorKind, Result};
pub use graph::{DriveItem, GRAPH_BASE_URL, GraphClient, OutgoingMail, User};
pub use graphlink_oauth::DeviceAuthorization;
