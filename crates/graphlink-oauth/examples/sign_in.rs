//! Example: sign in to Microsoft 365 and print the account.
//!
//! Tries a silent acquisition first (always interactive on a fresh run, the
//! cache lives in memory), then signs in through the system browser or, with
//! `--device`, the device-code flow.
//!
//! ## Prerequisites
//!
//! Register a public client application in Microsoft Entra ID with the
//! redirect URI `http://localhost` (mobile and desktop platform), then:
//!
//! ```bash
//! export GRAPHLINK_CLIENT_ID="your-client-id-here"
//! ```
//!
//! ## Running
//!
//! ```bash
//! cargo run -p graphlink-oauth --example sign_in
//! cargo run -p graphlink-oauth --example sign_in -- --device
//! ```

use graphlink_oauth::{InteractiveMethod, Provider, PublicClientApp, SilentAcquisition};
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client_id = env::var("GRAPHLINK_CLIENT_ID")
        .map_err(|_| "GRAPHLINK_CLIENT_ID environment variable not set")?;
    let method = if env::args().any(|a| a == "--device") {
        InteractiveMethod::DeviceCode
    } else {
        InteractiveMethod::Browser
    };

    let app = PublicClientApp::builder(client_id, Provider::microsoft()?)
        .with_interactive_method(method)
        .with_device_prompt(|auth| println!("{}", auth.instructions()))
        .build()?;
    let scopes = vec!["User.Read".to_string(), "offline_access".to_string()];

    let accounts = app.accounts().await;
    let result = match app.acquire_token_silent(&scopes, accounts.first()).await {
        SilentAcquisition::Silent(result) => result,
        SilentAcquisition::InteractionRequired(reason) => {
            println!("Interactive sign-in required ({reason})");
            app.acquire_token_interactive(&scopes).await?
        }
        SilentAcquisition::Failed(e) => return Err(e.into()),
    };

    println!("Signed in as {}", result.account.username);
    println!("  Account id: {}", result.account.home_account_id);
    if let Some(expires_at) = result.token.expires_at {
        println!("  Token expires at: {expires_at}");
    }
    println!(
        "  Refresh token: {}",
        if result.token.refresh_token.is_some() { "yes" } else { "no" }
    );

    Ok(())
}
