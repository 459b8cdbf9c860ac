//! Example: run the three actions from the command line.
//!
//! Loads the regular config (`GRAPHLINK_CLIENT_ID` overrides the client id),
//! signs in, sends a test mail to the given address, and optionally uploads a
//! file to OneDrive.
//!
//! ## Running
//!
//! ```bash
//! export GRAPHLINK_CLIENT_ID="your-client-id-here"
//! cargo run -p graphlink-core --example send_test_mail -- someone@example.com [file]
//! ```

use graphlink_core::actions;
use graphlink_core::{AppContext, Config};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let to = args.next().ok_or("usage: send_test_mail <recipient> [file]")?;
    let file = args.next().map(PathBuf::from);

    let config = Config::load().await?;
    let ctx = AppContext::from_config(&config)?;

    println!("{}", actions::sign_in(Some(&ctx)).await);
    println!(
        "{}",
        actions::send_mail(Some(&ctx), "Test", "Hello from graphlink", &to).await
    );
    if let Some(file) = file {
        println!("{}", actions::upload_file(Some(&ctx), &file).await);
    }

    Ok(())
}
