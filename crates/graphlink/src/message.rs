//! Message types for application events.

use std::path::PathBuf;
use std::sync::Arc;

use graphlink_core::{ActionOutcome, AppContext};

/// Application messages (events).
#[derive(Debug, Clone)]
pub enum Message {
    /// Startup finished building the Graph context.
    ContextLoaded(Result<Arc<AppContext>, String>),

    // Form
    /// Subject field edited.
    SubjectChanged(String),
    /// Body field edited.
    BodyChanged(String),
    /// Recipient field edited.
    ToChanged(String),

    // Actions
    /// Sign in and greet the user.
    SignIn,
    /// Send the composed mail.
    SendEmail,
    /// Pick a file and upload it to OneDrive.
    UploadFile,
    /// The file dialog closed; `None` if cancelled.
    FilePicked(Option<PathBuf>),
    /// Device-code sign-in wants the user to visit a URL and enter a code.
    DeviceCode(String),
    /// An action finished.
    ActionFinished(ActionOutcome),
}
