//! Graph resource types used by the client.

use serde::{Deserialize, Serialize};

/// The signed-in user (`GET /me`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Object id.
    #[serde(default)]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Sign-in name.
    #[serde(default)]
    pub user_principal_name: Option<String>,
    /// Primary SMTP address.
    #[serde(default)]
    pub mail: Option<String>,
}

impl User {
    /// Best name to show for this user.
    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.user_principal_name.as_deref())
            .or(self.mail.as_deref())
            .unwrap_or(&self.id)
    }
}

/// A plain-text message to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// Recipient address. Not validated locally.
    pub to: String,
}

impl OutgoingMail {
    /// Creates a message.
    pub fn new(
        subject: impl Into<String>,
        body: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            to: to.into(),
        }
    }
}

/// Body of `POST /me/sendMail`.
#[derive(Debug, Serialize)]
pub(crate) struct SendMailRequest<'a> {
    message: Message<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Message<'a> {
    subject: &'a str,
    body: ItemBody<'a>,
    to_recipients: Vec<Recipient<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemBody<'a> {
    content_type: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Recipient<'a> {
    email_address: EmailAddress<'a>,
}

#[derive(Debug, Serialize)]
struct EmailAddress<'a> {
    address: &'a str,
}

impl<'a> From<&'a OutgoingMail> for SendMailRequest<'a> {
    fn from(mail: &'a OutgoingMail) -> Self {
        Self {
            message: Message {
                subject: &mail.subject,
                body: ItemBody {
                    content_type: "Text",
                    content: &mail.body,
                },
                to_recipients: vec![Recipient {
                    email_address: EmailAddress { address: &mail.to },
                }],
            },
        }
    }
}

/// A file or folder in OneDrive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    /// Item id.
    #[serde(default)]
    pub id: String,
    /// File name.
    #[serde(default)]
    pub name: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
    /// Browser URL.
    #[serde(default)]
    pub web_url: Option<String>,
}

/// Graph error envelope: `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}
