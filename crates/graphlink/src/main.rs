//! `graphlink` - sign in to Microsoft 365, send a test mail, upload a file.
//!
//! Built with iced; all Graph access goes through `graphlink-core`.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod message;
mod style;
mod view;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use graphlink_core::actions::{self, ActionOutcome};
use graphlink_core::{AppContext, Config, DeviceAuthorization};
use iced::futures::channel::mpsc;
use iced::{Element, Task};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use message::Message;

fn main() -> iced::Result {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "graphlink=debug,graphlink_core=debug,graphlink_oauth=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting graphlink");

    iced::application(GraphLink::new, GraphLink::update, GraphLink::view)
        .title("graphlink")
        .run()
}

/// What the status line shows.
#[derive(Debug, Clone, Default)]
enum Status {
    #[default]
    Idle,
    Working(String),
    Done(ActionOutcome),
}

/// Main application state.
#[derive(Debug, Default)]
struct GraphLink {
    /// Graph context; `None` until startup finishes or if it failed.
    ctx: Option<Arc<AppContext>>,
    subject: String,
    body: String,
    to: String,
    status: Status,
    /// An action is in flight; buttons are disabled.
    busy: bool,
}

impl GraphLink {
    fn new() -> (Self, Task<Message>) {
        let app = Self {
            status: Status::Working("Loading configuration...".into()),
            ..Self::default()
        };
        // Device-code instructions arrive while sign-in is running.
        let (prompt_tx, prompt_rx) = mpsc::unbounded();
        let task = Task::batch([
            Task::perform(load_context(prompt_tx), |result| {
                Message::ContextLoaded(result.map_err(|e| format!("{e:#}")))
            }),
            Task::run(prompt_rx, Message::DeviceCode),
        ]);
        (app, task)
    }

    #[allow(clippy::needless_pass_by_value)]
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::ContextLoaded(Ok(ctx)) => {
                info!("Graph client ready");
                self.ctx = Some(ctx);
                self.status = Status::Idle;
            }
            Message::ContextLoaded(Err(e)) => {
                // Actions still run and report that the client is missing.
                warn!("Failed to initialize Graph client: {e}");
                self.status = Status::Done(ActionOutcome::ApiError(format!(
                    "Error loading configuration: {e}"
                )));
            }
            Message::SubjectChanged(s) => self.subject = s,
            Message::BodyChanged(s) => self.body = s,
            Message::ToChanged(s) => self.to = s,
            Message::SignIn => {
                if self.start("Signing in...") {
                    let ctx = self.ctx.clone();
                    return Task::perform(
                        async move { actions::sign_in(ctx.as_deref()).await },
                        Message::ActionFinished,
                    );
                }
            }
            Message::SendEmail => {
                if self.start("Sending email...") {
                    let ctx = self.ctx.clone();
                    let (subject, body, to) =
                        (self.subject.clone(), self.body.clone(), self.to.clone());
                    return Task::perform(
                        async move { actions::send_mail(ctx.as_deref(), &subject, &body, &to).await },
                        Message::ActionFinished,
                    );
                }
            }
            Message::UploadFile => {
                if self.start("Choosing file...") {
                    return Task::perform(pick_file(), Message::FilePicked);
                }
            }
            Message::FilePicked(None) => {
                self.busy = false;
                self.status = Status::Idle;
            }
            Message::FilePicked(Some(path)) => {
                self.status = Status::Working(format!("Uploading {}...", path.display()));
                let ctx = self.ctx.clone();
                return Task::perform(
                    async move { actions::upload_file(ctx.as_deref(), &path).await },
                    Message::ActionFinished,
                );
            }
            Message::DeviceCode(instructions) => {
                info!("Waiting for device-code sign-in");
                self.status = Status::Working(instructions);
            }
            Message::ActionFinished(outcome) => {
                self.busy = false;
                self.status = Status::Done(outcome);
            }
        }
        Task::none()
    }

    fn view(&self) -> Element<'_, Message> {
        view::view(self)
    }

    /// Marks an action as started. Returns false if one is already running.
    fn start(&mut self, label: &str) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        self.status = Status::Working(label.to_string());
        true
    }
}

/// Loads the config and builds the Graph context.
async fn load_context(prompts: mpsc::UnboundedSender<String>) -> anyhow::Result<Arc<AppContext>> {
    let config = Config::load()
        .await
        .with_context(|| format!("reading {}", Config::path().display()))?;
    let ctx = AppContext::from_config_with_device_prompt(&config, device_prompt(prompts))
        .context("building Graph client")?;
    Ok(Arc::new(ctx))
}

/// Forwards device-code instructions to the status line.
fn device_prompt(
    prompts: mpsc::UnboundedSender<String>,
) -> impl Fn(&DeviceAuthorization) + Send + Sync + 'static {
    move |auth: &DeviceAuthorization| {
        if prompts.unbounded_send(auth.instructions()).is_err() {
            warn!("UI closed; device code: {}", auth.instructions());
        }
    }
}

async fn pick_file() -> Option<PathBuf> {
    rfd::AsyncFileDialog::new()
        .set_title("Choose a file to upload")
        .pick_file()
        .await
        .map(|handle| handle.path().to_path_buf())
}
