//! Main window layout.

use iced::widget::{Space, button, column, container, row, text, text_input};
use iced::{Alignment, Element, Length};

use crate::message::Message;
use crate::style;
use crate::{GraphLink, Status};

/// Renders the whole window.
pub fn view(app: &GraphLink) -> Element<'_, Message> {
    let title = text("graphlink").size(28);

    let subject_row = field_row("Subject:", &app.subject, "Enter subject", Message::SubjectChanged);
    let to_row = field_row("To:", &app.to, "recipient@example.com", Message::ToChanged);
    let body_row = field_row("Body:", &app.body, "Write your message here...", Message::BodyChanged);

    let buttons = row![
        action_button("Sign in", app.busy, Message::SignIn),
        action_button("Send email", app.busy, Message::SendEmail),
        action_button("Upload file", app.busy, Message::UploadFile),
    ]
    .spacing(12);

    let status: Element<'_, Message> = match &app.status {
        Status::Idle => Space::new().height(Length::Fixed(20.0)).into(),
        Status::Working(label) => text(label.as_str()).size(14).color(style::TEXT_MUTED).into(),
        Status::Done(outcome) => text(outcome.message())
            .size(14)
            .color(style::outcome_color(outcome))
            .into(),
    };

    let content = column![
        title,
        Space::new().height(Length::Fixed(12.0)),
        subject_row,
        to_row,
        body_row,
        Space::new().height(Length::Fixed(12.0)),
        buttons,
        Space::new().height(Length::Fixed(12.0)),
        status,
    ]
    .spacing(12)
    .padding(24)
    .width(Length::Fill);

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

fn field_row<'a>(
    label: &'a str,
    value: &'a str,
    placeholder: &'a str,
    on_input: fn(String) -> Message,
) -> Element<'a, Message> {
    row![
        text(label).size(14).width(Length::Fixed(80.0)),
        text_input(placeholder, value)
            .on_input(on_input)
            .padding(10)
            .size(14)
            .width(Length::Fill),
    ]
    .spacing(12)
    .align_y(Alignment::Center)
    .into()
}

fn action_button(label: &str, busy: bool, message: Message) -> Element<'_, Message> {
    button(text(label).size(14))
        .padding([10, 20])
        .style(style::primary_button_style)
        .on_press_maybe((!busy).then_some(message))
        .into()
}
