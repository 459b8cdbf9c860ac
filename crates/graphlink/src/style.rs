//! Colors and widget styles.

use iced::widget::button;
use iced::{Background, Border, Color};

use graphlink_core::ActionOutcome;

pub const PRIMARY: Color = Color::from_rgb(0.0, 0.48, 0.95);
pub const PRIMARY_LIGHT: Color = Color::from_rgb(0.35, 0.65, 1.0);
pub const PRIMARY_DARK: Color = Color::from_rgb(0.0, 0.38, 0.80);
pub const TEXT_ON_PRIMARY: Color = Color::WHITE;
pub const TEXT_MUTED: Color = Color::from_rgb(0.55, 0.57, 0.62);
pub const ACCENT_GREEN: Color = Color::from_rgb(0.20, 0.73, 0.42);
pub const ACCENT_YELLOW: Color = Color::from_rgb(0.95, 0.70, 0.15);
pub const ACCENT_RED: Color = Color::from_rgb(0.92, 0.30, 0.30);

const RADIUS: f32 = 8.0;

/// Filled button for the three actions.
pub fn primary_button_style(_theme: &iced::Theme, status: button::Status) -> button::Style {
    let base = button::Style {
        background: Some(Background::Color(PRIMARY)),
        text_color: TEXT_ON_PRIMARY,
        border: Border {
            color: PRIMARY_LIGHT,
            width: 1.0,
            radius: RADIUS.into(),
        },
        ..button::Style::default()
    };

    match status {
        button::Status::Active => base,
        button::Status::Hovered => button::Style {
            background: Some(Background::Color(PRIMARY_LIGHT)),
            ..base
        },
        button::Status::Pressed => button::Style {
            background: Some(Background::Color(PRIMARY_DARK)),
            ..base
        },
        button::Status::Disabled => button::Style {
            background: Some(Background::Color(Color { a: 0.4, ..PRIMARY })),
            text_color: Color {
                a: 0.6,
                ..TEXT_ON_PRIMARY
            },
            ..base
        },
    }
}

/// Status line color for an action outcome.
pub const fn outcome_color(outcome: &ActionOutcome) -> Color {
    match outcome {
        ActionOutcome::Success(_) => ACCENT_GREEN,
        ActionOutcome::AuthError(_) => ACCENT_YELLOW,
        ActionOutcome::ApiError(_) => ACCENT_RED,
    }
}
