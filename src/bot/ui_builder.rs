//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::generation::{model_display_name, MODELS};
use crate::quiz::Epoch;

/// Callback-data prefix for model selection buttons.
pub const MODEL_CALLBACK_PREFIX: &str = "model:";

/// Callback-data prefix for quiz answer buttons.
pub const QUIZ_ANSWER_PREFIX: &str = "quiz:";

/// Callback data for the "next question" button.
pub const QUIZ_NEXT_CALLBACK: &str = "quiz_next";

/// Create the two-column inline keyboard listing every generation model.
///
/// The odd last model lands alone on the final row.
pub fn create_model_keyboard() -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = MODELS
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|(key, name)| {
                    InlineKeyboardButton::callback(
                        name.to_string(),
                        format!("{MODEL_CALLBACK_PREFIX}{key}"),
                    )
                })
                .collect()
        })
        .collect();

    InlineKeyboardMarkup::new(rows)
}

/// Header for the model menu, naming the user's current selection.
pub fn format_model_menu(current_model: &str) -> String {
    format!(
        "Selected model: {}\n\nPick an image model:",
        model_display_name(current_model)
    )
}

/// Create the answer keyboard for a quiz question: one row per epoch.
pub fn create_quiz_answer_keyboard() -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Epoch::ALL
        .iter()
        .map(|epoch| {
            vec![InlineKeyboardButton::callback(
                epoch.label().to_string(),
                format!("{QUIZ_ANSWER_PREFIX}{}", epoch.key()),
            )]
        })
        .collect();

    rows.push(vec![InlineKeyboardButton::callback(
        "Next question".to_string(),
        QUIZ_NEXT_CALLBACK.to_string(),
    )]);

    InlineKeyboardMarkup::new(rows)
}

/// Keyboard offered after answer feedback, to keep the quiz going.
pub fn create_quiz_next_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "Next question".to_string(),
        QUIZ_NEXT_CALLBACK.to_string(),
    )]])
}

/// Question text for a posed epoch. Describes the scene without naming
/// the period.
pub fn format_quiz_question(epoch: Epoch) -> String {
    format!(
        "Which period does this scene belong to?\n\n{}",
        epoch.scene()
    )
}

/// Feedback for an answered quiz question.
///
/// Both branches name the posed epoch's label: confirmation on a
/// correct answer, the right period on an incorrect one.
pub fn format_quiz_feedback(candidate: Epoch, posed: Epoch) -> String {
    if candidate == posed {
        format!("Correct! That was the {}.", posed.label())
    } else {
        format!("Not this time — the scene was from the {}.", posed.label())
    }
}

/// Caption attached to a generated image sent back to the requester.
pub fn format_image_caption(prompt: &str, model: &str) -> String {
    format!("Prompt: {prompt}\nModel: {model}")
}

/// Caption for the copy forwarded to the moderation chat.
pub fn format_audit_caption(
    user_id: i64,
    username: Option<&str>,
    name: Option<&str>,
    prompt: &str,
    model: &str,
) -> String {
    format!(
        "• {user_id}\n• {}\n• {}\n\n• Prompt: {prompt}\n• Model: {model}",
        username.unwrap_or("-"),
        name.unwrap_or("-"),
    )
}
