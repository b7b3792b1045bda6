//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use rusqlite::Connection;
use std::sync::Arc;
use teloxide::prelude::*;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::db::{self, UserField};
use crate::generation::{is_known_model, GenerationClient};
use crate::quiz::{Epoch, QuizSessions};

use super::message_handler::pose_quiz_question;
use super::ui_builder::{
    create_model_keyboard, create_quiz_next_keyboard, format_model_menu, format_quiz_feedback,
    MODEL_CALLBACK_PREFIX, QUIZ_ANSWER_PREFIX, QUIZ_NEXT_CALLBACK,
};

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    conn: Arc<Mutex<Connection>>,
    client: Arc<GenerationClient>,
    sessions: Arc<QuizSessions>,
) -> Result<()> {
    let user_id = q.from.id.0 as i64;
    debug!(user_id, "Received callback query from user");

    {
        let conn = conn.lock().await;
        db::ensure_user(
            &conn,
            user_id,
            q.from.username.as_deref(),
            Some(&q.from.first_name),
        )?;
    }

    let data = q.data.as_deref().unwrap_or("");

    if let Some(model_key) = data.strip_prefix(MODEL_CALLBACK_PREFIX) {
        handle_model_selection(&bot, &q, user_id, &conn, model_key).await?;
    } else if let Some(answer_key) = data.strip_prefix(QUIZ_ANSWER_PREFIX) {
        handle_quiz_answer(&bot, &q, user_id, &sessions, answer_key).await?;
    } else if data == QUIZ_NEXT_CALLBACK {
        if let Some(msg) = &q.message {
            pose_quiz_question(&bot, msg.chat().id, user_id, &client, &sessions).await?;
        }
    } else {
        debug!(user_id, data, "Ignoring callback with unknown payload");
    }

    // Answer the callback query to remove the loading state
    bot.answer_callback_query(q.id).await?;

    Ok(())
}

/// Store the tapped model and refresh the menu header.
///
/// Re-tapping the already-selected model is a no-op (editing a message
/// with identical content would fail the Telegram call anyway).
async fn handle_model_selection(
    bot: &Bot,
    q: &CallbackQuery,
    user_id: i64,
    conn: &Mutex<Connection>,
    model_key: &str,
) -> Result<()> {
    if !is_known_model(model_key) {
        warn!(user_id, model_key, "Callback named a model outside the catalog");
        return Ok(());
    }

    let current_model = {
        let conn = conn.lock().await;
        db::get_preference(&conn, user_id, UserField::Model)?
    };

    if model_key == current_model {
        return Ok(());
    }

    {
        let conn = conn.lock().await;
        db::set_preference(&conn, user_id, UserField::Model, model_key)?;
    }

    if let Some(msg) = &q.message {
        match bot
            .edit_message_text(msg.chat().id, msg.id(), format_model_menu(model_key))
            .reply_markup(create_model_keyboard())
            .await
        {
            Ok(_) => (),
            Err(e) => {
                error!(user_id, error = %e, "Failed to refresh model menu after selection")
            }
        }
    }

    Ok(())
}

/// Compare the tapped epoch against the posed question and reply with
/// correct/incorrect feedback.
///
/// The posed entry stays until the next question overwrites it, so a
/// stale double-tap just re-checks against the same epoch.
async fn handle_quiz_answer(
    bot: &Bot,
    q: &CallbackQuery,
    user_id: i64,
    sessions: &QuizSessions,
    answer_key: &str,
) -> Result<()> {
    let candidate = match Epoch::from_key(answer_key) {
        Some(epoch) => epoch,
        None => {
            warn!(user_id, answer_key, "Callback named an unknown epoch");
            return Ok(());
        }
    };

    let chat_id = match &q.message {
        Some(msg) => msg.chat().id,
        None => return Ok(()),
    };

    match sessions.posed(user_id) {
        None => {
            bot.send_message(
                chat_id,
                "No active question right now — send /quiz to get one.",
            )
            .await?;
        }
        Some(posed) => {
            bot.send_message(chat_id, format_quiz_feedback(candidate, posed))
                .reply_markup(create_quiz_next_keyboard())
                .await?;
        }
    }

    Ok(())
}
