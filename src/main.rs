use anyhow::Result;
use rusqlite::Connection;
use std::env;
use std::sync::Arc;
use teloxide::prelude::*;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use forgebot::bot;
use forgebot::db;
use forgebot::generation::{GenerationClient, DEFAULT_API_BASE};
use forgebot::quiz::QuizSessions;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting ForgeBot");

    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Get bot token from environment
    let bot_token = env::var("TELEGRAM_BOT_TOKEN").expect("TELEGRAM_BOT_TOKEN must be set");

    // Database path and generation backend are optional with defaults
    let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "forgebot.db".to_string());
    let api_base =
        env::var("GENERATION_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

    info!("Initializing database at: {}", database_url);

    let conn = Connection::open(&database_url)?;
    db::init_database_schema(&conn)?;

    // Shared state: the connection is serialized behind an async mutex,
    // the session store carries its own lock.
    let shared_conn = Arc::new(Mutex::new(conn));
    let client = Arc::new(GenerationClient::new(api_base));
    let sessions = Arc::new(QuizSessions::default());

    let bot = Bot::new(bot_token);

    info!("Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint({
            let conn = Arc::clone(&shared_conn);
            let client = Arc::clone(&client);
            let sessions = Arc::clone(&sessions);
            move |bot: Bot, msg: Message| {
                let conn = Arc::clone(&conn);
                let client = Arc::clone(&client);
                let sessions = Arc::clone(&sessions);
                async move { bot::message_handler(bot, msg, conn, client, sessions).await }
            }
        }))
        .branch(Update::filter_callback_query().endpoint({
            let conn = Arc::clone(&shared_conn);
            let client = Arc::clone(&client);
            let sessions = Arc::clone(&sessions);
            move |bot: Bot, q: CallbackQuery| {
                let conn = Arc::clone(&conn);
                let client = Arc::clone(&client);
                let sessions = Arc::clone(&sessions);
                async move { bot::callback_handler(bot, q, conn, client, sessions).await }
            }
        }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
