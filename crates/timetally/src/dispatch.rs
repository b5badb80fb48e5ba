//! 📡 Dispatch — getting the report to people who did not run the command.
//!
//! 📬 email: the written report file, as a plain-text mail
//! 🤖 bot: Telegram long polling, commands, and timesheet entry from chat
//! ⏰ schedule: the daily report at 08:00 and 18:00 while the bot runs
//!
//! Dispatch failures are logged, never fatal. The one exception is starting the bot
//! without Telegram credentials, which is a config error like any other.

mod bot;
mod commands;
pub(crate) mod email;
mod schedule;
mod telegram;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::app_config::AppConfig;

/// 🤖 Run the chat bot and its daily schedule until `cancel` fires.
pub async fn run_bot(config: Arc<AppConfig>, cancel: CancellationToken) -> Result<()> {
    let telegram = config
        .telegram
        .clone()
        .context("💀 --telegram needs TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID")?;
    telegram.validate()?;

    let bot = Arc::new(bot::Bot {
        client: telegram::TelegramClient::new(&telegram)?,
        chat_id: telegram.chat_id,
        config,
        cancel: cancel.clone(),
    });

    let scheduled = tokio::spawn(schedule::run(bot.clone(), schedule::default_slots()));
    let polled = bot::poll(bot).await;

    // -- the poller only returns on cancel or a hard error; either way the schedule goes too
    cancel.cancel();
    if let Err(err) = scheduled.await {
        warn!("💀 the schedule task panicked: {err}");
    }
    polled
}
