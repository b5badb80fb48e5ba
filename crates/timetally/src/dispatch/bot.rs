//! 🤖 The bot — long-polls Telegram and answers the one chat it trusts.
//!
//! 🎬 *[a phone buzzes. "/today", it says. the bot cracks its knuckles.]*
//!
//! Each message gets its own task, so a slow month-to-date report does not hold up a
//! `/help`. Messages from any other chat are logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::commands::{self, BotCommand, BotMessage, parse_message};
use super::telegram::{LONG_POLL_SECS, TelegramClient, Update};
use crate::app_config::AppConfig;
use crate::backends::odoo::OdooSource;
use crate::common::TimesheetDraft;
use crate::period::DateFilter;
use crate::report::escape_markdown;
use crate::runner::{ReportRequest, generate_report};

/// 😴 Back-off after a failed poll, so a dead network is not a busy loop.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// 💬 Everything a handler needs: the config, the API client, the chat, the off switch.
#[derive(Debug)]
pub(crate) struct Bot {
    pub(crate) config: Arc<AppConfig>,
    pub(crate) client: TelegramClient,
    pub(crate) chat_id: i64,
    pub(crate) cancel: CancellationToken,
}

impl Bot {
    pub(crate) async fn say(&self, text: &str) {
        self.client.reply(self.chat_id, text).await;
    }

    /// 📨 Answer one message. Never fails; every problem becomes a reply or a warning.
    pub(crate) async fn handle(&self, text: &str) {
        match parse_message(text) {
            BotMessage::Command(BotCommand::Start) => self.say(commands::WELCOME).await,
            BotMessage::Command(BotCommand::Help) => self.say(commands::HELP).await,
            BotMessage::Command(BotCommand::Add) => self.say(commands::ADD_HELP).await,
            BotMessage::Command(BotCommand::Today) => {
                self.say("⏳ Generating today's report...").await;
                self.report_to_chat(DateFilter::Today, false).await;
            }
            BotMessage::Command(BotCommand::Month) => {
                self.say("⏳ Generating this month's report...").await;
                self.report_to_chat(DateFilter::MonthToDate, false).await;
            }
            BotMessage::Command(BotCommand::Unknown(name)) => {
                debug!("🤷 unknown command /{name}");
                self.say(commands::UNKNOWN_COMMAND).await;
            }
            BotMessage::Entry(draft) => self.add_entry(&draft).await,
            BotMessage::BadHours(raw) => {
                debug!("🤷 hours '{raw}' are not a number");
                self.say(commands::BAD_HOURS).await;
            }
            BotMessage::BadDate(raw) => {
                debug!("🤷 '{raw}' is not a date");
                self.say(commands::BAD_DATE).await;
            }
            BotMessage::Unrecognized => self.say(commands::FORMAT_HINT).await,
        }
    }

    /// 📊 Run a report for the whole roster and post the chat summary, or the error.
    pub(crate) async fn report_to_chat(&self, date_filter: DateFilter, send_mail: bool) {
        let request = ReportRequest {
            date_filter,
            employee: None,
            send_mail,
        };
        match generate_report(&self.config, &request, self.cancel.child_token()).await {
            Ok(outcome) => self.say(&outcome.chat_summary).await,
            Err(err) => {
                warn!("📭 report for the chat failed: {err:#}");
                self.say(&format!("❌ Error generating report: {err:#}")).await;
            }
        }
    }

    async fn add_entry(&self, draft: &TimesheetDraft) {
        let created = async {
            let source = OdooSource::connect(
                self.config.odoo.clone(),
                Duration::from_secs(self.config.runtime.fetch_timeout_secs),
            )
            .await
            .context("💀 Could not open a session with the ERP")?;
            source.create_entry(draft).await
        }
        .await;

        match created {
            Ok(id) => {
                info!("✍️ timesheet entry {id} created from chat");
                self.say(&format!(
                    "✅ Timesheet entry created!\n\n\
                     Date: {}\nProject: {}\nTask: {}\nDescription: {}\nHours: {:.2}\nID: {id}",
                    draft.date.format("%Y-%m-%d"),
                    escape_markdown(&draft.project),
                    escape_markdown(draft.task.as_deref().unwrap_or("-")),
                    escape_markdown(&draft.description),
                    draft.hours,
                ))
                .await;
            }
            Err(err) => {
                warn!("📭 creating a timesheet entry from chat failed: {err:#}");
                self.say(&format!("❌ Could not create the entry: {err:#}"))
                    .await;
            }
        }
    }
}

/// 🔁 Long-poll until cancelled. Handlers run concurrently and are aborted on the way out.
pub(crate) async fn poll(bot: Arc<Bot>) -> Result<()> {
    let mut offset = 0i64;
    let mut handlers = JoinSet::new();
    info!("🤖 listening to chat {}", bot.chat_id);

    loop {
        let polled = tokio::select! {
            biased;
            _ = bot.cancel.cancelled() => break,
            polled = bot.client.get_updates(offset, LONG_POLL_SECS) => polled,
        };

        match polled {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    if let Some(text) = accept(&bot, update) {
                        let bot = bot.clone();
                        handlers.spawn(async move { bot.handle(&text).await });
                    }
                }
            }
            Err(err) => {
                warn!("📡 polling Telegram failed, retrying in {}s: {err:#}", POLL_RETRY_DELAY.as_secs());
                tokio::select! {
                    _ = bot.cancel.cancelled() => break,
                    _ = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                }
            }
        }

        // -- reap what already finished, the set would grow forever otherwise
        while let Some(joined) = handlers.try_join_next() {
            if let Err(err) = joined {
                warn!("💀 a chat handler panicked: {err}");
            }
        }
    }

    info!("🛑 bot stopping, {} handler(s) still running", handlers.len());
    handlers.shutdown().await;
    Ok(())
}

/// 🔒 The text of a message from our chat, or `None` for anything else.
fn accept(bot: &Bot, update: Update) -> Option<String> {
    let message = update.message?;
    if message.chat.id != bot.chat_id {
        warn!(
            "🚫 ignoring update {} from chat {}, only chat {} is served",
            update.update_id, message.chat.id, bot.chat_id
        );
        return None;
    }
    message.text
}
