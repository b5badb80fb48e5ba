//! 💬 What the chat said, sorted into what we can do about it.

use chrono::NaiveDate;

use crate::common::TimesheetDraft;

pub(crate) const WELCOME: &str = "👋 Hello! Welcome to the timesheet bot.\n\n\
Commands:\n\
/help - show the help menu\n\
/today - today's report\n\
/month - this month's report\n\
/add - how to add a timesheet entry";

pub(crate) const HELP: &str = "📚 *Help*\n\n\
*Commands:*\n\
/today - today's report\n\
/month - this month's report\n\
/add - how to add a timesheet entry\n\n\
*Adding an entry:*\n\
Send a message in this format:\n\
`YYYY-MM-DD|Project|Task|Description|Hours`\n\n\
The task is optional, leave it empty:\n\
`YYYY-MM-DD|Project||Description|Hours`";

pub(crate) const ADD_HELP: &str = "📝 To add a timesheet entry, send:\n\n\
`YYYY-MM-DD|Project|Task|Description|Hours`\n\n\
Example:\n\
`2026-10-19|APOLLO|CX-7006|Fixed the login page|3.5`\n\n\
No task? Leave it empty:\n\
`2026-10-19|APOLLO||Fixed the login page|3.5`";

pub(crate) const UNKNOWN_COMMAND: &str = "❓ Unknown command. Use /help to see what I can do.";

pub(crate) const FORMAT_HINT: &str = "❓ I didn't understand that. To add a timesheet entry use:\n\n\
`YYYY-MM-DD|Project|Task|Description|Hours`\n\n\
The task can be left empty:\n\
`YYYY-MM-DD|Project||Description|Hours`";

pub(crate) const BAD_HOURS: &str = "❌ Invalid hours. Please send a number, like `3.5`.";

pub(crate) const BAD_DATE: &str = "❌ Invalid date. Please use `YYYY-MM-DD`.";

/// 🤖 The slash commands the bot answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BotCommand {
    Start,
    Help,
    Today,
    Month,
    Add,
    Unknown(String),
}

/// 📨 One incoming chat message, classified.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BotMessage {
    Command(BotCommand),
    Entry(TimesheetDraft),
    BadHours(String),
    BadDate(String),
    Unrecognized,
}

/// 🔍 `/cmd[@botname] [args]` → command; five pipe-separated fields → entry draft;
/// anything else → unrecognized.
pub(crate) fn parse_message(text: &str) -> BotMessage {
    let text = text.trim();
    if let Some(command) = text.strip_prefix('/') {
        // -- 🏷️ group chats append the bot's username: /today@timetally_bot
        let name = command
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .split('@')
            .next()
            .unwrap_or_default();
        return BotMessage::Command(match name {
            "start" => BotCommand::Start,
            "help" => BotCommand::Help,
            "today" => BotCommand::Today,
            "month" => BotCommand::Month,
            "add" => BotCommand::Add,
            other => BotCommand::Unknown(other.to_string()),
        });
    }

    let fields: Vec<&str> = text.split('|').map(str::trim).collect();
    let [date, project, task, description, hours] = fields.as_slice() else {
        return BotMessage::Unrecognized;
    };

    let Ok(hours) = hours.parse::<f64>() else {
        return BotMessage::BadHours(hours.to_string());
    };
    if !hours.is_finite() || hours < 0.0 {
        return BotMessage::BadHours(hours.to_string());
    }
    let Ok(date) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
        return BotMessage::BadDate(date.to_string());
    };

    BotMessage::Entry(TimesheetDraft {
        date,
        project: project.to_string(),
        task: (!task.is_empty()).then(|| task.to_string()),
        description: description.to_string(),
        hours,
    })
}
