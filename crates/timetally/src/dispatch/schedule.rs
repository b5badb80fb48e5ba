//! ⏰ The schedule — twice a day, unprompted, the bot posts the daily report.
//!
//! 08:00 and 18:00 local time. Each run mails the report too, so whoever is not on the
//! chat still gets it.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime, NaiveTime, Timelike};
use tracing::info;

use super::bot::Bot;
use crate::period::DateFilter;

/// 🕗 When the scheduled reports go out, local time.
pub(crate) fn default_slots() -> Vec<NaiveTime> {
    [8, 18]
        .into_iter()
        .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
        .collect()
}

/// ⏭️ The first slot strictly after `now`: later today, or the earliest slot tomorrow.
///
/// `slots` must not be empty; an empty schedule fires again in a day, which is harmless.
pub(crate) fn next_fire(now: NaiveDateTime, slots: &[NaiveTime]) -> NaiveDateTime {
    let today = now.date();
    let later_today = slots
        .iter()
        .map(|slot| today.and_time(*slot))
        .filter(|at| *at > now)
        .min();
    later_today.unwrap_or_else(|| {
        let tomorrow = today.succ_opt().unwrap_or(today);
        let first = slots.iter().min().copied().unwrap_or(now.time());
        tomorrow.and_time(first)
    })
}

pub(crate) fn greeting(at: NaiveDateTime) -> &'static str {
    if at.hour() < 12 {
        "🌅 Good morning! Here is today's timesheet report."
    } else {
        "🌆 Good evening! Here is today's timesheet report."
    }
}

/// 🔁 Sleep until the next slot, report, repeat. Returns when the bot is cancelled.
pub(crate) async fn run(bot: Arc<Bot>, slots: Vec<NaiveTime>) {
    loop {
        let now = Local::now().naive_local();
        let at = next_fire(now, &slots);
        let wait = (at - now).to_std().unwrap_or_default();
        info!("⏰ next scheduled report at {at}");

        tokio::select! {
            _ = bot.cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        info!("⏰ scheduled report firing");
        bot.say(greeting(at)).await;
        bot.report_to_chat(DateFilter::Today, true).await;
    }
    info!("🛑 schedule stopped");
}
