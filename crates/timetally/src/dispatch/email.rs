//! 📬 Email — the report, as a plain-text mail, over SMTP with STARTTLS.
//!
//! Mail is a courtesy, not a requirement: [`mail_report`] logs every failure and
//! tells the caller whether it worked. It never fails the run.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

use crate::app_config::SmtpConfig;

pub(crate) fn subject_for(day: NaiveDate) -> String {
    format!("Daily timesheet report - {}", day.format("%Y-%m-%d"))
}

/// ✉️ Build the message. `to` may hold several addresses separated by commas.
pub(crate) fn build_message(smtp: &SmtpConfig, day: NaiveDate, body: String) -> Result<Message> {
    let mut builder = Message::builder()
        .from(
            smtp.from
                .parse()
                .with_context(|| format!("💀 '{}' is not a valid sender address", smtp.from))?,
        )
        .subject(subject_for(day))
        .header(ContentType::TEXT_PLAIN);

    for recipient in smtp.to.split(',').map(str::trim).filter(|r| !r.is_empty()) {
        builder = builder.to(recipient
            .parse()
            .with_context(|| format!("💀 '{recipient}' is not a valid recipient address"))?);
    }

    builder
        .body(body)
        .context("💀 The email refused to assemble itself")
}

/// 📡 Send `body` through the configured relay.
pub(crate) async fn send_report(smtp: &SmtpConfig, day: NaiveDate, body: String) -> Result<()> {
    smtp.validate()?;
    let message = build_message(smtp, day, body)?;

    let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
        .with_context(|| format!("💀 Could not set up a STARTTLS relay to '{}'", smtp.host))?
        .port(smtp.port)
        .credentials(Credentials::new(
            smtp.username.clone(),
            smtp.password.clone(),
        ))
        .build();

    transport
        .send(message)
        .await
        .with_context(|| format!("💀 '{}:{}' did not accept the report", smtp.host, smtp.port))?;
    Ok(())
}

/// 📨 Read the written report back from disk and mail it. Returns whether it went out.
pub(crate) async fn mail_report(smtp: Option<&SmtpConfig>, report_path: &Path, day: NaiveDate) -> bool {
    let Some(smtp) = smtp else {
        warn!("📭 --send-mail was given but there is no SMTP configuration (SMTP_*), skipping mail");
        return false;
    };

    let body = match tokio::fs::read_to_string(report_path).await {
        Ok(body) => body,
        Err(err) => {
            warn!(
                "📭 could not read the report back from '{}', skipping mail: {err}",
                report_path.display()
            );
            return false;
        }
    };

    match send_report(smtp, day, body).await {
        Ok(()) => {
            info!("📬 report mailed to {}", smtp.to);
            true
        }
        Err(err) => {
            warn!("📭 mailing the report failed: {err:#}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::fixtures::day;

    fn smtp() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".into(),
            from: "reports@example.com".into(),
            to: "boss@example.com, hr@example.com".into(),
            ..SmtpConfig::default()
        }
    }

    #[test]
    fn the_one_where_the_subject_carries_the_day() {
        assert_eq!(
            subject_for(day("2026-10-19")),
            "Daily timesheet report - 2026-10-19"
        );
    }

    #[test]
    fn the_one_where_every_recipient_makes_it_onto_the_envelope() -> Result<()> {
        let message = build_message(&smtp(), day("2026-10-19"), "Total hours: 8.00\n".into())?;
        let recipients: Vec<String> = message
            .envelope()
            .to()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(recipients, ["boss@example.com", "hr@example.com"]);
        let raw = String::from_utf8(message.formatted())?;
        assert!(raw.contains("Subject: Daily timesheet report - 2026-10-19"));
        assert!(raw.contains("Total hours: 8.00"));
        Ok(())
    }

    #[test]
    fn the_one_where_a_bad_sender_is_caught_before_the_network() {
        let mut config = smtp();
        config.from = "not an address".into();
        let err = build_message(&config, day("2026-10-19"), String::new())
            .expect_err("💀 garbage sender must not build");
        assert!(format!("{err:#}").contains("not a valid sender address"));
    }

    #[tokio::test]
    async fn the_one_where_no_smtp_config_means_no_mail_and_no_drama() {
        assert!(!mail_report(None, Path::new("results/nope.txt"), day("2026-10-19")).await);
    }

    #[tokio::test]
    async fn the_one_where_a_missing_report_file_is_shrugged_off() {
        let tmp = tempfile::tempdir().expect("💀 tempdir");
        let missing = tmp.path().join("result_missing.txt");
        assert!(!mail_report(Some(&smtp()), &missing, day("2026-10-19")).await);
    }
}
