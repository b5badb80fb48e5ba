//! 🚀 timetally-cli — the front door, the bouncer, the maitre d' of timetally.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary crate is the thin CLI wrapper that loads config,
//! sets up logging, and then lets the real code do the heavy lifting.
//! Like a manager. 🦆

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use timetally::period::DateFilter;
use timetally::{ReportRequest, generate_report, run_bot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// ⏱️ Sum up the timesheets. Report the damage.
#[derive(Debug, Parser)]
#[command(name = "timetally", version, about)]
struct Cli {
    /// Only this employee (display name). Default: every roster member.
    #[arg(long)]
    employee: Option<String>,

    /// `daily`, or a single day as YYYY-MM-DD. Default: month to date.
    #[arg(long, default_value = "")]
    date: String,

    /// Mail the written report (needs SMTP_*).
    #[arg(long)]
    send_mail: bool,

    /// Run as a Telegram bot with a daily schedule, instead of one report.
    #[arg(long)]
    telegram: bool,

    /// Optional TOML config, merged over the environment.
    #[arg(long, default_value = "timetally.toml")]
    config: PathBuf,
}

/// 🚀 main() — where it all begins. The genesis. The big bang.
/// The "I pressed F5 and held my breath" moment.
///
/// 🔧 Steps:
/// 1. Load .env files, init tracing (stderr, so stdout stays the report)
/// 2. Parse args, and the date filter before anything touches the network
/// 3. Load config (the moment of truth)
/// 4. Run the thing (send it and pray 🙏), Ctrl-C cancels politely
/// 5. Handle errors (cry), exit 1
#[tokio::main]
async fn main() -> Result<()> {
    // 🌱 .env.local first: dotenv never overwrites, so the first file to set a key wins
    // -- a missing file is the normal case in production, not an error
    for env_file in [".env.local", ".env"] {
        dotenv::from_filename(env_file).ok();
    }

    // 📡 Set up tracing — because println! debugging is a lifestyle choice
    // we're trying to move past, like flip phones and cargo shorts
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one tear-jerking layer at a time
        let mut the_vibes_are_giving_connection_issues = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            // -- 🕵️ sniff the cause like a truffle pig hunting for connection problems
            let cause_str = cause.to_string();
            if cause_str.contains("error sending request")
                || cause_str.contains("connection refused")
                || cause_str.contains("Connection refused")
                || cause_str.contains("tcp connect error")
                || cause_str.contains("dns error")
            {
                the_vibes_are_giving_connection_issues = true;
            }
        }

        // -- 📡 if it smells like a connection problem, it's probably a connection problem
        if the_vibes_are_giving_connection_issues {
            error!(
                "🔧 hint: looks like a service isn't reachable. \
                Double-check ODOO_BASE_URL (and SMTP_HOST if mailing), that the ERP is up, \
                and that this machine can reach it. VPNs have feelings too. ☕"
            );
        }

        // 🗑️ Exit with prejudice. Process exitus maximus.
        std::process::exit(1);
    }

    // ✅ If we got here, everything worked. Pop the champagne. 🍾
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let date_filter: DateFilter = cli.date.parse()?;

    // 🔒 The config file is optional. If it isn't there, the environment has to carry us.
    let config_file = cli.config.as_path();
    let config_file_if_it_exists = match config_file.try_exists()
        .with_context(|| format!("💀 Could not check whether the config file exists. Permissions, maybe. Was checking here: '{}'", config_file.display()))?
    {
        true => Some(config_file),
        false => {
            info!("🔧 no config file at '{}', using the environment only", config_file.display());
            None
        }
    };

    let app_config = timetally::app_config::load_config(config_file_if_it_exists)
        .context("💀 In timetally-cli, main, we couldn't load the configuration. Check the .env file and the TOML file for typos and missing keys")?;

    // 🛑 Ctrl-C: stop handing out pages, let the report say what it did manage
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Ctrl-C received, wrapping up");
            on_ctrl_c.cancel();
        }
    });

    if cli.telegram {
        return run_bot(Arc::new(app_config), cancel).await;
    }

    let request = ReportRequest {
        date_filter,
        employee: cli.employee,
        send_mail: cli.send_mail,
    };
    let outcome = generate_report(&app_config, &request, cancel).await?;
    info!(
        "✅ {:.2} hours over {} entries in {}, report at '{}'",
        outcome.summary.aggregate.total_hours,
        outcome.summary.aggregate.entries,
        outcome.range,
        outcome.report_path.display()
    );
    Ok(())
}
