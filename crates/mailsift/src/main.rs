//! `mailsift` - search, list and sort IMAP mail from the command line.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod report;

use std::io::BufRead;
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{CommandFactory, Parser};
use mailsift_core::config::ALL_ACCOUNTS;
use mailsift_core::{Account, Config, MergeMode, SearchSpec, credentials};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    if std::env::args_os().len() <= 1 {
        // Nothing asked for: show usage without touching any account.
        return match usage(&mut std::io::stdout()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("mailsift: cannot print usage: {e}");
                ExitCode::FAILURE
            }
        };
    }
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailsift=info,mailsift_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("mailsift: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every account succeeded.
async fn run(cli: &Cli) -> anyhow::Result<bool> {
    let spec = cli
        .search_spec(chrono::Local::now().date_naive())
        .context("invalid search flags")?;

    let path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_path().context("cannot locate the configuration directory")?,
    };
    let config =
        Config::load(&path).with_context(|| format!("loading {}", path.display()))?;

    if cli.store_password {
        return store_password(&config, &cli.account).map(|()| true);
    }

    let names = config.select(&cli.account);
    if names.is_empty() {
        bail!("no accounts configured in {}", path.display());
    }

    let mut ok = true;
    for name in &names {
        if let Err(e) = process_account(&config, name, cli, &spec).await {
            warn!(account = %name, "{e:#}");
            eprintln!("{name}: {e:#}");
            ok = false;
        }
    }
    Ok(ok)
}

fn usage(out: &mut impl std::io::Write) -> std::io::Result<()> {
    Cli::command().write_help(out)
}

async fn process_account(
    config: &Config,
    name: &str,
    cli: &Cli,
    spec: &SearchSpec,
) -> anyhow::Result<()> {
    let mut account = Account::from_config(config, name)?;
    info!(account = name, "processing account");

    if cli.rules {
        for report in account.process_rules(cli.dry_run).await? {
            println!("{name}: {report}");
        }
        return Ok(());
    }

    if cli.folders {
        for folder in account.folders().await? {
            println!("{name}: {}", folder.name);
        }
        return Ok(());
    }

    let mode = MergeMode::from(cli.merge);
    for folder in account.resolve_folders(&cli.mailbox).await? {
        println!("{name}/{folder}");
        if cli.unique {
            let senders = account.unique_senders(&folder, spec, mode).await?;
            for (address, count) in &senders {
                println!("{}", report::sender_line(address, *count));
            }
            println!("{} senders", senders.len());
        } else {
            let summaries = account.summaries(&folder, spec, mode).await?;
            for summary in &summaries {
                println!("{}", report::message_line(summary, cli.name));
            }
            println!("{}", report::count_line(summaries.len()));
        }
    }
    Ok(())
}

fn store_password(config: &Config, name: &str) -> anyhow::Result<()> {
    if name.eq_ignore_ascii_case(ALL_ACCOUNTS) {
        bail!("--store-password needs a single account (-a NAME)");
    }
    let name = name.to_lowercase();
    config.account(&name)?;

    eprintln!("Password for {name} (read from stdin):");
    let mut password = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut password)
        .context("reading password")?;
    let password = password.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        bail!("empty password");
    }
    credentials::store_imap_password(&name, password)?;
    info!(account = %name, "password stored in keyring");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Closed;

    impl std::io::Write for Closed {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn usage_lists_the_flags() {
        let mut out = Vec::new();
        usage(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("--rules"), "{text}");
        assert!(text.contains("--dry-run"), "{text}");
    }

    #[test]
    fn usage_reports_a_closed_stdout() {
        let err = usage(&mut Closed).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }
}
