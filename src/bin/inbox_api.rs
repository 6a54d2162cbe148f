use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use inbox_api::auth::credential_store;
use inbox_api::config::{Config, load_config};
use inbox_api::domain::email::Email;
use inbox_api::http;
use inbox_api::mail::criteria::Selection;
use inbox_api::mail::decoders::normalize_snippet;
use inbox_api::mail::session::ImapConnector;
use inbox_api::service::MailService;

#[derive(Parser)]
#[command(name = "inbox_api")]
#[command(about = "Read-only HTTP API over an IMAP mailbox", long_about = None)]
struct Cli {
    /// Config file (defaults to <config dir>/inbox_api/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Listen address, overrides `listen_addr` from the config
        #[arg(long)]
        listen: Option<String>,
    },

    /// Print emails newest-first
    List {
        /// A single day, YYYY-MM-DD
        #[arg(long, conflicts_with_all = ["start", "end"])]
        date: Option<NaiveDate>,

        /// First day of an inclusive range
        #[arg(long, requires = "end")]
        start: Option<NaiveDate>,

        /// Last day of an inclusive range
        #[arg(long, requires = "start")]
        end: Option<NaiveDate>,
    },

    /// Download one attachment
    Attachment {
        #[arg(long)]
        uid: u32,

        #[arg(long)]
        filename: String,

        /// Output path (defaults to the attachment's filename)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Store the IMAP password in the keyring
    SetPassword,
}

fn build_service(cfg: &Config) -> Result<MailService<ImapConnector>> {
    let password = credential_store::resolve_password(&cfg.user_email)?;
    let connector = ImapConnector::new(cfg.imap_settings(password));
    Ok(MailService::new(
        connector,
        cfg.folder(),
        cfg.recent_limit(),
    ))
}

fn print_email(email: &Email) {
    let date = email
        .date
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    let text = html2text::from_read(email.html.as_bytes(), 100).unwrap_or_default();
    println!(
        "[{}] {} | {} | {}",
        email.id,
        date,
        email.from,
        email.subject.as_deref().unwrap_or("(no subject)")
    );
    println!("    {}", normalize_snippet(&text, 140));
    for att in &email.attachments {
        println!(
            "    + {} ({}, {} bytes)",
            att.filename.as_deref().unwrap_or("(unnamed)"),
            att.content_type,
            att.size
        );
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::SetPassword => {
            let cfg = load_config(cli.config.as_deref())
                .map_err(|e| anyhow!("Configuration error: {e}"))?;
            eprintln!("Paste IMAP password for {} (end with Ctrl-D):", cfg.user_email);
            let mut secret = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
            credential_store::save_password(&cfg.user_email, secret.trim())?;
            println!("Saved password for {}", cfg.user_email);
            Ok(())
        }

        Command::Serve { listen } => {
            let cfg = load_config(cli.config.as_deref())
                .map_err(|e| anyhow!("Configuration error: {e}"))?;
            let service = Arc::new(build_service(&cfg)?);
            let addr = listen.unwrap_or_else(|| cfg.listen_addr().to_string());

            let running = Arc::new(AtomicBool::new(true));
            let r2 = running.clone();
            ctrlc::set_handler(move || {
                r2.store(false, Ordering::SeqCst);
            })?;

            http::serve(service, &addr, running)
        }

        Command::List { date, start, end } => {
            let cfg = load_config(cli.config.as_deref())
                .map_err(|e| anyhow!("Configuration error: {e}"))?;
            let selection = match (date, start, end) {
                (Some(d), _, _) => Selection::SingleDate(d),
                (None, Some(s), Some(e)) => Selection::range(s, e)?,
                _ => Selection::Recent,
            };
            let service = build_service(&cfg)?;
            let emails = service.list_emails(selection)?;
            if emails.is_empty() {
                println!("No emails.");
            }
            for email in &emails {
                print_email(email);
            }
            Ok(())
        }

        Command::Attachment { uid, filename, out } => {
            let cfg = load_config(cli.config.as_deref())
                .map_err(|e| anyhow!("Configuration error: {e}"))?;
            let service = build_service(&cfg)?;
            let att = service.attachment(uid, &filename)?;
            let out = out.unwrap_or_else(|| {
                Path::new(&att.filename)
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("attachment"))
            });
            std::fs::write(&out, &att.data)
                .with_context(|| format!("cannot write {}", out.display()))?;
            println!(
                "Saved {} ({}, {} bytes) to {}",
                att.filename,
                att.content_type,
                att.data.len(),
                out.display()
            );
            Ok(())
        }
    }
}
