mod config;
mod display;

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use snapnotify_core::FeedView;
use snapnotify_store::{FileKv, ReadStateStore};
use snapnotify_sync::{FeedHandle, MarkOutcome, NotificationClient};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use config::{Cli, Command};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    tracing::debug!("snapnotify v{}", env!("CARGO_PKG_VERSION"));

    let client = NotificationClient::new(cli.client_config()).context("configuring API client")?;
    let storage = FileKv::open(&cli.state_dir)
        .with_context(|| format!("opening state directory {}", cli.state_dir.display()))?;
    let feed = FeedHandle::spawn(
        Arc::new(client),
        ReadStateStore::new(Arc::new(storage)),
        cli.feed_config(),
    );

    match &cli.command {
        Command::List { unread } => {
            let view = feed.refresh().await.context("fetching notifications")?;
            if cli.json {
                let entries: Vec<_> = if *unread {
                    view.unread().collect()
                } else {
                    view.entries.iter().collect()
                };
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print!("{}", display::render_feed(&view, *unread, Utc::now()));
            }
        }
        Command::Unread => {
            let view = feed.refresh().await.context("fetching notifications")?;
            if cli.json {
                println!("{}", serde_json::json!({ "unread_count": view.unread_count }));
            } else {
                println!("{}", view.unread_count);
            }
        }
        Command::Watch => watch(&feed, cli.json).await?,
        Command::Read { id } => {
            let view = feed.refresh().await.context("fetching notifications")?;
            if view.entry(id).is_none() {
                tracing::warn!(id = %id, "notification is not in the current feed");
            }
            let outcome = feed
                .mark_read(id.as_str())
                .await
                .with_context(|| format!("Failed to mark notification {id} as read"))?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "id": id, "outcome": outcome })
                );
            } else {
                match outcome {
                    MarkOutcome::Marked => println!("Marked {id} as read"),
                    MarkOutcome::AlreadyRead => println!("{id} is already read"),
                    MarkOutcome::AlreadyPending => println!("{id} is already being marked read"),
                }
            }
        }
        Command::ReadAll => {
            feed.refresh().await.context("fetching notifications")?;
            let count = feed
                .mark_all_read()
                .await
                .context("Failed to mark all as read")?;
            if cli.json {
                println!("{}", serde_json::json!({ "marked": count }));
            } else {
                println!("All notifications marked as read ({count})");
            }
        }
        Command::Delete { id } => {
            feed.delete(id.as_str())
                .await
                .with_context(|| format!("Failed to delete notification {id}"))?;
            if !cli.json {
                println!("Deleted {id}");
            }
        }
        Command::Forget => {
            feed.forget_local().await?;
            if !cli.json {
                println!("Cleared local read state in {}", cli.state_dir.display());
            }
        }
    }

    Ok(())
}

/// Print new arrivals and unread-count changes until Ctrl-C.
async fn watch(feed: &FeedHandle, json: bool) -> anyhow::Result<()> {
    let mut views = feed.watch();
    let mut notices = feed.notices();
    let mut seen: HashSet<String> = HashSet::new();
    let mut last_unread: Option<usize> = None;

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                report_changes(&view, &mut seen, &mut last_unread, json)?;
            }
            notice = notices.recv() => match notice {
                Ok(notice) => {
                    if json {
                        println!("{}", serde_json::to_string(&notice)?);
                    } else {
                        eprintln!("{}", notice.message());
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "missed notices");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

fn report_changes(
    view: &FeedView,
    seen: &mut HashSet<String>,
    last_unread: &mut Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    // Ignore the empty view published before the first fetch.
    if view.fetched_at.is_none() {
        return Ok(());
    }
    let now = Utc::now();
    for entry in &view.entries {
        if seen.insert(entry.notification.id.clone()) && !entry.is_read {
            if json {
                println!("{}", serde_json::to_string(entry)?);
            } else {
                print!("{}", display::render_entry(entry, now));
            }
        }
    }
    if *last_unread != Some(view.unread_count) {
        *last_unread = Some(view.unread_count);
        if json {
            println!("{}", serde_json::json!({ "unread_count": view.unread_count }));
        } else {
            println!("--- {}", display::render_summary(view));
        }
    }
    Ok(())
}
