#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Read-only IMAP CLI

use clap::{Parser, Subcommand};
use mailfetch::{ConnectionParams, Folder, MailClient, Message};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mailfetch")]
#[command(about = "Read-only IMAP mail retrieval")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the server accepts the configured credentials
    Check,

    /// List available IMAP folders
    Folders,

    /// List messages, newest first
    List {
        /// Folder to list from
        #[arg(long, default_value = "INBOX")]
        folder: String,

        /// Maximum number of messages to show
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Number of newest messages to skip
        #[arg(long, default_value = "0")]
        offset: usize,

        /// Fetch full bodies instead of headers only
        #[arg(long)]
        body: bool,
    },

    /// Show a single message by UID
    Show {
        /// Message UID
        uid: u32,

        /// Folder containing the message
        #[arg(long, default_value = "INBOX")]
        folder: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let client = MailClient::new(ConnectionParams::from_env()?);

    match &args.command {
        Command::Check => cmd_check(&client, &args).await?,
        Command::Folders => cmd_folders(&client, &args).await?,
        Command::List {
            folder,
            limit,
            offset,
            body,
        } => cmd_list(&client, &args, folder, *limit, *offset, *body).await?,
        Command::Show { uid, folder } => cmd_show(&client, &args, folder, *uid).await?,
    }

    Ok(())
}

async fn cmd_check(client: &MailClient, args: &Args) -> anyhow::Result<()> {
    let check = client.test_connection().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&check)?);
    } else {
        println!("{}", check.message);
    }

    if check.ok {
        Ok(())
    } else {
        anyhow::bail!("connection check failed")
    }
}

async fn cmd_folders(client: &MailClient, args: &Args) -> anyhow::Result<()> {
    let folders = client.try_list_folders().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&folders)?);
    } else {
        print_folder_table(&folders);
    }

    Ok(())
}

async fn cmd_list(
    client: &MailClient,
    args: &Args,
    folder: &str,
    limit: usize,
    offset: usize,
    body: bool,
) -> anyhow::Result<()> {
    let page = client.fetch_page(folder, limit, offset, body).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&page)?);
    } else {
        print_message_table(&page.messages);
        println!(
            "\n{} of {} message(s), page {} of {}",
            page.messages.len(),
            page.total,
            offset / limit.max(1) + 1,
            page.page_count(limit).max(1)
        );
    }

    Ok(())
}

async fn cmd_show(client: &MailClient, args: &Args, folder: &str, uid: u32) -> anyhow::Result<()> {
    let Some(message) = client.fetch_one(folder, uid).await? else {
        anyhow::bail!("No message with UID {uid} in {folder}");
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&message)?);
    } else {
        print_message_detail(&message);
    }

    Ok(())
}

fn print_folder_table(folders: &[Folder]) {
    if folders.is_empty() {
        println!("No folders found.");
        return;
    }

    for folder in folders {
        let role = folder.role.map(|r| format!(" [{r}]")).unwrap_or_default();
        let noselect = if folder.selectable { "" } else { " (not selectable)" };
        println!("{}{role}{noselect}", folder.path);
    }
}

fn print_message_table(messages: &[Message]) {
    if messages.is_empty() {
        println!("No messages found.");
        return;
    }

    println!("{:<8} {:<17} {:<30} Subject", "UID", "Date", "From");
    println!("{}", "-".repeat(100));

    for message in messages {
        println!(
            "{:<8} {:<17} {:<30} {}",
            message.uid.map_or_else(|| "-".to_string(), |u| u.to_string()),
            message
                .date
                .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d %H:%M").to_string()),
            truncate(&message.from.as_ref().map(ToString::to_string).unwrap_or_default(), 28),
            truncate(&message.subject, 40),
        );
    }
}

fn print_message_detail(message: &Message) {
    if let Some(uid) = message.uid {
        println!("UID:     {uid}");
    }
    if let Some(date) = message.date {
        println!("Date:    {}", date.format("%Y-%m-%d %H:%M:%S %:z"));
    }
    if let Some(from) = &message.from {
        println!("From:    {from}");
    }
    println!("To:      {}", join(&message.to));
    if !message.cc.is_empty() {
        println!("CC:      {}", join(&message.cc));
    }
    println!("Subject: {}", message.subject);
    if let Some(id) = &message.message_id {
        println!("Msg-ID:  {id}");
    }

    println!("\n--- Body ---\n");
    match (&message.body.plain, &message.body.html) {
        (Some(text), _) => println!("{text}"),
        (None, Some(html)) => println!("{html}"),
        (None, None) => println!("(no text body)"),
    }

    if message.has_attachments() {
        println!("\n--- Attachments ---");
        for a in &message.attachments {
            println!("  {} ({}, {} bytes)", a.filename, a.content_type, a.size);
        }
    }

    if !message.inline_images.is_empty() {
        println!("\n--- Inline images ---");
        for (cid, image) in &message.inline_images {
            println!("  cid:{cid} ({})", image.content_type);
        }
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
