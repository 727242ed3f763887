// src/main.rs

use chrono::{DateTime, Utc};
use clap::Parser;
use env_logger::Builder;
use eyre::{eyre, Result};
use log::{debug, info, LevelFilter};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use imap_mailstore::cfg::{load_config, Config};
use imap_mailstore::hierarchy::INBOX;
use imap_mailstore::utils::{parse_date, parse_header_arg, read_message_file};
use imap_mailstore::{
    Backend, Clock, Conn, MailboxHandle, MemoryStore, RealClock, SearchCriteria, Settings, Update, User,
};

mod cli;

use cli::{Cli, Command, SearchArgs};

const SCRATCH_USER: &str = "scratch";

/// Logs updates from the scratch mailbox.
struct LogConn;

impl Conn for LogConn {
    fn send_update(&self, update: Update) -> imap_mailstore::Result<()> {
        debug!("update: {:?}", update);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct SearchHit {
    uid: u32,
    file: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = Builder::new();
    builder.parse_default_env();
    if cli.debug {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.try_init().ok();

    let mut cfg = resolve_config(cli.config.as_deref())?;
    if let Some(policy) = cli.rename_policy {
        cfg.rename_policy = policy;
    }
    if let Some(policy) = cli.delete_policy {
        cfg.delete_policy = policy;
    }
    cfg.validate()?;

    match cli.command {
        Command::Check => {
            print!("{}", serde_yaml::to_string(&cfg)?);
            Ok(())
        }
        Command::Search(args) => run_search(&cfg, &args),
        Command::Stats { files, json } => run_stats(&cfg, &files, json),
    }
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return load_config(path);
    }
    match Config::default_path() {
        Some(path) if path.exists() => load_config(&path),
        _ => {
            debug!("No config file found; using defaults");
            Ok(Config::default())
        }
    }
}

/// A memory-backed user with the given files appended to INBOX. Returns the
/// files in UID order alongside an open view of INBOX.
fn load_scratch(cfg: &Config, files: &[PathBuf]) -> Result<(Arc<User>, MailboxHandle, Vec<PathBuf>)> {
    let clock: Arc<dyn Clock> = Arc::new(RealClock);
    let backend = Backend::new(Settings::from(cfg), Arc::new(MemoryStore::new()), clock.clone());
    backend.set_message_limit(cfg.append_limit)?;

    let user = backend.create_user(SCRATCH_USER)?;
    user.create_mailbox(INBOX)?;
    let (_, handle) = user.get_mailbox(INBOX, false, Arc::new(LogConn))?;

    let mut loaded = Vec::with_capacity(files.len());
    for path in files {
        let content = read_message_file(path)?;
        let date = fs::metadata(path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| clock.now());
        let no_flags: [&str; 0] = [];
        user.create_message(INBOX, no_flags, date, &content, Some(&handle))
            .map_err(|e| eyre!("Failed to load {}: {}", path.display(), e))?;
        loaded.push(path.clone());
    }
    info!("Loaded {} message file(s)", loaded.len());
    Ok((user, handle, loaded))
}

fn build_criteria(args: &SearchArgs) -> Result<SearchCriteria> {
    let now = Utc::now();
    let mut criteria = SearchCriteria::default();
    for (name, values) in [("From", &args.from), ("To", &args.to), ("Subject", &args.subject)] {
        for value in values {
            criteria.header.push((name.to_string(), value.clone()));
        }
    }
    for raw in &args.header {
        criteria.header.push(parse_header_arg(raw)?);
    }
    criteria.body = args.body.clone();
    criteria.text = args.text.clone();
    criteria.since = args.since.as_deref().map(|s| parse_date(s, now)).transpose()?;
    criteria.before = args.before.as_deref().map(|s| parse_date(s, now)).transpose()?;
    criteria.larger = args.larger;
    criteria.smaller = args.smaller;
    Ok(criteria)
}

fn run_search(cfg: &Config, args: &SearchArgs) -> Result<()> {
    let criteria = build_criteria(args)?;
    let (_user, handle, files) = load_scratch(cfg, &args.files)?;

    let uids = handle.search_messages(true, &criteria)?;
    let hits: Vec<SearchHit> = uids
        .into_iter()
        .filter_map(|uid| {
            files.get(uid as usize - 1).map(|file| SearchHit {
                uid,
                file: file.clone(),
            })
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else {
        for hit in &hits {
            println!("{}", hit.file.display());
        }
    }
    Ok(())
}

fn run_stats(cfg: &Config, files: &[PathBuf], json: bool) -> Result<()> {
    let (_user, handle, _) = load_scratch(cfg, files)?;
    let status = handle.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("mailbox:      {}", status.name);
        println!("messages:     {}", status.messages);
        println!("recent:       {}", status.recent);
        println!("unseen:       {}", status.unseen);
        println!("uidnext:      {}", status.uid_next);
        println!("uidvalidity:  {}", status.uid_validity);
        println!("flags:        {}", status.flags.join(" "));
        if let Some(limit) = status.append_limit {
            println!("append-limit: {}", limit);
        }
    }
    Ok(())
}
