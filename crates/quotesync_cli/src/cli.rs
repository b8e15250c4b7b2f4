//! CLI command definitions and handlers.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use quotesync_core::{
    CategoryFilter, ChannelNotifier, Config, ConflictEvent, CycleOutcome, CycleReport,
    HttpRemoteClient, IntervalTicks, QuoteService, SqliteLocalStore, SyncEngine, SyncScheduler,
    TickOutcome,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread;

type Engine = SyncEngine<SqliteLocalStore, HttpRemoteClient, ChannelNotifier>;

#[derive(Parser)]
#[command(name = "quotesync")]
#[command(author, version, about = "Quote collection with remote sync")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true, env = "QUOTESYNC_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List quotes under the selected category
    List,

    /// Add a quote and queue it for the next sync
    Add {
        /// Quote text
        text: String,

        /// Quote category
        category: String,
    },

    /// List categories; the selected one is marked
    Categories,

    /// Select a category filter (`all` clears it)
    Filter {
        /// Category name
        category: String,
    },

    /// Show a random quote from the selected category
    Random,

    /// Write the collection to a JSON file
    Export {
        /// Destination file
        path: PathBuf,
    },

    /// Merge quotes from a JSON file
    Import {
        /// Source file
        path: PathBuf,
    },

    /// Run one sync cycle now
    Sync,

    /// Sync periodically until stdin closes; type `sync` to trigger a cycle
    Watch,
}

impl Cli {
    pub fn load_config(&self) -> Config {
        match &self.config {
            Some(path) => Config::load_from_path(path),
            None => Config::load(),
        }
    }
}

pub fn run(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::List => list(&open_quotes(config)?),
        Commands::Add { text, category } => {
            let added = open_quotes(config)?.add_quote(&text, &category)?;
            println!("Added [{}] {}", added.category, added.text);
            Ok(())
        }
        Commands::Categories => {
            let quotes = open_quotes(config)?;
            let selected = quotes.preferences().selected_category.as_str();
            for category in quotes.categories() {
                let marker = if category == selected { "*" } else { " " };
                println!("{marker} {category}");
            }
            Ok(())
        }
        Commands::Filter { category } => {
            let mut quotes = open_quotes(config)?;
            quotes.select_category(CategoryFilter::parse(&category))?;
            list(&quotes)
        }
        Commands::Random => {
            let quotes = open_quotes(config)?;
            match quotes.random_quote(&mut rand::thread_rng())? {
                Some(picked) => println!("\"{}\" [{}]", picked.text, picked.category),
                None => println!("No quotes in this category."),
            }
            Ok(())
        }
        Commands::Export { path } => {
            let quotes = open_quotes(config)?;
            quotes
                .export_to_path(&path)
                .with_context(|| format!("failed to export to {}", path.display()))?;
            println!("Exported {} quotes to {}", quotes.quotes().len(), path.display());
            Ok(())
        }
        Commands::Import { path } => {
            let outcome = open_quotes(config)?
                .import_from_path(&path)
                .with_context(|| format!("failed to import {}", path.display()))?;
            println!(
                "Imported {} quotes ({} already present).",
                outcome.added, outcome.duplicates_skipped
            );
            Ok(())
        }
        Commands::Sync => sync_once(config),
        Commands::Watch => watch(config),
    }
}

fn open_quotes(config: &Config) -> Result<QuoteService<SqliteLocalStore>> {
    let store = SqliteLocalStore::open(&config.storage.db_path).with_context(|| {
        format!("failed to open store at {}", config.storage.db_path.display())
    })?;
    Ok(QuoteService::open(store)?)
}

fn open_engine(config: &Config) -> Result<(Engine, Receiver<ConflictEvent>)> {
    let quotes = open_quotes(config)?;
    let remote = HttpRemoteClient::new(
        config.sync.remote_url.clone(),
        config.sync.snapshot_limit,
        config.request_timeout(),
    )?;
    let (events_tx, events_rx) = mpsc::channel();
    Ok((
        SyncEngine::new(quotes, remote, ChannelNotifier::new(events_tx)),
        events_rx,
    ))
}

fn list(quotes: &QuoteService<SqliteLocalStore>) -> Result<()> {
    let visible = quotes.filtered();
    if visible.is_empty() {
        println!("No quotes in this category.");
    }
    for quote in visible {
        println!("[{}] {}", quote.category, quote.text);
    }
    Ok(())
}

fn sync_once(config: &Config) -> Result<()> {
    let (mut engine, events) = open_engine(config)?;
    let report = engine.run_cycle()?;
    print_report(&report);
    for event in events.try_iter() {
        println!("{}", event.message());
    }
    Ok(())
}

fn watch(config: &Config) -> Result<()> {
    let (engine, events) = open_engine(config)?;
    let scheduler = SyncScheduler::new(engine);
    let handle = scheduler.start(IntervalTicks::new(config.sync_interval()));
    info!(
        "event=watch_start module=cli status=ok interval_secs={}",
        config.sync.interval_secs
    );

    // Detached; ends with the process.
    let _printer = thread::spawn(move || {
        for event in events {
            println!("{}", event.message());
        }
    });

    println!(
        "Syncing every {}s. Type `sync` to sync now, Ctrl-D to stop.",
        config.sync.interval_secs
    );
    for line in std::io::stdin().lock().lines() {
        let line = line.context("failed to read stdin")?;
        match line.trim() {
            "sync" => match scheduler.trigger_now() {
                TickOutcome::Completed(report) => print_report(&report),
                TickOutcome::Failed(err) => eprintln!("Sync failed: {err}"),
                TickOutcome::Dropped => println!("A sync is already running."),
            },
            "" => {}
            other => eprintln!("Unknown input `{other}`; expected `sync`."),
        }
    }

    handle.stop();
    let stats = scheduler.stats();
    info!(
        "event=watch_stop module=cli status=ok completed={} failed={} dropped={}",
        stats.completed, stats.failed, stats.dropped
    );
    Ok(())
}

fn print_report(report: &CycleReport) {
    if report.push.pushed > 0 || report.push.failed > 0 {
        println!(
            "Pushed {} quotes ({} will be retried).",
            report.push.pushed, report.push.failed
        );
    }
    match &report.outcome {
        CycleOutcome::RemoteUnavailable(err) => println!("Server unavailable: {err}"),
        CycleOutcome::Merged {
            conflict_occurred: false,
            total,
            ..
        } => println!("Up to date ({total} quotes)."),
        CycleOutcome::Merged { total, .. } => println!("Merged server changes ({total} quotes)."),
    }
}
