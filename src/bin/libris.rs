//! Libris CLI Binary
//!
//! Runs the library simulation and renders the core's event stream to the
//! console. All output formatting lives here; the core itself only emits
//! typed events.

use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::Table;
use libris::config::{ConfigLoader, LibraryConfig};
use libris::events::{Event, EventBus, EventRecord};
use libris::library::{Library, SimulationReport};
use libris::logging::init_logging;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

/// Libris - concurrent library simulation
#[derive(Parser)]
#[command(name = "libris")]
#[command(about = "Concurrent library simulation: shared catalog, bounded borrow queue, one librarian")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation
    Run {
        /// Number of reader units
        #[arg(long)]
        readers: Option<u32>,

        /// Number of borrower units
        #[arg(long)]
        borrowers: Option<u32>,

        /// Initial number of books in the catalog
        #[arg(long)]
        books: Option<u32>,

        /// Borrow-request queue capacity
        #[arg(long)]
        capacity: Option<usize>,

        /// Simulation duration in seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Refuse submissions on a full queue instead of blocking
        #[arg(long)]
        nonblocking: bool,

        /// Emit events as JSON lines instead of formatted text
        #[arg(long)]
        json: bool,

        /// Suppress the live event feed
        #[arg(long)]
        quiet: bool,
    },
    /// Print the effective configuration as JSON
    Config,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ConfigLoader::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    if let Some(output) = cli.log_output {
        config.logging.output = output;
    }
    if let Some(file) = cli.log_file {
        config.logging.file = Some(file);
    }

    match cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Run {
            readers,
            borrowers,
            books,
            capacity,
            duration,
            nonblocking,
            json,
            quiet,
        } => {
            if let Some(readers) = readers {
                config.readers = readers;
            }
            if let Some(borrowers) = borrowers {
                config.borrowers = borrowers;
            }
            if let Some(books) = books {
                config.initial_books = books;
            }
            if let Some(capacity) = capacity {
                config.queue_capacity = capacity;
            }
            if let Some(duration) = duration {
                config.run_secs = duration;
            }
            config.nonblocking_submit |= nonblocking;
            config.validate()?;

            init_logging(&config.logging)?;
            run_simulation(config, json, quiet)
        }
    }
}

fn run_simulation(config: LibraryConfig, json: bool, quiet: bool) -> anyhow::Result<()> {
    let duration = Duration::from_secs(config.run_secs);
    println!(
        "{} {} readers, {} borrowers, {} books, queue capacity {}, {}s",
        "libris:".bold(),
        config.readers,
        config.borrowers,
        config.initial_books,
        config.queue_capacity,
        config.run_secs,
    );

    let (events, sink) = if quiet {
        (EventBus::disabled(), None)
    } else {
        let (bus, records) = EventBus::channel();
        let handle = std::thread::Builder::new()
            .name("event-sink".to_string())
            .spawn(move || {
                for record in records {
                    if json {
                        match serde_json::to_string(&record) {
                            Ok(line) => println!("{line}"),
                            Err(e) => eprintln!("event serialization failed: {e}"),
                        }
                    } else {
                        println!("{}", render(&record));
                    }
                }
            })
            .context("failed to spawn event sink thread")?;
        (bus, Some(handle))
    };

    let library = Library::start(config, events)?;

    let (interrupt_tx, interrupt_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.try_send(());
    })
    .context("failed to install interrupt handler")?;

    if interrupt_rx.recv_timeout(duration).is_ok() {
        println!("{}", "interrupted, closing the library".yellow());
    }

    let report = library.join();
    if let Some(handle) = sink {
        // All bus handles dropped with the library; the sink drains and ends.
        let _ = handle.join();
    }

    print_report(&report);
    Ok(())
}

fn render(record: &EventRecord) -> String {
    let at = record.at.format("%H:%M:%S%.3f");
    let line = match &record.event {
        Event::ReaderEntered {
            reader,
            active_readers,
        } => format!(
            "reader-{reader} entered the reading room ({active_readers} active)"
        )
        .green()
        .to_string(),
        Event::ReaderExited {
            reader,
            active_readers,
        } => format!("reader-{reader} left the reading room ({active_readers} active)"),
        Event::RequestQueued {
            request,
            borrower,
            depth,
        } => format!("borrower-{borrower} queued request #{request} (queue depth {depth})")
            .cyan()
            .to_string(),
        Event::AgentWoke => "librarian woke up".bold().to_string(),
        Event::RequestProcessing { request, borrower } => {
            format!("librarian processing request #{request} for borrower-{borrower}")
        }
        Event::BookDelivered {
            request,
            borrower,
            remaining,
        } => format!(
            "book handed to borrower-{borrower} for request #{request} ({remaining} left)"
        )
        .green()
        .bold()
        .to_string(),
        Event::BookUnavailable { request, borrower } => {
            format!("no books left for borrower-{borrower} (request #{request})")
                .red()
                .to_string()
        }
        Event::AgentSleeping => "librarian is resting".dimmed().to_string(),
    };
    format!("[{at}] {line}")
}

fn print_report(report: &SimulationReport) {
    let rows = [
        ("Books delivered", report.delivered.to_string()),
        ("Out of stock", report.out_of_stock.to_string()),
        ("Cancelled", report.cancelled.to_string()),
        ("Rejected (queue full)", report.rejected_full.to_string()),
        ("Books remaining", report.books_remaining.to_string()),
        ("Pending requests", report.pending_requests.to_string()),
        ("Active readers", report.active_readers.to_string()),
    ];
    let mut table = Table::new();
    table.set_header(vec!["Final statistics", "Count"]);
    for (label, value) in rows {
        table.add_row(vec![label.to_string(), value]);
    }
    println!("{table}");
}
