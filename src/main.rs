use std::fs::File;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod controller;
mod domain;
mod filter;
mod inputter;
mod loader;
mod mock;
mod model;
mod nav;
mod records;
mod segments;
mod stats;
mod table_state;
mod ui;

use controller::Controller;
use domain::{DashConfig, DashError};
use model::{Model, Status};
use ui::DashUI;

/// Terminal dashboard for IPTV packages, clients, buildings and viewing statistics.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Directory with package_channel.csv, client.csv, address.csv and
    /// epg_stat.csv. Built-in sample data is shown when omitted.
    #[arg(short, long)]
    data_dir: Option<String>,

    /// Initial rows per page (5, 10 or 25).
    #[arg(short, long, default_value_t = 5)]
    rows_per_page: usize,

    /// Event poll interval in milliseconds.
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Widest a column is drawn, in characters.
    #[arg(long, default_value_t = 32)]
    max_column_width: usize,

    /// Log file. Filter with RUST_LOG, e.g. RUST_LOG=epgdash=trace.
    #[arg(long, default_value = "epgdash.log")]
    log_file: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli.log_file) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Err(e) => {
            error!("Exiting with error: {e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_logging(log_file: &str) -> Result<(), DashError> {
    let file = File::create(loader::expand_path(log_file)?)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(cli: Cli) -> Result<(), DashError> {
    let mut cfg = DashConfig::default()
        .event_poll_time(cli.poll_ms)
        .rows_per_page(cli.rows_per_page)
        .max_column_width(cli.max_column_width);
    if let Some(dir) = cli.data_dir.as_deref() {
        cfg = cfg.data_dir(loader::expand_path(dir)?);
    }
    info!("Starting epgdash with {cfg:?}");

    let (datasets, failures) = match &cfg.data_dir {
        Some(dir) => {
            let res = loader::load_dir(dir)?;
            (res.datasets, res.failures)
        }
        None => (mock::datasets(), Vec::new()),
    };

    let mut model = Model::init(&cfg, datasets)?;
    if !failures.is_empty() {
        model.report(format!("Could not load {}", failures.join("; ")));
    }
    let mut ui = DashUI::new();
    let controller = Controller::new(&cfg);

    let mut terminal = ratatui::init();
    let res = event_loop(&mut terminal, &mut model, &mut ui, &controller);
    ratatui::restore();

    info!("Bye");
    res
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    model: &mut Model,
    ui: &mut DashUI,
    controller: &Controller,
) -> Result<(), DashError> {
    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(model)?;
        model.update(message)?;
    }
    Ok(())
}
