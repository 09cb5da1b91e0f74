use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{info, warn};

mod conflicts;
mod controller;
mod domain;
mod ingest;
mod inputter;
mod logging;
mod model;
mod persistence;
mod pipeline;
mod query;
mod record;
mod store;
mod ui;

use controller::Controller;
use domain::{CTVError, TVConfig};
use model::{Model, Status};
use persistence::{JsonFileStore, NoPersistence, Persistence};
use ui::TableUI;

const DEFAULT_STATE_FILE: &str = "~/.ctv_state.json";

/// View a table, search, filter, sort and find names with conflicting professions.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// CSV, Parquet or Arrow file to open
    file: Option<String>,

    /// Where the last loaded dataset is kept between sessions
    #[arg(long, default_value = DEFAULT_STATE_FILE)]
    state_file: String,

    /// Do not restore or save the dataset between sessions
    #[arg(long)]
    no_persist: bool,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Event poll time in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Maximum rendered column width
    #[arg(long, default_value_t = 40)]
    max_column_width: usize,
}

impl Args {
    fn to_config(&self) -> Result<TVConfig, CTVError> {
        let state_file = if self.no_persist {
            None
        } else {
            Some(ingest::expand_path(&self.state_file)?)
        };
        let file = self.file.as_deref().map(ingest::expand_path).transpose()?;
        Ok(TVConfig::default()
            .event_poll_time(self.poll_ms)
            .max_column_width(self.max_column_width)
            .state_file(state_file)
            .file(file))
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let result = run(&args);
    ratatui::restore();
    match result {
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(args: &Args) -> Result<(), CTVError> {
    logging::init_logging(args.log_file.as_deref(), &args.log_level)?;
    let cfg = args.to_config()?;
    info!("Starting ctv with {:?}", cfg);

    let persistence: Box<dyn Persistence> = match &cfg.state_file {
        Some(path) => Box::new(JsonFileStore::new(path.clone())),
        None => Box::new(NoPersistence),
    };
    let mut model = Model::init(&cfg, persistence);
    if let Some(path) = cfg.file.clone() {
        // Errors end up on the status line, the viewer still starts.
        if let Err(e) = model.load_data_file(path) {
            warn!("Initial load failed: {e}");
        }
    }

    let mut ui = TableUI::new();
    let controller = Controller::new(&cfg);
    let mut terminal = ratatui::init();
    let size = terminal.size()?;
    model.update(Some(domain::Message::Resize(
        size.width as usize,
        size.height as usize,
    )))?;

    while model.status != Status::QUITTING {
        terminal.draw(|f| ui.draw(&model, f))?;

        if let Some(message) = controller.handle_event(&model)? {
            model.update(Some(message))?;
        };
    }

    info!("Quitting ctv");
    Ok(())
}
