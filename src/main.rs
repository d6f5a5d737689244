use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use weekgrid::application::commands::{
    clear_all_impl, clear_token_impl, fetch_coverage_impl, grid_view_impl, select_cells_impl,
    selection_impl, set_token_impl, toggle_cell_impl, week_summary_impl, CoverageResponse,
    SubmitResponse,
};
use weekgrid::domain::summary::WeekSummary;
use weekgrid::{init_tracing, AppState, ScheduleMode};

#[derive(Parser)]
#[command(name = "weekgrid")]
#[command(about = "Select weekly busy or available time on a half-hour grid and sync it to the schedule store")]
struct Cli {
    /// Workspace holding config/ and logs/ (defaults to the current directory)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Which records to work on: busy or availability
    #[arg(short, long, global = true, default_value = "busy")]
    mode: ScheduleMode,

    /// Show the grid without accepting selections
    #[arg(long, global = true)]
    read_only: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load existing ranges and print them per day
    Fetch,
    /// Render the week grid with existing coverage
    Grid,
    /// Sweep over cells (DAY@HH:MM, e.g. mon@09:00 or 0@09:00) and submit them
    Select {
        #[arg(required = true)]
        cells: Vec<String>,

        /// Release the pointer outside the grid
        #[arg(long)]
        off_grid: bool,
    },
    /// Submit a single cell, as keyboard activation does
    Toggle { cell: String },
    /// Delete every range of the current mode
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Store a bearer token in the system keyring
    Set { token: String },
    /// Remove the stored token
    Clear,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let workspace_root = match cli.workspace.clone() {
        Some(path) => path,
        None => match std::env::current_dir() {
            Ok(path) => path,
            Err(error) => {
                eprintln!("failed to resolve current directory: {error}");
                return ExitCode::FAILURE;
            }
        },
    };
    let state = match AppState::new(workspace_root) {
        Ok(state) => state.with_read_only(cli.read_only),
        Err(error) => {
            eprintln!("failed to initialize workspace: {error}");
            return ExitCode::FAILURE;
        }
    };

    match run(&state, cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(state: &AppState, cli: Cli) -> Result<(), String> {
    let mode = cli.mode;
    let json = cli.json;

    match cli.command {
        Commands::Fetch => {
            let response = fetch_coverage_impl(state, mode)
                .await
                .map_err(|error| state.command_error("fetch_coverage", &error))?;
            emit(json, &response, || format_coverage(&response))
        }
        Commands::Grid => {
            // a failed load still renders, just without coverage
            if let Err(error) = fetch_coverage_impl(state, mode).await {
                eprintln!("{}", state.command_error("fetch_coverage", &error));
            }
            let view = grid_view_impl(state, mode)
                .map_err(|error| state.command_error("grid_view", &error))?;
            let summary = week_summary_impl(state, mode)
                .map_err(|error| state.command_error("week_summary", &error))?;
            emit(json, &view, || {
                format!("{}\n{}", view.render_text(), format_week(mode, &summary))
            })
        }
        Commands::Select { cells, off_grid } => {
            let response = select_cells_impl(state, mode, &cells, !off_grid)
                .await
                .map_err(|error| state.command_error("select_cells", &error))?;
            emit_submission(state, json, mode, response)
        }
        Commands::Toggle { cell } => {
            let response = toggle_cell_impl(state, mode, &cell)
                .await
                .map_err(|error| state.command_error("toggle_cell", &error))?;
            emit_submission(state, json, mode, response)
        }
        Commands::Clear { yes } => {
            let confirmed = yes || confirm_clear(mode).map_err(|error| error.to_string())?;
            let message = clear_all_impl(state, mode, confirmed)
                .await
                .map_err(|error| state.command_error("clear_all", &error))?;
            emit(json, &serde_json::json!({ "message": message }), || message.clone())
        }
        Commands::Token { action } => match action {
            TokenAction::Set { token } => {
                set_token_impl(state, &token).map_err(|error| state.command_error("set_token", &error))?;
                println!("Access token stored.");
                Ok(())
            }
            TokenAction::Clear => {
                clear_token_impl(state).map_err(|error| state.command_error("clear_token", &error))?;
                println!("Access token removed.");
                Ok(())
            }
        },
    }
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<(), String> {
    if json {
        let rendered = serde_json::to_string_pretty(value).map_err(|error| error.to_string())?;
        println!("{rendered}");
    } else {
        println!("{}", text());
    }
    Ok(())
}

fn emit_submission(
    state: &AppState,
    json: bool,
    mode: ScheduleMode,
    response: Option<SubmitResponse>,
) -> Result<(), String> {
    match response {
        Some(response) => emit(json, &response, || {
            let mut lines = vec![response.message.clone()];
            lines.extend(response.errors.iter().map(|error| format!("  - {error}")));
            lines.join("\n")
        }),
        None => {
            let selection =
                selection_impl(state, mode).map_err(|error| state.command_error("selection", &error))?;
            emit(json, &selection, || "Nothing to submit.".to_string())
        }
    }
}

fn format_coverage(response: &CoverageResponse) -> String {
    if response.ranges.is_empty() {
        return format!("No {} ranges yet.", response.mode);
    }
    format_week(response.mode, &response.summary)
}

fn format_week(mode: ScheduleMode, summary: &WeekSummary) -> String {
    let mut lines: Vec<String> = summary
        .days
        .iter()
        .map(|day| format!("{:<10} {}", day.day_name, day.ranges.join(", ")))
        .collect();
    let covered = match mode {
        ScheduleMode::Busy => "busy",
        ScheduleMode::Availability => "available",
    };
    lines.push(format!(
        "{} blocks, {}h {covered}, {}h otherwise",
        summary.block_count,
        summary.covered_hours(),
        summary.uncovered_hours()
    ));
    lines.join("\n")
}

fn confirm_clear(mode: ScheduleMode) -> io::Result<bool> {
    print!("Delete all {mode} ranges? This cannot be undone. [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
