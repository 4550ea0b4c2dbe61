use crate::cli::RunArgs;
use crate::config::builder::build_worker_config;
use crate::config::models::GlobalOptions;
use crate::error::Result;
use crate::ui::{CliProgressHandler, UiEvent};
use foldbatch::engine::progress::ProgressReporter;
use foldbatch::workflows::worker::{self, SessionSummary};
use tokio::sync::mpsc;
use tracing::{info, warn};

pub async fn run(
    args: RunArgs,
    global: &GlobalOptions,
    ui_sender: mpsc::Sender<UiEvent>,
) -> Result<()> {
    let config = build_worker_config(global, &args)?;
    info!(
        "Worker {} reading {:?}, writing {:?}",
        config.worker_id, config.paths.chunk_file, config.paths.output_file
    );
    if let Some(rows) = config.pilot_rows {
        warn!("Pilot mode: only the first {} rows of the chunk will be processed.", rows);
    }

    let progress_handler = CliProgressHandler::new(ui_sender);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let summary = tokio::task::block_in_place(|| worker::run(&config, &reporter))?;

    print_summary(config.worker_id, &summary);
    Ok(())
}

fn print_summary(worker_id: usize, summary: &SessionSummary) {
    println!("Worker {} session summary:", worker_id);
    println!("  Mutations in chunk:       {}", summary.total_mutations);
    println!("  Completed before session: {}", summary.previously_completed);
    println!("  Completed this session:   {}", summary.mutations_completed);
    if summary.null_energies > 0 {
        println!("    of which without ddG:   {}", summary.null_energies);
    }
    println!("  Skipped mutations:        {}", summary.mutations_skipped);
    println!(
        "  Proteins processed:       {} ({} skipped)",
        summary.proteins_processed, summary.proteins_skipped
    );
    println!("  Remaining:                {}", summary.remaining());
    if summary.budget_reached {
        println!("Batch limit reached; run the same command again to continue.");
    } else if summary.remaining() > 0 {
        println!("Some mutations were skipped; a later run will retry them.");
    }
}
