use crate::cli::StatusArgs;
use crate::config::builder::build_status_config;
use crate::config::models::GlobalOptions;
use crate::error::Result;
use foldbatch::workflows::status;

pub async fn run(args: StatusArgs, global: &GlobalOptions) -> Result<()> {
    let config = build_status_config(global, &args)?;
    let report = status::status(&config)?;

    let percent = if report.total_mutations == 0 {
        100.0
    } else {
        100.0 * report.completed as f64 / report.total_mutations as f64
    };
    println!("Worker {}:", report.worker_id);
    println!("  Chunk:     {}", config.paths.chunk_file.display());
    println!("  Output:    {}", config.paths.output_file.display());
    println!(
        "  Mutations: {} / {} completed ({:.1}%), {} pending",
        report.completed, report.total_mutations, percent, report.pending
    );
    println!(
        "  Proteins:  {} ({} repaired)",
        report.proteins, report.proteins_repaired
    );
    println!("  Output rows: {}", report.output_rows);
    if report.output_tail_torn {
        println!("  The output file ends mid-record; the next run will repair it.");
    }
    Ok(())
}
