use crate::cli::SplitArgs;
use crate::config::builder::build_partition_config;
use crate::config::models::GlobalOptions;
use crate::error::Result;
use foldbatch::workflows::partition;
use tracing::info;

pub async fn run(args: SplitArgs, global: &GlobalOptions) -> Result<()> {
    let config = build_partition_config(global, &args)?;
    info!(
        "Splitting {:?} into {} chunks under {:?}",
        config.input_file, config.chunks, config.output_dir
    );

    let report = tokio::task::block_in_place(|| partition::split_file(&config))?;

    println!(
        "Split {} mutations across {} proteins into {} chunks:",
        report.total_rows,
        report.total_proteins,
        report.chunks.len()
    );
    for chunk in &report.chunks {
        println!(
            "  #{:<3} {:>8} mutations {:>6} proteins  {}",
            chunk.index,
            chunk.rows,
            chunk.proteins,
            chunk.path.display()
        );
    }
    Ok(())
}
