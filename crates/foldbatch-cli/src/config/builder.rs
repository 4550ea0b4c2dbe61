use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use super::models::{AppConfig, GlobalOptions};
use crate::cli::{RunArgs, SplitArgs, StatusArgs};
use crate::error::{CliError, Result};
use foldbatch::engine::config::{
    PartitionConfig, PartitionConfigBuilder, WorkerConfig, WorkerConfigBuilder, WorkerLayout,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Merges `--set` values, the config file, and built-in defaults (in that order of precedence).
pub fn build_app_config(global: &GlobalOptions, set_values: &[String]) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();
    let base_dir = resolve_base_dir(global.base_dir.as_deref())?;

    let file_config = if let Some(config_path) = &global.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };
    let mut file_config = apply_set_values(file_config, set_values)?;

    let paths = file_config.paths.take().unwrap_or_default();
    let engine = file_config.engine.take().unwrap_or_default();

    let layout = WorkerLayout {
        chunk_prefix: paths.chunk_prefix.unwrap_or(defaults.layout.chunk_prefix),
        output_prefix: paths.output_prefix.unwrap_or(defaults.layout.output_prefix),
        workspace_prefix: paths
            .workspace_prefix
            .unwrap_or(defaults.layout.workspace_prefix),
    };

    let resolve = |value: Option<PathBuf>, default: String| {
        resolve_path(&base_dir, value.unwrap_or_else(|| PathBuf::from(default)))
    };
    let config = AppConfig {
        processed_dir: resolve(paths.processed_dir, defaults.processed_dir),
        structure_dir: resolve(paths.structure_dir, defaults.structure_dir),
        mutant_structure_dir: resolve(paths.mutant_structure_dir, defaults.mutant_structure_dir),
        layout,
        engine_binary: resolve(engine.binary, defaults.engine_binary),
        number_of_runs: engine.number_of_runs.unwrap_or(defaults.number_of_runs),
        chain_id: engine.chain.unwrap_or(defaults.chain_id),
        repair: engine.repair.unwrap_or(defaults.repair),
    };
    debug!("Resolved application configuration: {:?}", config);
    Ok(config)
}

/// Builds the configuration for `run`; command-line flags take precedence over everything else.
pub fn build_worker_config(global: &GlobalOptions, args: &RunArgs) -> Result<WorkerConfig> {
    let app = build_app_config(global, &args.set_values)?;
    let engine_binary = args.foldx.clone().unwrap_or_else(|| app.engine_binary.clone());

    worker_builder(&app, args.worker_id)
        .engine_binary(engine_binary)
        .batch_limit(args.batch_size)
        .pilot_rows(args.pilot)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))
}

/// Builds the configuration for `status`, which never limits the chunk.
pub fn build_status_config(global: &GlobalOptions, args: &StatusArgs) -> Result<WorkerConfig> {
    let app = build_app_config(global, &[])?;
    worker_builder(&app, args.worker_id)
        .engine_binary(app.engine_binary.clone())
        .build()
        .map_err(|e| CliError::Config(e.to_string()))
}

pub fn build_partition_config(global: &GlobalOptions, args: &SplitArgs) -> Result<PartitionConfig> {
    let app = build_app_config(global, &[])?;
    PartitionConfigBuilder::new()
        .input_file(args.input.clone())
        .chunks(args.chunks)
        .output_dir(args.output_dir.clone().unwrap_or(app.processed_dir))
        .chunk_prefix(args.prefix.clone().unwrap_or(app.layout.chunk_prefix))
        .build()
        .map_err(|e| CliError::Config(e.to_string()))
}

fn worker_builder(app: &AppConfig, worker_id: usize) -> WorkerConfigBuilder {
    WorkerConfigBuilder::new()
        .worker(&app.processed_dir, &app.layout, worker_id)
        .structure_dir(app.structure_dir.clone())
        .mutant_structure_dir(app.mutant_structure_dir.clone())
        .repair_params(app.repair)
        .number_of_runs(app.number_of_runs)
        .chain_id(app.chain_id)
}

fn resolve_base_dir(base_dir: Option<&Path>) -> Result<PathBuf> {
    match base_dir {
        Some(dir) if dir.is_dir() => Ok(dir.to_path_buf()),
        Some(dir) => Err(CliError::Argument(format!(
            "Base directory '{}' does not exist or is not a directory",
            dir.display()
        ))),
        None => Ok(std::env::current_dir()?),
    }
}

fn resolve_path(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let key = key.trim();

        if let Some(field) = key.strip_prefix("paths.") {
            let paths = config.paths.get_or_insert_with(Default::default);
            match field {
                "processed-dir" => paths.processed_dir = Some(PathBuf::from(value_str)),
                "structure-dir" => paths.structure_dir = Some(PathBuf::from(value_str)),
                "mutant-structure-dir" => {
                    paths.mutant_structure_dir = Some(PathBuf::from(value_str))
                }
                "chunk-prefix" => paths.chunk_prefix = Some(value_str.to_string()),
                "output-prefix" => paths.output_prefix = Some(value_str.to_string()),
                "workspace-prefix" => paths.workspace_prefix = Some(value_str.to_string()),
                _ => return Err(unsupported_key(key)),
            }
            continue;
        }

        let engine = config.engine.get_or_insert_with(Default::default);
        match key {
            "engine.binary" => engine.binary = Some(PathBuf::from(value_str)),
            "engine.number-of-runs" => {
                engine.number_of_runs = Some(parse_value(key, value_str, "integer")?)
            }
            "engine.chain" => engine.chain = Some(parse_value(key, value_str, "chain")?),
            "engine.repair.ion-strength" => {
                engine.repair.get_or_insert_with(Default::default).ion_strength =
                    parse_value(key, value_str, "float")?
            }
            "engine.repair.ph" => {
                engine.repair.get_or_insert_with(Default::default).ph =
                    parse_value(key, value_str, "float")?
            }
            "engine.repair.vdw-design" => {
                engine.repair.get_or_insert_with(Default::default).vdw_design =
                    parse_value(key, value_str, "integer")?
            }
            _ => return Err(unsupported_key(key)),
        }
    }
    Ok(config)
}

fn unsupported_key(key: &str) -> CliError {
    CliError::Config(format!("Unsupported configuration key for --set: '{}'", key))
}
