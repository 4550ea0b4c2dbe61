use foldbatch::engine::config::{RepairParams, WorkerLayout};

/// Built-in settings used when neither the command line nor the config file sets a value.
pub struct DefaultsConfig {
    pub processed_dir: String,
    pub structure_dir: String,
    pub mutant_structure_dir: String,
    pub layout: WorkerLayout,
    pub engine_binary: String,
    pub number_of_runs: u32,
    pub chain_id: char,
    pub repair: RepairParams,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            processed_dir: "data/processed".to_string(),
            structure_dir: "data/raw/alphaFold_human".to_string(),
            mutant_structure_dir: "data/processed/structures".to_string(),
            layout: WorkerLayout::default(),
            engine_binary: "tools/foldx/foldx".to_string(),
            number_of_runs: 1,
            chain_id: 'A',
            repair: RepairParams::default(),
        }
    }
}
