pub mod ds;
pub mod graph;
pub mod groups;
pub mod hooks;
pub mod ir;
pub mod prep;
pub mod search;
pub mod solver;

pub use graph::Builder;
pub use graph::Graph;
pub use hooks::AutomorphismHook;
pub use solver::Solver;

// search tree parameters
const IR_SIZE_FACTOR: usize = 6;
const DEVIATION_BUDGET_CAP: usize = 128;
const SELECTOR_CACHE_SIZE: usize = 12;

// worker pool parameters
const SEQUENTIAL_CUTOFF: usize = 256;
const MAX_WORKERS: usize = 8;

// restart heuristics
const BUDGET_INCREASE_FACTOR: u64 = 5;
const MAX_CONSECUTIVE_DISCARDS: u32 = 3;

/// initialize terminal logging; `silent` drops everything below warnings
pub fn init_logging(silent: bool) {
    let level = if silent {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    };
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let _ = simplelog::TermLogger::init(
        level,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
}
