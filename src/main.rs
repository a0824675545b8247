use anyhow::Context;
use automorph::graph;
use automorph::AutomorphismHook;
use automorph::Solver;
use clap::Parser;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Automorphism groups of vertex-colored graphs",
    long_about = None
)]
struct Args {
    /// DIMACS-like input: `p edge n m`, `e u v`, `n v c` lines
    file: std::path::PathBuf,
    /// worker threads (default: chosen by graph size)
    #[arg(long)]
    threads: Option<usize>,
    /// error probability of a nondeterministic run is below 2^-BOUND
    #[arg(long, default_value_t = 10)]
    error_bound: usize,
    /// do not solve quotient components separately
    #[arg(long)]
    no_decompose: bool,
    /// skip the graph-rewriting preprocessor
    #[arg(long)]
    no_prep: bool,
    /// skip degree-0/1 elimination
    #[arg(long)]
    no_deg01: bool,
    /// skip degree-2 path compression and matching
    #[arg(long)]
    no_deg2: bool,
    /// skip the quotient edge flip
    #[arg(long)]
    no_flip: bool,
    /// skip quotient-component probing
    #[arg(long)]
    no_probe: bool,
    /// cell selector policy: auto, first, largest, smallest or traces
    #[arg(long, default_value = "auto")]
    selector: String,
    /// shuffle vertex names with this seed before solving
    #[arg(long)]
    permute: Option<u64>,
    /// seed of the randomized leaf search
    #[arg(long, default_value_t = 0x5eed)]
    seed: u64,
    /// suppress progress output
    #[arg(long)]
    silent: bool,
    /// print generators in cycle notation as they are found
    #[arg(long)]
    gens: bool,
    /// dump run statistics as JSON
    #[arg(long)]
    stats_json: bool,
}

struct PrintingHook;

impl AutomorphismHook for PrintingHook {
    fn automorphism(&self, perm: &[usize], supp: &[usize]) {
        println!("{}", cycle_notation(perm, supp));
    }
}

fn cycle_notation(perm: &[usize], supp: &[usize]) -> String {
    let mut out = String::new();
    let mut done = vec![false; perm.len()];
    for &start in supp {
        if done[start] {
            continue;
        }
        out.push('(');
        let mut v = start;
        loop {
            done[v] = true;
            out.push_str(&v.to_string());
            v = perm[v];
            if v == start {
                break;
            }
            out.push(' ');
        }
        out.push(')');
    }
    out
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    automorph::init_logging(args.silent);

    let (mut g, mut colmap) = graph::read_dimacs_file(&args.file, args.permute)
        .with_context(|| format!("reading {}", args.file.display()))?;
    log::info!(
        "parsed n={} m={}",
        g.vertex_count(),
        g.edge_count() / 2
    );

    let mut solver = Solver::new();
    solver.h_error_bound = args.error_bound;
    solver.h_decompose = !args.no_decompose;
    solver.h_prep = !args.no_prep;
    solver.h_threads = args.threads;
    solver.h_seed = args.seed;
    solver.h_silent = args.silent;
    solver.h_selector = match args.selector.as_str() {
        "auto" => None,
        "first" => Some(automorph::ir::Policy::First),
        "largest" => Some(automorph::ir::Policy::Largest),
        "smallest" => Some(automorph::ir::Policy::Smallest),
        "traces" => Some(automorph::ir::Policy::Traces),
        other => anyhow::bail!("unknown selector policy `{other}`"),
    };
    solver.h_prep_schedule.retain(|stage| {
        use automorph::prep::Stage;
        match stage {
            Stage::Deg01 => !args.no_deg01,
            Stage::Deg2Match | Stage::Deg2Unique => !args.no_deg2,
            Stage::QcEdgeFlip => !args.no_flip,
            Stage::ProbeQc | Stage::Probe2Qc => !args.no_probe,
            Stage::ReductionLoop => !(args.no_deg01 || args.no_deg2 || args.no_flip),
        }
    });

    let hook = PrintingHook;
    let hook: Option<&dyn AutomorphismHook> = if args.gens { Some(&hook) } else { None };
    let grp = solver.automorphisms(&mut g, &mut colmap, hook);

    println!("group size: {grp}");
    println!(
        "termination: {}{}",
        solver.s_termination.as_str(),
        if solver.s_deterministic_termination {
            ""
        } else {
            " (probabilistic)"
        }
    );
    if args.stats_json {
        println!("{}", serde_json::to_string_pretty(&solver.s_stats)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_cover_the_support() {
        // (0 2 1)(3 4)
        let perm = vec![2, 0, 1, 4, 3, 5];
        let supp = vec![0, 1, 2, 3, 4];
        assert_eq!(cycle_notation(&perm, &supp), "(0 2 1)(3 4)");
        assert_eq!(cycle_notation(&[0, 1], &[]), "");
    }
}
