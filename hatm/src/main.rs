use hatm::{GibbsInput, GibbsOptions, GibbsState};

use anyhow::Result;
use clap::Parser;
use log::info;
use std::io::Write;

#[derive(Parser)]
#[command(name = "hatm")]
#[command(about = "Hierarchical author-topic model by collapsed Gibbs sampling")]
struct Cli {
    /// Corpus file, one `<n> word_id:count ...` line per document
    corpus: String,

    /// Authors file, candidate author ids per document line
    authors: String,

    /// Settings file (DEPTH, ETA, GEM_MEAN, GEM_SCALE, ...)
    settings: String,

    /// Number of Gibbs iterations
    #[arg(long, default_value_t = 10000)]
    iterations: usize,

    /// Number of initializations to pick the best from
    #[arg(long, default_value_t = 100)]
    restarts: usize,

    /// Random seed (drawn at random if not given)
    #[arg(long)]
    seed: Option<u64>,

    /// Shuffle documents and words every this many iterations (0 = never)
    #[arg(long, default_value_t = 100)]
    shuffle_lag: usize,

    /// Resample hyperparameters every this many iterations (0 = never)
    #[arg(long, default_value_t = 0)]
    hyper_lag: usize,

    /// Cycle the path sampling start level every this many iterations
    #[arg(long)]
    level_lag: Option<usize>,

    #[arg(short = 'v', long)]
    verbose: bool,

    /// Hide progress bars
    #[arg(long)]
    no_progress: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let seed = cli.seed.unwrap_or_else(rand::random);
    info!("random seed {}", seed);

    let options = GibbsOptions {
        shuffle_lag: cli.shuffle_lag,
        hyper_lag: cli.hyper_lag,
        level_lag: cli.level_lag,
        num_restarts: cli.restarts,
        seed,
        show_progress: !cli.no_progress,
        ..Default::default()
    };

    let input = GibbsInput::read(&cli.corpus, &cli.authors, &cli.settings)?;
    let mut state = GibbsState::best_of_restarts(&input, &options)?;

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    writeln!(out, "iter\tgem\teta\tgamma\tscore\tbest")?;

    state.run(cli.iterations, |s| {
        let score = s.score();
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}",
            s.iteration(),
            score.gem,
            score.eta,
            score.gamma,
            score.total,
            s.max_score()
        )?;
        Ok(())
    })?;

    out.flush()?;
    Ok(())
}
