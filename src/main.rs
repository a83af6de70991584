use std::path::PathBuf;
use std::process::exit;

use clap::Parser;

use caliper::optimizer::Config;

/// Gradient-based evaluation tuner: learns parameter corrections from a
/// labelled dataset of FEN/result/score lines.
#[derive(Parser)]
struct Args {
    /// Path to the dataset file (`<FEN> <result> <score>` per line).
    dataset: PathBuf,

    /// Number of training iterations over the whole dataset.
    #[arg(long)]
    iters: Option<usize>,

    /// Number of entries per gradient batch.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Number of worker threads used for gradient and loss computation.
    #[arg(long)]
    threads: Option<usize>,
}

fn main() {
    let args = Args::parse();
    let mut config = Config::default();
    if let Some(iters) = args.iters {
        config.iters = iters;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }

    if let Err(err) = caliper::run(&args.dataset, &config) {
        eprintln!("error: {err:#}");
        exit(1);
    }
}
