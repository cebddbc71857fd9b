use capsule::data::CapsuleData;
use capsule::decay::DecayKernel;
use capsule::eval::evaluate_ranking;
use capsule::persist::{log_time, LoadedFactors};
use capsule::predict::Predictor;
use capsule::{Corpus, ModelMode};

use clap::Parser;
use log::info;
use std::time::Instant;

#[derive(Parser, Debug, Clone)]
pub struct EvalArgs {
    /// directory with `meta.tsv`, `train.tsv`, `validation.tsv` and
    /// `test.tsv` (each may be gzipped)
    #[arg(required = true)]
    data_dir: Box<str>,

    /// output directory of `capsule fit`
    #[arg(long, required = true)]
    fit_dir: Box<str>,

    /// snapshot label, e.g. `final` or `0100`
    #[arg(long, default_value = "final")]
    label: Box<str>,

    /// number of days an event keeps influencing documents (as fitted)
    #[arg(long, default_value_t = 7)]
    event_dur: usize,

    /// the snapshot models entity concerns only
    #[arg(long, default_value_t = false)]
    entity_only: bool,

    /// the snapshot models entity-event involvement only
    #[arg(long, default_value_t = false)]
    event_only: bool,

    /// verbosity
    #[arg(long, short)]
    verbose: bool,
}

pub fn run_capsule_eval(args: EvalArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let mode = ModelMode::from_flags(args.entity_only, args.event_only)?;

    let corpus = Corpus::from_dir(&args.data_dir)?;
    if corpus.test().is_empty() {
        anyhow::bail!("no test observations under {}", args.data_dir);
    }

    let dims = (corpus.entity_count(), corpus.date_count(), corpus.term_count());
    let factors = LoadedFactors::load(&args.fit_dir, &args.label, mode, dims)?;
    let decay = DecayKernel::new(corpus.date_count(), args.event_dur)?;
    let predictor = Predictor::new(&factors, &decay, mode, &corpus);

    let start = Instant::now();
    evaluate_ranking(&predictor, &corpus, &args.fit_dir, &args.label)?;
    log_time(&args.fit_dir, -1, start.elapsed().as_secs_f64())?;

    info!("done");
    Ok(())
}
