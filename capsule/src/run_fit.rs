use capsule::{Capsule, CapsuleOptions, Corpus, ModelMode};
use clap::Parser;
use log::info;

#[derive(Parser, Debug, Clone)]
pub struct FitArgs {
    /// directory with `meta.tsv`, `train.tsv`, `validation.tsv` and
    /// optionally `test.tsv` (each may be gzipped)
    #[arg(required = true)]
    data_dir: Box<str>,

    /// output directory
    #[arg(long, short, required = true)]
    out: Box<str>,

    /// random seed
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// save parameters every `save_freq` iterations (0: only at the end)
    #[arg(long, default_value_t = 0)]
    save_freq: usize,

    /// evaluate on the test split every `eval_freq` iterations (0: only at the end)
    #[arg(long, default_value_t = 0)]
    eval_freq: usize,

    /// check held-out likelihood every `conv_freq` iterations
    #[arg(long, default_value_t = 10)]
    conv_freq: usize,

    /// maximum number of iterations
    #[arg(long, default_value_t = 300)]
    max_iter: usize,

    /// minimum number of iterations before convergence
    #[arg(long, default_value_t = 30)]
    min_iter: usize,

    /// relative change in held-out likelihood to declare convergence
    #[arg(long, default_value_t = 1e-6)]
    delta: f64,

    /// shape hyperparameter of entity concerns
    #[arg(long, default_value_t = 0.3)]
    a_phi: f64,

    /// rate hyperparameter of entity concerns
    #[arg(long, default_value_t = 0.3)]
    b_phi: f64,

    /// shape hyperparameter of topics
    #[arg(long, default_value_t = 0.3)]
    a_theta: f64,

    /// rate hyperparameter of topics
    #[arg(long, default_value_t = 0.3)]
    b_theta: f64,

    /// shape hyperparameter of event descriptions
    #[arg(long, default_value_t = 0.3)]
    a_pi: f64,

    /// rate hyperparameter of event descriptions
    #[arg(long, default_value_t = 0.3)]
    b_pi: f64,

    /// use stochastic variational inference over mini-batches
    #[arg(long, default_value_t = false)]
    svi: bool,

    /// after convergence, one more batch pass over all documents
    #[arg(long, default_value_t = false)]
    final_pass: bool,

    /// number of documents per mini-batch (SVI only)
    #[arg(long, default_value_t = 1000)]
    sample_size: usize,

    /// SVI delay tau
    #[arg(long, default_value_t = 1024.0)]
    svi_delay: f64,

    /// SVI forgetting rate kappa in (0.5, 1]
    #[arg(long, default_value_t = 0.75)]
    svi_forget: f64,

    /// number of general topics
    #[arg(long, short = 'k', default_value_t = 100)]
    k: usize,

    /// number of days an event keeps influencing documents
    #[arg(long, default_value_t = 7)]
    event_dur: usize,

    /// model entity concerns over topics only
    #[arg(long, default_value_t = false)]
    entity_only: bool,

    /// model entity-event involvement only
    #[arg(long, default_value_t = false)]
    event_only: bool,

    /// verbosity
    #[arg(long, short)]
    verbose: bool,
}

pub fn run_capsule_fit(args: FitArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let mode = ModelMode::from_flags(args.entity_only, args.event_only)?;

    let opts = CapsuleOptions {
        outdir: args.out.clone(),
        datadir: args.data_dir.clone(),
        verbose: args.verbose,
        a_phi: args.a_phi,
        b_phi: args.b_phi,
        a_theta: args.a_theta,
        b_theta: args.b_theta,
        a_pi: args.a_pi,
        b_pi: args.b_pi,
        mode,
        event_dur: args.event_dur,
        k: args.k,
        seed: args.seed,
        save_freq: args.save_freq,
        eval_freq: args.eval_freq,
        conv_freq: args.conv_freq,
        max_iter: args.max_iter,
        min_iter: args.min_iter,
        likelihood_delta: args.delta,
        svi: args.svi,
        final_pass: args.final_pass,
        sample_size: args.sample_size,
        delay: args.svi_delay,
        forget: args.svi_forget,
    };
    opts.validate()?;

    let corpus = Corpus::from_dir(&args.data_dir)?;

    let mut model = Capsule::new(opts, &corpus)?;
    let summary = model.learn()?;
    info!(
        "{} after {} iterations, held-out log-likelihood {:.4}",
        summary.termination, summary.iterations, summary.log_likelihood
    );
    if summary.dropped_observations > 0 {
        info!(
            "{} observations were skipped over the run",
            summary.dropped_observations
        );
    }

    model.evaluate("final")?;

    info!("done");
    Ok(())
}
