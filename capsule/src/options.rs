use std::fmt;

/// Which latent factor families the model carries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelMode {
    /// entity-topic and entity-event factors
    Full,
    /// entity-topic factors only
    EntityOnly,
    /// entity-event factors only
    EventOnly,
}

impl ModelMode {
    /// Resolve the two mutually exclusive command-line flags
    pub fn from_flags(entity_only: bool, event_only: bool) -> anyhow::Result<Self> {
        match (entity_only, event_only) {
            (false, false) => Ok(ModelMode::Full),
            (true, false) => Ok(ModelMode::EntityOnly),
            (false, true) => Ok(ModelMode::EventOnly),
            (true, true) => Err(anyhow::anyhow!(
                "entity-only and event-only are mutually exclusive"
            )),
        }
    }

    /// entity concerns (phi_k) and topics (theta)
    pub fn has_entity_factors(&self) -> bool {
        !matches!(self, ModelMode::EventOnly)
    }

    /// entity-event involvement (phi_d) and event descriptions (pi)
    pub fn has_event_factors(&self) -> bool {
        !matches!(self, ModelMode::EntityOnly)
    }
}

impl fmt::Display for ModelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelMode::Full => write!(f, "full Capsule model (entity + event factors)"),
            ModelMode::EntityOnly => write!(f, "entity factors only"),
            ModelMode::EventOnly => write!(f, "event factors only"),
        }
    }
}

/// Options for Capsule inference.
#[derive(Debug, Clone)]
pub struct CapsuleOptions {
    /// Output directory for parameters and logs
    pub outdir: Box<str>,
    /// Where the data came from (only recorded in `settings.dat`)
    pub datadir: Box<str>,
    /// Log more about each likelihood checkpoint
    pub verbose: bool,

    /// Gamma prior (shape, rate) of entity concerns phi_k and phi_d. Default: (0.3, 0.3)
    pub a_phi: f64,
    pub b_phi: f64,
    /// Gamma prior (shape, rate) of topics theta. Default: (0.3, 0.3)
    pub a_theta: f64,
    pub b_theta: f64,
    /// Gamma prior (shape, rate) of event descriptions pi. Default: (0.3, 0.3)
    pub a_pi: f64,
    pub b_pi: f64,

    /// Factor families in the model. Default: `Full`
    pub mode: ModelMode,
    /// Number of days an event keeps influencing documents. Default: 7
    pub event_dur: usize,
    /// Number of general topics K. Default: 100
    pub k: usize,

    /// Random seed. Default: 0
    pub seed: u64,
    /// Save parameters every `save_freq` iterations (0 = never). Default: 0
    pub save_freq: usize,
    /// Evaluate on the test split every `eval_freq` iterations (0 = never). Default: 0
    pub eval_freq: usize,
    /// Check held-out likelihood every `conv_freq` iterations. Default: 10
    pub conv_freq: usize,
    /// Maximum number of iterations. Default: 300
    pub max_iter: usize,
    /// Minimum number of iterations before declaring convergence. Default: 30
    pub min_iter: usize,
    /// Relative change in held-out likelihood for convergence. Default: 1e-6
    pub likelihood_delta: f64,

    /// Stochastic variational inference over mini-batches. Default: false
    pub svi: bool,
    /// After convergence, run one batch pass over every document. Default: false
    pub final_pass: bool,
    /// Mini-batch size; replaced by the number of training documents in batch mode. Default: 1000
    pub sample_size: usize,
    /// SVI delay tau (>= 0). Default: 1024
    pub delay: f64,
    /// SVI forgetting rate kappa in (0.5, 1]. Default: 0.75
    pub forget: f64,
}

impl Default for CapsuleOptions {
    fn default() -> Self {
        CapsuleOptions {
            outdir: "capsule_out".into(),
            datadir: "".into(),
            verbose: false,
            a_phi: 0.3,
            b_phi: 0.3,
            a_theta: 0.3,
            b_theta: 0.3,
            a_pi: 0.3,
            b_pi: 0.3,
            mode: ModelMode::Full,
            event_dur: 7,
            k: 100,
            seed: 0,
            save_freq: 0,
            eval_freq: 0,
            conv_freq: 10,
            max_iter: 300,
            min_iter: 30,
            likelihood_delta: 1e-6,
            svi: false,
            final_pass: false,
            sample_size: 1000,
            delay: 1024.0,
            forget: 0.75,
        }
    }
}

impl CapsuleOptions {
    /// Reject inconsistent settings before anything is allocated
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.event_dur == 0 {
            anyhow::bail!("event duration must be positive");
        }
        if self.sample_size == 0 {
            anyhow::bail!("sample size must be positive");
        }
        if self.conv_freq == 0 {
            anyhow::bail!("convergence check frequency must be positive");
        }
        if self.max_iter == 0 {
            anyhow::bail!("maximum number of iterations must be positive");
        }
        if self.mode.has_entity_factors() && self.k == 0 {
            anyhow::bail!("number of latent factors K must be positive");
        }
        if !(self.forget > 0.5 && self.forget <= 1.0) {
            anyhow::bail!("SVI forgetting rate must be in (0.5, 1], got {}", self.forget);
        }
        if !(self.delay >= 0.0) {
            anyhow::bail!("SVI delay must be non-negative, got {}", self.delay);
        }
        if !(self.likelihood_delta >= 0.0) {
            anyhow::bail!("likelihood delta must be non-negative");
        }

        let hyper = [
            ("a_phi", self.a_phi),
            ("b_phi", self.b_phi),
            ("a_theta", self.a_theta),
            ("b_theta", self.b_theta),
            ("a_pi", self.a_pi),
            ("b_pi", self.b_pi),
        ];
        for (name, x) in hyper {
            if !(x > 0.0 && x.is_finite()) {
                anyhow::bail!("hyperparameter {} must be positive, got {}", name, x);
            }
        }
        Ok(())
    }

    /// Write the settings file `{outdir}/settings.dat`
    pub fn save(&self, file_path: &str) -> anyhow::Result<()> {
        let lines: Vec<Box<str>> = self
            .to_string()
            .lines()
            .map(|x| x.to_string().into_boxed_str())
            .collect();
        matrix_util::common_io::write_lines(&lines, file_path)
    }
}

impl fmt::Display for CapsuleOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "data directory: {}", self.datadir)?;

        writeln!(f, "\nmodel specification:")?;
        writeln!(f, "\t{}", self.mode)?;
        if self.mode.has_event_factors() {
            writeln!(f, "\nevent duration:\t{}", self.event_dur)?;
        }
        if self.mode.has_entity_factors() {
            writeln!(f, "\tK = {}   (number of latent factors for general preferences)", self.k)?;
        }

        writeln!(f, "\nshape and rate hyperparameters:")?;
        if self.mode.has_entity_factors() {
            writeln!(f, "\tphi      ({:.2}, {:.2})", self.a_phi, self.b_phi)?;
            writeln!(f, "\ttheta    ({:.2}, {:.2})", self.a_theta, self.b_theta)?;
        }
        if self.mode.has_event_factors() {
            writeln!(f, "\tpi       ({:.2}, {:.2})", self.a_pi, self.b_pi)?;
        }

        writeln!(f, "\ninference parameters:")?;
        writeln!(f, "\tseed:                                     {}", self.seed)?;
        writeln!(f, "\tsave frequency:                           {}", self.save_freq)?;
        writeln!(f, "\tevaluation frequency:                     {}", self.eval_freq)?;
        writeln!(f, "\tconvergence check frequency:              {}", self.conv_freq)?;
        writeln!(f, "\tmaximum number of iterations:             {}", self.max_iter)?;
        writeln!(f, "\tminimum number of iterations:             {}", self.min_iter)?;
        writeln!(f, "\tchange in log likelihood for convergence: {}", self.likelihood_delta)?;
        writeln!(
            f,
            "\tfinal pass after convergence:             {}",
            if self.final_pass { "yes" } else { "no" }
        )?;

        if self.svi {
            writeln!(f, "\nStochastic variational inference parameters")?;
            writeln!(f, "\tsample size:                              {}", self.sample_size)?;
            writeln!(f, "\tSVI delay (tau):                          {}", self.delay)?;
            writeln!(f, "\tSVI forgetting rate (kappa):              {}", self.forget)?;
        } else {
            writeln!(f, "\nusing batch variational inference")?;
        }
        Ok(())
    }
}
