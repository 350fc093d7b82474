//! Ensemble averaging of single realization patterns, and the driver that produces them.
//!
//! Partial coherence only shows up in the mean over many independent speckle realizations. Each realization is
//! an independent unit of work seeded from `(seed, index)`, so realizations can be computed in any order, on any
//! thread, or one at a time by an external loop that checks for cancellation in between.

use std::hash::Hasher;

use ndarray::parallel::prelude::{IntoParallelIterator, ParallelIterator};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use siphasher::sip::SipHasher13;
use tracing::{debug, info, warn};

use crate::config::ExperimentConfig;
use crate::error::{Error, ErrorKind, Result, Stage};
use crate::filter::SpatialFilter;
use crate::grid::SamplingGrid;
use crate::pattern::{InterferencePattern, PatternMetadata};
use crate::slits::{DoubleSlit, Superposition};
use crate::speckle::{synthesize, SpeckleSource};
use crate::Field;

/// A realization that was skipped instead of aborting the ensemble.
#[derive(Clone, Debug, PartialEq)]
pub struct RealizationFailure {
    pub index: usize,
    pub kind: ErrorKind,
    pub message: String,
}

/// Running sum of patterns sharing one screen grid and one set of metadata.
#[derive(Clone, Debug)]
pub struct Ensemble {
    screen: SamplingGrid,
    metadata: PatternMetadata,
    requested: usize,
    intensity: Array1<f64>,
    profile: Option<Array1<f64>>,
    completed: usize,
    failures: Vec<RealizationFailure>,
}

impl Ensemble {
    pub fn new(screen: SamplingGrid, requested: usize, metadata: PatternMetadata) -> Self {
        Ensemble {
            screen,
            metadata,
            requested,
            intensity: Array1::zeros(screen.len()),
            profile: None,
            completed: 0,
            failures: Vec::new(),
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn failures(&self) -> &[RealizationFailure] {
        &self.failures
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.requested
    }

    /// Adds a pattern to the sum. A pattern that is itself a mean counts with its own realization count.
    pub fn record(&mut self, pattern: &InterferencePattern) -> Result<()> {
        self.screen.ensure_same(&pattern.grid, Stage::Ensemble)?;
        if pattern.metadata != self.metadata {
            return Err(Error::mismatch(
                Stage::Ensemble,
                "pattern metadata",
                format!("{:?}", self.metadata),
                format!("{:?}", pattern.metadata),
            ));
        }
        if self.completed == 0 {
            self.profile = pattern
                .profile
                .as_ref()
                .map(|_| Array1::zeros(self.screen.len()));
        }

        let weight = pattern.realizations as f64;
        match (&mut self.profile, &pattern.profile) {
            (Some(sum), Some(profile)) => sum.scaled_add(weight, profile),
            (None, None) => {}
            (sum, _) => {
                return Err(Error::mismatch(
                    Stage::Ensemble,
                    "profile",
                    if sum.is_some() { "present" } else { "absent" },
                    if sum.is_some() { "absent" } else { "present" },
                ))
            }
        }
        self.intensity.scaled_add(weight, &pattern.intensity);
        self.completed += pattern.realizations;
        Ok(())
    }

    /// Records every pattern from `patterns`, returning how many realizations were added.
    pub fn accumulate<I>(&mut self, patterns: I) -> Result<usize>
    where
        I: IntoIterator<Item = InterferencePattern>,
    {
        let before = self.completed;
        for pattern in patterns {
            self.record(&pattern)?;
        }
        Ok(self.completed - before)
    }

    pub fn record_failure(&mut self, index: usize, error: &Error) {
        self.failures.push(RealizationFailure {
            index,
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    /// Records the outcome of one realization.
    ///
    /// Numerical failures are logged and kept as [`RealizationFailure`]s so the rest of the ensemble can go on,
    /// anything else is returned.
    pub fn record_outcome(
        &mut self,
        index: usize,
        outcome: Result<InterferencePattern>,
    ) -> Result<()> {
        match outcome {
            Ok(pattern) => {
                self.record(&pattern)?;
                debug!(index, completed = self.completed, "realization recorded");
                Ok(())
            }
            Err(err) if !err.is_fatal() => {
                warn!(index, error = %err, "realization skipped");
                self.record_failure(index, &err);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Combines two partial sums of the same ensemble.
    pub fn merge(mut self, mut other: Ensemble) -> Result<Ensemble> {
        self.screen.ensure_same(&other.screen, Stage::Ensemble)?;
        if other.completed == 0 {
            self.failures.append(&mut other.failures);
            return Ok(self);
        }
        if self.completed == 0 {
            other.failures.append(&mut self.failures);
            return Ok(other);
        }
        let partial = InterferencePattern::new(
            other.screen,
            other.intensity,
            other.profile,
            other.metadata,
            1,
        )?;
        // the partial sum is added with unit weight, its count is carried separately
        self.record(&partial)?;
        self.completed += other.completed - 1;
        self.failures.append(&mut other.failures);
        Ok(self)
    }

    /// Turns the sum into a mean.
    ///
    /// The result reports how many realizations it holds out of how many were requested, so a run stopped early
    /// is never mistaken for the full ensemble.
    pub fn finish(mut self) -> Result<EnsembleAverage> {
        if self.completed == 0 {
            return Err(Error::EmptyEnsemble {
                requested: self.requested,
            });
        }
        let scale = 1.0 / self.completed as f64;
        self.intensity.mapv_inplace(|v| v * scale);
        if let Some(profile) = &mut self.profile {
            profile.mapv_inplace(|v| v * scale);
        }
        self.failures.sort_by_key(|f| f.index);

        let pattern = InterferencePattern::new(
            self.screen,
            self.intensity,
            self.profile,
            self.metadata,
            self.completed,
        )?;
        let average_intensity = pattern.mean_intensity();
        Ok(EnsembleAverage {
            pattern,
            requested: self.requested,
            failures: self.failures,
            average_intensity,
        })
    }
}

/// Mean pattern of an ensemble together with its bookkeeping.
#[derive(Clone, Debug)]
pub struct EnsembleAverage {
    /// The mean pattern, `pattern.realizations` is the number of realizations averaged.
    pub pattern: InterferencePattern,
    pub requested: usize,
    pub failures: Vec<RealizationFailure>,
    /// Mean screen intensity of the averaged pattern, needed by the visibility fit.
    pub average_intensity: f64,
}

impl EnsembleAverage {
    pub fn completed(&self) -> usize {
        self.pattern.realizations
    }

    pub fn is_complete(&self) -> bool {
        self.completed() >= self.requested
    }
}

/// Derives the seed of realization `index` from the master seed.
///
/// Seeds are SipHash-1-3 (zero keys) of `(master, index)`, so a realization does not depend on which thread
/// computes it or on what was computed before.
pub fn realization_seed(master: u64, index: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master);
    hasher.write_u64(index);
    hasher.finish()
}

/// Everything needed to produce one realization: source, optional filter, slits and both grids.
#[derive(Clone, Debug)]
pub struct Experiment {
    pub source: SpeckleSource,
    pub filter: Option<SpatialFilter>,
    pub slits: DoubleSlit,
    /// Grid of the field at the slit plane.
    pub source_grid: SamplingGrid,
    /// Grid of the observation screen.
    pub screen: SamplingGrid,
    pub superposition: Superposition,
    pub realizations: usize,
}

impl Experiment {
    /// Builds the experiment described by `config`, validating every parameter.
    pub fn from_config(config: &ExperimentConfig) -> Result<Self> {
        let experiment = Experiment {
            source: config.source(),
            filter: config.filter,
            slits: config.slits(),
            source_grid: config.source_grid()?,
            screen: config.screen_grid()?,
            superposition: config.superposition,
            realizations: config.realizations,
        };
        experiment.validate()?;
        Ok(experiment)
    }

    /// Checks every parameter before any computation starts.
    pub fn validate(&self) -> Result<()> {
        if self.realizations == 0 {
            return Err(Error::invalid(
                Stage::Ensemble,
                "realization count",
                self.realizations,
                "must be positive",
            ));
        }
        self.source.validate()?;
        if let Some(filter) = &self.filter {
            filter.width_rad_per_cm()?;
        }
        self.slits.apertures(&self.source_grid)?;
        Ok(())
    }

    pub fn metadata(&self) -> PatternMetadata {
        PatternMetadata {
            filter: self.filter,
            slit_separation: self.slits.separation,
            slit_width: self.slits.width,
        }
    }

    /// The filtered speckle field of realization `index`.
    pub fn field(&self, seed: u64, index: usize) -> Result<Field> {
        let mut rng = StdRng::seed_from_u64(realization_seed(seed, index as u64));
        let field = synthesize(&self.source, &self.source_grid, &mut rng)?;
        match &self.filter {
            Some(filter) => filter.apply(field),
            None => Ok(field),
        }
    }

    /// Computes realization `index` of the ensemble seeded with `seed`.
    pub fn realization(&self, seed: u64, index: usize) -> Result<InterferencePattern> {
        let pattern = self.field(seed, index).and_then(|field| {
            let composition = self
                .slits
                .compose(&field, &self.screen, self.superposition)?;
            InterferencePattern::single(self.screen, composition, self.metadata())
        });
        pattern.map_err(|err| err.in_realization(index))
    }

    /// Runs every realization in parallel and averages them.
    pub fn run(&self, seed: u64) -> Result<EnsembleAverage> {
        self.validate()?;
        info!(
            realizations = self.realizations,
            seed,
            scatterers = self.source.scatterers,
            "ensemble starting"
        );

        let metadata = self.metadata();
        let empty = || Ensemble::new(self.screen, self.realizations, metadata);
        let ensemble = (0..self.realizations)
            .into_par_iter()
            .map(|index| (index, self.realization(seed, index)))
            .try_fold(empty, |mut ensemble, (index, outcome)| -> Result<Ensemble> {
                ensemble.record_outcome(index, outcome)?;
                Ok(ensemble)
            })
            .try_reduce(empty, Ensemble::merge)?;

        let average = ensemble.finish()?;
        info!(
            completed = average.completed(),
            skipped = average.failures.len(),
            average_intensity = average.average_intensity,
            "ensemble complete"
        );
        Ok(average)
    }

    /// Runs realizations one at a time, asking `keep_going` before each.
    ///
    /// When `keep_going` returns false the realizations completed so far are averaged and returned as a partial
    /// ensemble.
    pub fn run_while<F>(&self, seed: u64, mut keep_going: F) -> Result<EnsembleAverage>
    where
        F: FnMut(usize) -> bool,
    {
        self.validate()?;
        let mut ensemble = Ensemble::new(self.screen, self.realizations, self.metadata());
        for index in 0..self.realizations {
            if !keep_going(index) {
                info!(
                    completed = ensemble.completed(),
                    requested = self.realizations,
                    "ensemble stopped early"
                );
                break;
            }
            ensemble.record_outcome(index, self.realization(seed, index))?;
        }
        ensemble.finish()
    }
}
