//! Error type shared by every stage of the simulation and analysis pipeline.

use std::fmt;

use thiserror::Error;

use crate::units::Length;

/// Pipeline stage an error originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Config,
    Synthesis,
    Filter,
    Composition,
    Ensemble,
    Analysis,
    Record,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Synthesis => "synthesis",
            Stage::Filter => "filter",
            Stage::Composition => "composition",
            Stage::Ensemble => "ensemble",
            Stage::Analysis => "analysis",
            Stage::Record => "record",
        };
        f.write_str(name)
    }
}

/// Broad classification used to decide whether a failure aborts an ensemble run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any computation starts.
    InvalidConfiguration,
    /// The numbers went somewhere the model cannot follow.
    NumericalDegeneracy,
    /// Inputs produced on mismatched grids or geometries.
    Consistency,
    /// Reading or writing a record failed.
    Storage,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{stage}: invalid {parameter} = {value}: {reason}")]
    InvalidParameter {
        stage: Stage,
        parameter: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("{stage}: {what} mismatch, expected {expected} but found {found}")]
    Mismatch {
        stage: Stage,
        what: &'static str,
        expected: String,
        found: String,
    },

    #[error(
        "composition: slit {slit} selects no grid sample (slit width {width}, separation {separation}, grid step {step_cm} cm)"
    )]
    EmptyAperture {
        slit: usize,
        width: Length,
        separation: Length,
        step_cm: f64,
    },

    #[error(
        "analysis: found {maxima} maxima and {minima} minima within |x| <= {window_cm} cm, fringes need at least one of each"
    )]
    InsufficientExtrema {
        maxima: usize,
        minima: usize,
        window_cm: f64,
    },

    #[error("analysis: fitted fringe amplitude {amplitude} is not positive")]
    NonPositiveAmplitude { amplitude: f64 },

    #[error("analysis: singular normal equations at fit iteration {iteration}")]
    SingularFit { iteration: usize },

    #[error(
        "analysis: fit did not converge after {iterations} iterations (visibility {visibility}, amplitude {amplitude})"
    )]
    FitDiverged {
        iterations: usize,
        visibility: f64,
        amplitude: f64,
    },

    #[error("analysis: {envelope} envelope vanishes at x = {position_cm} cm")]
    ZeroEnvelope {
        envelope: &'static str,
        position_cm: f64,
    },

    #[error("analysis: normalized pattern is degenerate (max {max}, min {min})")]
    DegeneratePattern { max: f64, min: f64 },

    #[error("ensemble: none of the {requested} requested realizations completed")]
    EmptyEnsemble { requested: usize },

    #[error("realization {index}: {source}")]
    Realization {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("record: {0}")]
    Io(#[from] std::io::Error),

    #[error("record: {0}")]
    Csv(#[from] csv::Error),

    #[error("record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record: {0}")]
    MalformedRecord(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn invalid(
        stage: Stage,
        parameter: &'static str,
        value: impl fmt::Display,
        reason: &'static str,
    ) -> Self {
        Error::InvalidParameter {
            stage,
            parameter,
            value: value.to_string(),
            reason,
        }
    }

    pub(crate) fn mismatch(
        stage: Stage,
        what: &'static str,
        expected: impl fmt::Display,
        found: impl fmt::Display,
    ) -> Self {
        Error::Mismatch {
            stage,
            what,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub(crate) fn in_realization(self, index: usize) -> Self {
        match self {
            e @ Error::Realization { .. } => e,
            e => Error::Realization {
                index,
                source: Box::new(e),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidParameter { .. } | Error::EmptyAperture { .. } => {
                ErrorKind::InvalidConfiguration
            }
            Error::Mismatch { .. } => ErrorKind::Consistency,
            Error::InsufficientExtrema { .. }
            | Error::SingularFit { .. }
            | Error::FitDiverged { .. }
            | Error::NonPositiveAmplitude { .. }
            | Error::ZeroEnvelope { .. }
            | Error::DegeneratePattern { .. }
            | Error::EmptyEnsemble { .. } => ErrorKind::NumericalDegeneracy,
            Error::Realization { source, .. } => source.kind(),
            Error::Io(_) | Error::Csv(_) | Error::Json(_) | Error::MalformedRecord(_) => {
                ErrorKind::Storage
            }
        }
    }

    /// Fatal errors abort a whole ensemble run, the rest only cost a realization.
    pub fn is_fatal(&self) -> bool {
        self.kind() != ErrorKind::NumericalDegeneracy
    }

    /// Index of the failed realization, if the error was raised inside one.
    pub fn realization(&self) -> Option<usize> {
        match self {
            Error::Realization { index, .. } => Some(*index),
            _ => None,
        }
    }
}
