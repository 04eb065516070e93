use crate::models::ActivityKind;
use thiserror::Error;

/// Terminal failures of the ingestion pipeline. Classification and mapping
/// ambiguities never reach this type; they degrade to `unknown` roles or
/// silently dropped rows instead.
#[derive(Debug, Error)]
pub enum IngestError {
    /// No sheet of the supplied buffer yields a usable table.
    #[error("input is not readable as a spreadsheet: {reason}")]
    InputUnreadable { reason: String },

    /// The active factor catalog lacks a kind's default subtype. Raised when
    /// the catalog is installed, before any row is read.
    #[error("factor catalog is missing default subtype '{subtype}' for kind '{kind}'")]
    FactorMissing { kind: ActivityKind, subtype: String },

    /// Emission factors must be strictly positive.
    #[error("factor for '{kind}/{subtype}' must be strictly positive, got {value}")]
    FactorNotPositive {
        kind: ActivityKind,
        subtype: String,
        value: f64,
    },

    /// A caller-supplied factor CSV could not be parsed at all.
    #[error("failed to read factor CSV: {0}")]
    FactorCsv(#[from] csv::Error),
}
