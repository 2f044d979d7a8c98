use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    /// A value arrived outside its documented domain. Never clamped.
    #[error("Contract violation for {asset} on {date}: {field} = {value} outside {domain}")]
    ContractViolation {
        asset: String,
        date: NaiveDate,
        field: &'static str,
        value: f64,
        domain: &'static str,
    },

    /// A signal observed data timestamped after its cutoff. Fatal for the date.
    #[error("Lookahead for {asset} on {date}: {stream} observation dated {observed}")]
    Lookahead {
        asset: String,
        date: NaiveDate,
        stream: &'static str,
        observed: NaiveDate,
    },

    /// More than one bundle for the same asset on the same date.
    #[error("Duplicate signal bundle for {asset} on {date} ({count} bundles)")]
    DuplicateBundle {
        asset: String,
        date: NaiveDate,
        count: usize,
    },

    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Provider error: {0}")]
    Provider(String),
}
