use thiserror::Error;

/// Failure kinds for the pipeline steps. Earlier versions of this pipeline
/// caught everything at the top of each task and only logged it, which made a
/// broken run indistinguishable from a healthy one. These propagate so the
/// scheduler marks the step failed and its retry policy actually engages;
/// only the benign empty states (see `ExtractOutcome` / `LoadOutcome`) are
/// reported as success.
#[derive(Debug, Error)]
pub enum StepError {
    /// Could not reach or read the document source.
    #[error("document source error: {0}")]
    Source(#[from] mongodb::error::Error),

    /// A document did not match the expected grading shape.
    #[error("malformed source document: {0}")]
    Shape(String),

    /// Reading or writing the intermediate row file or its manifest failed.
    #[error("artifact error: {0}")]
    Artifact(String),

    /// The warehouse rejected or failed the load job.
    #[error("warehouse load failed: {0}")]
    Warehouse(String),
}

impl From<std::io::Error> for StepError {
    fn from(err: std::io::Error) -> Self {
        StepError::Artifact(err.to_string())
    }
}

impl From<csv::Error> for StepError {
    fn from(err: csv::Error) -> Self {
        StepError::Artifact(err.to_string())
    }
}
