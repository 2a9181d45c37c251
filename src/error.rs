use crate::cfa::Signature;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no entry node registered for main function {0}")]
    MissingMainEntry(Signature),
    #[error("no entry node registered for call target {0}")]
    MissingEntry(Signature),
    #[error("expected a call edge but found an ordinary one")]
    NotACallEdge,
}
