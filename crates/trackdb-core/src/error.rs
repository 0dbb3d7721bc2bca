use crate::model::ModelError;
use crate::session::SessionError;
use crate::snapshot::SnapshotError;
use crate::values::ValuesError;
use thiserror::Error as ThisError;

///
/// TrackError
///
/// Crate-level error: transparent fan-in of the per-module taxonomies.
/// Validation errors are raised synchronously at the call site; the only
/// deferred condition in the engine is the conceptual-null flag, checked
/// explicitly through the save gate.
///

#[derive(Debug, ThisError)]
pub enum TrackError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Values(#[from] ValuesError),
}
