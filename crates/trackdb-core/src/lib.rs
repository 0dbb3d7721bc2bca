//! Core runtime for trackdb: the unit-of-work session, property value
//! stores, navigation fixup, cascade resolution, graph tracking, and the
//! snapshot boundary to the persistence collaborator.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod error;
pub mod key;
pub mod model;
pub mod session;
pub mod snapshot;
pub mod value;
pub mod values;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, sources, stores, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        key::KeyTuple,
        model::{DeleteBehavior, ModelBuilder, ModelRegistry},
        session::{EntityState, InstanceId, Session, TrackPolicy},
        value::{Value, ValueKind},
        values::PropertyValues,
    };
}
