//! ## Crate layout
//! - `core`: the unit-of-work runtime: value stores, entries, fixup,
//!   cascade resolution, graph tracking, and the snapshot boundary.
//!
//! The `prelude` module mirrors the runtime surface used by application
//! code; everything else is reachable through the `core` re-export.

pub use trackdb_core as core;

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use core::error::TrackError;

///
/// Prelude
/// using _ brings traits into scope and avoids name conflicts
///

pub mod prelude {
    pub use crate::core::{
        key::KeyTuple,
        model::{DeleteBehavior, ModelBuilder, ModelRegistry, RelationModel},
        session::{
            CascadeTiming, EntityState, EntryView, InstanceId, PropertyView, Session,
            TrackPolicy, TrackerOptions,
        },
        snapshot::{MemorySnapshotSource, SnapshotSource, StoredRow},
        value::{Value, ValueKind},
        values::{PropertyValues, ValuesRole},
    };
    pub use serde::{Deserialize, Serialize};
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn facade_builds_a_working_session() {
        let mut builder = ModelBuilder::new();
        builder
            .entity("Note")
            .key(&["Id"])
            .property("Id", ValueKind::Int)
            .property("Body", ValueKind::Text);
        let model = std::sync::Arc::new(builder.build().unwrap());

        let mut session = Session::new(model);
        let note = session.new_instance("Note").unwrap();
        session.set_value(note, "Id", 1i64).unwrap();
        session.set_value(note, "Body", "hello").unwrap();
        session.attach(note).unwrap();

        session.set_value(note, "Body", "edited").unwrap();
        let entries = session.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].state, EntityState::Modified);
    }
}
