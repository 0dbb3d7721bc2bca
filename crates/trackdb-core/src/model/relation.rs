use serde::{Deserialize, Serialize};
use std::fmt;

///
/// RelationModel
///
/// One principal/dependent relationship: the dependent carries the foreign
/// key and the optional reference navigation; the principal carries the
/// optional collection navigation. The dependent entity may be a derived
/// entity, in which case fixup dispatches to the most-derived declaration
/// matching the runtime discriminator.
///

#[derive(Debug)]
pub struct RelationModel {
    /// Unique relation name, used in diagnostics and builder validation.
    pub name: &'static str,
    pub principal: &'static str,
    pub dependent: &'static str,
    /// FK property names on the dependent, aligned with `principal_key`.
    pub foreign_key: Vec<&'static str>,
    /// Principal-side key property names; defaults to the primary key.
    pub principal_key: Vec<&'static str>,
    /// Reference navigation on the dependent, if declared.
    pub dependent_nav: Option<&'static str>,
    /// Collection navigation on the principal, if declared.
    pub principal_nav: Option<&'static str>,
    pub on_delete: DeleteBehavior,
}

///
/// DeleteBehavior
///
/// Effect of removing a principal on its tracked dependents. The Client*
/// variants behave like their plain counterparts inside this engine; the
/// distinction only matters to the persistence collaborator, which cannot
/// rely on database-level enforcement for them.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum DeleteBehavior {
    Cascade,
    ClientCascade,
    #[default]
    ClientSetNull,
    ClientNoAction,
    NoAction,
    Restrict,
    SetNull,
}

impl DeleteBehavior {
    /// True when tracked dependents are deleted along with the principal.
    #[must_use]
    pub const fn cascades(self) -> bool {
        matches!(self, Self::Cascade | Self::ClientCascade)
    }

    /// True when tracked dependents have their FK nulled out.
    #[must_use]
    pub const fn severs(self) -> bool {
        matches!(self, Self::SetNull | Self::ClientSetNull)
    }

    /// True when tracked dependents are left untouched; enforcement (if
    /// any) belongs to the persistence collaborator.
    #[must_use]
    pub const fn leaves_dependents(self) -> bool {
        matches!(self, Self::Restrict | Self::NoAction | Self::ClientNoAction)
    }
}

impl fmt::Display for DeleteBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Cascade => "cascade",
            Self::ClientCascade => "client_cascade",
            Self::ClientSetNull => "client_set_null",
            Self::ClientNoAction => "client_no_action",
            Self::NoAction => "no_action",
            Self::Restrict => "restrict",
            Self::SetNull => "set_null",
        };
        write!(f, "{label}")
    }
}
