//! Outcomes of the reconcile verbs.

use std::fmt;

/// Result of `observe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalObservation {
    pub resource_exists: bool,
    pub resource_up_to_date: bool,
}

impl ExternalObservation {
    /// The remote entity does not exist (or is not known yet).
    pub const fn absent() -> Self {
        Self {
            resource_exists: false,
            resource_up_to_date: false,
        }
    }

    pub const fn present(up_to_date: bool) -> Self {
        Self {
            resource_exists: true,
            resource_up_to_date: up_to_date,
        }
    }
}

/// Result of `create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalCreation {
    /// The external-name annotation was set or changed.
    pub external_name_assigned: bool,
}

/// What one reconcile cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    Created { external_name: String },
    Updated,
    UpToDate,
    Deleted,
    /// Deleted locally, remote entity left in place.
    Orphaned,
}

impl ReconcileAction {
    /// True once the object can be forgotten.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted | Self::Orphaned)
    }
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created { external_name } => write!(f, "created {external_name}"),
            Self::Updated => write!(f, "updated"),
            Self::UpToDate => write!(f, "up to date"),
            Self::Deleted => write!(f, "deleted"),
            Self::Orphaned => write!(f, "orphaned"),
        }
    }
}
