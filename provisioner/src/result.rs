//! Result type of the crate and the report of a provisioning run.

use std::fmt;

use crate::error::ResourceId;

pub type Result<T, E = crate::error::Error> = core::result::Result<T, E>;

/// What a provisioning step found or did for one resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The stored identifier was valid on chain and kept as is.
    Existing,
    /// The resource was missing or invalid and has been (re)created.
    Created,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Existing => write!(f, "existing"),
            Self::Created => write!(f, "created"),
        }
    }
}

/// Ordered list of the resources a run ensured and how each one was ensured.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    entries: Vec<(ResourceId, Outcome)>,
}

impl ProvisionReport {
    pub(crate) fn push(&mut self, resource: ResourceId, outcome: Outcome) {
        self.entries.push((resource, outcome));
    }

    pub fn entries(&self) -> &[(ResourceId, Outcome)] {
        &self.entries
    }

    /// Outcome recorded for `resource`, if the run got to it.
    pub fn outcome(&self, resource: &ResourceId) -> Option<Outcome> {
        self.entries
            .iter()
            .find(|(id, _)| id == resource)
            .map(|(_, outcome)| *outcome)
    }

    /// Resources that had to be (re)created during the run.
    pub fn created(&self) -> impl Iterator<Item = &ResourceId> {
        self.entries
            .iter()
            .filter(|(_, outcome)| *outcome == Outcome::Created)
            .map(|(id, _)| id)
    }

    /// True if every resource already existed. The account step never
    /// creates anything, so it does not count against this.
    pub fn is_noop(&self) -> bool {
        self.created().next().is_none()
    }
}

impl fmt::Display for ProvisionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (resource, outcome)) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{resource}: {outcome}")?;
        }
        Ok(())
    }
}
