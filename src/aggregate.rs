//! Aggregation results and the merge shared by every fan-out path.
//!
//! The merged order is the connection set's configuration order, then each
//! connection's item order, so a finalized aggregate never depends on which
//! connection answered first.

use crate::connection::Connection;
use crate::error::FetchError;
use crate::resource::{RawItem, Resource, ResourceKind};
use std::collections::HashMap;
use std::sync::Arc;

/// Identifies one `load()` invocation's in-flight work.
pub type Generation = u64;

/// What one connection produced for one generation.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The connection answered.
    Success(Vec<RawItem>),
    /// The connection failed; isolated from its siblings.
    Failure(FetchError),
}

impl FetchOutcome {
    /// Returns true for [`FetchOutcome::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Carried with a result that is missing one or more connections' data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradedSignal {
    /// Every connection that failed or never reported, in configuration order.
    pub failed_connections: Vec<String>,
    /// The subset of `failed_connections` that never reported.
    pub non_responding: Vec<String>,
}

/// Every connection in a generation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalFailureSignal {
    /// Every connection, in configuration order.
    pub failed_connections: Vec<String>,
    /// The error each reporting connection returned.
    pub errors: Vec<(String, FetchError)>,
}

/// A merged result set.
#[derive(Debug, Clone)]
pub enum Aggregate {
    /// At least one connection answered (possibly with zero items).
    Success {
        /// Merged resources.
        resources: Vec<Resource>,
        /// Present when some connections failed or are missing.
        degraded: Option<DegradedSignal>,
    },
    /// Nothing came back from any connection.
    TotalFailure(TotalFailureSignal),
}

impl Aggregate {
    /// Merged resources; empty for a total failure.
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        match self {
            Self::Success { resources, .. } => resources,
            Self::TotalFailure(_) => &[],
        }
    }

    /// Consumes the aggregate, returning its resources.
    #[must_use]
    pub fn into_resources(self) -> Vec<Resource> {
        match self {
            Self::Success { resources, .. } => resources,
            Self::TotalFailure(_) => Vec::new(),
        }
    }

    /// The degraded signal, if any.
    #[must_use]
    pub fn degraded(&self) -> Option<&DegradedSignal> {
        match self {
            Self::Success { degraded, .. } => degraded.as_ref(),
            Self::TotalFailure(_) => None,
        }
    }

    /// Returns true for [`Aggregate::TotalFailure`].
    #[must_use]
    pub fn is_total_failure(&self) -> bool {
        matches!(self, Self::TotalFailure(_))
    }
}

/// Whether an update may still be followed by more data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Debounced flush of an incomplete generation.
    Partial,
    /// The generation's single final result.
    Final,
}

/// One push from the orchestrator to its consumer.
#[derive(Debug, Clone)]
pub struct AggregateUpdate {
    /// Generation this update belongs to.
    pub generation: Generation,
    /// Resource kind being aggregated.
    pub kind: ResourceKind,
    /// Partial or final.
    pub stage: Stage,
    /// Connections that have reported so far.
    pub reported: usize,
    /// Connections queried.
    pub expected: usize,
    /// The merged data.
    pub aggregate: Aggregate,
}

impl AggregateUpdate {
    /// Returns true for the final update of a generation.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.stage == Stage::Final
    }
}

/// Merges per-connection outcomes in configuration order.
///
/// For [`Stage::Final`] a connection with no outcome is reported as
/// non-responding, and a generation with connections but no success is a
/// total failure. For [`Stage::Partial`] missing connections are simply
/// still pending.
pub(crate) fn merge(
    connections: &[Arc<Connection>],
    outcomes: &HashMap<String, FetchOutcome>,
    stage: Stage,
) -> Aggregate {
    let mut resources = Vec::new();
    let mut failed = Vec::new();
    let mut non_responding = Vec::new();
    let mut errors = Vec::new();
    let mut successes = 0usize;

    for connection in connections {
        match outcomes.get(&connection.name) {
            Some(FetchOutcome::Success(items)) => {
                successes += 1;
                resources.extend(
                    items
                        .iter()
                        .map(|item| Resource::new(item.clone(), Arc::clone(connection))),
                );
            }
            Some(FetchOutcome::Failure(err)) => {
                failed.push(connection.name.clone());
                errors.push((connection.name.clone(), err.clone()));
            }
            None if stage == Stage::Final => {
                failed.push(connection.name.clone());
                non_responding.push(connection.name.clone());
            }
            None => {}
        }
    }

    if stage == Stage::Final && !connections.is_empty() && successes == 0 {
        return Aggregate::TotalFailure(TotalFailureSignal {
            failed_connections: failed,
            errors,
        });
    }

    let degraded = (!failed.is_empty()).then_some(DegradedSignal {
        failed_connections: failed,
        non_responding,
    });
    Aggregate::Success { resources, degraded }
}
