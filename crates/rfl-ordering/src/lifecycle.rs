//! Lifecycle contract for the declarative wrapper.
//!
//! A wrapper (CLI, provider, operator) keeps an [`OrderingRecord`] per
//! ordering it manages and drives it through four entry points:
//!
//! 1. **create** (`create`): enforce the order unconditionally, mint a record.
//!    Returns [`ReconcileState::Reordering`] until the next refresh confirms it.
//! 2. **refresh** (`read`): re-validate; on drift the record's rule list is
//!    invalidated so the next plan re-enforces.
//! 3. **update** (`update`): enforce the new order, keep the record id.
//! 4. **release** (`delete`): no-op. The previous order is NOT restored: the
//!    record guards the relative order of its rules, not the whole category.
//!
//! The wrapper owns persistence and serialization of its records.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{Appliance, Category, OrderingSpec, Result};

// ---------------------------------------------------------------------------
// Reconciliation state
// ---------------------------------------------------------------------------

/// Where an ordering sits in its reconcile cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileState {
    /// Never checked against the appliance.
    Unvalidated,
    /// The last check found the desired run in place.
    Ordered,
    /// The last check did not find the desired run.
    Drifted,
    /// A Move has been issued and not yet re-checked.
    Reordering,
}

impl ReconcileState {
    /// State implied by a validator result.
    pub fn after_check(satisfied: bool) -> Self {
        if satisfied {
            ReconcileState::Ordered
        } else {
            ReconcileState::Drifted
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileState::Unvalidated => "unvalidated",
            ReconcileState::Ordered => "ordered",
            ReconcileState::Drifted => "drifted",
            ReconcileState::Reordering => "reordering",
        }
    }

    /// `true` when the wrapper must re-enforce.
    pub fn requires_enforce(&self) -> bool {
        matches!(self, ReconcileState::Drifted | ReconcileState::Unvalidated)
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Wrapper-side bookkeeping for one managed ordering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingRecord {
    /// Opaque wrapper id. Never interpreted by the engine.
    pub id: String,
    pub category: Category,
    /// Desired order as last enforced; `None` once drift invalidated it.
    pub rules: Option<Vec<String>>,
}

impl OrderingRecord {
    pub fn is_invalidated(&self) -> bool {
        self.rules.is_none()
    }

    /// `true` when this record tracks the same category and order as `spec`.
    pub fn matches(&self, spec: &OrderingSpec) -> bool {
        self.category == spec.category && self.rules.as_deref() == Some(&spec.desired_order[..])
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Enforce `spec` and mint a new record for it.
///
/// The Move is not re-validated, so the state is `Reordering`.
pub fn create<A: Appliance + ?Sized>(
    appliance: &A,
    spec: &OrderingSpec,
) -> Result<(OrderingRecord, ReconcileState)> {
    apply(appliance, spec)?;
    let record = OrderingRecord {
        id: Uuid::new_v4().to_string(),
        category: spec.category,
        rules: Some(spec.desired_order.clone()),
    };
    info!(id = %record.id, category = %record.category, "ordering created");
    Ok((record, ReconcileState::Reordering))
}

/// Re-validate `record` against the live appliance.
///
/// On drift the returned record has `rules == None`. A record that is
/// already invalidated is returned as-is without contacting the appliance.
pub fn read<A: Appliance + ?Sized>(
    appliance: &A,
    record: &OrderingRecord,
) -> Result<(OrderingRecord, ReconcileState)> {
    let Some(rules) = record.rules.as_deref() else {
        return Ok((record.clone(), ReconcileState::Drifted));
    };

    let state = ReconcileState::after_check(crate::is_satisfied(
        appliance,
        record.category,
        rules,
    )?);

    let mut refreshed = record.clone();
    if state == ReconcileState::Drifted {
        warn!(
            id = %record.id,
            category = %record.category,
            "ordering drifted; invalidating record"
        );
        refreshed.rules = None;
    }
    Ok((refreshed, state))
}

/// Enforce `spec` for an existing record, keeping its id.
pub fn update<A: Appliance + ?Sized>(
    appliance: &A,
    spec: &OrderingSpec,
    prior: &OrderingRecord,
) -> Result<(OrderingRecord, ReconcileState)> {
    apply(appliance, spec)?;
    info!(id = %prior.id, category = %spec.category, "ordering updated");
    let record = OrderingRecord {
        id: prior.id.clone(),
        category: spec.category,
        rules: Some(spec.desired_order.clone()),
    };
    Ok((record, ReconcileState::Reordering))
}

/// Release an ordering. Makes no remote call and leaves the category as-is.
pub fn delete(record: &OrderingRecord) {
    info!(id = %record.id, category = %record.category, "ordering released (no-op)");
}

fn apply<A: Appliance + ?Sized>(appliance: &A, spec: &OrderingSpec) -> Result<()> {
    let rules = spec.resolve_all(appliance)?;
    spec.enforce(appliance, &rules)
}
