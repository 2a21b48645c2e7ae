use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::{
    Appliance, Category, MoveCommand, Operation, OrderingError, OrderingSpec, Result, Rule,
    Snapshot,
};

/// Result of [`reconcile`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The desired order already holds; no Move was issued.
    AlreadyOrdered,
    /// Drift was found and one Move was issued for `moved`, in this order.
    Reordered { moved: Vec<String> },
}

impl ReconcileOutcome {
    pub fn was_reordered(&self) -> bool {
        matches!(self, ReconcileOutcome::Reordered { .. })
    }
}

/// Fetch the current ordered rule list of `category`. One List call, never cached.
pub fn fetch<A: Appliance + ?Sized>(appliance: &A, category: Category) -> Result<Snapshot> {
    let raw = appliance
        .list_rules(category)
        .map_err(|e| OrderingError::from_transport(Operation::List, category, e))?;
    let snapshot = Snapshot::from_raw(category, raw);
    debug!(
        appliance = appliance.name(),
        %category,
        rules = snapshot.len(),
        "fetched rule snapshot"
    );
    Ok(snapshot)
}

/// Look up a single rule by id in a fresh snapshot.
pub fn resolve<A: Appliance + ?Sized>(
    appliance: &A,
    category: Category,
    id: &str,
) -> Result<Rule> {
    let snapshot = fetch(appliance, category)?;
    snapshot
        .get(id)
        .cloned()
        .ok_or_else(|| OrderingError::NotFound {
            category,
            id: id.to_string(),
        })
}

/// Resolve every id against one snapshot, preserving the order of `ids`.
///
/// Exactly one fetch is made so the returned rules come from a single
/// consistent view of the appliance.
pub fn resolve_all<A, S>(appliance: &A, category: Category, ids: &[S]) -> Result<Vec<Rule>>
where
    A: Appliance + ?Sized,
    S: AsRef<str>,
{
    let snapshot = fetch(appliance, category)?;
    resolve_in(&snapshot, ids)
}

/// Resolve `ids` against an already fetched snapshot.
pub fn resolve_in<S: AsRef<str>>(snapshot: &Snapshot, ids: &[S]) -> Result<Vec<Rule>> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(snapshot.len());
    for (i, rule) in snapshot.rules.iter().enumerate() {
        index.entry(rule.id.as_str()).or_insert(i);
    }

    ids.iter()
        .map(|id| {
            let id: &str = id.as_ref();
            index
                .get(id)
                .map(|&i| snapshot.rules[i].clone())
                .ok_or_else(|| OrderingError::NotFound {
                    category: snapshot.category,
                    id: id.to_string(),
                })
        })
        .collect()
}

/// `true` iff `desired` occurs in `live` as a contiguous run, compared id by id.
///
/// An empty `desired` is always satisfied.
pub fn contains_run<L, D>(live: &[L], desired: &[D]) -> bool
where
    L: AsRef<str>,
    D: AsRef<str>,
{
    if desired.is_empty() {
        return true;
    }
    if desired.len() > live.len() {
        return false;
    }
    live.windows(desired.len()).any(|window| {
        window.iter().zip(desired).all(|(l, d)| {
            let l: &str = l.as_ref();
            let d: &str = d.as_ref();
            l == d
        })
    })
}

/// Check whether `desired_order` currently holds in `category`.
pub fn is_satisfied<A, S>(appliance: &A, category: Category, desired_order: &[S]) -> Result<bool>
where
    A: Appliance + ?Sized,
    S: AsRef<str>,
{
    let snapshot = fetch(appliance, category)?;
    let satisfied = contains_run(snapshot.ids().as_slice(), desired_order);
    if !satisfied {
        warn!(%category, desired = desired_order.len(), "rule order drift detected");
    }
    Ok(satisfied)
}

/// Move `rules` to the tail of `category`, in the given order, with one Move.
///
/// An empty slice is a no-op. The result is not re-validated.
pub fn enforce<A: Appliance + ?Sized>(
    appliance: &A,
    category: Category,
    rules: &[Rule],
) -> Result<()> {
    if let Some(stray) = rules.iter().find(|r| r.category != category) {
        return Err(OrderingError::Validation(format!(
            "rule '{}' belongs to category '{}', not '{}'",
            stray.id, stray.category, category
        )));
    }

    let ids: Vec<&str> = rules.iter().map(|r| r.id.as_str()).collect();
    let Some(cmd) = MoveCommand::to_tail(&ids) else {
        debug!(%category, "nothing to enforce");
        return Ok(());
    };

    info!(
        appliance = appliance.name(),
        %category,
        numbers = %cmd.numbers,
        destination = %cmd.destination,
        "issuing move"
    );
    appliance
        .move_rules(category, &cmd)
        .map_err(|e| OrderingError::from_transport(Operation::Move, category, e))
}

/// Detect drift for `spec` and correct it when found.
pub fn reconcile<A: Appliance + ?Sized>(
    appliance: &A,
    spec: &OrderingSpec,
) -> Result<ReconcileOutcome> {
    if spec.validate(appliance)? {
        return Ok(ReconcileOutcome::AlreadyOrdered);
    }
    let rules = spec.resolve_all(appliance)?;
    spec.enforce(appliance, &rules)?;
    Ok(ReconcileOutcome::Reordered {
        moved: rules.into_iter().map(|r| r.id).collect(),
    })
}
