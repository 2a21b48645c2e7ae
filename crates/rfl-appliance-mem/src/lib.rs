//! Deterministic in-memory appliance.
//!
//! Design decisions (kept intentionally simple/deterministic):
//! - One ordered `Vec<RawRule>` per category; array index is the rank.
//! - Move follows RouterOS semantics: every listed id must exist or nothing
//!   moves; `*ffffff` appends the ids at the tail in the given order; any
//!   other destination inserts them before that rule.
//! - Every List call is counted and every Move command is recorded, so tests
//!   can assert exactly how many round trips an operation made.
//! - Faults are injected one-shot (`fail_next_list` / `fail_next_move`).
//! - An external reorder can be scheduled to land right after the next List,
//!   to model a concurrent edit between two engine calls.
//! - No randomness. No timestamps.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use rfl_ordering::{
    Appliance, Category, MoveCommand, RawRule, TransportError, DESTINATION_TAIL,
};

#[derive(Debug, Default)]
struct State {
    rules: BTreeMap<Category, Vec<RawRule>>,
    moves: Vec<(Category, MoveCommand)>,
    list_calls: usize,
    fail_next_list: Option<TransportError>,
    fail_next_move: Option<TransportError>,
    reorder_after_list: Option<(Category, Vec<String>)>,
}

#[derive(Debug, Default)]
pub struct MemAppliance {
    state: Mutex<State>,
}

impl MemAppliance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appliance with `ids` (chain `input`) in `category`, in that order.
    pub fn with_rules(category: Category, ids: &[&str]) -> Self {
        let appliance = Self::new();
        appliance.set_rules(category, ids);
        appliance
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave the lists half-moved:
        // apply_move validates before mutating.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the whole list of `category`.
    pub fn set_rules(&self, category: Category, ids: &[&str]) {
        let rules = ids.iter().map(|id| RawRule::new(*id, "input")).collect();
        self.state().rules.insert(category, rules);
    }

    /// Current ids of `category`, in order.
    pub fn ids(&self, category: Category) -> Vec<String> {
        self.state()
            .rules
            .get(&category)
            .map(|rules| rules.iter().map(|r| r.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Every Move received so far, oldest first.
    pub fn moves(&self) -> Vec<(Category, MoveCommand)> {
        self.state().moves.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state().list_calls
    }

    pub fn fail_next_list(&self, err: TransportError) {
        self.state().fail_next_list = Some(err);
    }

    pub fn fail_next_move(&self, err: TransportError) {
        self.state().fail_next_move = Some(err);
    }

    /// After the next successful List, replace `category` with `ids`.
    pub fn reorder_after_next_list(&self, category: Category, ids: &[&str]) {
        self.state().reorder_after_list =
            Some((category, ids.iter().map(|s| s.to_string()).collect()));
    }
}

impl Appliance for MemAppliance {
    fn name(&self) -> &'static str {
        "mem"
    }

    fn list_rules(&self, category: Category) -> Result<Vec<RawRule>, TransportError> {
        let mut st = self.state();
        st.list_calls += 1;
        if let Some(err) = st.fail_next_list.take() {
            return Err(err);
        }

        let out = st.rules.get(&category).cloned().unwrap_or_default();

        if let Some((cat, ids)) = st.reorder_after_list.take() {
            let rules = ids.into_iter().map(|id| RawRule::new(id, "input")).collect();
            st.rules.insert(cat, rules);
        }

        Ok(out)
    }

    fn move_rules(&self, category: Category, cmd: &MoveCommand) -> Result<(), TransportError> {
        let mut st = self.state();
        if let Some(err) = st.fail_next_move.take() {
            return Err(err);
        }
        st.moves.push((category, cmd.clone()));
        let list = st.rules.entry(category).or_default();
        apply_move(list, cmd)
    }
}

fn bad_request(detail: String) -> TransportError {
    TransportError::Api {
        code: Some(400),
        message: format!("Bad Request: {detail}"),
    }
}

/// Apply one Move to `list`. Validates everything before mutating.
fn apply_move(list: &mut Vec<RawRule>, cmd: &MoveCommand) -> Result<(), TransportError> {
    let ids = cmd.ids();
    if ids.is_empty() {
        return Err(bad_request("missing numbers".to_string()));
    }

    let present: BTreeSet<&str> = list.iter().map(|r| r.id.as_str()).collect();
    let mut seen = BTreeSet::new();
    for id in &ids {
        if !present.contains(id) {
            return Err(bad_request(format!("no such item ({id})")));
        }
        if !seen.insert(*id) {
            return Err(bad_request(format!("duplicate item ({id})")));
        }
    }

    let tail = cmd.destination == DESTINATION_TAIL;
    if !tail {
        if !present.contains(cmd.destination.as_str()) {
            return Err(bad_request(format!(
                "no such destination ({})",
                cmd.destination
            )));
        }
        if seen.contains(cmd.destination.as_str()) {
            return Err(bad_request("destination is being moved".to_string()));
        }
    }

    let mut by_id: BTreeMap<String, RawRule> = BTreeMap::new();
    let mut rest = Vec::with_capacity(list.len());
    for rule in list.drain(..) {
        if seen.contains(rule.id.as_str()) {
            by_id.insert(rule.id.clone(), rule);
        } else {
            rest.push(rule);
        }
    }
    let moved: Vec<RawRule> = ids.iter().filter_map(|id| by_id.remove(*id)).collect();

    let at = if tail {
        rest.len()
    } else {
        rest.iter()
            .position(|r| r.id == cmd.destination)
            .unwrap_or(rest.len())
    };
    rest.splice(at..at, moved);
    *list = rest;
    Ok(())
}
