use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine;
use crate::{Appliance, OrderingError, Result};

/// Move destination meaning "after the last rule in the category".
pub const DESTINATION_TAIL: &str = "*ffffff";

/// Firewall rule category. Each one is an independently ordered list on the
/// appliance (`/ip/firewall/<category>`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Filter,
    Nat,
    Mangle,
    Raw,
}

impl Category {
    /// RouterOS path segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Filter => "filter",
            Category::Nat => "nat",
            Category::Mangle => "mangle",
            Category::Raw => "raw",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "filter" => Ok(Category::Filter),
            "nat" => Ok(Category::Nat),
            "mangle" => Ok(Category::Mangle),
            "raw" => Ok(Category::Raw),
            other => Err(OrderingError::Validation(format!(
                "invalid category '{other}'. expected one of: filter | nat | mangle | raw"
            ))),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = OrderingError;

    fn from_str(s: &str) -> Result<Self> {
        Category::parse(s)
    }
}

/// One entry of a List response, as sent by the appliance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRule {
    #[serde(rename = ".id")]
    pub id: String,
    #[serde(default)]
    pub chain: String,
}

impl RawRule {
    pub fn new(id: impl Into<String>, chain: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            chain: chain.into(),
        }
    }
}

/// A rule as seen in one snapshot.
///
/// `position` is the rank inside the snapshot and `next` is the index of the
/// following rule (`position + 1`), or `None` for the last rule. Both are only
/// meaningful against the [`Snapshot`] that produced them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    pub id: String,
    pub category: Category,
    /// Chain the rule is attached to (`input`, `forward`, `srcnat`, ...).
    pub chain: String,
    pub position: usize,
    pub next: Option<usize>,
}

/// Full ordered rule list of one category, observed at one fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub category: Category,
    pub rules: Vec<Rule>,
}

impl Snapshot {
    /// Build a snapshot from a List response, deriving adjacency from the
    /// array order.
    pub fn from_raw(category: Category, raw: Vec<RawRule>) -> Self {
        let len = raw.len();
        let rules = raw
            .into_iter()
            .enumerate()
            .map(|(position, r)| Rule {
                id: r.id,
                category,
                chain: r.chain,
                position,
                next: (position + 1 < len).then_some(position + 1),
            })
            .collect();
        Self { category, rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id.as_str()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Follower of `rule` in this snapshot.
    pub fn next_of(&self, rule: &Rule) -> Option<&Rule> {
        rule.next.and_then(|i| self.rules.get(i))
    }
}

/// JSON body of the Move command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCommand {
    /// Comma-joined rule ids, in the order they must end up.
    pub numbers: String,
    pub destination: String,
}

impl MoveCommand {
    /// Move `ids` to the end of the category. `None` when there is nothing to move.
    pub fn to_tail<S: AsRef<str>>(ids: &[S]) -> Option<Self> {
        if ids.is_empty() {
            return None;
        }
        let numbers = ids
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<&str>>()
            .join(",");
        Some(Self {
            numbers,
            destination: DESTINATION_TAIL.to_string(),
        })
    }

    pub fn ids(&self) -> Vec<&str> {
        if self.numbers.is_empty() {
            return Vec::new();
        }
        self.numbers.split(',').collect()
    }
}

/// Desired order for one category: the reconciliation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingSpec {
    pub category: Category,
    #[serde(rename = "rules")]
    pub desired_order: Vec<String>,
}

impl OrderingSpec {
    /// Duplicate ids are rejected: they cannot appear twice in one category.
    pub fn new(category: Category, desired_order: Vec<String>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for id in &desired_order {
            if !seen.insert(id.as_str()) {
                return Err(OrderingError::Validation(format!(
                    "duplicate rule id '{id}' in desired order for category '{category}'"
                )));
            }
        }
        Ok(Self {
            category,
            desired_order,
        })
    }

    /// `true` when the desired order currently holds on the appliance.
    pub fn validate<A: Appliance + ?Sized>(&self, appliance: &A) -> Result<bool> {
        engine::is_satisfied(appliance, self.category, &self.desired_order)
    }

    pub fn resolve_all<A: Appliance + ?Sized>(&self, appliance: &A) -> Result<Vec<Rule>> {
        engine::resolve_all(appliance, self.category, &self.desired_order)
    }

    pub fn enforce<A: Appliance + ?Sized>(&self, appliance: &A, rules: &[Rule]) -> Result<()> {
        engine::enforce(appliance, self.category, rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse() {
        assert_eq!(Category::parse("filter").unwrap(), Category::Filter);
        assert_eq!(Category::parse(" NAT ").unwrap(), Category::Nat);
        assert_eq!("mangle".parse::<Category>().unwrap(), Category::Mangle);
        assert_eq!(Category::parse("raw").unwrap(), Category::Raw);

        let err = Category::parse("bridge").unwrap_err();
        assert!(matches!(err, OrderingError::Validation(_)));
        assert!(err.to_string().contains("bridge"));
    }

    #[test]
    fn snapshot_adjacency_follows_array_order() {
        let snap = Snapshot::from_raw(
            Category::Filter,
            vec![
                RawRule::new("*1", "input"),
                RawRule::new("*2", "input"),
                RawRule::new("*3", "forward"),
            ],
        );
        assert_eq!(snap.ids(), vec!["*1", "*2", "*3"]);
        for (i, rule) in snap.rules.iter().enumerate() {
            assert_eq!(rule.position, i);
            assert_eq!(rule.category, Category::Filter);
        }
        let first = snap.get("*1").unwrap();
        assert_eq!(snap.next_of(first).unwrap().id, "*2");
        let last = snap.get("*3").unwrap();
        assert_eq!(last.next, None);
        assert!(snap.next_of(last).is_none());
    }

    #[test]
    fn raw_rule_decodes_routeros_shape() {
        let raw: Vec<RawRule> = serde_json::from_str(
            r#"[{".id":"*A","chain":"input","action":"accept"},{".id":"*B"}]"#,
        )
        .unwrap();
        assert_eq!(raw[0], RawRule::new("*A", "input"));
        assert_eq!(raw[1].chain, "");
    }

    #[test]
    fn move_command_body() {
        let cmd = MoveCommand::to_tail(&["*3", "*1", "*2"]).unwrap();
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            serde_json::json!({"numbers": "*3,*1,*2", "destination": "*ffffff"})
        );
        assert_eq!(cmd.ids(), vec!["*3", "*1", "*2"]);
        assert!(MoveCommand::to_tail::<&str>(&[]).is_none());
    }

    #[test]
    fn ordering_spec_rejects_duplicates() {
        let err = OrderingSpec::new(
            Category::Nat,
            vec!["*1".to_string(), "*2".to_string(), "*1".to_string()],
        )
        .unwrap_err();
        assert!(matches!(err, OrderingError::Validation(_)));

        let spec = OrderingSpec::new(Category::Nat, vec![]).unwrap();
        assert!(spec.desired_order.is_empty());
    }

    #[test]
    fn ordering_spec_yaml_shape() {
        let spec: OrderingSpec =
            serde_json::from_str(r#"{"category":"raw","rules":["*5","*6"]}"#).unwrap();
        assert_eq!(spec.category, Category::Raw);
        assert_eq!(spec.desired_order, vec!["*5", "*6"]);
    }
}
