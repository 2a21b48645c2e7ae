//! Ordering requests declared in config.
//!
//! ```yaml
//! orderings:
//!   - category: filter
//!     rules: ["*3", "*1", "*2"]
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use rfl_ordering::{Category, OrderingSpec};

#[derive(Debug, Deserialize)]
struct OrderingEntry {
    category: String,
    #[serde(default)]
    rules: Vec<String>,
}

/// Parse `/orderings`. A missing key yields no orderings.
pub fn orderings_from_config(config_json: &Value) -> Result<Vec<OrderingSpec>> {
    let Some(raw) = config_json.pointer("/orderings") else {
        return Ok(Vec::new());
    };
    if raw.is_null() {
        return Ok(Vec::new());
    }

    let entries: Vec<OrderingEntry> =
        serde_json::from_value(raw.clone()).context("invalid /orderings: expected a list")?;

    entries
        .into_iter()
        .enumerate()
        .map(|(i, e)| {
            let category = Category::parse(&e.category)
                .with_context(|| format!("invalid /orderings/{i}/category"))?;
            OrderingSpec::new(category, e.rules)
                .with_context(|| format!("invalid /orderings/{i}/rules"))
        })
        .collect()
}
