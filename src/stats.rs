use std::collections::HashMap;

use crate::records::{Dataset, Value};

/// Sums the integer `value_column` per distinct `group_column` value,
/// largest total first. Ties are ordered by group name.
pub fn totals_by(ds: &Dataset, group_column: &str, value_column: &str) -> Vec<(String, u64)> {
    let (Some(g), Some(v)) = (
        ds.kind.column_index(group_column),
        ds.kind.column_index(value_column),
    ) else {
        return Vec::new();
    };

    let mut totals: HashMap<String, u64> = HashMap::new();
    for r in &ds.records {
        let amount = match r.get(v) {
            Value::Int(i) if *i > 0 => *i as u64,
            _ => 0,
        };
        *totals.entry(r.get(g).to_string()).or_insert(0) += amount;
    }
    let mut sorted: Vec<(String, u64)> = totals.into_iter().collect();
    sorted.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted
}
