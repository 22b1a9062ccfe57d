use std::cmp::Ordering;

use crate::records::{Record, Value};
use crate::table_state::Order;

/// Compares two records by the cell in `column`, reversed for [`Order::Desc`].
/// With no column every pair compares equal, leaving the input order.
pub fn get_comparator(
    order: Order,
    column: Option<usize>,
) -> impl Fn(&Record, &Record) -> Ordering {
    move |a, b| match column {
        None => Ordering::Equal,
        Some(c) => match order {
            Order::Asc => a.get(c).cmp(b.get(c)),
            Order::Desc => b.get(c).cmp(a.get(c)),
        },
    }
}

/// Keeps the records whose `name_column` contains `filter_name` (ignoring
/// case) and sorts them with `comparator`. Ties keep their input order.
pub fn apply_filter<'a, F>(
    input: &'a [Record],
    comparator: F,
    filter_name: &str,
    name_column: usize,
) -> Vec<&'a Record>
where
    F: Fn(&Record, &Record) -> Ordering,
{
    let needle = filter_name.to_lowercase();
    let mut data: Vec<&Record> = if needle.is_empty() {
        input.iter().collect()
    } else {
        input
            .iter()
            .filter(|r| match r.get(name_column) {
                Value::Empty => false,
                v => v.to_string().to_lowercase().contains(&needle),
            })
            .collect()
    };
    data.sort_by(|a, b| comparator(a, b));
    data
}
