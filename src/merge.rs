//! Task merge engine.
//!
//! Combines the tasks already in a cell with a batch of reported statuses.
//! Matching is case-insensitive on trimmed text; matches update status in
//! place and everything else is appended in arrival order.

use crate::cell::TaskEntry;

/// Outcome counters for a merge, used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MergeSummary {
    pub updated: usize,
    pub added: usize,
    pub unchanged: usize,
}

/// Merge `updates` into `existing`.
///
/// Duplicate texts inside `updates` resolve to the last occurrence's status;
/// the first occurrence decides text and position.
pub fn merge_tasks(existing: &[TaskEntry], updates: &[TaskEntry]) -> Vec<TaskEntry> {
    merge_tasks_with_summary(existing, updates).0
}

/// Merge and report how many entries were touched.
pub fn merge_tasks_with_summary(
    existing: &[TaskEntry],
    updates: &[TaskEntry],
) -> (Vec<TaskEntry>, MergeSummary) {
    let mut merged = existing.to_vec();
    let base_len = merged.len();
    let mut touched = vec![false; base_len];

    for update in updates {
        let text = update.text.trim();
        if text.is_empty() {
            continue;
        }
        match merged.iter().position(|entry| entry.same_task(text)) {
            Some(idx) => {
                merged[idx].status = update.status;
                if idx < base_len {
                    touched[idx] = true;
                }
            }
            None => merged.push(TaskEntry {
                text: text.to_string(),
                status: update.status,
            }),
        }
    }

    let updated = touched
        .iter()
        .zip(existing)
        .zip(&merged)
        .filter(|((hit, before), after)| **hit && before.status != after.status)
        .count();
    let summary = MergeSummary {
        updated,
        added: merged.len() - base_len,
        unchanged: base_len - updated,
    };
    (merged, summary)
}
