use std::cmp::Reverse;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{CalendarEvent, Issue};

/// Label priority table; lower scores sort first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortOrder {
    pub default_score: i32,
    pub complete_score: i32,
    pub labels: BTreeMap<String, i32>,
}

impl Default for SortOrder {
    fn default() -> Self {
        let labels = [("inprogress", 0), ("blocked", 3), ("backlog", 4)]
            .into_iter()
            .map(|(label, score)| (label.to_string(), score))
            .collect();
        Self {
            default_score: 2,
            complete_score: 5,
            labels,
        }
    }
}

impl SortOrder {
    /// Completed issues always take `complete_score`; otherwise the best
    /// scored label wins, and unscored issues fall back to `default_score`.
    pub fn score(&self, issue: &Issue) -> i32 {
        if issue.complete {
            return self.complete_score;
        }
        issue
            .labels
            .iter()
            .filter_map(|label| self.labels.get(label).copied())
            .min()
            .unwrap_or(self.default_score)
    }
}

pub fn sort_issues(issues: &mut [Issue], order: &SortOrder) {
    issues.sort_by_cached_key(|issue| {
        (
            order.score(issue),
            Reverse(issue.latest_update().to_string()),
            issue.number,
        )
    });
}

pub fn sorted_issues(issues: &[Issue], order: &SortOrder) -> Vec<Issue> {
    let mut sorted = issues.to_vec();
    sort_issues(&mut sorted, order);
    sorted
}

/// Events must already be normalized, so string order is chronological.
pub fn sort_events(events: &mut [CalendarEvent]) {
    events.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| a.end.cmp(&b.end))
            .then_with(|| a.name.cmp(&b.name))
    });
}
