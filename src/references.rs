use crate::schema::Reference;
use crate::utils::days_between;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Reference points for one search request.
///
/// Generic references come from configuration and never change. Priority
/// references are receipts confirmed during the current search; they are kept in
/// insertion order and take precedence over generic ones.
#[derive(Debug, Clone)]
pub struct ReferenceStore {
    generic: Vec<Reference>,
    priority: Vec<Reference>,
}

impl ReferenceStore {
    pub fn new(mut generic: Vec<Reference>) -> Self {
        generic.sort_by_key(|r| r.date);
        Self {
            generic,
            priority: Vec::new(),
        }
    }

    /// Generic references, sorted by date.
    pub fn generic(&self) -> &[Reference] {
        &self.generic
    }

    /// Priority references, in the order they were confirmed.
    pub fn priority(&self) -> &[Reference] {
        &self.priority
    }

    pub fn add_priority(&mut self, reference: Reference) {
        self.priority.push(reference);
    }

    pub fn is_empty(&self) -> bool {
        self.generic.is_empty() && self.priority.is_empty()
    }

    /// The priority reference nearest to `target`; the earliest confirmed one wins ties.
    pub fn closest_priority(&self, target: NaiveDate) -> Option<&Reference> {
        self.priority
            .iter()
            .min_by_key(|r| days_between(target, r.date).abs())
    }

    /// Union of both sets, sorted by date with one entry per date.
    ///
    /// Generic numbers are moved by `generic_shift`. A priority reference replaces
    /// any generic one on the same date; among priority duplicates the first wins.
    pub fn merged(&self, generic_shift: i64) -> Vec<Reference> {
        let mut by_date: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for r in &self.priority {
            by_date.entry(r.date).or_insert(r.number);
        }
        for r in &self.generic {
            by_date.entry(r.date).or_insert(r.number + generic_shift);
        }
        by_date
            .into_iter()
            .map(|(date, number)| Reference { date, number })
            .collect()
    }
}
