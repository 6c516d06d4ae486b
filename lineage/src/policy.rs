//! Correlation policy shared by the stage-2 and stage-3 correlators.
//!
//! Given the candidates a store query returned and the values a stage is about
//! to write, decide whether to update a candidate in place, start a new entry
//! that borrows a candidate's lineage, or start an orphan entry.

use crate::model::DeploymentEntry;
use crate::model::DeploymentField;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Exact,
    CaseInsensitive,
}

/// A field the matched candidate must agree on.
///
/// A candidate agrees when its field is absent or equal to `value`. An unset
/// candidate field matches anything, including an absent `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchCriterion<'a> {
    pub field: DeploymentField,
    pub value: Option<&'a str>,
    pub comparison: Comparison,
}

impl<'a> MatchCriterion<'a> {
    pub fn exact(field: DeploymentField, value: Option<&'a str>) -> Self {
        Self {
            field,
            value,
            comparison: Comparison::Exact,
        }
    }

    pub fn case_insensitive(field: DeploymentField, value: Option<&'a str>) -> Self {
        Self {
            field,
            value,
            comparison: Comparison::CaseInsensitive,
        }
    }

    fn accepts(&self, candidate: &DeploymentEntry) -> bool {
        let Some(existing) = candidate.field(self.field) else {
            return true;
        };
        match (self.value, self.comparison) {
            (None, _) => false,
            (Some(value), Comparison::Exact) => existing == value,
            (Some(value), Comparison::CaseInsensitive) => {
                existing.to_lowercase() == value.to_lowercase()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationOutcome {
    /// Update the candidate at this index in place.
    Matched(usize),
    /// Insert a new entry seeded from the candidate at this index.
    Donor(usize),
    /// Insert a new entry with no inherited lineage.
    Orphan,
}

/// Pick what to do with a stage's write given the query `candidates`.
///
/// The first candidate (in result order) that accepts every criterion wins.
/// Otherwise the most recent candidate becomes the donor, using the store
/// timestamp and falling back to the later position in the result list when
/// timestamps are missing or tied.
pub fn correlate(
    candidates: &[DeploymentEntry],
    criteria: &[MatchCriterion<'_>],
) -> CorrelationOutcome {
    if let Some(index) = candidates
        .iter()
        .position(|candidate| criteria.iter().all(|criterion| criterion.accepts(candidate)))
    {
        return CorrelationOutcome::Matched(index);
    }
    match most_recent(candidates) {
        Some(index) => CorrelationOutcome::Donor(index),
        None => CorrelationOutcome::Orphan,
    }
}

fn most_recent(candidates: &[DeploymentEntry]) -> Option<usize> {
    // `max_by_key` keeps the last of equal maxima.
    candidates
        .iter()
        .enumerate()
        .max_by_key(|(_, candidate)| candidate.timestamp)
        .map(|(index, _)| index)
}
