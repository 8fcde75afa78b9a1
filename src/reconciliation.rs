// 🔗 Reconciliation Engine - partition identifiers across both source tables
//
//   matched   = demographic ∩ observation
//   unmatched = demographic △ observation
//
// Both lists come out in ascending identifier order.

use crate::records::Identifier;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// SOURCE TABLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceTable {
    Demographics,
    Observations,
}

impl SourceTable {
    pub fn name(&self) -> &'static str {
        match self {
            SourceTable::Demographics => "demographic",
            SourceTable::Observations => "observation",
        }
    }
}

/// Identifier present in exactly one source table. Never validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedIdentifier {
    pub id: Identifier,
    pub present_in: SourceTable,
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub matched: Vec<Identifier>,
    pub unmatched: Vec<UnmatchedIdentifier>,
}

impl ReconciliationReport {
    /// Size of the union of both tables' identifiers
    pub fn total_identifiers(&self) -> usize {
        self.matched.len() + self.unmatched.len()
    }

    pub fn is_fully_matched(&self) -> bool {
        self.unmatched.is_empty()
    }

    pub fn unmatched_in(&self, table: SourceTable) -> impl Iterator<Item = Identifier> + '_ {
        self.unmatched
            .iter()
            .filter(move |u| u.present_in == table)
            .map(|u| u.id)
    }

    pub fn summary(&self) -> String {
        format!(
            "Reconciliation: {} identifiers, {} matched, {} only in demographic, {} only in observation",
            self.total_identifiers(),
            self.matched.len(),
            self.unmatched_in(SourceTable::Demographics).count(),
            self.unmatched_in(SourceTable::Observations).count(),
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine;

impl ReconciliationEngine {
    /// Partition two identifier sets. Empty inputs give an empty report.
    ///
    /// ```
    /// use patient_merge::{Identifier, ReconciliationEngine};
    ///
    /// let report = ReconciliationEngine::reconcile(
    ///     [Identifier(100001), Identifier(100002)],
    ///     [Identifier(100001), Identifier(100003)],
    /// );
    /// assert_eq!(report.matched, vec![Identifier(100001)]);
    /// assert_eq!(report.unmatched.len(), 2);
    /// ```
    pub fn reconcile(
        demographic_ids: impl IntoIterator<Item = Identifier>,
        observation_ids: impl IntoIterator<Item = Identifier>,
    ) -> ReconciliationReport {
        let demographic: BTreeSet<Identifier> = demographic_ids.into_iter().collect();
        let observation: BTreeSet<Identifier> = observation_ids.into_iter().collect();

        let matched = demographic.intersection(&observation).copied().collect();

        let unmatched = demographic
            .symmetric_difference(&observation)
            .map(|id| UnmatchedIdentifier {
                id: *id,
                present_in: if demographic.contains(id) {
                    SourceTable::Demographics
                } else {
                    SourceTable::Observations
                },
            })
            .collect();

        ReconciliationReport { matched, unmatched }
    }

    /// Reconcile two identifier-keyed tables by their keys
    pub fn reconcile_tables<A, B>(
        demographics: &BTreeMap<Identifier, A>,
        observations: &BTreeMap<Identifier, B>,
    ) -> ReconciliationReport {
        Self::reconcile(demographics.keys().copied(), observations.keys().copied())
    }
}

// ============================================================================
// TESTS
// ============================================================================
