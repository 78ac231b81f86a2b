//! Assessment merge — primary/assessment precedence and read-only keys.
//!
//! The fallback is all-or-nothing: assessment data is only consulted when
//! the primary instance knows nothing at all, and every field it supplies
//! becomes read-only.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::initial::InitialState;

/// Final initial state plus the set of fields the form must not let the
/// user edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedState {
    pub values: InitialState,
    pub readonly_keys: BTreeSet<String>,
}

impl MergedState {
    /// A merged state with one empty mapping per fragment and nothing
    /// read-only.
    pub fn blank(fragment_count: usize) -> Self {
        Self {
            values: InitialState::blank(fragment_count),
            readonly_keys: BTreeSet::new(),
        }
    }
}

/// Apply the precedence rule between primary and assessment state.
///
/// A primary state with any resolved field wins outright and the assessment
/// is ignored, including fragments the primary left empty. Only a fully
/// blank primary falls back to the assessment, whose defined fields all
/// become read-only. With no assessment either, the blank primary is
/// returned as-is.
pub fn merge(primary: InitialState, assessment: Option<InitialState>) -> MergedState {
    if !primary.is_blank() {
        return MergedState {
            values: primary,
            readonly_keys: BTreeSet::new(),
        };
    }

    match assessment {
        Some(assessment) => {
            let readonly_keys = assessment.defined_keys().map(str::to_string).collect();
            MergedState {
                values: assessment,
                readonly_keys,
            }
        }
        None => MergedState {
            values: primary,
            readonly_keys: BTreeSet::new(),
        },
    }
}
