//! Workflow state and per-field merge policies.
//!
//! Each workflow declares a typed state struct plus an `Update` struct holding the
//! fields a node may write. `merge` folds an update into the state using the
//! helpers below, one call per field, so the policy for a field lives in exactly
//! one place and nodes never merge by hand.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// The written value overwrites the prior one.
    Replace,
    /// The written sequence is concatenated onto the prior one.
    Append,
}

pub trait WorkflowState:
    Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Partial state written by a node. `Default` is the empty delta.
    type Update: Clone + Debug + Default + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Field name → merge policy, fixed for the lifetime of the workflow definition.
    const FIELDS: &'static [(&'static str, MergePolicy)];

    fn merge(&mut self, update: Self::Update);

    fn merge_policy(field: &str) -> Option<MergePolicy> {
        Self::FIELDS
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, policy)| *policy)
    }
}

pub mod merge {
    /// Replace policy for a required field.
    pub fn replace<T>(slot: &mut T, value: Option<T>) {
        if let Some(value) = value {
            *slot = value;
        }
    }

    /// Replace policy for an optional field. An absent write leaves the slot alone.
    pub fn replace_opt<T>(slot: &mut Option<T>, value: Option<T>) {
        if value.is_some() {
            *slot = value;
        }
    }

    /// Append policy.
    pub fn append<T>(slot: &mut Vec<T>, values: Vec<T>) {
        slot.extend(values);
    }
}
