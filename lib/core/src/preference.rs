use serde::{Deserialize, Serialize};

use crate::normalize::normalize_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetSensitivity {
    Low,
    Medium,
    High,
}

/// Inferred, soft preferences. They shape the preference vector but never
/// constrain retrieval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceSignal {
    /// Priority tags such as `fuel_efficiency` or `safety`
    pub priorities: Vec<String>,
    pub budget_sensitivity: Option<BudgetSensitivity>,
    /// Affinity tags; `attr:value` pairs or free tags
    pub affinities: Vec<String>,
}

impl PreferenceSignal {
    pub fn is_empty(&self) -> bool {
        self.priorities.is_empty() && self.affinities.is_empty() && self.budget_sensitivity.is_none()
    }

    /// Copy with all tags normalized
    #[must_use]
    pub fn normalized(&self) -> Self {
        let clean = |tags: &[String]| -> Vec<String> {
            tags.iter()
                .map(|t| normalize_text(t))
                .filter(|t| !t.is_empty())
                .collect()
        };
        Self {
            priorities: clean(&self.priorities),
            budget_sensitivity: self.budget_sensitivity,
            affinities: clean(&self.affinities),
        }
    }
}
