use std::sync::Arc;

use shortlist_core::{BudgetSensitivity, Constraint, FilterSet, PreferenceSignal, TokenVector};

use crate::bins::{bin_token, price_tier_token, range_bins, tag_token, value_token};
use crate::weights::WeightTable;

/// Builds the preference vector of a request from its filter set and soft signals
#[derive(Debug, Clone)]
pub struct PreferenceVectorizer {
    weights: Arc<WeightTable>,
}

impl PreferenceVectorizer {
    pub fn new(weights: Arc<WeightTable>) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Deterministic projection of `filters` and `preferences` into token space
    pub fn vectorize(&self, filters: &FilterSet, preferences: &PreferenceSignal) -> TokenVector {
        let mut tokens: Vec<(String, f32)> = Vec::new();

        for (attribute, constraint) in filters.all_constraints() {
            self.constraint_tokens(attribute, constraint, &mut tokens);
        }

        let pw = self.weights.preference_weight;
        let preferences = preferences.normalized();

        for priority in &preferences.priorities {
            let key = priority.replace(' ', "_");
            match self.weights.priority_tokens.get(&key) {
                Some(expanded) => tokens.extend(expanded.iter().map(|t| (t.clone(), pw))),
                None => tokens.push((tag_token(priority), pw)),
            }
        }

        for affinity in &preferences.affinities {
            if affinity.contains(':') {
                tokens.push((affinity.clone(), pw));
            } else {
                tokens.push((tag_token(affinity), pw));
            }
        }

        if let Some(sensitivity) = preferences.budget_sensitivity {
            let tier = match sensitivity {
                BudgetSensitivity::High => "budget",
                BudgetSensitivity::Medium => "mid",
                BudgetSensitivity::Low => "premium",
            };
            tokens.push((price_tier_token(tier), pw));
        }

        TokenVector::from_weights(tokens)
    }

    fn constraint_tokens(&self, attribute: &str, constraint: &Constraint, out: &mut Vec<(String, f32)>) {
        let weight = self.weights.weight(attribute);
        let width = self.weights.bin_width(attribute);

        match constraint {
            Constraint::Exact(value) => out.push((value_token(attribute, value, width), weight)),
            Constraint::AnyOf(values) => {
                out.extend(values.iter().map(|v| (value_token(attribute, v, width), weight)));
            }
            Constraint::Range { min, max } => {
                out.extend(
                    range_bins(*min, *max, width, self.weights.max_range_bins)
                        .into_iter()
                        .map(|bin| (bin_token(attribute, bin), weight)),
                );
            }
            Constraint::Within { .. } => {}
        }
    }
}
