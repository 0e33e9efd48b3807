// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Condition registry
//!
//! Maps trial-type ids (image / stimulus ids) to condition labels, and labels
//! to dense stimulus-class indices assigned in first-seen order. Also owns the
//! per-class trial counts used as normalization denominators.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Dense index of one experimental condition
pub type StimulusClass = usize;

/// Everything an `AddCondition` message declares about a condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionDefinition {
    /// Legend label (condition name)
    pub label: String,
    pub stimulus_tag: String,
    pub visible: bool,
    /// The `<label>` field of `AddCondition` (field 5)
    pub group: String,
    pub trial_type_ids: Vec<String>,
}

impl ConditionDefinition {
    pub fn new<I, S>(label: impl Into<String>, trial_type_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label: label.into(),
            stimulus_tag: String::new(),
            visible: true,
            group: String::new(),
            trial_type_ids: trial_type_ids.into_iter().map(Into::into).collect(),
        }
    }
}

/// A registered condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub stimulus_class: StimulusClass,
    pub label: String,
    pub stimulus_tag: String,
    pub visible: bool,
    pub group: String,
    pub trial_count: u32,
    pub trial_type_ids: Vec<String>,
}

/// Registry of conditions and trial-type mappings
#[derive(Debug, Default)]
pub struct ConditionRegistry {
    conditions: Vec<Condition>,
    class_by_label: AHashMap<String, StimulusClass>,
    label_by_trial_type: AHashMap<String, String>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a condition and its trial-type ids.
    ///
    /// A label seen before keeps its index and trial count; only the id
    /// mappings are added. Ids already mapped elsewhere are re-pointed here.
    pub fn define_condition(&mut self, definition: ConditionDefinition) -> StimulusClass {
        let class = match self.class_by_label.get(&definition.label) {
            Some(&existing) => existing,
            None => {
                let class = self.conditions.len();
                self.conditions.push(Condition {
                    stimulus_class: class,
                    label: definition.label.clone(),
                    stimulus_tag: definition.stimulus_tag.clone(),
                    visible: definition.visible,
                    group: definition.group.clone(),
                    trial_count: 0,
                    trial_type_ids: Vec::new(),
                });
                self.class_by_label.insert(definition.label.clone(), class);
                class
            }
        };

        for id in definition.trial_type_ids {
            if let Some(previous) = self
                .label_by_trial_type
                .insert(id.clone(), definition.label.clone())
            {
                if previous != definition.label {
                    if let Some(&old_class) = self.class_by_label.get(&previous) {
                        self.conditions[old_class].trial_type_ids.retain(|t| t != &id);
                    }
                }
            }
            let ids = &mut self.conditions[class].trial_type_ids;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        class
    }

    /// Look up the stimulus class a trial-type id belongs to
    pub fn resolve_trial_type(&self, trial_type_id: &str) -> EngineResult<StimulusClass> {
        self.label_by_trial_type
            .get(trial_type_id)
            .and_then(|label| self.class_by_label.get(label))
            .copied()
            .ok_or_else(|| EngineError::UnmappedTrialType(trial_type_id.to_string()))
    }

    /// Bump a class's trial count, returning the new count
    pub fn increment_trial_count(&mut self, class: StimulusClass) -> Option<u32> {
        self.conditions.get_mut(class).map(|c| {
            c.trial_count += 1;
            c.trial_count
        })
    }

    pub fn trial_count(&self, class: StimulusClass) -> Option<u32> {
        self.conditions.get(class).map(|c| c.trial_count)
    }

    /// Legend label for a class; empty for unknown classes
    pub fn label_of(&self, class: StimulusClass) -> String {
        self.conditions
            .get(class)
            .map(|c| c.label.clone())
            .unwrap_or_default()
    }

    pub fn condition(&self, class: StimulusClass) -> Option<&Condition> {
        self.conditions.get(class)
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Known classes in first-seen order
    pub fn stimulus_classes(&self) -> Vec<StimulusClass> {
        (0..self.conditions.len()).collect()
    }

    pub fn num_conditions(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn clear(&mut self) {
        self.conditions.clear();
        self.class_by_label.clear();
        self.label_by_trial_type.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes_assigned_in_order() {
        let mut registry = ConditionRegistry::new();
        assert_eq!(registry.define_condition(ConditionDefinition::new("A", ["a1"])), 0);
        assert_eq!(registry.define_condition(ConditionDefinition::new("B", ["b1"])), 1);
        assert_eq!(registry.define_condition(ConditionDefinition::new("C", ["c1"])), 2);
        assert_eq!(registry.stimulus_classes(), vec![0, 1, 2]);
        assert_eq!(registry.label_of(1), "B");
        assert_eq!(registry.trial_count(2), Some(0));
    }

    #[test]
    fn test_resolve_many_to_one() {
        let mut registry = ConditionRegistry::new();
        registry.define_condition(ConditionDefinition::new("faces", ["img1", "img2", "img3"]));
        assert_eq!(registry.resolve_trial_type("img1"), Ok(0));
        assert_eq!(registry.resolve_trial_type("img3"), Ok(0));
        assert_eq!(
            registry.resolve_trial_type("img9"),
            Err(EngineError::UnmappedTrialType("img9".to_string()))
        );
    }

    #[test]
    fn test_redefining_label_is_idempotent() {
        let mut registry = ConditionRegistry::new();
        registry.define_condition(ConditionDefinition::new("A", ["a1"]));
        registry.increment_trial_count(0);
        let class = registry.define_condition(ConditionDefinition::new("A", ["a2"]));
        assert_eq!(class, 0);
        assert_eq!(registry.num_conditions(), 1);
        assert_eq!(registry.trial_count(0), Some(1));
        assert_eq!(registry.resolve_trial_type("a2"), Ok(0));
    }

    #[test]
    fn test_trial_type_last_write_wins() {
        let mut registry = ConditionRegistry::new();
        registry.define_condition(ConditionDefinition::new("A", ["shared", "a1"]));
        registry.define_condition(ConditionDefinition::new("B", ["shared"]));
        assert_eq!(registry.resolve_trial_type("shared"), Ok(1));
        assert_eq!(registry.condition(0).unwrap().trial_type_ids, vec!["a1".to_string()]);
        assert_eq!(registry.condition(1).unwrap().trial_type_ids, vec!["shared".to_string()]);
    }

    #[test]
    fn test_unknown_label_is_empty() {
        let registry = ConditionRegistry::new();
        assert_eq!(registry.label_of(4), "");
        assert_eq!(registry.trial_count(4), None);
    }

    #[test]
    fn test_clear() {
        let mut registry = ConditionRegistry::new();
        registry.define_condition(ConditionDefinition::new("A", ["a1"]));
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.resolve_trial_type("a1").is_err());
        assert_eq!(registry.define_condition(ConditionDefinition::new("B", ["b1"])), 0);
    }
}
