use anyhow::Result;
use serde_json::Value;

use crate::models::{GoalEntry, ValidationError, normalize_key, validate_goal_value};
use crate::store::{KvStore, VISIBLE_NUTRIENTS_KEY, set_typed};

/// The user's explicitly tracked nutrients, at most one entry per nutrient,
/// kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalRegistry {
    entries: Vec<GoalEntry>,
}

impl GoalRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `visibleNutrients`. Duplicate ids in stored data collapse to
    /// the last entry, keeping the position of the first. Entries that cannot
    /// be decoded or fail validation are skipped.
    pub fn load(store: &dyn KvStore) -> Result<Self> {
        let mut registry = Self::new();
        let items = match store.get(VISIBLE_NUTRIENTS_KEY)? {
            Some(Value::Array(items)) => items,
            Some(_) => {
                tracing::warn!(key = VISIBLE_NUTRIENTS_KEY, "stored goal list is not an array, ignoring");
                return Ok(registry);
            }
            None => return Ok(registry),
        };

        for item in items {
            let goal = match serde_json::from_value::<GoalEntry>(item) {
                Ok(goal) => goal,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping undecodable goal entry");
                    continue;
                }
            };
            if let Err(e) =
                registry.set_goal(&goal.nutrient_id, &goal.name, &goal.unit, goal.max_value)
            {
                tracing::warn!(nutrient = %goal.nutrient_id, error = %e, "dropping stored goal");
            }
        }
        Ok(registry)
    }

    /// Overwrite `visibleNutrients` with the full registry.
    pub fn save(&self, store: &dyn KvStore) -> Result<()> {
        set_typed(store, VISIBLE_NUTRIENTS_KEY, &self.entries)
    }

    /// Insert or replace the goal for `nutrient_id`. The registry is left
    /// untouched when `max_value` is rejected.
    pub fn set_goal(
        &mut self,
        nutrient_id: &str,
        name: &str,
        unit: &str,
        max_value: f64,
    ) -> Result<&GoalEntry, ValidationError> {
        let key = normalize_key(nutrient_id);
        if key.is_empty() {
            return Err(ValidationError::UnknownNutrient(nutrient_id.to_string()));
        }
        let max_value = validate_goal_value(max_value)?;

        let idx = if let Some(idx) = self
            .entries
            .iter()
            .position(|g| normalize_key(&g.nutrient_id) == key)
        {
            let existing = &mut self.entries[idx];
            existing.name = name.to_string();
            existing.unit = unit.to_string();
            existing.max_value = max_value;
            idx
        } else {
            self.entries.push(GoalEntry {
                nutrient_id: nutrient_id.trim().to_string(),
                name: name.to_string(),
                unit: unit.to_string(),
                max_value,
            });
            self.entries.len() - 1
        };
        Ok(&self.entries[idx])
    }

    /// Returns whether an entry was removed.
    pub fn remove_goal(&mut self, nutrient_id: &str) -> bool {
        let key = normalize_key(nutrient_id);
        let before = self.entries.len();
        self.entries.retain(|g| normalize_key(&g.nutrient_id) != key);
        self.entries.len() != before
    }

    #[must_use]
    pub fn get(&self, nutrient_id: &str) -> Option<&GoalEntry> {
        let key = normalize_key(nutrient_id);
        self.entries
            .iter()
            .find(|g| normalize_key(&g.nutrient_id) == key)
    }

    #[must_use]
    pub fn list(&self) -> &[GoalEntry] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_scenario_c_upsert() {
        let mut registry = GoalRegistry::new();
        registry.set_goal("calcium", "Calcium", "mg", 1200.0).unwrap();
        assert_eq!(registry.list().len(), 1);
        assert_eq!(registry.list()[0].nutrient_id, "calcium");
        assert!((registry.list()[0].max_value - 1200.0).abs() < f64::EPSILON);

        registry.set_goal("calcium", "Calcium", "mg", 1500.0).unwrap();
        assert_eq!(registry.list().len(), 1);
        assert!((registry.list()[0].max_value - 1500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_upsert_matches_case_insensitively() {
        let mut registry = GoalRegistry::new();
        registry.set_goal("iron", "Iron", "mg", 18.0).unwrap();
        registry.set_goal("IRON", "Iron", "mg", 20.0).unwrap();
        assert_eq!(registry.list().len(), 1);
        assert_eq!(registry.list()[0].nutrient_id, "iron");
    }

    #[test]
    fn test_upsert_keeps_position() {
        let mut registry = GoalRegistry::new();
        registry.set_goal("iron", "Iron", "mg", 18.0).unwrap();
        registry.set_goal("zinc", "Zinc", "mg", 11.0).unwrap();
        registry.set_goal("iron", "Iron", "mg", 25.0).unwrap();
        let ids: Vec<&str> = registry
            .list()
            .iter()
            .map(|g| g.nutrient_id.as_str())
            .collect();
        assert_eq!(ids, vec!["iron", "zinc"]);
    }

    #[test]
    fn test_scenario_e_rejects_negative() {
        let mut registry = GoalRegistry::new();
        registry.set_goal("iron", "Iron", "mg", 18.0).unwrap();
        let before = registry.clone();

        let err = registry.set_goal("x", "X", "g", -5.0).unwrap_err();
        assert_eq!(err, ValidationError::InvalidGoal(-5.0));
        assert_eq!(registry, before);

        assert!(registry.set_goal("iron", "Iron", "mg", 0.0).is_err());
        assert!(registry.set_goal("iron", "Iron", "mg", f64::NAN).is_err());
        assert_eq!(registry, before);
    }

    #[test]
    fn test_remove_goal_idempotent() {
        let mut registry = GoalRegistry::new();
        registry.set_goal("iron", "Iron", "mg", 18.0).unwrap();
        registry.set_goal("zinc", "Zinc", "mg", 11.0).unwrap();

        assert!(registry.remove_goal("iron"));
        let after_first = registry.clone();
        assert!(!registry.remove_goal("iron"));
        assert_eq!(registry, after_first);
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn test_save_and_load() {
        let store = MemoryStore::new();
        let mut registry = GoalRegistry::new();
        registry.set_goal("calcium", "Calcium", "mg", 1200.0).unwrap();
        registry.set_goal("iron", "Iron", "mg", 18.0).unwrap();
        registry.save(&store).unwrap();

        let stored = store.get(VISIBLE_NUTRIENTS_KEY).unwrap().unwrap();
        assert_eq!(stored[0]["id"], "calcium");
        assert_eq!(stored[0]["maxValue"], 1200.0);

        let loaded = GoalRegistry::load(&store).unwrap();
        assert_eq!(loaded, registry);
    }

    #[test]
    fn test_load_collapses_duplicates_and_drops_invalid() {
        let store = MemoryStore::new();
        store
            .set(
                VISIBLE_NUTRIENTS_KEY,
                &json!([
                    {"id": "iron", "name": "Iron", "unit": "mg", "maxValue": 10},
                    {"id": "zinc", "name": "Zinc", "unit": "mg", "maxValue": -1},
                    {"id": "iron", "name": "Iron", "unit": "mg", "maxValue": 15}
                ]),
            )
            .unwrap();

        let loaded = GoalRegistry::load(&store).unwrap();
        assert_eq!(loaded.list().len(), 1);
        assert!((loaded.get("iron").unwrap().max_value - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_set_goal_rejects_blank_id() {
        let mut registry = GoalRegistry::new();
        for id in ["", "   "] {
            assert!(matches!(
                registry.set_goal(id, "Fiber", "g", 28.0),
                Err(ValidationError::UnknownNutrient(_))
            ));
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_skips_undecodable_entries() {
        let store = MemoryStore::new();
        store
            .set(
                VISIBLE_NUTRIENTS_KEY,
                &json!([
                    {"id": "iron", "maxValue": 10},
                    "garbage",
                    {"id": "zinc", "name": "Zinc", "unit": "mg", "maxValue": 11}
                ]),
            )
            .unwrap();

        let loaded = GoalRegistry::load(&store).unwrap();
        assert_eq!(loaded.list().len(), 1);
        assert_eq!(loaded.list()[0].nutrient_id, "zinc");

        store.set(VISIBLE_NUTRIENTS_KEY, &json!({"iron": 10})).unwrap();
        assert!(GoalRegistry::load(&store).unwrap().is_empty());
    }

    #[test]
    fn test_load_empty_store() {
        let store = MemoryStore::new();
        assert!(GoalRegistry::load(&store).unwrap().is_empty());
    }
}
