use std::collections::HashSet;

use crate::models::{Nutrient, NutrientCategory, ValidationError, normalize_key};

/// Fixed lookup table of trackable nutrients, kept in definition order.
#[derive(Debug, Clone)]
pub struct NutrientCatalog {
    nutrients: Vec<Nutrient>,
}

impl NutrientCatalog {
    /// Build a catalog, rejecting duplicate ids (compared case-insensitively)
    /// and non-positive recommended amounts.
    pub fn new(nutrients: Vec<Nutrient>) -> Result<Self, ValidationError> {
        let mut seen = HashSet::new();
        for n in &nutrients {
            if n.id.trim().is_empty() {
                return Err(ValidationError::InvalidCatalog(
                    "nutrient id must not be empty".to_string(),
                ));
            }
            if !seen.insert(normalize_key(&n.id)) {
                return Err(ValidationError::InvalidCatalog(format!(
                    "duplicate nutrient id '{}'",
                    n.id
                )));
            }
            if !(n.recommended_daily.is_finite() && n.recommended_daily > 0.0) {
                return Err(ValidationError::InvalidCatalog(format!(
                    "recommended daily amount for '{}' must be greater than 0",
                    n.id
                )));
            }
        }
        Ok(Self { nutrients })
    }

    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Nutrient> {
        let key = normalize_key(id);
        self.nutrients.iter().find(|n| normalize_key(&n.id) == key)
    }

    /// Resolve a storage key to a nutrient: by id first, then by display name
    /// for keys written by older versions.
    #[must_use]
    pub fn resolve_key(&self, key: &str) -> Option<&Nutrient> {
        self.find(key).or_else(|| {
            let key = normalize_key(key);
            self.nutrients.iter().find(|n| normalize_key(&n.name) == key)
        })
    }

    #[must_use]
    pub fn list(&self) -> &[Nutrient] {
        &self.nutrients
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Nutrient> {
        self.nutrients.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nutrients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nutrients.is_empty()
    }
}

impl<'a> IntoIterator for &'a NutrientCatalog {
    type Item = &'a Nutrient;
    type IntoIter = std::slice::Iter<'a, Nutrient>;

    fn into_iter(self) -> Self::IntoIter {
        self.nutrients.iter()
    }
}

fn nutrient(
    id: &str,
    name: &str,
    category: NutrientCategory,
    unit: &str,
    recommended_daily: f64,
    description: &str,
) -> Nutrient {
    Nutrient {
        id: id.to_string(),
        name: name.to_string(),
        category,
        unit: unit.to_string(),
        recommended_daily,
        description: description.to_string(),
    }
}

impl Default for NutrientCatalog {
    fn default() -> Self {
        use NutrientCategory::{Macro, Mineral, Vitamin};

        Self {
            nutrients: vec![
                nutrient(
                    "vitamin-a",
                    "Vitamin A",
                    Vitamin,
                    "mcg",
                    900.0,
                    "Supports vision, immune function, and cell growth",
                ),
                nutrient(
                    "vitamin-c",
                    "Vitamin C",
                    Vitamin,
                    "mg",
                    90.0,
                    "Antioxidant involved in immunity and collagen production",
                ),
                nutrient(
                    "vitamin-d",
                    "Vitamin D",
                    Vitamin,
                    "mcg",
                    15.0,
                    "Aids calcium absorption and bone health",
                ),
                nutrient(
                    "vitamin-e",
                    "Vitamin E",
                    Vitamin,
                    "mg",
                    15.0,
                    "Antioxidant that protects cells from damage",
                ),
                nutrient(
                    "iron",
                    "Iron",
                    Mineral,
                    "mg",
                    18.0,
                    "Needed for blood production and oxygen transport",
                ),
                nutrient(
                    "calcium",
                    "Calcium",
                    Mineral,
                    "mg",
                    1000.0,
                    "Bone health and muscle function",
                ),
                nutrient(
                    "zinc",
                    "Zinc",
                    Mineral,
                    "mg",
                    11.0,
                    "Immune function and wound healing",
                ),
                nutrient(
                    "protein",
                    "Protein",
                    Macro,
                    "g",
                    56.0,
                    "Muscle building and repair",
                ),
                nutrient(
                    "carbs",
                    "Carbohydrates",
                    Macro,
                    "g",
                    275.0,
                    "Primary energy source",
                ),
                nutrient(
                    "fat",
                    "Fat",
                    Macro,
                    "g",
                    78.0,
                    "Hormone production and nutrient absorption",
                ),
            ],
        }
    }
}
