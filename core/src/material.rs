use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub type MaterialId = u32;

/// Id after the largest of `existing`, starting at 1. `None` once ids are exhausted.
pub fn next_id(existing: impl IntoIterator<Item = u32>) -> Option<u32> {
    existing.into_iter().max().map_or(Some(1), |m| m.checked_add(1))
}

/// A leasable catalog item as seen by the recommendation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecord {
    pub id: MaterialId,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub specifications: String,
    /// Pricing unit, e.g. "sqft", "set", "ton".
    #[serde(default)]
    pub unit: String,
    pub price_per_day: f64,
    #[serde(default)]
    pub quantity_available: u32,
}

impl MaterialRecord {
    /// Text fed to the indexer: name, category, description and specifications,
    /// empty fields skipped, joined by single spaces.
    pub fn document_text(&self) -> String {
        [
            self.name.as_str(),
            self.category.as_str(),
            self.description.as_str(),
            self.specifications.as_str(),
        ]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// Create payload. `id` is optional so bulk imports can carry storage ids.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMaterial {
    #[serde(default)]
    pub id: Option<MaterialId>,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub specifications: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    pub price_per_day: f64,
    #[serde(default)]
    pub quantity_available: u32,
}

impl NewMaterial {
    pub fn into_record(self, id: MaterialId) -> Result<MaterialRecord> {
        if id == 0 {
            bail!("material id must be positive");
        }
        let record = MaterialRecord {
            id,
            name: self.name.trim().to_string(),
            category: self.category.trim().to_string(),
            description: self.description.unwrap_or_default(),
            specifications: self.specifications.unwrap_or_default(),
            unit: self.unit.unwrap_or_default(),
            price_per_day: self.price_per_day,
            quantity_available: self.quantity_available,
        };
        validate(&record)?;
        Ok(record)
    }
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaterialPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub specifications: Option<String>,
    pub unit: Option<String>,
    pub price_per_day: Option<f64>,
    pub quantity_available: Option<u32>,
}

impl MaterialPatch {
    /// Returns the patched copy, leaving `record` untouched if validation fails.
    pub fn apply(self, record: &MaterialRecord) -> Result<MaterialRecord> {
        let mut out = record.clone();
        if let Some(v) = self.name { out.name = v.trim().to_string(); }
        if let Some(v) = self.category { out.category = v.trim().to_string(); }
        if let Some(v) = self.description { out.description = v; }
        if let Some(v) = self.specifications { out.specifications = v; }
        if let Some(v) = self.unit { out.unit = v; }
        if let Some(v) = self.price_per_day { out.price_per_day = v; }
        if let Some(v) = self.quantity_available { out.quantity_available = v; }
        validate(&out)?;
        Ok(out)
    }
}

fn validate(record: &MaterialRecord) -> Result<()> {
    if record.name.is_empty() {
        bail!("name is required");
    }
    if record.category.is_empty() {
        bail!("category is required");
    }
    if !record.price_per_day.is_finite() || record.price_per_day < 0.0 {
        bail!("price_per_day must be a non-negative number");
    }
    Ok(())
}
