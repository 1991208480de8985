use crate::index::{CatalogIndex, DEFAULT_MAX_FEATURES};
use crate::material::{MaterialId, MaterialRecord};
use crate::pricing::{self, PricingQuote};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Number of results returned when a caller does not ask for a specific count.
pub const DEFAULT_TOP_N: usize = 5;

const DIVERSE_CATEGORY_SCORE: f32 = 0.5;
const SAME_CATEGORY_SCORE: f32 = 0.2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecommenderConfig {
    pub max_features: usize,
}

impl Default for RecommenderConfig {
    fn default() -> Self { Self { max_features: DEFAULT_MAX_FEATURES } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceLabel {
    HighlyRelevant,
    GoodMatch,
    MayBeUseful,
    Complementary,
}

impl RelevanceLabel {
    pub fn from_score(score: f32) -> Self {
        if score > 0.7 {
            RelevanceLabel::HighlyRelevant
        } else if score > 0.5 {
            RelevanceLabel::GoodMatch
        } else if score > 0.3 {
            RelevanceLabel::MayBeUseful
        } else {
            RelevanceLabel::Complementary
        }
    }

    /// Sentence shown to end users next to a recommendation.
    pub fn reason(&self) -> &'static str {
        match self {
            RelevanceLabel::HighlyRelevant => "Highly relevant for your project requirements",
            RelevanceLabel::GoodMatch => "Good match for your project",
            RelevanceLabel::MayBeUseful => "May be useful for your project",
            RelevanceLabel::Complementary => "Consider for complementary needs",
        }
    }
}

impl fmt::Display for RelevanceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelevanceLabel::HighlyRelevant => "highly relevant",
            RelevanceLabel::GoodMatch => "good match",
            RelevanceLabel::MayBeUseful => "may be useful",
            RelevanceLabel::Complementary => "complementary",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    pub material: MaterialRecord,
    pub score: f32,
}

impl ScoredCandidate {
    pub fn label(&self) -> RelevanceLabel { RelevanceLabel::from_score(self.score) }
}

/// A fitted, immutable view of the catalog. Rebuild with [`Recommender::fit`]
/// whenever the catalog changes.
#[derive(Debug, Clone, Default)]
pub struct Recommender {
    config: RecommenderConfig,
    materials: Vec<MaterialRecord>,
    positions: HashMap<MaterialId, usize>,
    index: CatalogIndex,
}

impl Recommender {
    pub fn fit(materials: Vec<MaterialRecord>, config: RecommenderConfig) -> Self {
        let texts: Vec<String> = materials.iter().map(MaterialRecord::document_text).collect();
        let index = CatalogIndex::fit(&texts, config.max_features);
        let positions = materials.iter().enumerate().map(|(pos, m)| (m.id, pos)).collect();
        tracing::info!(
            num_materials = materials.len(),
            vocabulary = index.terms.len(),
            "fitted catalog index"
        );
        Self { config, materials, positions, index }
    }

    pub fn config(&self) -> RecommenderConfig { self.config }

    pub fn materials(&self) -> &[MaterialRecord] { &self.materials }

    pub fn index(&self) -> &CatalogIndex { &self.index }

    pub fn get(&self, id: MaterialId) -> Option<&MaterialRecord> {
        self.positions.get(&id).map(|&pos| &self.materials[pos])
    }

    /// Cosine similarity of `query` against every material, in catalog order.
    pub fn score(&self, query: &str) -> Vec<f32> { self.index.score(query) }

    /// Materials matching a project description, best first.
    ///
    /// At most `top_n` results; equal scores keep catalog order, and a
    /// material with zero similarity is never returned.
    pub fn recommend_by_project(
        &self,
        project_description: &str,
        project_type: Option<&str>,
        top_n: usize,
    ) -> Vec<ScoredCandidate> {
        let query = match project_type {
            Some(t) => format!("{t} {project_description}"),
            None => project_description.to_string(),
        };
        let scores = self.score(&query);
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        order
            .into_iter()
            .take(top_n)
            .filter(|&pos| scores[pos] > 0.0)
            .map(|pos| ScoredCandidate { material: self.materials[pos].clone(), score: scores[pos] })
            .collect()
    }

    /// Materials that round out a selection.
    ///
    /// Each non-selected material scores `(category_score + avg_similarity) / 2`,
    /// where `category_score` rewards a category absent from the selection and
    /// `avg_similarity` is the mean cosine against the selected materials.
    /// Unknown ids are ignored; if none resolve the result is empty.
    pub fn recommend_complementary(&self, selected_ids: &[MaterialId], top_n: usize) -> Vec<ScoredCandidate> {
        let selected: HashSet<MaterialId> = selected_ids.iter().copied().collect();
        let selected_pos: Vec<usize> = self
            .materials
            .iter()
            .enumerate()
            .filter(|(_, m)| selected.contains(&m.id))
            .map(|(pos, _)| pos)
            .collect();
        if selected_pos.is_empty() || self.index.is_empty() {
            return Vec::new();
        }
        let categories: HashSet<&str> =
            selected_pos.iter().map(|&p| self.materials[p].category.as_str()).collect();

        let mut scored: Vec<ScoredCandidate> = self
            .materials
            .iter()
            .enumerate()
            .filter(|(_, m)| !selected.contains(&m.id))
            .map(|(pos, m)| {
                let category_score = if categories.contains(m.category.as_str()) {
                    SAME_CATEGORY_SCORE
                } else {
                    DIVERSE_CATEGORY_SCORE
                };
                let vector = &self.index.vectors[pos];
                let total: f32 = selected_pos.iter().map(|&s| vector.cosine(&self.index.vectors[s])).sum();
                let avg_similarity = total / selected_pos.len() as f32;
                ScoredCandidate { material: m.clone(), score: (category_score + avg_similarity) / 2.0 }
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_n);
        scored
    }

    /// Quote for `material_id`, or `None` when the material is not in the catalog.
    pub fn optimize_pricing(&self, material_id: MaterialId, lease_duration_days: u32, quantity: u32) -> Option<PricingQuote> {
        self.get(material_id).map(|m| pricing::quote(m, lease_duration_days, quantity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(id: MaterialId, name: &str, category: &str, description: &str) -> MaterialRecord {
        MaterialRecord {
            id,
            name: name.into(),
            category: category.into(),
            description: description.into(),
            specifications: String::new(),
            unit: "unit".into(),
            price_per_day: 10.0,
            quantity_available: 10,
        }
    }

    fn catalog() -> Vec<MaterialRecord> {
        vec![
            material(1, "Concrete Formwork Panels", "Formwork", "Plywood panels for concrete casting"),
            material(2, "Steel Scaffolding System", "Scaffolding", "Modular steel scaffolding"),
            material(3, "Cement Mixer", "Concrete Equipment", "Mixer for concrete preparation"),
            material(4, "Portable Generator", "Power Equipment", "Diesel generator for site power"),
        ]
    }

    #[test]
    fn labels_follow_score_bands() {
        assert_eq!(RelevanceLabel::from_score(0.71), RelevanceLabel::HighlyRelevant);
        assert_eq!(RelevanceLabel::from_score(0.7), RelevanceLabel::GoodMatch);
        assert_eq!(RelevanceLabel::from_score(0.5), RelevanceLabel::MayBeUseful);
        assert_eq!(RelevanceLabel::from_score(0.3), RelevanceLabel::Complementary);
        assert_eq!(RelevanceLabel::GoodMatch.to_string(), "good match");
    }

    #[test]
    fn project_type_is_prepended_to_query() {
        let rec = Recommender::fit(catalog(), RecommenderConfig::default());
        assert!(rec.recommend_by_project("plans", None, 5).is_empty());
        let hits = rec.recommend_by_project("plans", Some("diesel"), 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].material.id, 4);
    }

    #[test]
    fn zero_scores_are_dropped_even_when_top_n_is_not_filled() {
        let rec = Recommender::fit(catalog(), RecommenderConfig::default());
        let hits = rec.recommend_by_project("concrete", None, 10);
        let ids: Vec<_> = hits.iter().map(|c| c.material.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&1) && ids.contains(&3));
        assert!(hits.iter().all(|c| c.score > 0.0));
    }

    #[test]
    fn complementary_prefers_other_categories() {
        let rec = Recommender::fit(catalog(), RecommenderConfig::default());
        let hits = rec.recommend_complementary(&[1, 999], 10);
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|c| c.material.id != 1));
        // Cement Mixer shares "concrete" with the selection and sits in another category.
        assert_eq!(hits[0].material.id, 3);
        assert!(hits.iter().all(|c| c.score >= DIVERSE_CATEGORY_SCORE / 2.0));
    }

    #[test]
    fn equal_scores_keep_catalog_order() {
        let mut tied = vec![
            material(5, "Steel Beam", "Structural", ""),
            material(3, "Steel Beam", "Structural", ""),
            material(9, "Steel Beam", "Structural", ""),
        ];
        let rec = Recommender::fit(tied.clone(), RecommenderConfig::default());
        let ids: Vec<_> = rec.recommend_by_project("steel", None, 2).iter().map(|c| c.material.id).collect();
        assert_eq!(ids, vec![5, 3]);

        tied.insert(0, material(1, "Timber Plank", "Lumber", ""));
        let rec = Recommender::fit(tied, RecommenderConfig::default());
        let ids: Vec<_> = rec.recommend_complementary(&[1], 2).iter().map(|c| c.material.id).collect();
        assert_eq!(ids, vec![5, 3]);
    }

    #[test]
    fn complementary_with_unknown_ids_is_empty() {
        let rec = Recommender::fit(catalog(), RecommenderConfig::default());
        assert!(rec.recommend_complementary(&[42], 5).is_empty());
    }

    #[test]
    fn pricing_distinguishes_missing_material() {
        let rec = Recommender::fit(catalog(), RecommenderConfig::default());
        assert!(rec.optimize_pricing(77, 30, 10).is_none());
        let q = rec.optimize_pricing(2, 30, 10).unwrap();
        assert_eq!(q.material_name, "Steel Scaffolding System");
        assert_eq!(q.total_discount_percent, 10.0);
    }
}
