use crate::material::MaterialRecord;
use crate::recommend::{Recommender, RecommenderConfig};
use parking_lot::RwLock;
use std::sync::Arc;

/// Process-wide handle to the current fitted recommender.
///
/// Readers take a cheap `Arc` snapshot and score without holding the lock.
/// `refit` builds the replacement outside the lock and swaps it in, so a
/// reader sees either the old index or the new one, never a partial one.
#[derive(Debug, Default)]
pub struct SharedRecommender {
    config: RecommenderConfig,
    // (generation, recommender) swapped together so readers never pair them wrongly
    current: RwLock<(u64, Arc<Recommender>)>,
}

impl SharedRecommender {
    pub fn new(materials: Vec<MaterialRecord>, config: RecommenderConfig) -> Self {
        Self {
            config,
            current: RwLock::new((1, Arc::new(Recommender::fit(materials, config)))),
        }
    }

    pub fn snapshot(&self) -> Arc<Recommender> { self.current.read().1.clone() }

    /// Number of fits performed so far, including the initial one.
    pub fn generation(&self) -> u64 { self.current.read().0 }

    /// Generation and recommender read under one lock.
    pub fn versioned_snapshot(&self) -> (u64, Arc<Recommender>) {
        let guard = self.current.read();
        (guard.0, guard.1.clone())
    }

    /// Full re-fit on a new catalog snapshot.
    pub fn refit(&self, materials: Vec<MaterialRecord>) -> Arc<Recommender> {
        let fitted = Arc::new(Recommender::fit(materials, self.config));
        let mut current = self.current.write();
        let generation = current.0 + 1;
        *current = (generation, fitted.clone());
        tracing::debug!(generation, "swapped recommender");
        fitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u32, name: &str) -> MaterialRecord {
        MaterialRecord {
            id,
            name: name.into(),
            category: "Heavy Equipment".into(),
            description: String::new(),
            specifications: String::new(),
            unit: String::new(),
            price_per_day: 1.0,
            quantity_available: 1,
        }
    }

    #[test]
    fn old_snapshot_survives_refit() {
        let shared = SharedRecommender::new(vec![record(1, "excavator")], RecommenderConfig::default());
        let before = shared.snapshot();
        shared.refit(vec![record(1, "excavator"), record(2, "crane")]);
        assert_eq!(before.materials().len(), 1);
        assert_eq!(shared.snapshot().materials().len(), 2);
        assert_eq!(shared.generation(), 2);
    }

    #[test]
    fn generation_travels_with_its_recommender() {
        let shared = SharedRecommender::new(Vec::new(), RecommenderConfig::default());
        let (generation, rec) = shared.versioned_snapshot();
        assert_eq!((generation, rec.materials().len()), (1, 0));
        shared.refit(vec![record(7, "crane")]);
        let (generation, rec) = shared.versioned_snapshot();
        assert_eq!((generation, rec.materials().len()), (2, 1));
    }

    #[test]
    fn refit_with_empty_catalog_clears_results() {
        let shared = SharedRecommender::new(vec![record(1, "excavator")], RecommenderConfig::default());
        shared.refit(Vec::new());
        let rec = shared.snapshot();
        assert!(rec.recommend_by_project("excavator", None, 5).is_empty());
        assert!(rec.recommend_complementary(&[1], 5).is_empty());
        assert!(rec.optimize_pricing(1, 10, 1).is_none());
    }
}
