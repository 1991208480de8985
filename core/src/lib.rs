pub mod index;
pub mod lease;
pub mod material;
pub mod persist;
pub mod pricing;
pub mod recommend;
pub mod shared;
pub mod tokenizer;

pub use index::{CatalogIndex, DocumentVector, TermId, TermIndex, DEFAULT_MAX_FEATURES};
pub use lease::{Lease, LeaseError, LeaseId, LeaseItem, LeaseStatus, NewLease, NewLeaseItem, UserId};
pub use material::{next_id, MaterialId, MaterialPatch, MaterialRecord, NewMaterial};
pub use pricing::PricingQuote;
pub use recommend::{RecommenderConfig, Recommender, RelevanceLabel, ScoredCandidate};
pub use shared::SharedRecommender;
