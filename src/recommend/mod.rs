pub mod engine;
pub mod scoring;
pub mod types;

pub use engine::Recommender;
pub use types::{Dataset, RecommendationKind, RecommendationRequest};
