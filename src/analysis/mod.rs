pub mod recommender;
pub mod summary;
pub mod tag_extractor;

pub use recommender::{RecommendationOutcome, Recommender};
pub use summary::SummaryGenerator;
pub use tag_extractor::{TagExtraction, TagExtractor};
