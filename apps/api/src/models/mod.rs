pub mod location;
pub mod vote;

pub use location::{Location, LocationStats, LOCATIONS};
pub use vote::{StarRating, StarValue, Vote, VoteDirection, RATINGS, VOTES};

/// Document id shared by the per-(location, user) vote and rating records.
pub fn pair_document_id(location_id: &str, user_id: &str) -> String {
    format!("{location_id}_{user_id}")
}
