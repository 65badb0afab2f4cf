use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProviderRating {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub property_id: Uuid,
    pub issue_id: Option<Uuid>,
    pub rating: i16,
    pub quality: Option<i16>,
    pub timeliness: Option<i16>,
    pub communication: Option<i16>,
    pub price: Option<i16>,
    pub comment: Option<String>,
    pub rater_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProviderRating {
    pub property_id: Uuid,
    pub issue_id: Option<Uuid>,
    pub rating: i16,
    #[serde(default)]
    pub quality: Option<i16>,
    #[serde(default)]
    pub timeliness: Option<i16>,
    #[serde(default)]
    pub communication: Option<i16>,
    #[serde(default)]
    pub price: Option<i16>,
    #[serde(default)]
    pub comment: Option<String>,
    pub rater_id: Uuid,
}

impl NewProviderRating {
    /// Returns the name of the first score outside 1..=5.
    pub fn invalid_score(&self) -> Option<&'static str> {
        let in_range = |v: i16| (MIN_RATING..=MAX_RATING).contains(&v);
        if !in_range(self.rating) {
            return Some("rating");
        }
        [
            ("quality", self.quality),
            ("timeliness", self.timeliness),
            ("communication", self.communication),
            ("price", self.price),
        ]
        .into_iter()
        .find(|(_, score)| score.is_some_and(|v| !in_range(v)))
        .map(|(name, _)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating(value: i16) -> NewProviderRating {
        NewProviderRating {
            property_id: Uuid::new_v4(),
            issue_id: None,
            rating: value,
            quality: None,
            timeliness: None,
            communication: None,
            price: None,
            comment: None,
            rater_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn accepts_scores_within_range() {
        let mut r = rating(5);
        r.quality = Some(1);
        assert_eq!(r.invalid_score(), None);
    }

    #[test]
    fn flags_out_of_range_scores() {
        assert_eq!(rating(0).invalid_score(), Some("rating"));
        let mut r = rating(3);
        r.timeliness = Some(6);
        assert_eq!(r.invalid_score(), Some("timeliness"));
    }
}
