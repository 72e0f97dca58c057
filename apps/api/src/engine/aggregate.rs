//! Pure aggregate arithmetic for votes and star ratings.
//!
//! Neither function reads historical records: vote counters move by signed
//! deltas and the mean rating is folded from the current `(rating, count)`.

use crate::models::location::MAX_RATING;
use crate::models::{StarValue, VoteDirection};
use crate::store::FieldUpdate;

/// Signed change to a location's vote counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterDelta {
    pub upvotes: i64,
    pub downvotes: i64,
}

impl CounterDelta {
    fn bump(direction: VoteDirection, by: i64) -> Self {
        match direction {
            VoteDirection::Upvote => Self {
                upvotes: by,
                downvotes: 0,
            },
            VoteDirection::Downvote => Self {
                upvotes: 0,
                downvotes: by,
            },
        }
    }

    /// Atomic increments for the non-zero counters.
    pub fn updates(&self) -> Vec<FieldUpdate> {
        [
            (VoteDirection::Upvote, self.upvotes),
            (VoteDirection::Downvote, self.downvotes),
        ]
        .into_iter()
        .filter(|(_, by)| *by != 0)
        .map(|(direction, by)| FieldUpdate::increment(direction.counter_field(), by))
        .collect()
    }
}

/// Counter change for a user moving from `previous` to `next`.
/// `None` when the vote is unchanged.
pub fn vote_transition(previous: Option<VoteDirection>, next: VoteDirection) -> Option<CounterDelta> {
    match previous {
        None => Some(CounterDelta::bump(next, 1)),
        Some(prev) if prev == next => None,
        Some(prev) => {
            let add = CounterDelta::bump(next, 1);
            let remove = CounterDelta::bump(prev, -1);
            Some(CounterDelta {
                upvotes: add.upvotes + remove.upvotes,
                downvotes: add.downvotes + remove.downvotes,
            })
        }
    }
}

/// Running mean of star ratings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingAggregate {
    pub rating: f64,
    pub count: u64,
}

impl RatingAggregate {
    pub fn updates(&self) -> Vec<FieldUpdate> {
        vec![
            FieldUpdate::set("rating", self.rating),
            FieldUpdate::set("ratingCount", self.count),
        ]
    }
}

/// Folds one user's rating into the aggregate.
///
/// A first rating grows the count; a changed rating swaps `previous` for
/// `value` at the same count. The mean is not rounded, only kept inside
/// `[0, 5]` against float drift.
pub fn fold_rating(
    current: RatingAggregate,
    previous: Option<StarValue>,
    value: StarValue,
) -> RatingAggregate {
    let value = f64::from(value.get());
    let total = current.rating * current.count as f64;

    let (sum, count) = match previous {
        // A prior record against a zero count means the aggregate never saw
        // it; count this rating as the first.
        Some(_) if current.count == 0 => (value, 1),
        Some(old) => (total - f64::from(old.get()) + value, current.count),
        None => (total + value, current.count + 1),
    };

    RatingAggregate {
        rating: (sum / count as f64).clamp(0.0, MAX_RATING),
        count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FieldDelta;

    fn star(v: i64) -> StarValue {
        StarValue::try_from(v).unwrap()
    }

    const EMPTY: RatingAggregate = RatingAggregate {
        rating: 0.0,
        count: 0,
    };

    #[test]
    fn test_first_vote_increments_one_counter() {
        let delta = vote_transition(None, VoteDirection::Upvote).unwrap();
        assert_eq!(
            delta,
            CounterDelta {
                upvotes: 1,
                downvotes: 0
            }
        );
        assert_eq!(delta.updates(), vec![FieldUpdate::increment("upvotes", 1)]);
    }

    #[test]
    fn test_repeated_vote_is_noop() {
        assert_eq!(
            vote_transition(Some(VoteDirection::Downvote), VoteDirection::Downvote),
            None
        );
    }

    #[test]
    fn test_switching_vote_moves_one_count() {
        let delta = vote_transition(Some(VoteDirection::Upvote), VoteDirection::Downvote).unwrap();
        assert_eq!(
            delta,
            CounterDelta {
                upvotes: -1,
                downvotes: 1
            }
        );
        assert_eq!(delta.updates().len(), 2);
    }

    #[test]
    fn test_user_contribution_stays_at_one() {
        let mut previous = None;
        let (mut up, mut down) = (0i64, 0i64);
        for step in 0..10 {
            let next = if step % 2 == 0 {
                VoteDirection::Upvote
            } else {
                VoteDirection::Downvote
            };
            if let Some(delta) = vote_transition(previous, next) {
                up += delta.upvotes;
                down += delta.downvotes;
            }
            previous = Some(next);
            assert_eq!(up + down, 1, "step {step}");
        }
    }

    #[test]
    fn test_first_rating() {
        let next = fold_rating(EMPTY, None, star(4));
        assert_eq!(next, RatingAggregate { rating: 4.0, count: 1 });
    }

    #[test]
    fn test_second_user_rating_averages() {
        let next = fold_rating(RatingAggregate { rating: 4.0, count: 1 }, None, star(2));
        assert_eq!(next, RatingAggregate { rating: 3.0, count: 2 });
    }

    #[test]
    fn test_re_rating_keeps_count() {
        let next = fold_rating(RatingAggregate { rating: 3.0, count: 1 }, Some(star(3)), star(5));
        assert_eq!(next, RatingAggregate { rating: 5.0, count: 1 });
    }

    #[test]
    fn test_re_rating_among_others() {
        // ratings 5, 1, 3 -> mean 3; the 1 becomes a 4 -> (5 + 4 + 3) / 3 = 4
        let next = fold_rating(RatingAggregate { rating: 3.0, count: 3 }, Some(star(1)), star(4));
        assert_eq!(next.count, 3);
        assert!((next.rating - 4.0).abs() < 1e-9, "rating was {}", next.rating);
    }

    #[test]
    fn test_prior_rating_with_zero_count_counts_as_first() {
        let next = fold_rating(EMPTY, Some(star(2)), star(5));
        assert_eq!(next, RatingAggregate { rating: 5.0, count: 1 });
    }

    #[test]
    fn test_mean_of_many_is_not_rounded() {
        let values = [5, 4, 4, 1, 2, 3, 5];
        let mut agg = EMPTY;
        for v in values {
            agg = fold_rating(agg, None, star(v));
        }
        let expected = values.iter().sum::<i64>() as f64 / values.len() as f64;
        assert_eq!(agg.count, values.len() as u64);
        assert!((agg.rating - expected).abs() < 1e-9, "rating was {}", agg.rating);
    }

    #[test]
    fn test_rating_updates_overwrite_both_fields() {
        let updates = RatingAggregate { rating: 3.5, count: 2 }.updates();
        assert_eq!(updates.len(), 2);
        assert!(updates
            .iter()
            .all(|u| matches!(u.delta, FieldDelta::Set(_))));
    }
}
