use crate::{Flashcard, Rating};
use chrono::{DateTime, Duration, Utc};

/// Level and interval chosen for a rating.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleStep {
    pub level: u32,
    pub interval_days: u64,
}

fn pow2(exp: u32) -> u64 {
    2u64.saturating_pow(exp)
}

pub fn next_step(level: u32, rating: Rating) -> ScheduleStep {
    match rating {
        Rating::Forgot => ScheduleStep { level: 0, interval_days: 1 },
        // 2^(L-1) is 0.5 at level 0; the floor of one day covers it.
        Rating::Hard => ScheduleStep {
            level,
            interval_days: level.checked_sub(1).map_or(1, pow2).max(1),
        },
        Rating::Good => {
            let level = level.saturating_add(1);
            ScheduleStep { level, interval_days: pow2(level) }
        }
        Rating::Easy => {
            let level = level.saturating_add(2);
            ScheduleStep { level, interval_days: pow2(level) }
        }
    }
}

fn add_days(now: DateTime<Utc>, days: u64) -> DateTime<Utc> {
    i64::try_from(days)
        .ok()
        .and_then(Duration::try_days)
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Pure rating transition: returns the rescheduled card, leaving the input untouched.
pub fn rate(card: &Flashcard, rating: Rating, now: DateTime<Utc>) -> Flashcard {
    let step = next_step(card.srs_level, rating);
    tracing::debug!(card = %card.id, %rating, level = step.level, days = step.interval_days, "rated card");
    Flashcard {
        srs_level: step.level,
        next_review_date: Some(add_days(now, step.interval_days)),
        ..card.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huge_levels_saturate() {
        let step = next_step(u32::MAX, Rating::Easy);
        assert_eq!(step.level, u32::MAX);
        assert_eq!(step.interval_days, u64::MAX);
        assert_eq!(add_days(Utc::now(), step.interval_days), DateTime::<Utc>::MAX_UTC);
    }
}
