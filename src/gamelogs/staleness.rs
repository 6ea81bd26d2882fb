// src/gamelogs/staleness.rs
use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;

/// Player name -> most recent game date already persisted.
pub type LastDateIndex = HashMap<String, NaiveDate>;

/// Outcome of the skip-or-fetch check for one player.
///
/// Assumes the source publishes at most one update per calendar day: a
/// player whose latest stored game is from today cannot have anything newer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    New,
    Behind { days: i64 },
    Current,
    Inactive { days: i64 },
}

impl Staleness {
    pub fn should_fetch(&self) -> bool {
        matches!(self, Staleness::New | Staleness::Behind { .. })
    }
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Staleness::New => write!(f, "new"),
            Staleness::Behind { days } => write!(f, "{} days since last", days),
            Staleness::Current => write!(f, "already current"),
            Staleness::Inactive { days } => write!(f, "inactive for {} days", days),
        }
    }
}

/// Decides whether `name` needs a fetch as of `today`.
///
/// `inactive_after_days` optionally stops re-fetching players whose last game
/// is that many days old (injured, released). Unset, they are fetched every run.
pub fn should_fetch(
    name: &str,
    index: &LastDateIndex,
    today: NaiveDate,
    inactive_after_days: Option<i64>,
) -> Staleness {
    let Some(last) = index.get(name) else {
        return Staleness::New;
    };

    let days = (today - *last).num_days();
    if days == 0 {
        return Staleness::Current;
    }
    match inactive_after_days {
        Some(limit) if days >= limit => Staleness::Inactive { days },
        _ => Staleness::Behind { days },
    }
}
