//! # Quiz Module
//!
//! Four-epoch history quiz about ironmaking in Russia. Holds the
//! process-wide "question currently posed to this user" state.
//!
//! The session store is scratch state, not a system of record: entries
//! are overwritten whenever a new question is posed and expire after a
//! TTL so the map stays bounded no matter how many distinct users ever
//! played.

use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One of the four fixed historical-period buckets used as answer choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Epoch {
    /// 10th–13th centuries: bog iron and bloomery furnaces.
    Bloomery,
    /// 14th–15th centuries: town smithies of the rising principalities.
    Muscovite,
    /// 16th–17th centuries: first water-powered ironworks near Tula.
    Tsardom,
    /// 18th century: Ural blast furnaces and state-scale iron export.
    Imperial,
}

impl Epoch {
    /// All answer choices, in display order.
    pub const ALL: [Epoch; 4] = [
        Epoch::Bloomery,
        Epoch::Muscovite,
        Epoch::Tsardom,
        Epoch::Imperial,
    ];

    /// Stable key used in callback payloads.
    pub fn key(self) -> &'static str {
        match self {
            Epoch::Bloomery => "bloomery",
            Epoch::Muscovite => "muscovite",
            Epoch::Tsardom => "tsardom",
            Epoch::Imperial => "imperial",
        }
    }

    /// Human-readable period label shown on answer buttons and in feedback.
    pub fn label(self) -> &'static str {
        match self {
            Epoch::Bloomery => "X–XIII centuries",
            Epoch::Muscovite => "XIV–XV centuries",
            Epoch::Tsardom => "XVI–XVII centuries",
            Epoch::Imperial => "XVIII century",
        }
    }

    /// Scene description for this epoch. Doubles as the question text and
    /// as the prompt for the generated illustration.
    pub fn scene(self) -> &'static str {
        match self {
            Epoch::Bloomery => {
                "A village smith smelting bog iron in a small clay bloomery \
                 furnace, working the bloom with hand-driven bellows"
            }
            Epoch::Muscovite => {
                "A walled town smithy forging tools and weapon blanks for a \
                 prince's armory, apprentices hauling charcoal"
            }
            Epoch::Tsardom => {
                "A water-powered ironworks on a dammed river near Tula, \
                 foreign masters casting the first Russian cannon"
            }
            Epoch::Imperial => {
                "A giant Ural blast furnace estate shipping bar iron down \
                 river barges for export under the imperial eagle"
            }
        }
    }

    /// Parse a callback key back into an epoch.
    pub fn from_key(key: &str) -> Option<Epoch> {
        Epoch::ALL.iter().copied().find(|e| e.key() == key)
    }
}

/// Pick an epoch uniformly at random for the next question.
pub fn random_epoch() -> Epoch {
    let mut rng = rand::thread_rng();
    Epoch::ALL[rng.gen_range(0..Epoch::ALL.len())]
}

/// How long a posed question stays answerable before it expires.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy)]
struct PosedQuestion {
    epoch: Epoch,
    asked_at: Instant,
}

/// Thread-safe store of the question currently posed to each user.
///
/// Keyed by the requesting user's id, so concurrent events for distinct
/// users never touch the same entry. Concurrent events for the *same*
/// user are last-write-wins, which matches the chat semantics: the
/// newest posed question is the one that counts.
#[derive(Debug)]
pub struct QuizSessions {
    sessions: Mutex<HashMap<i64, PosedQuestion>>,
    ttl: Duration,
}

impl QuizSessions {
    /// Create an empty session store with the given expiry TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Record that `epoch` is now the question posed to `user_id`,
    /// overwriting any previous question.
    ///
    /// Expired entries of other users are evicted on the way, keeping the
    /// map bounded without a background task.
    pub fn pose(&self, user_id: i64, epoch: Epoch) {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.retain(|_, q| q.asked_at.elapsed() < self.ttl);
        sessions.insert(
            user_id,
            PosedQuestion {
                epoch,
                asked_at: Instant::now(),
            },
        );
    }

    /// The epoch currently posed to `user_id`, if any question is still
    /// active. Expired questions read as absent.
    pub fn posed(&self, user_id: i64) -> Option<Epoch> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .get(&user_id)
            .filter(|q| q.asked_at.elapsed() < self.ttl)
            .map(|q| q.epoch)
    }

    /// Number of live (non-expired) sessions.
    pub fn active_count(&self) -> usize {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .values()
            .filter(|q| q.asked_at.elapsed() < self.ttl)
            .count()
    }
}

impl Default for QuizSessions {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}
