//! Static table of move-decision providers.
//!
//! Names are stable configuration values (`ARENA_BOT_PROVIDER`). Same seed
//! yields the same decisions.

use super::{MoveDecisionProvider, RandomPlayer, RecallPlayer};

pub struct ProviderFactory {
    pub name: &'static str,
    pub version: &'static str,
    pub make: fn(seed: Option<u64>) -> Box<dyn MoveDecisionProvider>,
}

static PROVIDERS: &[ProviderFactory] = &[
    ProviderFactory {
        name: RandomPlayer::NAME,
        version: RandomPlayer::VERSION,
        make: make_random,
    },
    ProviderFactory {
        name: RecallPlayer::NAME,
        version: RecallPlayer::VERSION,
        make: make_recall,
    },
];

pub fn registered() -> &'static [ProviderFactory] {
    PROVIDERS
}

pub fn by_name(name: &str) -> Option<&'static ProviderFactory> {
    registered().iter().find(|f| f.name == name)
}

fn make_random(seed: Option<u64>) -> Box<dyn MoveDecisionProvider> {
    Box::new(RandomPlayer::new(seed))
}

fn make_recall(seed: Option<u64>) -> Box<dyn MoveDecisionProvider> {
    Box::new(RecallPlayer::new(seed))
}
