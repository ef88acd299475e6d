//! Synthetic participants take their turns through the same reveal path as
//! everyone else, paced by the delay their provider asks for.

use std::sync::Arc;

use tracing::{debug, warn};

use super::registry::{LiveSession, SessionTimer};
use super::SessionManager;
use crate::ai::Decision;
use crate::domain::{Resolution, RevealOutcome, SessionStatus, TurnPhase};
use crate::errors::domain::DomainError;

impl SessionManager {
    /// Play the current synthetic participant's turn unit right away.
    /// Returns the reveals made; empty when no bot is up.
    pub async fn play_bot_turn(
        self: &Arc<Self>,
        session_id: i64,
    ) -> Result<Vec<RevealOutcome>, DomainError> {
        let shared = self.live(session_id).await?;
        let mut reveals = Vec::new();
        let ended = {
            let mut live = shared.lock().await;
            live.pending_bot = None;
            self.timers.cancel(&SessionTimer::Bot(session_id));
            loop {
                let Some(bot) = live.current_bot() else {
                    break false;
                };
                if live.status != SessionStatus::Playing || live.game.phase != TurnPhase::Awaiting
                {
                    break false;
                }
                let decision = decide(&live, bot)?;
                let (out, ended) = self.reveal_locked(&mut live, bot, decision.position).await?;
                reveals.push(out);
                if ended || out.resolution != Resolution::Pending {
                    break ended;
                }
            }
        };
        if ended {
            self.finish_session(session_id).await;
        }
        Ok(reveals)
    }

    /// Arm the bot timer if a synthetic participant is up and may act.
    pub(super) fn schedule_bot_locked(self: &Arc<Self>, live: &mut LiveSession) {
        if !self.config.bot_autoplay
            || live.status != SessionStatus::Playing
            || live.game.phase != TurnPhase::Awaiting
        {
            return;
        }
        let Some(bot) = live.current_bot() else {
            return;
        };
        let decision = match decide(live, bot) {
            Ok(d) => d,
            Err(e) => {
                warn!(session_id = live.id, user_id = bot, error = %e, "bot has no move");
                return;
            }
        };

        let session_id = live.id;
        live.pending_bot = Some((bot, decision));
        let this = Arc::clone(self);
        self.timers.arm(
            SessionTimer::Bot(session_id),
            decision.delay,
            move |generation| async move { this.on_bot_timer(session_id, generation).await },
        );
    }

    async fn on_bot_timer(self: Arc<Self>, session_id: i64, generation: u64) {
        let Some(shared) = self.registry.get(session_id) else {
            return;
        };
        let ended = {
            let mut live = shared.lock().await;
            if !self.timers.take_if_current(&SessionTimer::Bot(session_id), generation) {
                return;
            }
            match self.bot_step_locked(&mut live).await {
                Ok(ended) => ended,
                Err(e) => {
                    warn!(session_id, error = %e, "bot move failed");
                    false
                }
            }
        };
        if ended {
            self.finish_session(session_id).await;
        }
    }

    async fn bot_step_locked(self: &Arc<Self>, live: &mut LiveSession) -> Result<bool, DomainError> {
        let Some(bot) = live.current_bot() else {
            live.pending_bot = None;
            return Ok(false);
        };
        let decision = match live.pending_bot.take() {
            Some((user_id, d)) if user_id == bot && live.game.board.is_hidden(d.position) => d,
            _ => {
                debug!(session_id = live.id, user_id = bot, "pending bot move is stale");
                decide(live, bot)?
            }
        };
        let (_, ended) = self.reveal_locked(live, bot, decision.position).await?;
        Ok(ended)
    }
}

fn decide(live: &LiveSession, bot: i64) -> Result<Decision, DomainError> {
    let provider = live.bots.get(&bot).ok_or_else(|| {
        DomainError::invariant(format!("no move provider for synthetic user {bot}"))
    })?;
    Ok(provider.decide(&live.game.board, &live.game.open)?)
}
