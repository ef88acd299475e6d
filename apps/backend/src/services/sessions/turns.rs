use std::sync::Arc;

use tracing::{debug, info, warn};

use super::registry::{LiveSession, SessionTimer};
use super::{ensure_playing, seat_rows, SessionManager};
use crate::domain::{Resolution, RevealOutcome, TerminationReason, TimeoutOutcome, TurnPhase};
use crate::errors::domain::DomainError;
use crate::events::ArenaEvent;

impl SessionManager {
    /// Reveal the card at `position` for `user_id`.
    pub async fn act(
        self: &Arc<Self>,
        session_id: i64,
        user_id: i64,
        position: usize,
    ) -> Result<RevealOutcome, DomainError> {
        let shared = self.live(session_id).await?;
        let (outcome, ended) = {
            let mut live = shared.lock().await;
            self.reveal_locked(&mut live, user_id, position).await?
        };
        if ended {
            self.finish_session(session_id).await;
        }
        Ok(outcome)
    }

    /// Apply one reveal. Returns the outcome and whether the session ended.
    pub(super) async fn reveal_locked(
        self: &Arc<Self>,
        live: &mut LiveSession,
        user_id: i64,
        position: usize,
    ) -> Result<(RevealOutcome, bool), DomainError> {
        ensure_playing(live)?;
        let session_id = live.id;
        let mut next = live.game.clone();
        let out = next.reveal(user_id, position)?;

        let revealed = ArenaEvent::CardRevealed {
            session_id,
            user_id,
            position: out.position,
            face: out.face,
        };

        if let Resolution::BoardCleared { winner } = out.resolution {
            let score = next.seat(user_id).map(|s| s.score).unwrap_or_default();
            let prelude = vec![
                revealed,
                ArenaEvent::ActionResolved {
                    session_id,
                    user_id,
                    matched: true,
                    score,
                },
            ];
            let ended = self
                .terminate_locked(live, next, TerminationReason::Completed, Some(winner), prelude)
                .await?;
            return Ok((out, ended));
        }

        let rows = seat_rows(live, &next, &[user_id]);
        self.persist(session_id, &next, rows).await?;
        live.game = next;
        for bot in live.bots.values() {
            bot.observe(out.position, out.face);
        }
        self.emit(live, revealed);

        match out.resolution {
            Resolution::Pending => self.schedule_bot_locked(live),
            Resolution::Matched { score } => {
                self.emit(
                    live,
                    ArenaEvent::ActionResolved {
                        session_id,
                        user_id,
                        matched: true,
                        score,
                    },
                );
                self.begin_turn(live);
            }
            Resolution::Mismatched => {
                let score = live.game.seat(user_id).map(|s| s.score).unwrap_or_default();
                self.emit(
                    live,
                    ArenaEvent::ActionResolved {
                        session_id,
                        user_id,
                        matched: false,
                        score,
                    },
                );
                self.timers.cancel(&SessionTimer::Turn(session_id));
                self.arm_hold_timer(session_id);
            }
            Resolution::BoardCleared { .. } => {}
        }
        Ok((out, false))
    }

    /// End the reveal hold: hide the mismatched pair and pass the turn.
    /// Returns the participant now up, or `None` if nothing was resolving.
    pub async fn finish_resolution(
        self: &Arc<Self>,
        session_id: i64,
    ) -> Result<Option<i64>, DomainError> {
        let shared = self.live(session_id).await?;
        let mut live = shared.lock().await;
        self.finish_resolution_locked(&mut live).await
    }

    async fn finish_resolution_locked(
        self: &Arc<Self>,
        live: &mut LiveSession,
    ) -> Result<Option<i64>, DomainError> {
        ensure_playing(live)?;
        if live.game.phase != TurnPhase::Resolving {
            return Ok(None);
        }
        let mut next = live.game.clone();
        let up = next.end_resolution();
        self.persist(live.id, &next, Vec::new()).await?;
        live.game = next;
        self.timers.cancel(&SessionTimer::Hold(live.id));
        self.begin_turn(live);
        Ok(up)
    }

    /// The turn timer ran out. Costs the current participant a lifeline and
    /// moves on; `None` if nothing was awaiting an action.
    pub async fn expire_turn(
        self: &Arc<Self>,
        session_id: i64,
    ) -> Result<Option<TimeoutOutcome>, DomainError> {
        let shared = self.live(session_id).await?;
        let (out, ended) = {
            let mut live = shared.lock().await;
            self.expire_turn_locked(&mut live).await?
        };
        if ended {
            self.finish_session(session_id).await;
        }
        Ok(out)
    }

    async fn expire_turn_locked(
        self: &Arc<Self>,
        live: &mut LiveSession,
    ) -> Result<(Option<TimeoutOutcome>, bool), DomainError> {
        ensure_playing(live)?;
        let session_id = live.id;
        let mut next = live.game.clone();
        let Some(out) = next.timeout() else {
            return Ok((None, false));
        };

        let mut events = vec![ArenaEvent::LifelineLost {
            session_id,
            user_id: out.user_id,
            lifelines_left: out.lifelines_left,
        }];
        if out.eliminated {
            events.push(ArenaEvent::ParticipantEliminated {
                session_id,
                user_id: out.user_id,
            });
        }
        info!(
            session_id,
            user_id = out.user_id,
            lifelines_left = out.lifelines_left,
            eliminated = out.eliminated,
            "turn timed out"
        );

        if let Some(survivor) = out.sole_survivor {
            let ended = self
                .terminate_locked(
                    live,
                    next,
                    TerminationReason::OpponentEliminated,
                    Some(survivor),
                    events,
                )
                .await?;
            return Ok((Some(out), ended));
        }

        let rows = seat_rows(live, &next, &[out.user_id]);
        self.persist(session_id, &next, rows).await?;
        live.game = next;
        live.pending_bot = None;
        for event in events {
            self.emit(live, event);
        }
        self.begin_turn(live);
        Ok((Some(out), false))
    }

    pub(super) fn arm_turn_timer(self: &Arc<Self>, session_id: i64) {
        let this = Arc::clone(self);
        self.timers.arm(
            SessionTimer::Turn(session_id),
            self.config.turn_duration,
            move |generation| async move { this.on_turn_timer(session_id, generation).await },
        );
    }

    pub(super) fn arm_hold_timer(self: &Arc<Self>, session_id: i64) {
        let this = Arc::clone(self);
        self.timers.arm(
            SessionTimer::Hold(session_id),
            self.config.reveal_hold,
            move |generation| async move { this.on_hold_timer(session_id, generation).await },
        );
    }

    async fn on_turn_timer(self: Arc<Self>, session_id: i64, generation: u64) {
        let Some(shared) = self.registry.get(session_id) else {
            return;
        };
        let ended = {
            let mut live = shared.lock().await;
            if !self.timers.take_if_current(&SessionTimer::Turn(session_id), generation) {
                debug!(session_id, "stale turn timer");
                return;
            }
            match self.expire_turn_locked(&mut live).await {
                Ok((_, ended)) => ended,
                Err(e) => {
                    warn!(session_id, error = %e, "turn expiry failed");
                    false
                }
            }
        };
        if ended {
            self.finish_session(session_id).await;
        }
    }

    async fn on_hold_timer(self: Arc<Self>, session_id: i64, generation: u64) {
        let Some(shared) = self.registry.get(session_id) else {
            return;
        };
        let mut live = shared.lock().await;
        if !self.timers.take_if_current(&SessionTimer::Hold(session_id), generation) {
            return;
        }
        if let Err(e) = self.finish_resolution_locked(&mut live).await {
            warn!(session_id, error = %e, "ending reveal hold failed");
        }
    }
}
