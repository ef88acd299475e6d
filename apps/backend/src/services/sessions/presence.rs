//! Quits, disconnects and the reconnect grace window.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, warn};

use super::registry::{LiveSession, SessionTimer};
use super::{ensure_playing, seat_rows, SessionManager};
use crate::domain::{ParticipantStatus, TerminationReason};
use crate::errors::domain::{BusinessKind, DomainError};
use crate::events::ArenaEvent;

/// What a lapsed grace window did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraceExpiry {
    /// Reconnected in time, or the session already moved on
    Ignored,
    /// Dropped from rotation; the others play on
    Dropped,
    Ended(TerminationReason),
}

fn not_seated(session_id: i64, user_id: i64) -> DomainError {
    DomainError::business(
        BusinessKind::NotAParticipant,
        format!("user {user_id} is not seated in session {session_id}"),
    )
}

impl SessionManager {
    /// Leave a session in play. A participant already out of rotation is a no-op.
    pub async fn quit(self: &Arc<Self>, session_id: i64, user_id: i64) -> Result<(), DomainError> {
        let shared = self.live(session_id).await?;
        let ended = {
            let mut live = shared.lock().await;
            self.remove_locked(&mut live, user_id).await?
        };
        if ended {
            self.finish_session(session_id).await;
        }
        Ok(())
    }

    /// Take `user_id` out of rotation as QUIT. Returns whether the session ended.
    async fn remove_locked(
        self: &Arc<Self>,
        live: &mut LiveSession,
        user_id: i64,
    ) -> Result<bool, DomainError> {
        ensure_playing(live)?;
        let session_id = live.id;
        let mut next = live.game.clone();
        let Some(removal) = next.remove(user_id, ParticipantStatus::Quit) else {
            return match live.game.seat(user_id) {
                Some(_) => Ok(false),
                None => Err(not_seated(session_id, user_id)),
            };
        };

        let away_since = live.disconnected_at.remove(&user_id);
        self.timers.cancel(&SessionTimer::Grace {
            session_id,
            user_id,
        });
        info!(session_id, user_id, "participant quit");
        let quit = ArenaEvent::ParticipantQuit {
            session_id,
            user_id,
        };

        let written = match removal.sole_survivor {
            Some(survivor) => {
                self.terminate_locked(
                    live,
                    next.clone(),
                    TerminationReason::OpponentQuit,
                    Some(survivor),
                    vec![quit.clone()],
                )
                .await
            }
            None => {
                let rows = seat_rows(live, &next, &[user_id]);
                self.persist(session_id, &next, rows).await.map(|()| false)
            }
        };
        let ended = match written {
            Ok(ended) => ended,
            Err(e) => {
                if let Some(at) = away_since {
                    live.disconnected_at.insert(user_id, at);
                }
                return Err(e);
            }
        };
        if removal.sole_survivor.is_some() {
            return Ok(ended);
        }

        live.game = next;
        self.emit(live, quit);
        if removal.was_current {
            live.pending_bot = None;
            self.timers.cancel(&SessionTimer::Hold(session_id));
            self.begin_turn(live);
        }
        Ok(false)
    }

    /// Mark a participant as away and start their grace window. The turn
    /// rotation is unchanged. Returns false if they were already away.
    pub async fn disconnect(
        self: &Arc<Self>,
        session_id: i64,
        user_id: i64,
    ) -> Result<bool, DomainError> {
        let shared = self.live(session_id).await?;
        let mut live = shared.lock().await;
        ensure_playing(&live)?;

        let mut next = live.game.clone();
        if !next.set_connected(user_id, false) {
            return match live.game.seat(user_id) {
                Some(_) => Ok(false),
                None => Err(not_seated(session_id, user_id)),
            };
        }

        live.disconnected_at.insert(user_id, OffsetDateTime::now_utc());
        let rows = seat_rows(&live, &next, &[user_id]);
        if let Err(e) = self.persist(session_id, &next, rows).await {
            live.disconnected_at.remove(&user_id);
            return Err(e);
        }
        live.game = next;
        info!(session_id, user_id, "participant disconnected");
        self.emit(
            &live,
            ArenaEvent::ParticipantDisconnected {
                session_id,
                user_id,
            },
        );
        self.arm_grace_timer(session_id, user_id);
        Ok(true)
    }

    /// Returns false if the participant was not away.
    pub async fn reconnect(
        self: &Arc<Self>,
        session_id: i64,
        user_id: i64,
    ) -> Result<bool, DomainError> {
        let shared = self.live(session_id).await?;
        let mut live = shared.lock().await;
        ensure_playing(&live)?;

        let mut next = live.game.clone();
        if !next.set_connected(user_id, true) {
            return match live.game.seat(user_id) {
                Some(_) => Ok(false),
                None => Err(not_seated(session_id, user_id)),
            };
        }

        let away_since = live.disconnected_at.remove(&user_id);
        let rows = seat_rows(&live, &next, &[user_id]);
        if let Err(e) = self.persist(session_id, &next, rows).await {
            if let Some(at) = away_since {
                live.disconnected_at.insert(user_id, at);
            }
            return Err(e);
        }
        live.game = next;
        self.timers.cancel(&SessionTimer::Grace {
            session_id,
            user_id,
        });
        info!(session_id, user_id, "participant reconnected");
        self.emit(
            &live,
            ArenaEvent::ParticipantReconnected {
                session_id,
                user_id,
            },
        );
        Ok(true)
    }

    /// The grace window lapsed without a reconnect. With one other
    /// participant left the session is called off and refunded; with more,
    /// the absent participant is dropped and play continues.
    pub async fn expire_grace(
        self: &Arc<Self>,
        session_id: i64,
        user_id: i64,
    ) -> Result<GraceExpiry, DomainError> {
        let shared = self.live(session_id).await?;
        let expiry = {
            let mut live = shared.lock().await;
            self.expire_grace_locked(&mut live, user_id).await?
        };
        if matches!(expiry, GraceExpiry::Ended(_)) {
            self.finish_session(session_id).await;
        }
        Ok(expiry)
    }

    async fn expire_grace_locked(
        self: &Arc<Self>,
        live: &mut LiveSession,
        user_id: i64,
    ) -> Result<GraceExpiry, DomainError> {
        if ensure_playing(live).is_err() {
            return Ok(GraceExpiry::Ignored);
        }
        let away = live
            .game
            .seat(user_id)
            .is_some_and(|s| s.status == ParticipantStatus::Disconnected);
        if !away {
            return Ok(GraceExpiry::Ignored);
        }

        let others = live
            .game
            .in_rotation()
            .filter(|s| s.user_id != user_id)
            .count();
        if others > 1 {
            warn!(session_id = live.id, user_id, "grace lapsed, dropping participant");
            self.remove_locked(live, user_id).await?;
            return Ok(GraceExpiry::Dropped);
        }

        warn!(session_id = live.id, user_id, "grace lapsed, calling off session");
        let next = live.game.clone();
        let ended = self
            .terminate_locked(live, next, TerminationReason::NetworkIssue, None, Vec::new())
            .await?;
        Ok(if ended {
            GraceExpiry::Ended(TerminationReason::NetworkIssue)
        } else {
            GraceExpiry::Ignored
        })
    }

    pub(super) fn arm_grace_timer(self: &Arc<Self>, session_id: i64, user_id: i64) {
        let this = Arc::clone(self);
        self.timers.arm(
            SessionTimer::Grace {
                session_id,
                user_id,
            },
            self.config.reconnect_grace,
            move |generation| async move {
                this.on_grace_timer(session_id, user_id, generation).await
            },
        );
    }

    async fn on_grace_timer(self: Arc<Self>, session_id: i64, user_id: i64, generation: u64) {
        let Some(shared) = self.registry.get(session_id) else {
            return;
        };
        let expiry = {
            let mut live = shared.lock().await;
            let timer = SessionTimer::Grace {
                session_id,
                user_id,
            };
            if !self.timers.take_if_current(&timer, generation) {
                return;
            }
            match self.expire_grace_locked(&mut live, user_id).await {
                Ok(expiry) => expiry,
                Err(e) => {
                    warn!(session_id, user_id, error = %e, "grace expiry failed");
                    GraceExpiry::Ignored
                }
            }
        };
        if matches!(expiry, GraceExpiry::Ended(_)) {
            self.finish_session(session_id).await;
        }
    }
}
