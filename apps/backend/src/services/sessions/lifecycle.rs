use std::collections::HashMap;
use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use super::registry::LiveSession;
use super::{current_seat, encode, seat_rows, FormedSession, SessionManager};
use crate::ai::{self, MoveDecisionProvider};
use crate::db::txn::with_retrying_txn;
use crate::domain::seed_derivation::derive_provider_seed;
use crate::domain::{
    Board, GameState, ParticipantStatus, PoolKey, SeatState, SessionStatus, TerminationReason,
    TurnPhase,
};
use crate::entities::sessions;
use crate::errors::domain::{BusinessKind, DomainError, InfraErrorKind};
use crate::events::ArenaEvent;
use crate::repos;

impl SessionManager {
    /// Take ownership of a freshly formed session: deal the board, move it to
    /// PLAYING and start the first turn.
    pub async fn start(self: &Arc<Self>, formed: FormedSession) -> Result<(), DomainError> {
        let session_id = formed.session_id;
        let game = GameState::new(
            Board::shuffled(self.config.board_pairs, formed.rng_seed),
            formed.seats,
        );
        let bots = self.providers_for(&game, formed.rng_seed)?;
        let live = LiveSession {
            id: session_id,
            key: formed.key,
            prize_pool: formed.prize_pool,
            rng_seed: formed.rng_seed,
            status: SessionStatus::Waiting,
            game,
            disconnected_at: HashMap::new(),
            bots,
            pending_bot: None,
        };

        let Some(mut live) = self.registry.insert_locked(live) else {
            debug!(session_id, "session already live");
            return Ok(());
        };

        let payload = encode(&live.game)?;
        let seat = current_seat(&live.game);
        let turn_no = live.game.turn_no as i32;
        let started = with_retrying_txn(&self.db, &self.config.retry, "sessions.start", move |txn| {
            let payload = payload.clone();
            Box::pin(async move {
                repos::sessions::mark_playing(txn, session_id, &payload, seat, turn_no).await
            })
        })
        .await;

        match started {
            Ok(true) => {}
            Ok(false) => {
                self.registry.remove(session_id);
                return Err(DomainError::business(
                    BusinessKind::SessionNotActive,
                    format!("session {session_id} is no longer waiting"),
                ));
            }
            Err(e) => {
                self.registry.remove(session_id);
                error!(session_id, error = %e, "failed to start session");
                return Err(e);
            }
        }

        live.status = SessionStatus::Playing;
        info!(
            session_id,
            pool = %live.key,
            participants = live.game.seats.len(),
            "session started"
        );
        self.emit(
            &live,
            ArenaEvent::SessionStarted {
                session_id,
                board_size: live.game.board.len(),
                lifelines: self.config.lifelines,
            },
        );
        self.begin_turn(&mut live);
        Ok(())
    }

    /// Reload sessions left in play by a previous process. WAITING sessions
    /// are started; PLAYING ones resume with fresh timers.
    pub async fn recover(self: &Arc<Self>) -> Result<usize, DomainError> {
        let mut resumed = 0;

        for row in repos::sessions::list_by_status(&self.db, SessionStatus::Playing).await? {
            if self.registry.contains(row.id) {
                continue;
            }
            let session_id = row.id;
            match self.restore(row).await {
                Ok(()) => resumed += 1,
                Err(e) => error!(session_id, error = %e, "failed to restore session"),
            }
        }

        for row in repos::sessions::list_by_status(&self.db, SessionStatus::Waiting).await? {
            if self.registry.contains(row.id) {
                continue;
            }
            let session_id = row.id;
            match self.formed_from_row(&row).await {
                Ok(formed) => match self.start(formed).await {
                    Ok(()) => resumed += 1,
                    Err(e) => warn!(session_id, error = %e, "failed to start recovered session"),
                },
                Err(e) => error!(session_id, error = %e, "unreadable waiting session"),
            }
        }

        info!(resumed, "session recovery finished");
        Ok(resumed)
    }

    async fn restore(self: &Arc<Self>, row: sessions::Model) -> Result<(), DomainError> {
        let session_id = row.id;
        let game: GameState = match serde_json::from_str(&row.payload) {
            Ok(g) => g,
            Err(e) => {
                self.freeze(session_id).await;
                return Err(DomainError::invariant(format!(
                    "session {session_id} payload is unreadable: {e}"
                )));
            }
        };
        let key = PoolKey::new(row.game_kind.clone(), party_size(&row)?, row.entry_fee)?;
        let disconnected_at = repos::participants::list(&self.db, session_id)
            .await?
            .into_iter()
            .filter_map(|p| p.disconnected_at.map(|at| (p.user_id, at)))
            .collect();
        let bots = self.providers_for(&game, row.rng_seed)?;

        let live = LiveSession {
            id: session_id,
            key,
            prize_pool: row.prize_pool,
            rng_seed: row.rng_seed,
            status: SessionStatus::Playing,
            game,
            disconnected_at,
            bots,
            pending_bot: None,
        };
        let Some(mut live) = self.registry.insert_locked(live) else {
            return Ok(());
        };

        let away: Vec<i64> = live
            .game
            .seats
            .iter()
            .filter(|s| s.status == ParticipantStatus::Disconnected)
            .map(|s| s.user_id)
            .collect();
        for user_id in away {
            self.arm_grace_timer(session_id, user_id);
        }
        if live.game.phase == TurnPhase::Resolving {
            self.arm_hold_timer(session_id);
        } else {
            self.arm_turn_timer(session_id);
            self.schedule_bot_locked(&mut live);
        }
        info!(session_id, "session restored");
        Ok(())
    }

    async fn formed_from_row(&self, row: &sessions::Model) -> Result<FormedSession, DomainError> {
        let seats = repos::participants::list(&self.db, row.id)
            .await?
            .iter()
            .map(repos::participants::to_seat)
            .collect::<Result<Vec<SeatState>, _>>()?;
        Ok(FormedSession {
            session_id: row.id,
            key: PoolKey::new(row.game_kind.clone(), party_size(row)?, row.entry_fee)?,
            prize_pool: row.prize_pool,
            rng_seed: row.rng_seed,
            seats,
        })
    }

    fn providers_for(
        &self,
        game: &GameState,
        rng_seed: i64,
    ) -> Result<HashMap<i64, Box<dyn MoveDecisionProvider>>, DomainError> {
        let factory = ai::by_name(&self.config.bot_provider).ok_or_else(|| {
            DomainError::infra(
                InfraErrorKind::Other("Provider".into()),
                format!("unknown move provider '{}'", self.config.bot_provider),
            )
        })?;
        Ok(game
            .seats
            .iter()
            .filter(|s| s.synthetic)
            .map(|s| {
                let seed = derive_provider_seed(rng_seed, s.user_id);
                (s.user_id, (factory.make)(Some(seed)))
            })
            .collect())
    }

    /// Write turn progress and the given participants' rows.
    pub(super) async fn persist(
        &self,
        session_id: i64,
        next: &GameState,
        seats: Vec<(SeatState, Option<OffsetDateTime>)>,
    ) -> Result<(), DomainError> {
        let payload = encode(next)?;
        let seat = current_seat(next);
        let turn_no = next.turn_no as i32;
        with_retrying_txn(&self.db, &self.config.retry, "sessions.persist", move |txn| {
            let payload = payload.clone();
            let seats = seats.clone();
            Box::pin(async move {
                repos::sessions::save_progress(txn, session_id, &payload, seat, turn_no).await?;
                for (state, away_since) in &seats {
                    repos::participants::update_seat(txn, session_id, state, *away_since).await?;
                }
                Ok(())
            })
        })
        .await
    }

    /// Record the outcome and move to SETTLEMENT_PENDING in one write, then
    /// announce the end. `prelude` events go out just before `SessionEnded`.
    ///
    /// Returns false if the session had already left play; nothing is
    /// announced twice.
    pub(super) async fn terminate_locked(
        &self,
        live: &mut LiveSession,
        next: GameState,
        reason: TerminationReason,
        winner: Option<i64>,
        prelude: Vec<ArenaEvent>,
    ) -> Result<bool, DomainError> {
        reason.outcome(winner)?;
        let session_id = live.id;
        let payload = encode(&next)?;
        let everyone = live.participants();
        let seats = seat_rows(live, &next, &everyone);

        let moved = with_retrying_txn(&self.db, &self.config.retry, "sessions.terminate", move |txn| {
            let payload = payload.clone();
            let seats = seats.clone();
            Box::pin(async move {
                let moved = repos::sessions::mark_settlement_pending(
                    txn,
                    session_id,
                    reason,
                    winner,
                    Some(&payload),
                )
                .await?;
                if moved {
                    for (state, away_since) in &seats {
                        repos::participants::update_seat(txn, session_id, state, *away_since)
                            .await?;
                    }
                }
                Ok(moved)
            })
        })
        .await?;

        if !moved {
            debug!(session_id, "session already terminated");
            return Ok(false);
        }

        live.game = next;
        live.status = SessionStatus::SettlementPending;
        live.pending_bot = None;
        self.timers.cancel_where(|t| t.session_id() == session_id);

        info!(session_id, reason = reason.as_str(), winner, "session ended");
        for event in prelude {
            self.emit(live, event);
        }
        self.emit(
            live,
            ArenaEvent::SessionEnded {
                session_id,
                reason,
                winner,
            },
        );
        Ok(true)
    }

    /// Announce whose turn it is and arm the turn timer.
    pub(super) fn begin_turn(self: &Arc<Self>, live: &mut LiveSession) {
        let Some(user_id) = live.game.current_user() else {
            return;
        };
        self.emit(
            live,
            ArenaEvent::TurnChanged {
                session_id: live.id,
                user_id,
                turn_no: live.game.turn_no,
            },
        );
        self.arm_turn_timer(live.id);
        self.schedule_bot_locked(live);
    }
}

fn party_size(row: &sessions::Model) -> Result<u8, DomainError> {
    u8::try_from(row.party_size)
        .map_err(|_| DomainError::invariant(format!("party size {} out of range", row.party_size)))
}
