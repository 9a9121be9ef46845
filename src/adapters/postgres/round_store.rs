//! PostgreSQL implementation of RoundStore.
//!
//! Per-room serialization comes from the schema and from status-conditioned
//! writes rather than locks:
//! - a partial unique index allows one 'voting' round per room, so a losing
//!   concurrent start gets a unique violation mapped to InvalidState;
//! - casts and reveals are single statements guarded by `status = 'voting'`,
//!   so a race-loser affects zero rows and reports `false`;
//! - reveal writes stats, revealed_at, and status in one UPDATE, keeping the
//!   multi-field reveal atomic even across a crash.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::foundation::{
    DomainError, ErrorCode, ParticipantId, RoomId, RoundId, Timestamp,
};
use crate::domain::round::{CardValue, Round, RoundStatus, Vote, VoteStats};
use crate::ports::RoundStore;

/// PostgreSQL implementation of RoundStore.
#[derive(Clone)]
pub struct PostgresRoundStore {
    pool: PgPool,
}

impl PostgresRoundStore {
    /// Creates a new PostgresRoundStore.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoundStore for PostgresRoundStore {
    async fn current_round(&self, room_id: &RoomId) -> Result<Option<Round>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, room_id, round_number, story_title, status,
                   started_at, revealed_at,
                   stats_average, stats_median, stats_consensus
            FROM rounds
            WHERE room_id = $1
            ORDER BY round_number DESC
            LIMIT 1
            "#,
        )
        .bind(room_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_error("fetch current round", e))?;

        row.map(row_to_round).transpose()
    }

    async fn latest_round_number(&self, room_id: &RoomId) -> Result<u32, DomainError> {
        let result: (i32,) =
            sqlx::query_as("SELECT COALESCE(MAX(round_number), 0) FROM rounds WHERE room_id = $1")
                .bind(room_id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| storage_error("fetch latest round number", e))?;

        Ok(result.0 as u32)
    }

    async fn insert_round(&self, round: &Round) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO rounds (
                id, room_id, round_number, story_title, status, started_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(round.id().as_uuid())
        .bind(round.room_id().as_uuid())
        .bind(round.round_number() as i32)
        .bind(round.story_title())
        .bind(round.status().as_str())
        .bind(round.started_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::invalid_state("room already has a round in voting")
            } else {
                storage_error("insert round", e)
            }
        })?;

        Ok(())
    }

    async fn upsert_vote(&self, vote: &Vote) -> Result<bool, DomainError> {
        // The EXISTS guard and the upsert run as one statement, so a cast
        // racing a reveal cannot slip a row into a revealed round.
        let result = sqlx::query(
            r#"
            INSERT INTO votes (round_id, participant_id, card_value, voted_at)
            SELECT $1, $2, $3, $4
            WHERE EXISTS (
                SELECT 1 FROM rounds WHERE id = $1 AND status = 'voting'
            )
            ON CONFLICT (round_id, participant_id) DO UPDATE
                SET card_value = EXCLUDED.card_value,
                    voted_at = EXCLUDED.voted_at
            "#,
        )
        .bind(vote.round_id().as_uuid())
        .bind(vote.participant_id().as_str())
        .bind(vote.card_value().as_str())
        .bind(vote.voted_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("upsert vote", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn votes_for_round(&self, round_id: &RoundId) -> Result<Vec<Vote>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT round_id, participant_id, card_value, voted_at
            FROM votes
            WHERE round_id = $1
            ORDER BY voted_at
            "#,
        )
        .bind(round_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error("fetch votes", e))?;

        rows.into_iter().map(row_to_vote).collect()
    }

    async fn reveal_round(
        &self,
        round_id: &RoundId,
        stats: &VoteStats,
        revealed_at: Timestamp,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE rounds SET
                status = 'revealed',
                revealed_at = $2,
                stats_average = $3,
                stats_median = $4,
                stats_consensus = $5
            WHERE id = $1 AND status = 'voting'
            "#,
        )
        .bind(round_id.as_uuid())
        .bind(revealed_at.as_datetime())
        .bind(stats.average)
        .bind(stats.median)
        .bind(stats.consensus)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("reveal round", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn reset_round(&self, round_id: &RoundId) -> Result<bool, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_error("begin reset", e))?;

        let flipped = sqlx::query(
            r#"
            UPDATE rounds SET
                status = 'voting',
                revealed_at = NULL,
                stats_average = NULL,
                stats_median = NULL,
                stats_consensus = NULL
            WHERE id = $1 AND status = 'revealed'
            "#,
        )
        .bind(round_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| storage_error("reset round", e))?;

        if flipped.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| storage_error("rollback reset", e))?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM votes WHERE round_id = $1")
            .bind(round_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_error("delete votes", e))?;

        tx.commit()
            .await
            .map_err(|e| storage_error("commit reset", e))?;

        Ok(true)
    }
}

fn storage_error(operation: &str, err: sqlx::Error) -> DomainError {
    DomainError::new(
        ErrorCode::ServiceUnavailable,
        format!("storage failure during {}: {}", operation, err),
    )
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}

fn row_to_round(row: sqlx::postgres::PgRow) -> Result<Round, DomainError> {
    let status: String = get(&row, "status")?;
    let status: RoundStatus = status
        .parse()
        .map_err(|e: String| DomainError::new(ErrorCode::Internal, e))?;

    let average: Option<f64> = get(&row, "stats_average")?;
    let median: Option<f64> = get(&row, "stats_median")?;
    let consensus: Option<bool> = get(&row, "stats_consensus")?;
    let stats = consensus.map(|consensus| VoteStats {
        average,
        median,
        consensus,
    });

    let revealed_at: Option<chrono::DateTime<chrono::Utc>> = get(&row, "revealed_at")?;

    Ok(Round::reconstitute(
        RoundId::from_uuid(get(&row, "id")?),
        RoomId::from_uuid(get(&row, "room_id")?),
        get::<i32>(&row, "round_number")? as u32,
        get(&row, "story_title")?,
        status,
        Timestamp::from_datetime(get(&row, "started_at")?),
        revealed_at.map(Timestamp::from_datetime),
        stats,
    ))
}

fn row_to_vote(row: sqlx::postgres::PgRow) -> Result<Vote, DomainError> {
    let participant_id: String = get(&row, "participant_id")?;
    let card_value: String = get(&row, "card_value")?;

    Ok(Vote::reconstitute(
        RoundId::from_uuid(get(&row, "round_id")?),
        ParticipantId::new(participant_id)
            .map_err(|e| DomainError::new(ErrorCode::Internal, e.to_string()))?,
        CardValue::new(card_value)
            .map_err(|e| DomainError::new(ErrorCode::Internal, e.to_string()))?,
        Timestamp::from_datetime(get(&row, "voted_at")?),
    ))
}

fn get<'r, T>(row: &'r sqlx::postgres::PgRow, column: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| DomainError::new(ErrorCode::Internal, format!("column {}: {}", column, e)))
}
