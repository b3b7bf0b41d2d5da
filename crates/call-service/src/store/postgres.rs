//! Postgres-backed call record store.
//!
//! # Security
//!
//! - All queries use parameterized statements (SQL injection safe)
//! - Device addresses are never logged
//! - Conditional UPDATEs implement the concurrency contract atomically;
//!   no read-modify-write cycles

use crate::errors::CallError;
use crate::models::{CallContext, CallRow, ParticipantRow, ResolvedRecipient};
use crate::store::CallStore;
use chrono::{DateTime, Utc};
use common::types::{
    ApartmentId, BridgeSessionId, BuildingId, CallId, CallStatus, DoormanId, ParticipantStatus,
    ResidentId,
};
use sqlx::{PgPool, Row};
use tracing::instrument;

/// Call record store backed by Postgres.
pub struct PgCallStore {
    pool: PgPool,
}

impl PgCallStore {
    /// Create a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CallStore for PgCallStore {
    #[instrument(skip_all, name = "call.store.resolve_recipients", fields(apartment_id = %apartment_id))]
    async fn resolve_recipients(
        &self,
        apartment_id: ApartmentId,
    ) -> Result<Vec<ResolvedRecipient>, CallError> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT ON (r.resident_id) r.resident_id, d.device_address
            FROM residents r
            JOIN resident_devices d ON d.resident_id = r.resident_id
            WHERE r.apartment_id = $1
              AND r.notifications_enabled = true
              AND d.is_active = true
            ORDER BY r.resident_id, d.registered_at DESC
            "#,
        )
        .bind(apartment_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CallError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| ResolvedRecipient {
                resident_id: ResidentId(row.get("resident_id")),
                device_address: row.get("device_address"),
            })
            .collect())
    }

    #[instrument(skip_all, name = "call.store.get_call_context", fields(apartment_id = %apartment_id))]
    async fn get_call_context(
        &self,
        apartment_id: ApartmentId,
        doorman_id: DoormanId,
    ) -> Result<Option<CallContext>, CallError> {
        let row = sqlx::query(
            r#"
            SELECT a.label AS apartment_label, d.display_name AS doorman_name
            FROM apartments a, doormen d
            WHERE a.apartment_id = $1 AND d.doorman_id = $2
            "#,
        )
        .bind(apartment_id.0)
        .bind(doorman_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CallError::Database(e.to_string()))?;

        Ok(row.map(|row| CallContext {
            apartment_label: row.get("apartment_label"),
            doorman_name: row.get("doorman_name"),
        }))
    }

    #[instrument(skip_all, name = "call.store.create_call", fields(apartment_id = %apartment_id))]
    async fn create_call(
        &self,
        apartment_id: ApartmentId,
        doorman_id: DoormanId,
        building_id: BuildingId,
        channel_ref: &str,
        recipients: &[ResolvedRecipient],
    ) -> Result<CallRow, CallError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CallError::Database(e.to_string()))?;

        let call_id = CallId::new();
        let row = sqlx::query(
            r#"
            INSERT INTO calls (
                call_id, apartment_id, doorman_id, building_id,
                status, channel_ref
            )
            VALUES ($1, $2, $3, $4, 'ringing', $5)
            RETURNING
                call_id, apartment_id, doorman_id, building_id, status,
                bridge_session_id, channel_ref, started_at, answered_at,
                ended_at, duration_seconds
            "#,
        )
        .bind(call_id.0)
        .bind(apartment_id.0)
        .bind(doorman_id.0)
        .bind(building_id.0)
        .bind(channel_ref)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            // The partial unique index on (apartment_id) WHERE status = 'ringing'
            // rejects a second concurrent call for the same apartment.
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return CallError::CallAlreadyActive;
                }
            }
            CallError::Database(e.to_string())
        })?;

        for recipient in recipients {
            sqlx::query(
                r#"
                INSERT INTO call_participants (call_id, resident_id, status, device_address)
                VALUES ($1, $2, 'invited', $3)
                "#,
            )
            .bind(call_id.0)
            .bind(recipient.resident_id.0)
            .bind(&recipient.device_address)
            .execute(&mut *tx)
            .await
            .map_err(|e| CallError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| CallError::Database(e.to_string()))?;

        map_row_to_call(&row)
    }

    #[instrument(skip_all, name = "call.store.get_call", fields(call_id = %call_id))]
    async fn get_call(&self, call_id: CallId) -> Result<Option<CallRow>, CallError> {
        let row = sqlx::query(
            r#"
            SELECT call_id, apartment_id, doorman_id, building_id, status,
                   bridge_session_id, channel_ref, started_at, answered_at,
                   ended_at, duration_seconds
            FROM calls
            WHERE call_id = $1
            "#,
        )
        .bind(call_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CallError::Database(e.to_string()))?;

        row.as_ref().map(map_row_to_call).transpose()
    }

    #[instrument(skip_all, name = "call.store.get_call_by_bridge_session")]
    async fn get_call_by_bridge_session(
        &self,
        bridge_session_id: &BridgeSessionId,
    ) -> Result<Option<CallRow>, CallError> {
        let row = sqlx::query(
            r#"
            SELECT call_id, apartment_id, doorman_id, building_id, status,
                   bridge_session_id, channel_ref, started_at, answered_at,
                   ended_at, duration_seconds
            FROM calls
            WHERE bridge_session_id = $1
            "#,
        )
        .bind(&bridge_session_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CallError::Database(e.to_string()))?;

        row.as_ref().map(map_row_to_call).transpose()
    }

    #[instrument(skip_all, name = "call.store.get_participants", fields(call_id = %call_id))]
    async fn get_participants(&self, call_id: CallId) -> Result<Vec<ParticipantRow>, CallError> {
        let rows = sqlx::query(
            r#"
            SELECT call_id, resident_id, status, device_address, answered_at
            FROM call_participants
            WHERE call_id = $1
            ORDER BY resident_id
            "#,
        )
        .bind(call_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CallError::Database(e.to_string()))?;

        rows.iter().map(map_row_to_participant).collect()
    }

    #[instrument(skip_all, name = "call.store.claim_answer", fields(call_id = %call_id))]
    async fn claim_answer(&self, call_id: CallId) -> Result<Option<CallRow>, CallError> {
        // First answer wins: the WHERE clause serializes concurrent claims.
        let row = sqlx::query(
            r#"
            UPDATE calls
            SET status = 'answered', answered_at = NOW()
            WHERE call_id = $1 AND status = 'ringing'
            RETURNING
                call_id, apartment_id, doorman_id, building_id, status,
                bridge_session_id, channel_ref, started_at, answered_at,
                ended_at, duration_seconds
            "#,
        )
        .bind(call_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CallError::Database(e.to_string()))?;

        row.as_ref().map(map_row_to_call).transpose()
    }

    #[instrument(skip_all, name = "call.store.set_bridge_session", fields(call_id = %call_id))]
    async fn set_bridge_session(
        &self,
        call_id: CallId,
        bridge_session_id: &BridgeSessionId,
    ) -> Result<bool, CallError> {
        let result = sqlx::query(
            r#"
            UPDATE calls
            SET bridge_session_id = $2
            WHERE call_id = $1 AND bridge_session_id IS NULL
            "#,
        )
        .bind(call_id.0)
        .bind(&bridge_session_id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| CallError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip_all, name = "call.store.record_participant_answer", fields(call_id = %call_id))]
    async fn record_participant_answer(
        &self,
        call_id: CallId,
        resident_id: ResidentId,
        answered_at: DateTime<Utc>,
    ) -> Result<(), CallError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CallError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE call_participants
            SET status = 'answered', answered_at = $3
            WHERE call_id = $1 AND resident_id = $2
            "#,
        )
        .bind(call_id.0)
        .bind(resident_id.0)
        .bind(answered_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| CallError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE call_participants
            SET status = 'missed'
            WHERE call_id = $1 AND resident_id != $2 AND status = 'invited'
            "#,
        )
        .bind(call_id.0)
        .bind(resident_id.0)
        .execute(&mut *tx)
        .await
        .map_err(|e| CallError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| CallError::Database(e.to_string()))?;

        Ok(())
    }

    #[instrument(skip_all, name = "call.store.finish_call", fields(call_id = %call_id))]
    async fn finish_call(
        &self,
        call_id: CallId,
        ended_at: DateTime<Utc>,
        duration_seconds: Option<i32>,
    ) -> Result<Option<CallRow>, CallError> {
        // Idempotent: a second hangup matches zero rows.
        let row = sqlx::query(
            r#"
            UPDATE calls
            SET status = 'ended',
                ended_at = $2,
                duration_seconds = COALESCE($3, EXTRACT(EPOCH FROM ($2 - started_at))::INT)
            WHERE call_id = $1 AND status != 'ended'
            RETURNING
                call_id, apartment_id, doorman_id, building_id, status,
                bridge_session_id, channel_ref, started_at, answered_at,
                ended_at, duration_seconds
            "#,
        )
        .bind(call_id.0)
        .bind(ended_at)
        .bind(duration_seconds)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CallError::Database(e.to_string()))?;

        row.as_ref().map(map_row_to_call).transpose()
    }
}

/// Map a database row to a CallRow struct.
///
/// Shared by all queries that return call rows to avoid field-by-field
/// mapping duplication.
fn map_row_to_call(row: &sqlx::postgres::PgRow) -> Result<CallRow, CallError> {
    let status: String = row.get("status");
    let status = CallStatus::parse(&status)
        .ok_or_else(|| CallError::Database(format!("unknown call status '{status}'")))?;

    let bridge_session_id: Option<String> = row.get("bridge_session_id");

    Ok(CallRow {
        call_id: CallId(row.get("call_id")),
        apartment_id: ApartmentId(row.get("apartment_id")),
        doorman_id: DoormanId(row.get("doorman_id")),
        building_id: BuildingId(row.get("building_id")),
        status,
        bridge_session_id: bridge_session_id.map(BridgeSessionId),
        channel_ref: row.get("channel_ref"),
        started_at: row.get("started_at"),
        answered_at: row.get("answered_at"),
        ended_at: row.get("ended_at"),
        duration_seconds: row.get("duration_seconds"),
    })
}

/// Map a database row to a ParticipantRow struct.
fn map_row_to_participant(row: &sqlx::postgres::PgRow) -> Result<ParticipantRow, CallError> {
    let status: String = row.get("status");
    let status = ParticipantStatus::parse(&status)
        .ok_or_else(|| CallError::Database(format!("unknown participant status '{status}'")))?;

    Ok(ParticipantRow {
        call_id: CallId(row.get("call_id")),
        resident_id: ResidentId(row.get("resident_id")),
        status,
        device_address: row.get("device_address"),
        answered_at: row.get("answered_at"),
    })
}
