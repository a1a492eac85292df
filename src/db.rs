use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::errors::StoreError;
use crate::models::{
    Check, CreateTarget, Incident, LastIncident, ReasonCode, ReliabilitySummary, Target,
    TargetSummary,
};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Self::from_pool(pool).await
    }

    /// Wraps an already-connected pool (e.g. one handed to a test by
    /// `#[sqlx::test]`) and runs schema setup against it.
    pub async fn from_pool(pool: PgPool) -> StoreResult<Self> {
        let store = Store { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Additive, idempotent schema setup. Safe to run on every boot.
    async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS targets (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                interval_seconds INTEGER NOT NULL DEFAULT 60,
                timeout_seconds INTEGER NOT NULL DEFAULT 8,
                expected_substring TEXT,
                expected_json_keys JSONB,
                max_latency_ms INTEGER,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );

            CREATE TABLE IF NOT EXISTS checks (
                id BIGSERIAL PRIMARY KEY,
                target_id BIGINT NOT NULL REFERENCES targets(id) ON DELETE CASCADE,
                checked_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                status_code INTEGER,
                latency_ms INTEGER,
                is_up BOOLEAN NOT NULL,
                reason_code TEXT,
                error_message TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_checks_target_time ON checks(target_id, checked_at DESC);
            CREATE INDEX IF NOT EXISTS idx_checks_time ON checks(checked_at DESC);

            CREATE TABLE IF NOT EXISTS incidents (
                id BIGSERIAL PRIMARY KEY,
                target_id BIGINT NOT NULL REFERENCES targets(id) ON DELETE CASCADE,
                started_at TIMESTAMPTZ NOT NULL,
                ended_at TIMESTAMPTZ,
                duration_seconds BIGINT,
                is_resolved BOOLEAN NOT NULL DEFAULT false,
                reason_code TEXT,
                reason_message TEXT,
                start_check_id BIGINT NOT NULL REFERENCES checks(id),
                recovery_check_id BIGINT REFERENCES checks(id)
            );
            CREATE INDEX IF NOT EXISTS idx_incidents_target_started ON incidents(target_id, started_at DESC);
            CREATE INDEX IF NOT EXISTS idx_incidents_target_open ON incidents(target_id, is_resolved);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert_target(&self, input: &CreateTarget) -> StoreResult<Target> {
        let expected_json_keys = input
            .expected_json_keys
            .as_ref()
            .map(|keys| serde_json::json!(keys));

        sqlx::query_as::<_, Target>(
            r#"
            INSERT INTO targets (name, url, interval_seconds, timeout_seconds, expected_substring, expected_json_keys, max_latency_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, url, interval_seconds, timeout_seconds, expected_substring, expected_json_keys, max_latency_ms, created_at
            "#,
        )
        .bind(&input.name)
        .bind(&input.url)
        .bind(input.interval_seconds)
        .bind(input.timeout_seconds)
        .bind(&input.expected_substring)
        .bind(expected_json_keys)
        .bind(input.max_latency_ms)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::DuplicateUrl,
            _ => StoreError::Db(e),
        })
    }

    pub async fn delete_target(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM targets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub async fn select_target_by_id(&self, id: i64) -> StoreResult<Target> {
        sqlx::query_as::<_, Target>(
            "SELECT id, name, url, interval_seconds, timeout_seconds, expected_substring, expected_json_keys, max_latency_ms, created_at FROM targets WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    /// Takes a target-scoped advisory lock, held for the remainder of the
    /// transaction, so a manual check and a concurrent scheduler tick for
    /// the same target serialize instead of racing on the same
    /// read-last/insert-check/apply-incident sequence.
    async fn lock_target(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, target_id: i64) -> StoreResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("target:{target_id}"))
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn select_last_check(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        target_id: i64,
    ) -> StoreResult<Option<Check>> {
        let check = sqlx::query_as::<_, Check>(
            r#"
            SELECT id, target_id, checked_at, status_code, latency_ms, is_up, reason_code, error_message
            FROM checks WHERE target_id = $1 ORDER BY checked_at DESC, id DESC LIMIT 1
            "#,
        )
        .bind(target_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(check)
    }

    pub async fn insert_check_returning_id(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        target_id: i64,
        checked_at: DateTime<Utc>,
        status_code: Option<i32>,
        latency_ms: Option<i32>,
        is_up: bool,
        reason_code: Option<ReasonCode>,
        error_message: &Option<String>,
    ) -> StoreResult<Check> {
        let check = sqlx::query_as::<_, Check>(
            r#"
            INSERT INTO checks (target_id, checked_at, status_code, latency_ms, is_up, reason_code, error_message)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, target_id, checked_at, status_code, latency_ms, is_up, reason_code, error_message
            "#,
        )
        .bind(target_id)
        .bind(checked_at)
        .bind(status_code)
        .bind(latency_ms)
        .bind(is_up)
        .bind(reason_code)
        .bind(error_message)
        .fetch_one(&mut **tx)
        .await?;
        Ok(check)
    }

    pub async fn select_open_incident(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        target_id: i64,
    ) -> StoreResult<Option<(i64, DateTime<Utc>)>> {
        let open: Option<(i64, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, started_at FROM incidents WHERE target_id = $1 AND is_resolved = false LIMIT 1",
        )
        .bind(target_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(open)
    }

    pub async fn insert_incident(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        target_id: i64,
        started_at: DateTime<Utc>,
        reason_code: Option<ReasonCode>,
        reason_message: &Option<String>,
        start_check_id: i64,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO incidents (target_id, started_at, reason_code, reason_message, start_check_id, is_resolved)
            VALUES ($1, $2, $3, $4, $5, false)
            "#,
        )
        .bind(target_id)
        .bind(started_at)
        .bind(reason_code)
        .bind(reason_message)
        .bind(start_check_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn update_incident_resolution(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        incident_id: i64,
        ended_at: DateTime<Utc>,
        duration_seconds: i64,
        recovery_check_id: i64,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE incidents
            SET ended_at = $1, duration_seconds = $2, recovery_check_id = $3, is_resolved = true
            WHERE id = $4
            "#,
        )
        .bind(ended_at)
        .bind(duration_seconds)
        .bind(recovery_check_id)
        .bind(incident_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Orchestrates one check's write path: read-last, insert-check,
    /// apply-incident, commit, all under the target's advisory lock.
    /// This is the single sequence a scheduler tick or a manual check runs.
    pub async fn record_check(
        &self,
        target_id: i64,
        checked_at: DateTime<Utc>,
        status_code: Option<i32>,
        latency_ms: Option<i32>,
        is_up: bool,
        reason_code: Option<ReasonCode>,
        error_message: Option<String>,
    ) -> StoreResult<Check> {
        let mut tx = self.pool.begin().await?;

        Self::lock_target(&mut tx, target_id).await?;

        let prev_up = Self::select_last_check(&mut tx, target_id).await?.map(|c| c.is_up);

        let check = Self::insert_check_returning_id(
            &mut tx,
            target_id,
            checked_at,
            status_code,
            latency_ms,
            is_up,
            reason_code,
            &error_message,
        )
        .await?;

        let open = Self::select_open_incident(&mut tx, target_id).await?;
        let action = crate::incidents::decide_transition(prev_up, is_up, open.is_some());

        match action {
            crate::incidents::IncidentAction::Open => {
                Self::insert_incident(
                    &mut tx,
                    target_id,
                    check.checked_at,
                    reason_code,
                    &error_message,
                    check.id,
                )
                .await?;
            }
            crate::incidents::IncidentAction::Close => {
                if let Some((incident_id, started_at)) = open {
                    let closed = crate::incidents::close_incident(started_at, check.checked_at, check.id);
                    Self::update_incident_resolution(
                        &mut tx,
                        incident_id,
                        closed.ended_at,
                        closed.duration_seconds,
                        closed.recovery_check_id,
                    )
                    .await?;
                }
            }
            crate::incidents::IncidentAction::NoOp => {}
        }

        tx.commit().await?;
        Ok(check)
    }

    pub async fn select_due_targets(&self, now: DateTime<Utc>) -> StoreResult<Vec<Target>> {
        let targets = sqlx::query_as::<_, Target>(
            r#"
            SELECT t.id, t.name, t.url, t.interval_seconds, t.timeout_seconds,
                   t.expected_substring, t.expected_json_keys, t.max_latency_ms, t.created_at
            FROM targets t
            LEFT JOIN LATERAL (
                SELECT checked_at FROM checks c WHERE c.target_id = t.id ORDER BY c.checked_at DESC LIMIT 1
            ) last ON true
            WHERE last.checked_at IS NULL
               OR last.checked_at <= $1 - (t.interval_seconds || ' seconds')::interval
            ORDER BY t.id ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(targets)
    }

    pub async fn select_history(&self, target_id: i64, limit: i64) -> StoreResult<Vec<Check>> {
        let checks = sqlx::query_as::<_, Check>(
            r#"
            SELECT id, target_id, checked_at, status_code, latency_ms, is_up, reason_code, error_message
            FROM checks WHERE target_id = $1 ORDER BY checked_at DESC LIMIT $2
            "#,
        )
        .bind(target_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(checks)
    }

    pub async fn select_incidents(&self, target_id: i64, limit: i64) -> StoreResult<Vec<Incident>> {
        let incidents = sqlx::query_as::<_, Incident>(
            r#"
            SELECT id, target_id, started_at, ended_at, duration_seconds, is_resolved,
                   reason_code, reason_message, start_check_id, recovery_check_id
            FROM incidents WHERE target_id = $1 ORDER BY started_at DESC LIMIT $2
            "#,
        )
        .bind(target_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(incidents)
    }

    pub async fn select_target_summaries(&self) -> StoreResult<Vec<TargetSummary>> {
        let rows = sqlx::query_as::<_, TargetSummary>(
            r#"
            SELECT t.id, t.name, t.url, t.interval_seconds,
                   last.checked_at AS last_checked_at,
                   last.is_up AS last_is_up,
                   last.status_code AS last_status_code,
                   last.latency_ms AS last_latency_ms,
                   last.reason_code AS last_reason_code,
                   last.error_message AS last_error_message,
                   uptime.uptime_24h AS uptime_24h
            FROM targets t
            LEFT JOIN LATERAL (
                SELECT checked_at, is_up, status_code, latency_ms, reason_code, error_message
                FROM checks c WHERE c.target_id = t.id ORDER BY c.checked_at DESC LIMIT 1
            ) last ON true
            LEFT JOIN LATERAL (
                SELECT ROUND(100.0 * AVG(CASE WHEN is_up THEN 1.0 ELSE 0.0 END), 2) AS uptime_24h
                FROM checks c WHERE c.target_id = t.id AND c.checked_at >= now() - interval '24 hours'
            ) uptime ON true
            ORDER BY t.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Same shape as `select_target_summaries`, scoped to one target —
    /// used to return the post-probe summary from `POST /api/targets`.
    pub async fn select_target_summary_by_id(&self, target_id: i64) -> StoreResult<TargetSummary> {
        sqlx::query_as::<_, TargetSummary>(
            r#"
            SELECT t.id, t.name, t.url, t.interval_seconds,
                   last.checked_at AS last_checked_at,
                   last.is_up AS last_is_up,
                   last.status_code AS last_status_code,
                   last.latency_ms AS last_latency_ms,
                   last.reason_code AS last_reason_code,
                   last.error_message AS last_error_message,
                   uptime.uptime_24h AS uptime_24h
            FROM targets t
            LEFT JOIN LATERAL (
                SELECT checked_at, is_up, status_code, latency_ms, reason_code, error_message
                FROM checks c WHERE c.target_id = t.id ORDER BY c.checked_at DESC LIMIT 1
            ) last ON true
            LEFT JOIN LATERAL (
                SELECT ROUND(100.0 * AVG(CASE WHEN is_up THEN 1.0 ELSE 0.0 END), 2) AS uptime_24h
                FROM checks c WHERE c.target_id = t.id AND c.checked_at >= now() - interval '24 hours'
            ) uptime ON true
            WHERE t.id = $1
            "#,
        )
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    pub async fn select_reliability(&self, target_id: Option<i64>) -> StoreResult<ReliabilitySummary> {
        let last_incident = sqlx::query_as::<_, LastIncident>(
            r#"
            SELECT i.id, i.target_id, t.name AS target_name, i.started_at, i.ended_at,
                   i.is_resolved, i.reason_code, i.reason_message
            FROM incidents i JOIN targets t ON t.id = i.target_id
            WHERE $1::bigint IS NULL OR i.target_id = $1
            ORDER BY i.started_at DESC LIMIT 1
            "#,
        )
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await?;

        let (mttr,): (Option<f64>,) = sqlx::query_as(
            r#"
            SELECT AVG(duration_seconds)::float8
            FROM incidents
            WHERE is_resolved = true AND ($1::bigint IS NULL OR target_id = $1)
            "#,
        )
        .bind(target_id)
        .fetch_one(&self.pool)
        .await?;

        let (mtbf,): (Option<f64>,) = sqlx::query_as(
            r#"
            WITH gaps AS (
                SELECT EXTRACT(EPOCH FROM (started_at - LAG(ended_at) OVER (PARTITION BY target_id ORDER BY started_at))) AS gap
                FROM incidents
                WHERE is_resolved = true AND ($1::bigint IS NULL OR target_id = $1)
            )
            SELECT AVG(gap)::float8 FROM gaps WHERE gap > 0
            "#,
        )
        .bind(target_id)
        .fetch_one(&self.pool)
        .await?;

        let (incidents_day,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM incidents WHERE started_at >= now() - interval '1 day' AND ($1::bigint IS NULL OR target_id = $1)",
        )
        .bind(target_id)
        .fetch_one(&self.pool)
        .await?;

        let (incidents_week,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM incidents WHERE started_at >= now() - interval '7 days' AND ($1::bigint IS NULL OR target_id = $1)",
        )
        .bind(target_id)
        .fetch_one(&self.pool)
        .await?;

        let (incidents_month,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM incidents WHERE started_at >= date_trunc('month', now()) AND ($1::bigint IS NULL OR target_id = $1)",
        )
        .bind(target_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ReliabilitySummary {
            last_incident,
            mttr_seconds: mttr,
            mtbf_seconds: mtbf,
            incidents_day,
            incidents_week,
            incidents_month,
        })
    }
}
