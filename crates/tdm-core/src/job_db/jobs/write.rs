//! Job write operations: create, save, claim, state changes, remove.
//!
//! Every update returns whether a row was touched so callers can tell a
//! vanished job (deleted by the caller layer) from a successful write.

use anyhow::Result;

use super::super::db::{unix_timestamp, JobDb};
use super::super::types::{Job, JobId, JobState, NewJob};

impl JobDb {
    /// Insert a new queued job.
    ///
    /// Engine identifiers and progress are filled in later by the worker and
    /// the progress monitor.
    pub async fn create_job(&self, job: &NewJob) -> Result<JobId> {
        let now = unix_timestamp();
        let row_id = sqlx::query(
            r#"
            INSERT INTO jobs (
                user_id, target_id, magnet_url, descriptor_url,
                state, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&job.user_id)
        .bind(&job.target_id)
        .bind(&job.magnet_url)
        .bind(&job.descriptor_url)
        .bind(JobState::Queued.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(row_id)
    }

    /// Replace every mutable column of an existing row with `job`'s values.
    /// Returns false if the row no longer exists.
    pub async fn save_job(&self, job: &Job) -> Result<bool> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE jobs
            SET transfer_id = ?1,
                info_hash = ?2,
                state = ?3,
                progress = ?4,
                downloaded_bytes = ?5,
                total_bytes = ?6,
                download_rate = ?7,
                upload_rate = ?8,
                peers = ?9,
                seeds = ?10,
                eta_secs = ?11,
                error = ?12,
                started_at = ?13,
                completed_at = ?14,
                updated_at = ?15
            WHERE id = ?16
            "#,
        )
        .bind(&job.transfer_id)
        .bind(&job.info_hash)
        .bind(job.state.as_str())
        .bind(job.progress)
        .bind(job.downloaded_bytes)
        .bind(job.total_bytes)
        .bind(job.download_rate)
        .bind(job.upload_rate)
        .bind(job.peers)
        .bind(job.seeds)
        .bind(job.eta_secs)
        .bind(&job.error)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(now)
        .bind(job.id)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() > 0)
    }

    /// Atomically move a job from `queued` to `running` and stamp its start time.
    /// Returns false if the job is gone or no longer queued, so two executors
    /// (or an executor and the recovery scanner) never both own it.
    pub async fn claim_queued_job(&self, id: JobId) -> Result<bool> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'running',
                error = NULL,
                started_at = ?1,
                updated_at = ?1
            WHERE id = ?2 AND state = 'queued'
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() > 0)
    }

    /// Update the state of an existing job. Clears the error text unless the
    /// new state is Failed.
    pub async fn set_state(&self, id: JobId, state: JobState) -> Result<bool> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?1,
                error = CASE WHEN ?1 = 'failed' THEN error ELSE NULL END,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(state.as_str())
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() > 0)
    }

    /// Mark a job Failed with a human-readable reason.
    pub async fn set_failed(&self, id: JobId, error: &str) -> Result<bool> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'failed',
                error = ?1,
                download_rate = 0,
                upload_rate = 0,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(error)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() > 0)
    }

    /// Permanently remove a job row from the database.
    ///
    /// Only the caller layer deletes; the orchestration core never does.
    pub async fn remove_job(&self, id: JobId) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
