//! Job read operations: list, get, and lookup by state.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::super::db::JobDb;
use super::super::types::{Job, JobId, JobState};

const JOB_COLUMNS: &str = r#"
    id, user_id, target_id, magnet_url, descriptor_url, transfer_id, info_hash,
    state, progress, downloaded_bytes, total_bytes, download_rate, upload_rate,
    peers, seeds, eta_secs, error, started_at, completed_at, created_at, updated_at
"#;

fn job_from_row(row: &SqliteRow) -> Job {
    let state_str: String = row.get("state");
    Job {
        id: row.get("id"),
        user_id: row.get("user_id"),
        target_id: row.get("target_id"),
        magnet_url: row.get("magnet_url"),
        descriptor_url: row.get("descriptor_url"),
        transfer_id: row.get("transfer_id"),
        info_hash: row.get("info_hash"),
        state: JobState::from_str(&state_str),
        progress: row.get("progress"),
        downloaded_bytes: row.get("downloaded_bytes"),
        total_bytes: row.get("total_bytes"),
        download_rate: row.get("download_rate"),
        upload_rate: row.get("upload_rate"),
        peers: row.get("peers"),
        seeds: row.get("seeds"),
        eta_secs: row.get("eta_secs"),
        error: row.get("error"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl JobDb {
    /// List all jobs in the database, newest first.
    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        let sql = format!(
            "SELECT {} FROM jobs ORDER BY created_at DESC, id DESC",
            JOB_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(job_from_row).collect())
    }

    /// Fetch a single job row.
    pub async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        let sql = format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(job_from_row))
    }

    /// All jobs whose state is one of `states`, oldest first (admission order).
    pub async fn find_by_states(&self, states: &[JobState]) -> Result<Vec<Job>> {
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = (1..=states.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM jobs WHERE state IN ({}) ORDER BY id ASC",
            JOB_COLUMNS, placeholders
        );
        let mut query = sqlx::query(&sql);
        for state in states {
            query = query.bind(state.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(job_from_row).collect())
    }
}
