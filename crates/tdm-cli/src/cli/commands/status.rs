//! `tdm status` – show status of all jobs.

use anyhow::Result;
use tdm_core::job_db::{Job, JobDb};

fn mib(bytes: i64) -> f64 {
    bytes as f64 / 1_048_576.0
}

fn size_column(j: &Job) -> String {
    if j.total_bytes > 0 {
        format!("{:.1}/{:.1}M", mib(j.downloaded_bytes), mib(j.total_bytes))
    } else {
        "-".to_string()
    }
}

pub async fn run_status(db: &JobDb) -> Result<()> {
    let jobs = db.list_jobs().await?;
    if jobs.is_empty() {
        println!("No jobs in database.");
        return Ok(());
    }
    println!(
        "{:<6} {:<10} {:>7} {:<16} {:>10} {:<12} {:<16} {}",
        "ID", "STATE", "PROG", "SIZE", "RATE", "USER", "TARGET", "ERROR"
    );
    for j in jobs {
        println!(
            "{:<6} {:<10} {:>6.1}% {:<16} {:>8.2}M/s {:<12} {:<16} {}",
            j.id,
            j.state.as_str(),
            j.progress,
            size_column(&j),
            mib(j.download_rate),
            j.user_id,
            j.target_id,
            j.error.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
