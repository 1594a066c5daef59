//! Submission: validate, persist as queued, offer to the executors.

use super::Shared;
use crate::descriptor;
use crate::error::CoreError;
use crate::job_db::{JobId, NewJob};

/// A descriptor file uploaded by the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedDescriptor {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for UploadedDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedDescriptor")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// What to download and for whom. At least one locator must be present;
/// the magnet link takes precedence when several are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadRequest {
    pub user_id: String,
    pub target_id: String,
    pub magnet: Option<String>,
    pub descriptor_url: Option<String>,
    pub descriptor: Option<UploadedDescriptor>,
}

impl DownloadRequest {
    pub fn magnet(user_id: &str, target_id: &str, magnet: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            target_id: target_id.to_string(),
            magnet: Some(magnet.to_string()),
            ..Self::default()
        }
    }

    pub fn descriptor_url(user_id: &str, target_id: &str, url: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            target_id: target_id.to_string(),
            descriptor_url: Some(url.to_string()),
            ..Self::default()
        }
    }

    pub fn uploaded(user_id: &str, target_id: &str, file_name: &str, bytes: Vec<u8>) -> Self {
        Self {
            user_id: user_id.to_string(),
            target_id: target_id.to_string(),
            descriptor: Some(UploadedDescriptor {
                file_name: file_name.to_string(),
                bytes,
            }),
            ..Self::default()
        }
    }
}

fn invalid(msg: impl Into<String>) -> CoreError {
    CoreError::InvalidRequest(msg.into())
}

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn validate_magnet(magnet: &str) -> Result<(), CoreError> {
    if !magnet.to_ascii_lowercase().starts_with("magnet:?") {
        return Err(invalid(format!("not a magnet link: {}", magnet)));
    }
    Ok(())
}

fn validate_descriptor_url(raw: &str) -> Result<(), CoreError> {
    let parsed = url::Url::parse(raw).map_err(|e| invalid(format!("descriptor URL {}: {}", raw, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported descriptor URL scheme: {}", other))),
    }
}

/// Checks a request and returns the row to insert plus any upload to cache.
fn validate(request: &DownloadRequest) -> Result<(NewJob, Option<(String, &[u8])>), CoreError> {
    if request.user_id.trim().is_empty() {
        return Err(invalid("missing user id"));
    }
    if request.target_id.trim().is_empty() {
        return Err(invalid("missing target id"));
    }
    let magnet = non_blank(&request.magnet);
    let url = non_blank(&request.descriptor_url);
    if let Some(m) = magnet {
        validate_magnet(m)?;
    }
    if let Some(u) = url {
        validate_descriptor_url(u)?;
    }

    let upload = match &request.descriptor {
        Some(_) if url.is_some() => {
            return Err(invalid("both a descriptor URL and an uploaded descriptor given"))
        }
        Some(d) => {
            if d.bytes.is_empty() {
                return Err(invalid("uploaded descriptor is empty"));
            }
            let name = descriptor::cached_name(&request.target_id, &d.file_name)
                .ok_or_else(|| invalid(format!("unusable descriptor file name: {:?}", d.file_name)))?;
            Some((name, d.bytes.as_slice()))
        }
        None => None,
    };

    if magnet.is_none() && url.is_none() && upload.is_none() {
        return Err(invalid("no magnet link or descriptor provided"));
    }

    let new_job = NewJob {
        user_id: request.user_id.trim().to_string(),
        target_id: request.target_id.trim().to_string(),
        magnet_url: magnet.map(str::to_string),
        descriptor_url: url
            .map(str::to_string)
            .or_else(|| upload.as_ref().map(|(name, _)| name.clone())),
    };
    Ok((new_job, upload))
}

pub(super) async fn submit(shared: &Shared, request: DownloadRequest) -> Result<JobId, CoreError> {
    let (new_job, upload) = validate(&request)?;
    if let Some((name, bytes)) = upload {
        let path = descriptor::store(&shared.descriptor_dir, &name, bytes).await?;
        tracing::debug!("cached uploaded descriptor at {}", path.display());
    }

    let id = shared.db.create_job(&new_job).await?;
    tracing::info!(job_id = id, user = %new_job.user_id, target = %new_job.target_id, "job queued");

    match shared.queue.try_enqueue(id) {
        Ok(()) => {}
        Err(CoreError::QueueSaturated) => {
            tracing::warn!(job_id = id, "admission queue full; job stays queued for a later sweep")
        }
        Err(e) => tracing::warn!(job_id = id, error = %e, "job not enqueued; stays queued"),
    }
    Ok(id)
}
