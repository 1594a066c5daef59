//! Cache for uploaded transfer descriptors (.torrent files).
//!
//! Uploaded bytes are written under the descriptor directory at admission; the
//! job row keeps only the cached file name, and the executor reads it back.

use std::io;
use std::path::{Path, PathBuf};

const NAME_MAX: usize = 255;

/// Sanitizes an uploaded file name into a single safe path component.
///
/// - Replaces NUL, `/`, `\`, whitespace and control characters with `_`
/// - Collapses consecutive underscores
/// - Trims leading/trailing dots and underscores (no `..`, no hidden files)
/// - Limits length to 255 bytes
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let replacement = if c == '\0' || c == '/' || c == '\\' || c.is_control() || c.is_whitespace() {
            '_'
        } else {
            c
        };

        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');

    if trimmed.len() > NAME_MAX {
        let mut take = NAME_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed[..take].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Cache name for an upload: `<target>-<file name>`, sanitized.
/// None when nothing usable remains.
pub fn cached_name(target_id: &str, uploaded_name: &str) -> Option<String> {
    let base = uploaded_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(uploaded_name);
    let base = sanitize_file_name(base);
    if base.is_empty() {
        return None;
    }
    let target = sanitize_file_name(target_id);
    if target.is_empty() {
        return Some(base);
    }
    Some(format!("{}-{}", target, base))
}

fn path_for(dir: &Path, name: &str) -> io::Result<PathBuf> {
    if name.is_empty() || sanitize_file_name(name) != name {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsafe descriptor name: {:?}", name),
        ));
    }
    Ok(dir.join(name))
}

/// Write `bytes` as `name` under `dir`, creating the directory if needed.
pub async fn store(dir: &Path, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    let path = path_for(dir, name)?;
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

/// Read the cached descriptor `name` from `dir`.
pub async fn load(dir: &Path, name: &str) -> io::Result<Vec<u8>> {
    let path = path_for(dir, name)?;
    tokio::fs::read(path).await
}
