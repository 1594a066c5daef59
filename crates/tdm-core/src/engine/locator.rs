//! Locators: what the engine is asked to fetch.

use std::fmt;

/// Content identifier handed to [`super::TransferEngine::start`].
#[derive(Clone, PartialEq, Eq)]
pub enum Locator {
    /// `magnet:?xt=...` URI.
    Magnet(String),
    /// Remote descriptor (.torrent) URL; the engine fetches and parses it.
    DescriptorUrl(String),
    /// Raw descriptor bytes.
    DescriptorBytes(Vec<u8>),
}

impl Locator {
    pub fn kind(&self) -> &'static str {
        match self {
            Locator::Magnet(_) => "magnet",
            Locator::DescriptorUrl(_) => "descriptor-url",
            Locator::DescriptorBytes(_) => "descriptor-bytes",
        }
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Magnet(m) => f.debug_tuple("Magnet").field(m).finish(),
            Locator::DescriptorUrl(u) => f.debug_tuple("DescriptorUrl").field(u).finish(),
            Locator::DescriptorBytes(b) => write!(f, "DescriptorBytes({} bytes)", b.len()),
        }
    }
}

/// True for `http://` and `https://` locations (case-insensitive scheme).
/// Anything else stored in a descriptor field is a cached file name.
pub fn is_remote_url(s: &str) -> bool {
    let s = s.trim_start();
    let lower = s.get(..8).unwrap_or(s).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_url_detection() {
        assert!(is_remote_url("https://tracker.example/file.torrent"));
        assert!(is_remote_url("HTTP://tracker.example/x"));
        assert!(!is_remote_url("game-1-file.torrent"));
        assert!(!is_remote_url("ftp://host/x.torrent"));
        assert!(!is_remote_url("http"));
    }

    #[test]
    fn debug_hides_descriptor_bytes() {
        let l = Locator::DescriptorBytes(vec![1, 2, 3]);
        assert_eq!(format!("{:?}", l), "DescriptorBytes(3 bytes)");
        assert_eq!(l.kind(), "descriptor-bytes");
    }
}
