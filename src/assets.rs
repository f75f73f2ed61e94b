//! Optional imagery – loading chapter and cover images.
//!
//! Images are never required: every failure is an [`AssetFetchError`] that
//! the caller logs before carrying on without the image.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};

use crate::error::AssetFetchError;

pub const MAX_ATTEMPTS: usize = 3;
pub const BASE_DELAY: Duration = Duration::from_millis(250);
pub const MAX_DELAY: Duration = Duration::from_secs(2);

/// Source of image bytes.
pub trait AssetFetcher: Send + Sync {
    fn fetch(&self, src: &str) -> Result<Vec<u8>, AssetFetchError>;
}

/// Decoded image with its pixel size.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl LoadedImage {
    /// Probe `bytes` for dimensions.
    pub fn decode(bytes: Vec<u8>) -> Result<Self, AssetFetchError> {
        let img = ::image::load_from_memory(&bytes)
            .map_err(|e| AssetFetchError::Decode(e.to_string()))?;
        Ok(Self {
            width: img.width(),
            height: img.height(),
            bytes,
        })
    }

    /// Largest `(w, h)` with this aspect ratio fitting in `max_w × max_h`.
    pub fn fit(&self, max_w: f32, max_h: f32) -> (f32, f32) {
        if self.width == 0 || self.height == 0 {
            return (max_w, max_h);
        }
        let scale = (max_w / self.width as f32).min(max_h / self.height as f32);
        (self.width as f32 * scale, self.height as f32 * scale)
    }
}

/// `data:` URIs and local files, relative paths resolved against `base_dir`.
#[derive(Debug, Clone, Default)]
pub struct LocalAssets {
    base_dir: Option<PathBuf>,
}

impl LocalAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(dir.into()),
        }
    }

    fn resolve(&self, src: &str) -> PathBuf {
        let raw = src.strip_prefix("file://").unwrap_or(src);
        let path = Path::new(raw);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl AssetFetcher for LocalAssets {
    fn fetch(&self, src: &str) -> Result<Vec<u8>, AssetFetchError> {
        let src = src.trim();
        if src.starts_with("data:") {
            return parse_data_uri(src);
        }
        if src.starts_with("http://") || src.starts_with("https://") {
            return Err(AssetFetchError::Unsupported(preview(src)));
        }
        let path = self.resolve(src);
        fs::read(&path).map_err(|source| AssetFetchError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Retries I/O failures of an inner fetcher with doubling, capped backoff.
/// Unsupported sources and undecodable data fail immediately.
#[derive(Debug, Clone)]
pub struct RetryingFetcher<F> {
    inner: F,
    max_attempts: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<F: AssetFetcher> RetryingFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            max_attempts: MAX_ATTEMPTS,
            base_delay: BASE_DELAY,
            max_delay: MAX_DELAY,
        }
    }

    pub fn with_policy(mut self, max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).max(self.base_delay).min(self.max_delay)
    }
}

impl<F: AssetFetcher> AssetFetcher for RetryingFetcher<F> {
    fn fetch(&self, src: &str) -> Result<Vec<u8>, AssetFetchError> {
        let mut delay = self.base_delay;
        let mut last = String::new();
        for attempt in 1..=self.max_attempts {
            match self.inner.fetch(src) {
                Ok(bytes) => return Ok(bytes),
                Err(e @ (AssetFetchError::Unsupported(_) | AssetFetchError::Decode(_))) => {
                    return Err(e)
                }
                Err(e) => {
                    last = e.to_string();
                    if attempt < self.max_attempts {
                        log::debug!(
                            "image fetch failed ({last}); retrying in {:.2}s (attempt {attempt}/{})",
                            delay.as_secs_f32(),
                            self.max_attempts
                        );
                        thread::sleep(delay);
                        delay = self.next_delay(delay);
                    }
                }
            }
        }
        Err(AssetFetchError::Exhausted {
            attempts: self.max_attempts,
            last,
        })
    }
}

/// Fetch and decode, or `None` with a warning.
pub fn load_image(fetcher: &dyn AssetFetcher, src: &str) -> Option<LoadedImage> {
    match fetcher.fetch(src).and_then(LoadedImage::decode) {
        Ok(img) => Some(img),
        Err(e) => {
            log::warn!("skipping image {}: {e}", preview(src));
            None
        }
    }
}

/// Decode a `data:<mime>;base64,<data>` URI.
pub fn parse_data_uri(src: &str) -> Result<Vec<u8>, AssetFetchError> {
    let rest = src
        .strip_prefix("data:")
        .ok_or_else(|| AssetFetchError::Unsupported(preview(src)))?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| AssetFetchError::Decode("data URI without ',' separator".into()))?;
    if !header.contains(";base64") {
        return Err(AssetFetchError::Unsupported(
            "only base64 data URIs are supported".into(),
        ));
    }
    BASE64_STD
        .decode(data.trim())
        .map_err(|e| AssetFetchError::Decode(format!("base64: {e}")))
}

fn preview(src: &str) -> String {
    let head: String = src.chars().take(80).collect();
    if head.len() < src.len() {
        format!("{head}…")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::PIXEL_PNG;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl AssetFetcher for Flaky {
        fn fetch(&self, _src: &str) -> Result<Vec<u8>, AssetFetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(AssetFetchError::Io {
                    path: "x".into(),
                    source: std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"),
                })
            } else {
                Ok(vec![1, 2, 3])
            }
        }
    }

    fn quick<F: AssetFetcher>(inner: F, attempts: usize) -> RetryingFetcher<F> {
        RetryingFetcher::new(inner).with_policy(attempts, Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn decodes_data_uri_image() {
        let bytes = LocalAssets::new().fetch(PIXEL_PNG).unwrap();
        let img = LoadedImage::decode(bytes).unwrap();
        assert_eq!((img.width, img.height), (1, 1));
        assert_eq!(img.fit(100.0, 50.0), (50.0, 50.0));
    }

    #[test]
    fn rejects_remote_and_bad_sources() {
        let local = LocalAssets::new();
        assert!(matches!(
            local.fetch("https://example.com/a.png"),
            Err(AssetFetchError::Unsupported(_))
        ));
        assert!(matches!(
            local.fetch("data:image/png,abc"),
            Err(AssetFetchError::Unsupported(_))
        ));
        assert!(matches!(
            local.fetch("data:image/png;base64,@@@"),
            Err(AssetFetchError::Decode(_))
        ));
        assert!(matches!(
            local.fetch("/definitely/not/here.png"),
            Err(AssetFetchError::Io { .. })
        ));
    }

    #[test]
    fn reads_relative_to_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.bin"), b"abc").unwrap();
        let local = LocalAssets::with_base_dir(dir.path());
        assert_eq!(local.fetch("a.bin").unwrap(), b"abc");
    }

    #[test]
    fn retries_transient_failures() {
        let fetcher = quick(
            Flaky {
                calls: AtomicUsize::new(0),
                fail_first: 2,
            },
            3,
        );
        assert_eq!(fetcher.fetch("x").unwrap(), vec![1, 2, 3]);
        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn gives_up_after_bounded_attempts() {
        let fetcher = quick(
            Flaky {
                calls: AtomicUsize::new(0),
                fail_first: usize::MAX,
            },
            2,
        );
        match fetcher.fetch("x") {
            Err(AssetFetchError::Exhausted { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let f = RetryingFetcher::new(LocalAssets::new()).with_policy(
            5,
            Duration::from_millis(100),
            Duration::from_millis(300),
        );
        assert_eq!(f.next_delay(Duration::from_millis(100)), Duration::from_millis(200));
        assert_eq!(f.next_delay(Duration::from_millis(200)), Duration::from_millis(300));
        assert_eq!(f.next_delay(Duration::ZERO), Duration::from_millis(100));
    }

    #[test]
    fn unsupported_is_not_retried() {
        let fetcher = quick(LocalAssets::new(), 3);
        assert!(matches!(
            fetcher.fetch("https://x/y.png"),
            Err(AssetFetchError::Unsupported(_))
        ));
    }
}
