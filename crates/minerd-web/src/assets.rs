//! Static asset resolution.
//!
//! The request path is attacker controlled. It is rebuilt segment by
//! segment below the asset root after percent-decoding, rejecting any `..`,
//! absolute or prefixed component. The resolved file is canonicalized and
//! re-checked against the root so a symlink cannot lead outside of it. Every
//! failure looks the same to the caller: `None`.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

/// A resolved static file.
#[derive(Debug, Clone)]
pub struct Asset {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Maps URL paths to files below a root directory.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    root: PathBuf,
}

impl AssetResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        // Canonical root so the containment check below compares like with like.
        let root = std::fs::canonicalize(&root).unwrap_or(root);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build the on-disk path for `relative` without touching the filesystem.
    ///
    /// Each `/` separated segment is percent-decoded before it is checked, so
    /// an encoded `..` or separator is caught the same as a literal one.
    pub fn sanitize(&self, relative: &str) -> Option<PathBuf> {
        let relative = relative.trim_start_matches('/');
        if relative.is_empty() {
            return None;
        }

        let mut result = self.root.clone();
        for segment in relative.split('/') {
            let Ok(name) = urlencoding::decode(segment) else {
                debug!(path = %relative, "Asset path is not valid UTF-8");
                return None;
            };
            if name.contains(['/', '\\', '\0']) {
                warn!(path = %relative, "Encoded separator in asset path blocked");
                return None;
            }
            let mut components = Path::new(name.as_ref()).components();
            match (components.next(), components.next()) {
                (None, _) | (Some(Component::CurDir), None) => continue,
                (Some(Component::Normal(part)), None) => result.push(part),
                _ => {
                    warn!(path = %relative, "Path traversal attempt blocked");
                    return None;
                }
            }
        }

        result.starts_with(&self.root).then_some(result)
    }

    /// Load the file at `relative`, if it exists inside the root.
    pub async fn resolve(&self, relative: &str) -> Option<Asset> {
        let candidate = self.sanitize(relative)?;

        let canonical = tokio::fs::canonicalize(&candidate).await.ok()?;
        if !canonical.starts_with(&self.root) {
            warn!(path = %relative, "Asset resolves outside of the asset root");
            return None;
        }

        let metadata = tokio::fs::metadata(&canonical).await.ok()?;
        if !metadata.is_file() {
            return None;
        }

        let bytes = match tokio::fs::read(&canonical).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %canonical.display(), error = %e, "Asset unreadable");
                return None;
            }
        };

        let mime = mime_guess::from_path(&canonical)
            .first_or_octet_stream()
            .to_string();
        Some(Asset { bytes, mime })
    }
}
