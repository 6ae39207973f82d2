//! Image reference: the immutable input identifying what to scan.

use std::fmt;

/// A fully qualified image reference.
///
/// `repository/image` forms the name used on every registry call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry base URL, including scheme (e.g. "https://registry-1.docker.io")
    pub registry_url: String,
    /// Repository (e.g. "library")
    pub repository: String,
    /// Image name (e.g. "busybox")
    pub image: String,
    /// Tag (e.g. "latest")
    pub tag: String,
}

impl ImageReference {
    /// Create a reference from its parts, trimming a trailing slash off the
    /// registry URL.
    pub fn new(
        registry_url: impl Into<String>,
        repository: impl Into<String>,
        image: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        let mut registry_url = registry_url.into();
        while registry_url.ends_with('/') {
            registry_url.pop();
        }
        Self {
            registry_url,
            repository: repository.into(),
            image: image.into(),
            tag: tag.into(),
        }
    }

    /// Fully qualified repository name used for registry calls.
    pub fn name(&self) -> String {
        format!("{}/{}", self.repository, self.image)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.repository, self.image, self.tag)
    }
}
