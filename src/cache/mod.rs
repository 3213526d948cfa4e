//! Two-tier artifact cache.
//!
//! - Tier 1 (`vectors`): [`ConversionSignature`] to encoded [`Artifact`] bytes
//! - Tier 2 (`bitmaps`): [`PresentationKey`] to finished [`Bitmap`]
//!
//! Both tiers are bounded LRU stores that are safe to share between any
//! number of renderers and sessions.

mod keys;
mod store;

pub use keys::{ConversionSignature, PresentationKey};
pub use store::{Capacity, LruStore, StoreStats, Weigh};

use std::sync::{Arc, LazyLock};

use crate::image::Bitmap;
use crate::svg::{Artifact, ArtifactError};

static SHARED: LazyLock<Arc<ArtifactCache>> =
    LazyLock::new(|| Arc::new(ArtifactCache::new(CacheLimits::default())));

/// Capacities of both tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    pub vectors: Capacity,
    pub bitmaps: Capacity,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            vectors: Capacity::new(4096, 32 * 1024 * 1024),
            bitmaps: Capacity::new(1024, 256 * 1024 * 1024),
        }
    }
}

#[derive(Debug)]
pub struct ArtifactCache {
    vectors: LruStore<ConversionSignature, Vec<u8>>,
    bitmaps: LruStore<PresentationKey, Bitmap>,
}

impl Default for ArtifactCache {
    fn default() -> Self {
        Self::new(CacheLimits::default())
    }
}

impl ArtifactCache {
    pub fn new(limits: CacheLimits) -> Self {
        Self {
            vectors: LruStore::new(limits.vectors),
            bitmaps: LruStore::new(limits.bitmaps),
        }
    }

    /// Process-wide cache with default limits.
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED)
    }

    /// Raw tier-1 bytes for a signature.
    pub fn vector(&self, signature: &ConversionSignature) -> Option<Arc<Vec<u8>>> {
        self.vectors.get(signature)
    }

    pub fn contains_vector(&self, signature: &ConversionSignature) -> bool {
        self.vectors.contains(signature)
    }

    pub fn insert_vector(&self, signature: ConversionSignature, bytes: Vec<u8>) {
        self.vectors.insert(signature, bytes);
    }

    /// Decoded artifact for a signature.
    ///
    /// Bytes that fail to decode are dropped and reported as a miss so the
    /// equation gets converted again.
    pub fn artifact(&self, signature: &ConversionSignature) -> Option<Artifact> {
        let bytes = self.vectors.get(signature)?;
        match Artifact::decode(&bytes) {
            Ok(artifact) => Some(artifact),
            Err(err) => {
                tracing::warn!(tex = signature.tex(), %err, "dropping corrupt cached artifact");
                crate::perf::log_event(
                    "cache.vector.corrupt",
                    format!("tex={} err={err}", signature.tex()),
                );
                self.vectors.remove(signature);
                None
            }
        }
    }

    /// Encode and store an artifact. Error artifacts are stored too, so a
    /// failing equation is not sent to the engine again.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be encoded.
    pub fn store_artifact(
        &self,
        signature: ConversionSignature,
        artifact: &Artifact,
    ) -> Result<(), ArtifactError> {
        self.vectors.insert(signature, artifact.encode()?);
        Ok(())
    }

    pub fn bitmap(&self, key: &PresentationKey) -> Option<Bitmap> {
        self.bitmaps.get(key).map(|bitmap| (*bitmap).clone())
    }

    pub fn contains_bitmap(&self, key: &PresentationKey) -> bool {
        self.bitmaps.contains(key)
    }

    pub fn insert_bitmap(&self, key: PresentationKey, bitmap: Bitmap) {
        self.bitmaps.insert(key, bitmap);
    }

    pub const fn vectors(&self) -> &LruStore<ConversionSignature, Vec<u8>> {
        &self.vectors
    }

    pub const fn bitmaps(&self) -> &LruStore<PresentationKey, Bitmap> {
        &self.bitmaps
    }

    pub fn clear(&self) {
        self.vectors.clear();
        self.bitmaps.clear();
    }
}
