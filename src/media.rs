//! Media transport and artwork collaborators.
//!
//! The core never decodes audio. For each song it asks a [`MediaTransport`]
//! for an opaque playable reference and later probes it for a duration, which
//! may take several attempts while the stream's metadata loads.
//!
//! Artwork goes through [`ArtworkCache`], a cache-through wrapper over an
//! [`AssetResolver`]. Artwork never affects playback correctness.

use crate::error::Result;
use crate::song::Song;
use log::trace;
use std::collections::HashMap;
use std::time::Duration;

/// Opaque reference handed to whatever actually plays audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaResource {
    pub locator: String,
    /// Content length in bytes, when the transport knows it.
    pub content_length: Option<u64>,
}

pub trait MediaTransport {
    fn resolve(&self, song: &Song) -> Result<MediaResource>;

    /// `None` while metadata is still loading.
    fn probe_duration(&self, resource: &MediaResource) -> Option<Duration>;
}

/// Transport that plays nothing and trusts the catalog's duration hint.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogDurationTransport;

impl MediaTransport for CatalogDurationTransport {
    fn resolve(&self, song: &Song) -> Result<MediaResource> {
        Ok(MediaResource {
            locator: format!(
                "song:{}#{}",
                song.file_id,
                song.duration.map_or(0, |d| d.as_millis())
            ),
            content_length: None,
        })
    }

    fn probe_duration(&self, resource: &MediaResource) -> Option<Duration> {
        let millis: u64 = resource.locator.rsplit_once('#')?.1.parse().ok()?;
        (millis > 0).then(|| Duration::from_millis(millis))
    }
}

pub trait AssetResolver {
    fn resolve_asset(&self, asset_id: &str) -> String;
}

/// Resolves artwork through an image proxy URL.
#[derive(Debug, Clone)]
pub struct ProxyAssetResolver {
    pub base_url: String,
}

impl AssetResolver for ProxyAssetResolver {
    fn resolve_asset(&self, asset_id: &str) -> String {
        format!("{}?fileid={asset_id}", self.base_url)
    }
}

/// Memoizes [`AssetResolver`] lookups for the session.
pub struct ArtworkCache {
    resolver: Box<dyn AssetResolver>,
    urls: HashMap<String, String>,
}

impl ArtworkCache {
    #[must_use]
    pub fn new(resolver: Box<dyn AssetResolver>) -> Self {
        Self {
            resolver,
            urls: HashMap::new(),
        }
    }

    /// Artwork reference for `song`, if it has any.
    pub fn artwork_for(&mut self, song: &Song) -> Option<&str> {
        let asset_id = song.img_id.as_deref()?;
        if !self.urls.contains_key(asset_id) {
            let url = self.resolver.resolve_asset(asset_id);
            trace!("Resolved artwork {asset_id} -> {url}");
            self.urls.insert(asset_id.to_string(), url);
        }
        self.urls.get(asset_id).map(String::as_str)
    }

    /// Warm the cache without reading the result.
    pub fn preload(&mut self, song: &Song) {
        let _ = self.artwork_for(song);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

impl Default for ArtworkCache {
    fn default() -> Self {
        Self::new(Box::new(ProxyAssetResolver {
            base_url: "/api/image-proxy".to_string(),
        }))
    }
}

impl std::fmt::Debug for ArtworkCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtworkCache").field("urls", &self.urls).finish()
    }
}
