//! Registry documents and the resolved manifest
//!
//! The registry serves a loosely shaped "packument" per package. It is
//! deserialized leniently here and narrowed to a strict [`Manifest`] before
//! anything else sees it.

use crate::error::{PkgcacheError, PkgcacheResult};
use crate::integrity::{Algorithm, Integrity, IntegrityHash};
use crate::registry::spec::{PackageSpec, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Resolved metadata for one package version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,

    pub version: String,

    #[serde(
        rename = "_hasShrinkwrap",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub has_shrinkwrap: Option<bool>,

    /// Integrity the registry advertises for the tarball
    #[serde(rename = "_integrity", default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<Integrity>,

    /// Tarball location
    #[serde(rename = "_resolved")]
    pub resolved: String,
}

/// `dist` block of a version document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dist {
    pub tarball: Option<String>,
    pub integrity: Option<String>,
    /// Legacy hex sha1
    pub shasum: Option<String>,
}

/// One entry of a packument's `versions` map, as served
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionDocument {
    pub name: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub dist: Dist,
    #[serde(rename = "_hasShrinkwrap")]
    pub has_shrinkwrap: Option<bool>,
    #[serde(rename = "_resolved")]
    pub resolved: Option<String>,
    #[serde(rename = "_integrity")]
    pub integrity: Option<String>,
}

/// Full package document from `GET {registry}/{name}`
#[derive(Debug, Clone, Deserialize)]
pub struct Packument {
    pub name: String,
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: HashMap<String, String>,
    #[serde(default)]
    pub versions: HashMap<String, VersionDocument>,
}

impl Packument {
    /// Select the version `spec` asks for and narrow it to a [`Manifest`]
    pub fn pick(&self, spec: &PackageSpec) -> PkgcacheResult<Manifest> {
        let version = match &spec.selector {
            Selector::Version(v) => v.to_string(),
            Selector::Tag(tag) => self
                .dist_tags
                .get(tag)
                .cloned()
                .ok_or_else(|| PkgcacheError::VersionNotFound {
                    name: spec.name.clone(),
                    selector: tag.clone(),
                })?,
        };

        let document = self
            .versions
            .get(&version)
            .ok_or_else(|| PkgcacheError::VersionNotFound {
                name: spec.name.clone(),
                selector: spec.selector.to_string(),
            })?;

        Manifest::from_document(&spec.to_string(), &self.name, &version, document)
    }
}

impl Manifest {
    /// Validate a version document
    ///
    /// `_resolved` falls back to `dist.tarball`; `_integrity` falls back to
    /// `dist.integrity`, then to `dist.shasum` as a sha1 hash.
    pub fn from_document(
        spec: &str,
        packument_name: &str,
        version: &str,
        document: &VersionDocument,
    ) -> PkgcacheResult<Self> {
        let invalid = |reason: String| PkgcacheError::InvalidManifest {
            spec: spec.to_string(),
            reason,
        };

        let resolved = document
            .resolved
            .clone()
            .or_else(|| document.dist.tarball.clone())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| invalid("no tarball location".to_string()))?;

        let integrity = match document
            .integrity
            .as_deref()
            .or(document.dist.integrity.as_deref())
        {
            Some(sri) => Some(
                Integrity::parse(sri).map_err(|e| invalid(e.to_string()))?,
            ),
            None => match document.dist.shasum.as_deref() {
                Some(shasum) => Some(Integrity::from_hash(
                    IntegrityHash::from_hex(Algorithm::Sha1, shasum)
                        .map_err(|e| invalid(e.to_string()))?,
                )),
                None => None,
            },
        };

        Ok(Self {
            name: document
                .name
                .clone()
                .unwrap_or_else(|| packument_name.to_string()),
            version: document
                .version
                .clone()
                .unwrap_or_else(|| version.to_string()),
            has_shrinkwrap: document.has_shrinkwrap,
            integrity,
            resolved,
        })
    }
}
