//! Integrity keys for content addressing
//!
//! An integrity key is one or more `algorithm-base64digest` pairs separated
//! by whitespace, the same shape registries publish in `dist.integrity`.
//! Keys are used both to address content in the store and to verify bytes
//! coming off the wire.

use crate::error::{PkgcacheError, PkgcacheResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;

/// Supported hash algorithms, weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl Algorithm {
    /// Algorithm used when the caller does not ask for one
    pub const DEFAULT: Algorithm = Algorithm::Sha512;

    /// Name as it appears in an integrity string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Digest length in bytes
    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => Sha1::digest(data).to_vec(),
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = PkgcacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => Err(PkgcacheError::MalformedIntegrity(format!(
                "unknown algorithm {}",
                other
            ))),
        }
    }
}

/// A single (algorithm, digest) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntegrityHash {
    pub algorithm: Algorithm,
    pub digest: Vec<u8>,
}

impl IntegrityHash {
    /// Digest as lowercase hex, used for content paths
    pub fn hex_digest(&self) -> String {
        hex::encode(&self.digest)
    }

    /// Build from a legacy hex digest such as `dist.shasum`
    pub fn from_hex(algorithm: Algorithm, hex_digest: &str) -> PkgcacheResult<Self> {
        let digest = hex::decode(hex_digest.trim()).map_err(|_| {
            PkgcacheError::MalformedIntegrity(format!("{}: invalid hex digest", hex_digest))
        })?;
        if digest.len() != algorithm.output_len() {
            return Err(PkgcacheError::MalformedIntegrity(format!(
                "{}: wrong length for {}",
                hex_digest, algorithm
            )));
        }
        Ok(Self { algorithm, digest })
    }
}

impl fmt::Display for IntegrityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.algorithm, STANDARD.encode(&self.digest))
    }
}

/// One or more hashes of the same content
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Integrity {
    hashes: Vec<IntegrityHash>,
}

impl Integrity {
    /// Parse an integrity string
    ///
    /// Unknown algorithms are skipped and `?opt` suffixes ignored, but at
    /// least one well-formed hash must remain.
    pub fn parse(s: &str) -> PkgcacheResult<Self> {
        let mut hashes: Vec<IntegrityHash> = Vec::new();

        for token in s.split_whitespace() {
            let token = token.split('?').next().unwrap_or(token);
            let Some((algo, encoded)) = token.split_once('-') else {
                return Err(PkgcacheError::MalformedIntegrity(s.to_string()));
            };
            let Ok(algorithm) = algo.parse::<Algorithm>() else {
                continue;
            };
            let digest = STANDARD
                .decode(encoded)
                .map_err(|_| PkgcacheError::MalformedIntegrity(s.to_string()))?;
            if digest.len() != algorithm.output_len() {
                return Err(PkgcacheError::MalformedIntegrity(s.to_string()));
            }
            let hash = IntegrityHash { algorithm, digest };
            if !hashes.contains(&hash) {
                hashes.push(hash);
            }
        }

        if hashes.is_empty() {
            return Err(PkgcacheError::MalformedIntegrity(s.to_string()));
        }
        Ok(Self { hashes })
    }

    /// Hash `data` with each of `algorithms` (the default algorithm if empty)
    pub fn from_bytes(data: &[u8], algorithms: &[Algorithm]) -> Self {
        let mut algorithms = if algorithms.is_empty() {
            vec![Algorithm::DEFAULT]
        } else {
            algorithms.to_vec()
        };
        algorithms.sort();
        algorithms.dedup();

        let hashes = algorithms
            .into_iter()
            .map(|algorithm| IntegrityHash {
                algorithm,
                digest: algorithm.digest(data),
            })
            .collect();
        Self { hashes }
    }

    /// Wrap a single hash
    pub fn from_hash(hash: IntegrityHash) -> Self {
        Self { hashes: vec![hash] }
    }

    pub fn hashes(&self) -> &[IntegrityHash] {
        &self.hashes
    }

    /// Distinct algorithms present, weakest first
    pub fn algorithms(&self) -> Vec<Algorithm> {
        let mut algorithms: Vec<Algorithm> = self.hashes.iter().map(|h| h.algorithm).collect();
        algorithms.sort();
        algorithms.dedup();
        algorithms
    }

    /// Strongest algorithm present
    pub fn pick_algorithm(&self) -> Algorithm {
        self.algorithms()
            .last()
            .copied()
            .unwrap_or(Algorithm::DEFAULT)
    }

    /// Hash with the strongest algorithm present
    pub fn strongest(&self) -> Option<&IntegrityHash> {
        self.hashes.iter().max_by_key(|hash| hash.algorithm)
    }

    /// The first hash of `self` that `other` agrees with
    pub fn matching(&self, other: &Integrity) -> Option<&IntegrityHash> {
        self.hashes.iter().find(|hash| other.hashes.contains(hash))
    }

    /// True iff both keys share an algorithm with an equal digest
    pub fn matches(&self, other: &Integrity) -> bool {
        self.matching(other).is_some()
    }

    /// Hash `data` with this key's algorithms and check it against `self`
    ///
    /// Returns the freshly computed integrity on success.
    pub fn verify(&self, data: &[u8]) -> PkgcacheResult<Integrity> {
        let actual = Integrity::from_bytes(data, &self.algorithms());
        if actual.matches(self) {
            Ok(actual)
        } else {
            Err(PkgcacheError::IntegrityMismatch {
                expected: self.to_string(),
                actual: actual.to_string(),
            })
        }
    }

    /// Union of both keys' hashes
    pub fn concat(&self, other: &Integrity) -> Integrity {
        let mut hashes = self.hashes.clone();
        for hash in &other.hashes {
            if !hashes.contains(hash) {
                hashes.push(hash.clone());
            }
        }
        Self { hashes }
    }
}

impl fmt::Display for Integrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, hash) in self.hashes.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", hash)?;
        }
        Ok(())
    }
}

impl FromStr for Integrity {
    type Err = PkgcacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Integrity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Integrity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Integrity::parse(&s).map_err(serde::de::Error::custom)
    }
}
