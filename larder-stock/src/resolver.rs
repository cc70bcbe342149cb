//! Canonical ingredient-name resolution
//!
//! Maps a freely-typed or upstream-normalized ingredient name onto the
//! canonical spelling already tracked in storage, so synonymous entries from
//! different users ("daging ayam" vs "ayam broiler") collapse into a single
//! inventory row while the spelling already on record stays stable.

use thiserror::Error;
use tracing::warn;

/// Descriptor prefixes stripped by the local fallback: the common Indonesian
/// "meat of" / "fruit of" / "seed of" phrasings that don't change the core
/// ingredient.
const DESCRIPTOR_PREFIXES: &[&str] = &["daging ", "buah ", "biji "];

/// Errors surfaced by a normalization oracle
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Request(String),

    #[error("oracle returned an empty name")]
    EmptyResponse,
}

/// External name-normalization capability.
///
/// Implementations may consult a remote language model; they are treated as
/// untrusted and possibly non-deterministic, though they should be idempotent
/// under composition. Resolution never depends on the oracle being available:
/// every failure falls back to [`strip_descriptors`]. The call is blocking
/// from the resolver's perspective; implementations own any I/O scheduling.
pub trait Normalizer {
    fn normalize(&self, name: &str) -> Result<String, OracleError>;
}

/// Local fallback normalization: lowercase, trim, strip descriptor prefixes.
///
/// Prefixes are checked in sequence against the progressively stripped name,
/// so "daging buah naga" reduces to "naga".
pub fn strip_descriptors(name: &str) -> String {
    let mut normalized = name.trim().to_lowercase();
    for prefix in DESCRIPTOR_PREFIXES {
        if let Some(rest) = normalized.strip_prefix(prefix) {
            normalized = rest.to_string();
        }
    }
    normalized
}

/// Rule-based normalizer applying the same descriptor stripping as the
/// oracle fallback path. Infallible; suitable as a default when no
/// language-model oracle is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorStripper;

impl Normalizer for DescriptorStripper {
    fn normalize(&self, name: &str) -> Result<String, OracleError> {
        Ok(strip_descriptors(name))
    }
}

/// Resolve a candidate name against the canonical names currently in stock.
///
/// First match wins:
/// 1. exact case-insensitive match — the stored spelling is returned
///    unchanged;
/// 2. with a normalizer, normalized candidate vs normalized existing names —
///    a hit still returns the stored spelling, so established references
///    don't change out from under the user;
/// 3. no match — the normalized candidate (or the lowercase-trimmed
///    candidate when no normalizer was supplied) becomes the new canonical
///    name.
///
/// Pure given its inputs plus the oracle's responses; no storage access.
pub fn resolve_name<N: Normalizer>(
    candidate: &str,
    existing: &[String],
    normalizer: Option<&N>,
) -> String {
    let candidate_lower = candidate.trim().to_lowercase();

    for name in existing {
        if name.to_lowercase() == candidate_lower {
            return name.clone();
        }
    }

    let Some(normalizer) = normalizer else {
        return candidate_lower;
    };

    let normalized_candidate = normalize_or_fallback(normalizer, candidate);
    for name in existing {
        if normalize_or_fallback(normalizer, name) == normalized_candidate {
            return name.clone();
        }
    }

    normalized_candidate
}

/// Run the oracle for one name, falling back to [`strip_descriptors`] on any
/// failure or unusable response. Never propagates the oracle's error.
fn normalize_or_fallback<N: Normalizer>(normalizer: &N, name: &str) -> String {
    match normalizer.normalize(name) {
        Ok(normalized) if !normalized.trim().is_empty() => normalized.trim().to_lowercase(),
        Ok(_) => {
            warn!("Normalizer returned empty name for '{}', using local fallback", name);
            strip_descriptors(name)
        }
        Err(e) => {
            warn!("Normalizer failed for '{}', using local fallback: {}", name, e);
            strip_descriptors(name)
        }
    }
}
