// ABOUTME: Release identifier generation for uploaded artifacts.
// ABOUTME: Combines a build id with a random suffix to avoid filename collisions.

use rand::TryRngCore;
use rand::rngs::OsRng;
use std::fmt;
use thiserror::Error;

/// 48 bits of suffix entropy, rendered as 12 hex digits.
const SUFFIX_BITS: u32 = 48;

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("release prefix cannot be empty")]
    EmptyPrefix,

    #[error("release prefix exceeds maximum length of 63 characters")]
    PrefixTooLong,

    #[error("release prefix cannot start with '{0}'")]
    PrefixLeadingPunctuation(char),

    #[error("invalid character in release prefix: '{0}'")]
    PrefixInvalidChar(char),

    #[error("build id cannot be empty")]
    EmptyBuildId,

    #[error("invalid character in build id: '{0}'")]
    BuildIdInvalidChar(char),

    #[error("randomness source unavailable: {0}")]
    RandomSource(String),
}

pub type Result<T> = std::result::Result<T, ReleaseError>;

/// A unique identifier for one deployment attempt's artifact.
///
/// Shaped as `{prefix}-{build_id}-{suffix}`. The suffix carries enough
/// entropy that two concurrent deploys of the same build get distinct
/// remote filenames.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseId(String);

impl ReleaseId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generates release identifiers for a fixed artifact prefix.
#[derive(Debug, Clone)]
pub struct ReleaseNamer {
    prefix: String,
}

impl ReleaseNamer {
    /// Create a namer with a validated prefix (usually the service name).
    ///
    /// The prefix must be filename-safe: lowercase alphanumerics plus
    /// `-`, `_`, `.`, not starting with punctuation, at most 63 characters.
    pub fn new(prefix: &str) -> Result<Self> {
        if prefix.is_empty() {
            return Err(ReleaseError::EmptyPrefix);
        }
        if prefix.len() > 63 {
            return Err(ReleaseError::PrefixTooLong);
        }
        let first = prefix.chars().next().unwrap_or_default();
        if matches!(first, '-' | '.' | '_') {
            return Err(ReleaseError::PrefixLeadingPunctuation(first));
        }
        for c in prefix.chars() {
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && !matches!(c, '-' | '_' | '.') {
                return Err(ReleaseError::PrefixInvalidChar(c));
            }
        }
        Ok(Self {
            prefix: prefix.to_string(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Derive a fresh release id from a build id (e.g. a revision hash).
    ///
    /// The build id lands in a remote filename, so it is restricted to
    /// characters that need no quoting anywhere. Fails only on validation
    /// or if the OS randomness source is unavailable.
    pub fn generate(&self, build_id: &str) -> Result<ReleaseId> {
        if build_id.is_empty() {
            return Err(ReleaseError::EmptyBuildId);
        }
        for c in build_id.chars() {
            if !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.') {
                return Err(ReleaseError::BuildIdInvalidChar(c));
            }
        }

        let raw = OsRng
            .try_next_u64()
            .map_err(|e| ReleaseError::RandomSource(e.to_string()))?;
        let suffix = raw & ((1u64 << SUFFIX_BITS) - 1);

        Ok(ReleaseId(format!(
            "{}-{}-{:012x}",
            self.prefix, build_id, suffix
        )))
    }
}
