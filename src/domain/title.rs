//! Title identifiers and the role convention encoded in their suffix.
//!
//! A title ID is 16 hexadecimal characters, normalized to uppercase.
//! The last three characters decide the role:
//!
//! | Suffix | Role |
//! |--------|------|
//! | `000`  | base game |
//! | `800`  | update for the base game |
//! | other  | DLC |
//!
//! The first 13 characters form the family prefix shared by a base game,
//! its update and its DLC.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of a title ID in characters
pub const TITLE_ID_LEN: usize = 16;

/// Length of the family prefix in characters
pub const FAMILY_PREFIX_LEN: usize = 13;

const BASE_SUFFIX: &str = "000";
const UPDATE_SUFFIX: &str = "800";

/// Errors produced when parsing a title ID
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TitleIdError {
    #[error("title ID must be {TITLE_ID_LEN} characters, got {0}")]
    Length(usize),

    #[error("title ID contains non-hexadecimal characters: {0}")]
    NotHex(String),
}

/// Role of a title within its family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleKind {
    /// Base game (suffix `000`)
    Base,

    /// Update for the base game (suffix `800`)
    Update,

    /// Downloadable content (any other suffix)
    Dlc,
}

impl std::fmt::Display for TitleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TitleKind::Base => write!(f, "base"),
            TitleKind::Update => write!(f, "update"),
            TitleKind::Dlc => write!(f, "dlc"),
        }
    }
}

/// Classify a title ID by its last three characters.
///
/// Case-insensitive. Inputs shorter than three characters are DLC, since
/// they cannot carry either reserved suffix.
pub fn classify(id: &str) -> TitleKind {
    let start = id.len().saturating_sub(3);
    match id.get(start..) {
        Some(suffix) if suffix.eq_ignore_ascii_case(BASE_SUFFIX) => TitleKind::Base,
        Some(suffix) if suffix.eq_ignore_ascii_case(UPDATE_SUFFIX) => TitleKind::Update,
        _ => TitleKind::Dlc,
    }
}

/// Normalized (uppercase, validated) title ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TitleId(String);

impl TitleId {
    /// Parse and normalize a title ID
    pub fn parse(raw: &str) -> Result<Self, TitleIdError> {
        let raw = raw.trim();
        if raw.len() != TITLE_ID_LEN {
            return Err(TitleIdError::Length(raw.len()));
        }
        if !raw.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TitleIdError::NotHex(raw.to_string()));
        }
        Ok(Self(raw.to_ascii_uppercase()))
    }

    /// Role of this title
    pub fn kind(&self) -> TitleKind {
        classify(&self.0)
    }

    /// First 13 characters, shared across the family
    pub fn family_prefix(&self) -> &str {
        &self.0[..FAMILY_PREFIX_LEN]
    }

    /// ID of the base game in this family
    pub fn base_id(&self) -> TitleId {
        Self(format!("{}{}", self.family_prefix(), BASE_SUFFIX))
    }

    /// ID of the update in this family
    pub fn update_id(&self) -> TitleId {
        Self(format!("{}{}", self.family_prefix(), UPDATE_SUFFIX))
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TitleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TitleId {
    type Err = TitleIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TitleId {
    type Error = TitleIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TitleId> for String {
    fn from(id: TitleId) -> Self {
        id.0
    }
}

/// Family prefix of an arbitrary ID string (uppercased).
///
/// Used for lookups where the caller may pass either a full title ID or a
/// bare prefix.
pub fn family_prefix_of(id: &str) -> String {
    let upper = id.trim().to_ascii_uppercase();
    upper.chars().take(FAMILY_PREFIX_LEN).collect()
}
