//! # Record Bodies
//!
//! The chain itself treats a body as an opaque JSON value that takes part in
//! the record hash. Two shapes are stored in practice:
//!
//! - a plain text note (the genesis record, test fixtures);
//! - a star registration: the registering wallet address plus the star's
//!   coordinates and a story.
//!
//! The story is hex-encoded before it is stored, so the persisted and hashed
//! form is always `story: "<hex>"`. Readers decode it on the way out.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::MAX_STORY_HEX_LENGTH;

/// Reasons a submitted star payload is rejected, or a stored story cannot
/// be decoded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BodyError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("story is {len} hex characters, maximum is {max}")]
    StoryTooLong { len: usize, max: usize },

    #[error("stored story is not valid hex-encoded UTF-8")]
    InvalidStoryEncoding,
}

// ---------------------------------------------------------------------------
// Stored Shapes
// ---------------------------------------------------------------------------

/// Body of a record, as stored and hashed.
///
/// Untagged so that the JSON form is exactly the payload: a registration is
/// an object, a note is a bare string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockBody {
    Registration(StarRegistration),
    Note(String),
}

impl BlockBody {
    pub fn note(text: impl Into<String>) -> Self {
        BlockBody::Note(text.into())
    }

    /// The wallet address a registration belongs to. Notes have none.
    pub fn identity(&self) -> Option<&str> {
        match self {
            BlockBody::Registration(registration) => Some(&registration.address),
            BlockBody::Note(_) => None,
        }
    }

    pub fn as_registration(&self) -> Option<&StarRegistration> {
        match self {
            BlockBody::Registration(registration) => Some(registration),
            BlockBody::Note(_) => None,
        }
    }
}

/// A wallet address claiming a star.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarRegistration {
    pub address: String,
    pub star: Star,
}

/// Star facts as stored. `story` is hex.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Star {
    pub ra: String,
    pub dec: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cen: Option<String>,
    pub story: String,
}

impl Star {
    /// Decode the hex story back to text.
    pub fn decoded_story(&self) -> Result<String, BodyError> {
        let bytes = hex::decode(&self.story).map_err(|_| BodyError::InvalidStoryEncoding)?;
        String::from_utf8(bytes).map_err(|_| BodyError::InvalidStoryEncoding)
    }
}

// ---------------------------------------------------------------------------
// Submissions
// ---------------------------------------------------------------------------

/// Star registration as a client submits it, with a plain-text story.
///
/// Every field defaults so that a missing one is reported by
/// [`StarSubmission::into_body`] by name rather than as a parse error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarSubmission {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub star: StarDraft,
}

/// Client-side star facts. Optional fields default to absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarDraft {
    #[serde(default)]
    pub ra: String,
    #[serde(default)]
    pub dec: String,
    #[serde(default)]
    pub mag: Option<String>,
    #[serde(default)]
    pub cen: Option<String>,
    #[serde(default)]
    pub story: String,
}

impl StarSubmission {
    /// Validate the payload and convert it into a storable body, hex-encoding
    /// the story.
    pub fn into_body(self) -> Result<BlockBody, BodyError> {
        require("address", &self.address)?;
        let draft = self.star;
        require("ra", &draft.ra)?;
        require("dec", &draft.dec)?;
        require("story", &draft.story)?;

        let story = hex::encode(draft.story.as_bytes());
        if story.len() > MAX_STORY_HEX_LENGTH {
            return Err(BodyError::StoryTooLong {
                len: story.len(),
                max: MAX_STORY_HEX_LENGTH,
            });
        }

        Ok(BlockBody::Registration(StarRegistration {
            address: self.address.trim().to_string(),
            star: Star {
                ra: draft.ra,
                dec: draft.dec,
                mag: draft.mag.filter(|m| !m.trim().is_empty()),
                cen: draft.cen.filter(|c| !c.trim().is_empty()),
                story,
            },
        }))
    }
}

fn require(field: &'static str, value: &str) -> Result<(), BodyError> {
    if value.trim().is_empty() {
        Err(BodyError::MissingField(field))
    } else {
        Ok(())
    }
}
