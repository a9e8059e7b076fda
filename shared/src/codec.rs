//! Pluggable serializers for structured values on the wire
//!
//! `Json`, `Bson` and `Ubjson` are the mapping-based codecs: packets travel as
//! objects keyed by field name. BSON can only hold a document at the top
//! level, so sequences fail to encode with it. `Bincode` and `Postcard` are
//! the compact positional codecs: packets travel as length-prefixed sequences
//! with trailing absent fields trimmed. Both peers must be configured with the
//! same codec.

use crate::ubjson::{self, UbjsonError};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json codec: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bson codec: {0}")]
    BsonEncode(#[from] bson::ser::Error),
    #[error("bson codec: {0}")]
    BsonDecode(#[from] bson::de::Error),
    #[error("ubjson codec: {0}")]
    Ubjson(#[from] UbjsonError),
    #[error("bincode codec: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("postcard codec: {0}")]
    Postcard(#[from] postcard::Error),
    #[error("{0} is not a valid codec")]
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    Json,
    Bson,
    Ubjson,
    Bincode,
    Postcard,
}

impl Codec {
    pub const ALL: [Codec; 5] = [
        Codec::Json,
        Codec::Bson,
        Codec::Ubjson,
        Codec::Bincode,
        Codec::Postcard,
    ];

    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        let bytes = match self {
            Codec::Json => serde_json::to_vec(value)?,
            Codec::Bson => {
                let mut bytes = Vec::new();
                bson::to_document(value)?.to_writer(&mut bytes)?;
                bytes
            }
            Codec::Ubjson => ubjson::to_vec(value)?,
            Codec::Bincode => bincode::serialize(value)?,
            Codec::Postcard => postcard::to_allocvec(value)?,
        };
        Ok(bytes)
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        let value = match self {
            Codec::Json => serde_json::from_slice(bytes)?,
            Codec::Bson => bson::from_document(bson::Document::from_reader(bson_frame(bytes)?)?)?,
            Codec::Ubjson => ubjson::from_slice(bytes)?,
            Codec::Bincode => bincode::deserialize(bytes)?,
            Codec::Postcard => postcard::from_bytes(bytes)?,
        };
        Ok(value)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Codec::Json => "json",
            Codec::Bson => "bson",
            Codec::Ubjson => "ubjson",
            Codec::Bincode => "bincode",
            Codec::Postcard => "postcard",
        }
    }
}

/// The reader sizes its buffer from the length prefix, so the prefix must
/// match the datagram before it is trusted.
fn bson_frame(bytes: &[u8]) -> Result<&[u8], bson::de::Error> {
    let declared = bytes
        .get(..4)
        .map(|prefix| i32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]));
    match declared {
        Some(len) if usize::try_from(len).ok() == Some(bytes.len()) => Ok(bytes),
        _ => Err(de::Error::custom(format!(
            "document length prefix does not match {} bytes",
            bytes.len()
        ))),
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Codec {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Codec::Json),
            "bson" => Ok(Codec::Bson),
            "ubjson" => Ok(Codec::Ubjson),
            "bincode" => Ok(Codec::Bincode),
            "postcard" => Ok(Codec::Postcard),
            other => Err(CodecError::Unknown(other.to_string())),
        }
    }
}
