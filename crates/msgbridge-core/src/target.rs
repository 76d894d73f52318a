//! Target description derived from a `target-lexicon` triple.

use std::str::FromStr;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use target_lexicon::{Architecture, BinaryFormat, Endianness, Triple};

/// Native pointer width of the target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum PointerWidth {
    #[display("32")]
    U32,
    #[default]
    #[display("64")]
    U64,
}

impl PointerWidth {
    pub fn bytes(self) -> usize {
        match self {
            PointerWidth::U32 => 4,
            PointerWidth::U64 => 8,
        }
    }

    pub fn is_64(self) -> bool {
        self == PointerWidth::U64
    }
}

#[derive(Debug, Display)]
#[display("invalid target triple `{triple}`: {reason}")]
pub struct TargetError {
    pub triple: String,
    pub reason: String,
}

impl std::error::Error for TargetError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetInfo {
    pub triple: Triple,
    pub pointer_width: PointerWidth,
    pub binary_format: BinaryFormat,
    pub architecture: Architecture,
    pub endianness: Endianness,
}

impl TargetInfo {
    pub fn from_triple(triple: Triple) -> Result<Self, TargetError> {
        let fail = |reason: &str| TargetError {
            triple: triple.to_string(),
            reason: reason.to_owned(),
        };
        let pointer_width = match triple.pointer_width() {
            Ok(target_lexicon::PointerWidth::U32) => PointerWidth::U32,
            Ok(target_lexicon::PointerWidth::U64) => PointerWidth::U64,
            Ok(target_lexicon::PointerWidth::U16) => return Err(fail("16-bit targets are not supported")),
            Err(()) => return Err(fail("unknown pointer width")),
        };
        let endianness = triple
            .endianness()
            .map_err(|()| fail("unknown endianness"))?;
        Ok(TargetInfo {
            pointer_width,
            binary_format: triple.binary_format,
            architecture: triple.architecture,
            endianness,
            triple,
        })
    }

    pub fn parse(triple: &str) -> Result<Self, TargetError> {
        let parsed = Triple::from_str(triple).map_err(|e| TargetError {
            triple: triple.to_owned(),
            reason: e.to_string(),
        })?;
        Self::from_triple(parsed)
    }

    pub fn host() -> Result<Self, TargetError> {
        Self::from_triple(Triple::host())
    }
}
