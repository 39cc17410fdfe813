//! Classification tags and their acceptance thresholds.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ConfigError;

/// A characteristic the classifier can attach to a bee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    /// Varroa mite visible on the bee
    Varroa,
    /// Bee carrying pollen
    Pollen,
    /// Wasp instead of a bee
    #[serde(alias = "wasps", alias = "wespe")]
    Wasp,
    /// Bee fanning at the entrance, a sign of overheating
    Cooling,
}

impl Tag {
    pub const ALL: [Tag; 4] = [Tag::Varroa, Tag::Pollen, Tag::Wasp, Tag::Cooling];

    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Varroa => "varroa",
            Tag::Pollen => "pollen",
            Tag::Wasp => "wasp",
            Tag::Cooling => "cooling",
        }
    }

    fn index(self) -> usize {
        match self {
            Tag::Varroa => 0,
            Tag::Pollen => 1,
            Tag::Wasp => 2,
            Tag::Cooling => 3,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown classification label `{0}`")]
pub struct UnknownTag(pub String);

impl FromStr for Tag {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "varroa" => Ok(Tag::Varroa),
            "pollen" => Ok(Tag::Pollen),
            "wasp" | "wasps" | "wespe" => Ok(Tag::Wasp),
            "cooling" => Ok(Tag::Cooling),
            _ => Err(UnknownTag(s.to_string())),
        }
    }
}

/// Set of tags already recorded for one track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TagSet(u8);

impl TagSet {
    /// Add a tag. Returns `false` if it was already present.
    pub fn insert(&mut self, tag: Tag) -> bool {
        let bit = 1 << tag.index();
        let fresh = self.0 & bit == 0;
        self.0 |= bit;
        fresh
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.0 & (1 << tag.index()) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Tag> + '_ {
        Tag::ALL.into_iter().filter(|t| self.contains(*t))
    }
}

/// Minimum classifier probability per tag.
///
/// Every tag must be defined and lie in `(0, 1]`; a table can only be built
/// through [`ThresholdTable::new`] or deserialization, both of which validate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<Tag, f64>", into = "BTreeMap<Tag, f64>")]
pub struct ThresholdTable {
    thresholds: [f64; 4],
}

impl Default for ThresholdTable {
    fn default() -> Self {
        let mut thresholds = [0.0; 4];
        thresholds[Tag::Pollen.index()] = 0.90;
        thresholds[Tag::Varroa.index()] = 0.95;
        thresholds[Tag::Wasp.index()] = 0.80;
        thresholds[Tag::Cooling.index()] = 0.90;
        Self { thresholds }
    }
}

impl ThresholdTable {
    pub fn new(entries: impl IntoIterator<Item = (Tag, f64)>) -> Result<Self, ConfigError> {
        let mut thresholds = [f64::NAN; 4];
        for (tag, value) in entries {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::InvalidThreshold { tag, value });
            }
            thresholds[tag.index()] = value;
        }
        for tag in Tag::ALL {
            if thresholds[tag.index()].is_nan() {
                return Err(ConfigError::MissingThreshold(tag));
            }
        }
        Ok(Self { thresholds })
    }

    pub fn threshold(&self, tag: Tag) -> f64 {
        self.thresholds[tag.index()]
    }

    /// Whether a probability is high enough to record `tag`.
    pub fn accepts(&self, tag: Tag, probability: f64) -> bool {
        probability >= self.threshold(tag)
    }
}

impl TryFrom<BTreeMap<Tag, f64>> for ThresholdTable {
    type Error = ConfigError;

    fn try_from(map: BTreeMap<Tag, f64>) -> Result<Self, Self::Error> {
        Self::new(map)
    }
}

impl From<ThresholdTable> for BTreeMap<Tag, f64> {
    fn from(table: ThresholdTable) -> Self {
        Tag::ALL.into_iter().map(|t| (t, table.threshold(t))).collect()
    }
}
