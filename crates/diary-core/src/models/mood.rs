//! Entry mood

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// How the author felt when writing an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mood {
    #[default]
    Neutral,
    Happy,
    Angry,
    Bored,
    Calm,
    Depressed,
    Disappointed,
    Humorous,
    Lonely,
    Mysterious,
    Romantic,
    Shameful,
    Awful,
    Surprised,
    Suspicious,
    Tense,
}

impl Mood {
    /// Every mood, in picker order.
    pub const ALL: [Self; 16] = [
        Self::Neutral,
        Self::Happy,
        Self::Angry,
        Self::Bored,
        Self::Calm,
        Self::Depressed,
        Self::Disappointed,
        Self::Humorous,
        Self::Lonely,
        Self::Mysterious,
        Self::Romantic,
        Self::Shameful,
        Self::Awful,
        Self::Surprised,
        Self::Suspicious,
        Self::Tense,
    ];

    /// Stable name stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Neutral => "Neutral",
            Self::Happy => "Happy",
            Self::Angry => "Angry",
            Self::Bored => "Bored",
            Self::Calm => "Calm",
            Self::Depressed => "Depressed",
            Self::Disappointed => "Disappointed",
            Self::Humorous => "Humorous",
            Self::Lonely => "Lonely",
            Self::Mysterious => "Mysterious",
            Self::Romantic => "Romantic",
            Self::Shameful => "Shameful",
            Self::Awful => "Awful",
            Self::Surprised => "Surprised",
            Self::Suspicious => "Suspicious",
            Self::Tense => "Tense",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|mood| mood.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown mood: {needle}")))
    }
}
