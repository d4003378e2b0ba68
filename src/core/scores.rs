use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;

pub const DRY_HEADING: &str = "### DRY Analysis";
pub const SOLID_HEADING: &str = "### SOLID Analysis";

/// A score transcribed from a model response. Values are kept exactly as
/// the model wrote them, so `15/10` stays 15.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Value(u32),
    Unavailable,
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Value(v) => write!(f, "{}", v),
            Score::Unavailable => f.write_str("N/A"),
        }
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Score::Value(v) => serializer.serialize_u32(*v),
            Score::Unavailable => serializer.serialize_str("N/A"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScorePair {
    #[serde(rename = "dry_score")]
    pub dry: Score,
    #[serde(rename = "solid_score")]
    pub solid: Score,
}

impl ScorePair {
    pub fn unavailable() -> Self {
        Self {
            dry: Score::Unavailable,
            solid: Score::Unavailable,
        }
    }
}

pub struct ScoreExtractor;

impl ScoreExtractor {
    /// Reads the DRY and SOLID scores out of a response that follows the
    /// prompt's output template. Anything off-template yields `Unavailable`.
    pub fn extract(response: &str) -> ScorePair {
        ScorePair {
            dry: Self::score_after(response, DRY_HEADING),
            solid: Self::score_after(response, SOLID_HEADING),
        }
    }

    fn score_after(response: &str, heading: &str) -> Score {
        static SCORE_PATTERN: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"\A\s*\*\*Score: (\d+)/10\*\*").unwrap());

        let Some(start) = response.find(heading) else {
            return Score::Unavailable;
        };
        let rest = &response[start + heading.len()..];

        SCORE_PATTERN
            .captures(rest)
            .and_then(|caps| caps.get(1))
            .and_then(|digits| digits.as_str().parse::<u32>().ok())
            .map(Score::Value)
            .unwrap_or(Score::Unavailable)
    }
}
