use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::bijection::Bijection;
use super::error::ClassifierError;

/// Symbolic class label of a binary classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Positive,
    Negative,
    /// The backend returned a code that maps to no class
    Unknown,
}

impl Label {
    /// Code the backend sees for this label.
    pub const fn code(self) -> i32 {
        match self {
            Label::Positive => 1,
            Label::Negative => -1,
            Label::Unknown => 0,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Label::Positive => "positive",
            Label::Negative => "negative",
            Label::Unknown => "unknown",
        }
    }

    /// The fixed `label ↔ code` table shared by training and decoding.
    pub fn bijection() -> Result<Bijection<Label, i32>, ClassifierError> {
        let mut labels = Bijection::new();
        for label in [Label::Positive, Label::Negative, Label::Unknown] {
            labels.insert(label, label.code())?;
        }
        Ok(labels)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts `positive`, `negative` and `unknown`, with or without a leading `:`.
impl FromStr for Label {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        match name.strip_prefix(':').unwrap_or(name) {
            "positive" => Ok(Label::Positive),
            "negative" => Ok(Label::Negative),
            "unknown" => Ok(Label::Unknown),
            _ => Err(ClassifierError::InvalidLabel(s.to_string())),
        }
    }
}
