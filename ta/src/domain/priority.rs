//! MoSCoW priority labels

use serde::{Deserialize, Serialize};

use super::DomainError;

/// Priority label assigned by the model using the MoSCoW method
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Must,
    #[default]
    Should,
    Could,
    Wont,
}

impl Priority {
    /// Human label used in ticket notes
    pub fn label(&self) -> &'static str {
        match self {
            Self::Must => "Must have",
            Self::Should => "Should have",
            Self::Could => "Could have",
            Self::Wont => "Won't have",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Must => write!(f, "must"),
            Self::Should => write!(f, "should"),
            Self::Could => write!(f, "could"),
            Self::Wont => write!(f, "wont"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "won't have" -> "wont have", "should-have" -> "should have"
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| *c != '\'' && *c != '\u{2019}')
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        let head = normalized.split_whitespace().next().unwrap_or("");

        match head {
            "must" => Ok(Self::Must),
            "should" => Ok(Self::Should),
            "could" => Ok(Self::Could),
            "wont" => Ok(Self::Wont),
            _ => Err(DomainError::InvalidPriority(s.to_string())),
        }
    }
}
