use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockroom_core::DomainError;

/// Physical condition of the stock a record tracks.
///
/// Part of a record's identity: the same product can be stocked once per condition.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Condition {
    #[default]
    New,
    OpenBox,
    Used,
}

impl Condition {
    pub const ALL: [Condition; 3] = [Condition::New, Condition::OpenBox, Condition::Used];

    /// Canonical wire/storage label.
    pub fn as_str(self) -> &'static str {
        match self {
            Condition::New => "new",
            Condition::OpenBox => "open_box",
            Condition::Used => "used",
        }
    }
}

impl core::fmt::Display for Condition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "new" => Ok(Condition::New),
            "open_box" => Ok(Condition::OpenBox),
            "used" => Ok(Condition::Used),
            _ => Err(DomainError::validation(format!(
                "condition must be one of: new, open_box, used (got '{s}')"
            ))),
        }
    }
}

impl TryFrom<String> for Condition {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Condition> for &'static str {
    fn from(value: Condition) -> Self {
        value.as_str()
    }
}
