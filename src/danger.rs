//! Danger classification for downloaded content.
//!
//! A download flagged dangerous is blocked from completing until the user
//! explicitly validates it, at which point the classification becomes
//! [`DangerType::UserValidated`] and the completion gate reopens.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Safety classification of a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DangerType {
    /// Content is considered safe.
    NotDangerous,
    /// The file type itself is dangerous (e.g. an executable).
    DangerousFile,
    /// The source URL is on a blocklist.
    DangerousUrl,
    /// A content check flagged the payload as dangerous.
    DangerousContent,
    /// The content is uncommon and could not be vouched for.
    UncommonContent,
    /// The serving host has a bad reputation.
    DangerousHost,
    /// Previously dangerous, explicitly accepted by the user.
    UserValidated,
}

impl DangerType {
    /// Whether this classification blocks completion.
    ///
    /// `UserValidated` deliberately returns false: validation is exactly
    /// the act that unblocks the completion gate.
    #[must_use]
    pub fn is_dangerous(self) -> bool {
        matches!(
            self,
            Self::DangerousFile
                | Self::DangerousUrl
                | Self::DangerousContent
                | Self::UncommonContent
                | Self::DangerousHost
        )
    }

    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotDangerous => "not_dangerous",
            Self::DangerousFile => "dangerous_file",
            Self::DangerousUrl => "dangerous_url",
            Self::DangerousContent => "dangerous_content",
            Self::UncommonContent => "uncommon_content",
            Self::DangerousHost => "dangerous_host",
            Self::UserValidated => "user_validated",
        }
    }
}

impl fmt::Display for DangerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DangerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_dangerous" => Ok(Self::NotDangerous),
            "dangerous_file" => Ok(Self::DangerousFile),
            "dangerous_url" => Ok(Self::DangerousUrl),
            "dangerous_content" => Ok(Self::DangerousContent),
            "uncommon_content" => Ok(Self::UncommonContent),
            "dangerous_host" => Ok(Self::DangerousHost),
            "user_validated" => Ok(Self::UserValidated),
            _ => Err(format!("invalid danger type: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_dangerous_variants_block() {
        for danger in [
            DangerType::DangerousFile,
            DangerType::DangerousUrl,
            DangerType::DangerousContent,
            DangerType::UncommonContent,
            DangerType::DangerousHost,
        ] {
            assert!(danger.is_dangerous(), "{danger} should be dangerous");
        }
    }

    #[test]
    fn test_safe_variants_do_not_block() {
        assert!(!DangerType::NotDangerous.is_dangerous());
        assert!(!DangerType::UserValidated.is_dangerous());
    }

    #[test]
    fn test_string_round_trip() {
        for danger in [
            DangerType::NotDangerous,
            DangerType::DangerousFile,
            DangerType::DangerousUrl,
            DangerType::DangerousContent,
            DangerType::UncommonContent,
            DangerType::DangerousHost,
            DangerType::UserValidated,
        ] {
            let parsed: DangerType = danger.as_str().parse().unwrap();
            assert_eq!(parsed, danger);
        }
    }

    #[test]
    fn test_from_str_invalid() {
        assert!("radioactive".parse::<DangerType>().is_err());
    }
}
