use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use strum::EnumString;

#[derive(Debug, Clone, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum ApplicationStatus {
    #[strum(serialize = "applied", serialize = "application received", serialize = "submitted")]
    Applied,
    #[strum(
        serialize = "interviewing",
        serialize = "interview",
        serialize = "in review",
        serialize = "under review"
    )]
    Interviewing,
    #[strum(serialize = "offer", serialize = "offered")]
    Offer,
    #[strum(serialize = "rejected", serialize = "rejection", serialize = "declined")]
    Rejected,
    #[strum(serialize = "unknown")]
    Unknown,
    /// Free text the parser returned that is not a known status
    #[strum(default)]
    Other(String),
}

impl ApplicationStatus {
    pub fn from_text(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return ApplicationStatus::Unknown;
        }
        // `Other` is the catch-all, so parsing cannot fail
        ApplicationStatus::from_str(text).unwrap_or_else(|_| ApplicationStatus::Other(text.into()))
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationStatus::Applied => write!(f, "Applied"),
            ApplicationStatus::Interviewing => write!(f, "Interviewing"),
            ApplicationStatus::Offer => write!(f, "Offer"),
            ApplicationStatus::Rejected => write!(f, "Rejected"),
            ApplicationStatus::Unknown => write!(f, "Unknown"),
            ApplicationStatus::Other(text) => write!(f, "{}", text),
        }
    }
}

/// Company/position/status extracted from one job email.
/// The store matches existing entries on the exact (company, position) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredRecord {
    pub company: String,
    pub position: String,
    pub status: ApplicationStatus,
    pub source_date: DateTime<Utc>,
    pub source_email: String,
}
