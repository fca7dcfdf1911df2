use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use civic_core::{Department, IssuePriority};
use thiserror::Error;

pub const DEFAULT_PREFERRED_CONTACT: &str = "SMS";
pub const PHONE_DIGITS: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("phone number must be exactly 10 digits, got {0:?}")]
    InvalidPhone(String),
}

/// A citizen report as entered, before id, routing and status are assigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueSubmission {
    pub title: String,
    pub description: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub reporter_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub preferred_contact: Option<String>,
    /// Reporter-chosen priority; the keyword estimate is used when absent.
    pub priority: Option<IssuePriority>,
    /// Skips the classifier and records the routing as manual.
    pub department: Option<Department>,
    pub image: Option<Vec<u8>>,
}

impl IssueSubmission {
    pub fn validate(&self) -> Result<(), SubmissionError> {
        let required = [
            ("title", &self.title),
            ("description", &self.description),
            ("location", &self.location),
            ("reporter_name", &self.reporter_name),
            ("phone", &self.phone),
        ];
        let missing = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| *field)
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(SubmissionError::MissingFields(missing));
        }

        let phone = self.phone.trim();
        if phone.len() != PHONE_DIGITS || !phone.chars().all(|c| c.is_ascii_digit()) {
            return Err(SubmissionError::InvalidPhone(self.phone.clone()));
        }
        Ok(())
    }

    pub(crate) fn image_base64(&self) -> Option<String> {
        self.image
            .as_deref()
            .filter(|bytes| !bytes.is_empty())
            .map(|bytes| STANDARD.encode(bytes))
    }

    pub(crate) fn email(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(str::to_string)
    }

    pub(crate) fn preferred_contact(&self) -> String {
        self.preferred_contact
            .as_deref()
            .map(str::trim)
            .filter(|contact| !contact.is_empty())
            .unwrap_or(DEFAULT_PREFERRED_CONTACT)
            .to_string()
    }
}
