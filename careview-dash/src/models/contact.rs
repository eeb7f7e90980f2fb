//! Contact list types for duplicate detection and Outlook export

use serde::{Deserialize, Serialize};

/// Contact as uploaded by the caller
///
/// Either `first_name`/`last_name` or a single `name` may be supplied; a bare
/// `name` is split at the first space.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Contact {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl Contact {
    /// First and last name, splitting `name` when the parts are absent
    pub fn name_parts(&self) -> (String, String) {
        let first = self.first_name.trim();
        let last = self.last_name.trim();
        if !first.is_empty() || !last.is_empty() {
            return (first.to_string(), last.to_string());
        }

        match self.name.as_deref().map(str::trim) {
            Some(full) if !full.is_empty() => match full.split_once(' ') {
                Some((f, l)) => (f.to_string(), l.trim().to_string()),
                None => (full.to_string(), String::new()),
            },
            _ => (String::new(), String::new()),
        }
    }
}

/// Rule that flagged a contact as a duplicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKind {
    Phone,
    Email,
    ExactName,
    FuzzyName,
}

impl DuplicateKind {
    /// Group id prefix, e.g. `Phone-1`
    pub fn group_prefix(&self) -> &'static str {
        match self {
            DuplicateKind::Phone => "Phone",
            DuplicateKind::Email => "Email",
            DuplicateKind::ExactName => "Name",
            DuplicateKind::FuzzyName => "Fuzzy",
        }
    }
}

/// A contact after phone formatting and duplicate detection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedContact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub phone_raw: String,
    pub phone_formatted: String,
    pub phone_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_kind: Option<DuplicateKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_group: Option<String>,
}

impl FlaggedContact {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn is_duplicate(&self) -> bool {
        self.duplicate_kind.is_some()
    }

    pub fn has_valid_phone(&self) -> bool {
        self.phone_status.starts_with("Valid")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub group_id: String,
    pub kind: DuplicateKind,
    /// Indexes into the submitted contact list
    pub members: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateCounts {
    pub phone: usize,
    pub email: usize,
    pub exact_name: usize,
    pub fuzzy_name: usize,
    /// Contacts flagged by any rule
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContactStats {
    pub total: usize,
    pub valid_phones: usize,
    pub invalid_phones: usize,
    pub duplicates: usize,
    /// Valid phone and not flagged as a duplicate
    pub unique_valid: usize,
}

/// One row of an Outlook contact import
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlookContact {
    #[serde(rename = "First Name")]
    pub first_name: String,
    #[serde(rename = "Last Name")]
    pub last_name: String,
    #[serde(rename = "E-mail Address")]
    pub email: String,
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "Business Phone")]
    pub business_phone: String,
    #[serde(rename = "Mobile Phone")]
    pub mobile_phone: String,
    #[serde(rename = "Primary Phone")]
    pub primary_phone: String,
    #[serde(rename = "Categories")]
    pub categories: String,
}

/// Result of `POST /api/contacts/analyze`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactReport {
    pub contacts: Vec<FlaggedContact>,
    pub groups: Vec<DuplicateGroup>,
    pub duplicate_counts: DuplicateCounts,
    pub stats: ContactStats,
    pub outlook_rows: Vec<OutlookContact>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_parts_prefers_explicit_fields() {
        let contact = Contact {
            first_name: "Ana".into(),
            last_name: "Lopez".into(),
            name: Some("Someone Else".into()),
            ..Default::default()
        };
        assert_eq!(contact.name_parts(), ("Ana".to_string(), "Lopez".to_string()));
    }

    #[test]
    fn test_name_parts_splits_full_name_once() {
        let contact = Contact {
            name: Some("Mary Ann Smith".into()),
            ..Default::default()
        };
        assert_eq!(contact.name_parts(), ("Mary".to_string(), "Ann Smith".to_string()));

        let single = Contact {
            name: Some("Cher".into()),
            ..Default::default()
        };
        assert_eq!(single.name_parts(), ("Cher".to_string(), String::new()));
    }
}
