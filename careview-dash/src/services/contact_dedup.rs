//! Contact list cleanup: phone formatting, duplicate detection, Outlook rows
//!
//! Duplicate rules run in a fixed order and each contact is flagged at most
//! once, by the first rule that catches it:
//! 1. Same formatted phone number
//! 2. Same email (case-insensitive)
//! 3. Same full name (case-insensitive)
//! 4. Optional fuzzy full-name similarity among contacts not yet flagged

use serde::Deserialize;
use std::collections::HashMap;

use super::phone_formatter::format_phone_number;
use super::similarity::ratio;
use crate::models::{
    Contact, ContactReport, ContactStats, DuplicateCounts, DuplicateGroup, DuplicateKind,
    FlaggedContact, OutlookContact,
};

const OUTLOOK_CATEGORY: &str = "Imported Contacts";

/// Options for [`analyze_contacts`]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupOptions {
    pub fuzzy_names: bool,
    /// Minimum similarity (0-100) for the fuzzy name rule
    pub fuzzy_threshold: u8,
    /// Export only one row per duplicate group
    pub skip_duplicates_in_export: bool,
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            fuzzy_names: true,
            fuzzy_threshold: 85,
            skip_duplicates_in_export: false,
        }
    }
}

/// Assigns group ids (`Phone-1`, `Email-2`, ...) from one shared counter
struct Flagger {
    contacts: Vec<FlaggedContact>,
    groups: Vec<DuplicateGroup>,
    counts: DuplicateCounts,
    next_group: usize,
}

impl Flagger {
    fn is_flagged(&self, idx: usize) -> bool {
        self.contacts[idx].is_duplicate()
    }

    /// Record a group when it holds at least one unflagged member
    ///
    /// Already-flagged members stay listed in the group but keep their first flag.
    fn flag_group(&mut self, kind: DuplicateKind, members: Vec<usize>) {
        if members.len() < 2 || members.iter().all(|&i| self.is_flagged(i)) {
            return;
        }

        self.next_group += 1;
        let group_id = format!("{}-{}", kind.group_prefix(), self.next_group);

        let mut newly_flagged = 0;
        for &idx in &members {
            let contact = &mut self.contacts[idx];
            if contact.duplicate_kind.is_none() {
                contact.duplicate_kind = Some(kind);
                contact.duplicate_group = Some(group_id.clone());
                newly_flagged += 1;
            }
        }

        match kind {
            DuplicateKind::Phone => self.counts.phone += newly_flagged,
            DuplicateKind::Email => self.counts.email += newly_flagged,
            DuplicateKind::ExactName => self.counts.exact_name += newly_flagged,
            DuplicateKind::FuzzyName => self.counts.fuzzy_name += newly_flagged,
        }

        tracing::debug!(group = %group_id, members = members.len(), newly_flagged, "Duplicate group");
        self.groups.push(DuplicateGroup {
            group_id,
            kind,
            members,
        });
    }

    /// Group indexes by a key, keeping first-appearance order; blank keys are skipped
    fn flag_by_key<F>(&mut self, kind: DuplicateKind, key_of: F)
    where
        F: Fn(&FlaggedContact) -> String,
    {
        let mut order: Vec<String> = Vec::new();
        let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();

        for (idx, contact) in self.contacts.iter().enumerate() {
            let key = key_of(contact);
            if key.is_empty() {
                continue;
            }
            buckets
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key);
                    Vec::new()
                })
                .push(idx);
        }

        for key in order {
            if let Some(members) = buckets.remove(&key) {
                self.flag_group(kind, members);
            }
        }
    }

    fn flag_fuzzy_names(&mut self, threshold: u8) {
        let names: Vec<String> = self
            .contacts
            .iter()
            .map(|c| c.full_name().to_lowercase())
            .collect();

        for i in 0..names.len() {
            for j in (i + 1)..names.len() {
                if self.is_flagged(i) {
                    break;
                }
                if self.is_flagged(j) || names[i].is_empty() || names[j].is_empty() {
                    continue;
                }
                if ratio(&names[i], &names[j]) >= threshold {
                    self.flag_group(DuplicateKind::FuzzyName, vec![i, j]);
                }
            }
        }
    }
}

/// Format phones, flag duplicates and build Outlook import rows
pub fn analyze_contacts(contacts: &[Contact], options: &DedupOptions) -> ContactReport {
    let prepared = contacts.iter().map(prepare).collect();

    let mut flagger = Flagger {
        contacts: prepared,
        groups: Vec::new(),
        counts: DuplicateCounts::default(),
        next_group: 0,
    };

    flagger.flag_by_key(DuplicateKind::Phone, |c| c.phone_formatted.clone());
    flagger.flag_by_key(DuplicateKind::Email, |c| c.email.trim().to_lowercase());
    flagger.flag_by_key(DuplicateKind::ExactName, |c| c.full_name().to_lowercase());
    if options.fuzzy_names {
        flagger.flag_fuzzy_names(options.fuzzy_threshold);
    }

    let Flagger {
        contacts,
        groups,
        mut counts,
        ..
    } = flagger;
    counts.total = contacts.iter().filter(|c| c.is_duplicate()).count();

    let stats = stats(&contacts);
    let outlook_rows = outlook_rows(&contacts, &groups, options.skip_duplicates_in_export);

    tracing::info!(
        contacts = stats.total,
        duplicates = counts.total,
        groups = groups.len(),
        "Contact analysis complete"
    );

    ContactReport {
        contacts,
        groups,
        duplicate_counts: counts,
        stats,
        outlook_rows,
    }
}

fn prepare(contact: &Contact) -> FlaggedContact {
    let (first_name, last_name) = contact.name_parts();
    let (phone_formatted, phone_status) = format_phone_number(&contact.phone);

    FlaggedContact {
        first_name,
        last_name,
        email: contact.email.trim().to_string(),
        company: contact.company.clone(),
        phone_raw: contact.phone.clone(),
        phone_formatted,
        phone_status,
        duplicate_kind: None,
        duplicate_group: None,
    }
}

fn stats(contacts: &[FlaggedContact]) -> ContactStats {
    let valid_phones = contacts.iter().filter(|c| c.has_valid_phone()).count();
    ContactStats {
        total: contacts.len(),
        valid_phones,
        invalid_phones: contacts.len() - valid_phones,
        duplicates: contacts.iter().filter(|c| c.is_duplicate()).count(),
        unique_valid: contacts
            .iter()
            .filter(|c| c.has_valid_phone() && !c.is_duplicate())
            .count(),
    }
}

/// Map contacts to Outlook import columns
///
/// With `skip_duplicates`, a flagged contact is exported only if it is the
/// first member of its own group.
pub fn outlook_rows(
    contacts: &[FlaggedContact],
    groups: &[DuplicateGroup],
    skip_duplicates: bool,
) -> Vec<OutlookContact> {
    let group_heads: HashMap<&str, usize> = groups
        .iter()
        .filter_map(|g| g.members.first().map(|&first| (g.group_id.as_str(), first)))
        .collect();

    contacts
        .iter()
        .enumerate()
        .filter(|(idx, c)| {
            if !skip_duplicates {
                return true;
            }
            match c.duplicate_group.as_deref() {
                None => true,
                Some(group) => group_heads.get(group) == Some(idx),
            }
        })
        .map(|(_, c)| OutlookContact {
            first_name: c.first_name.clone(),
            last_name: c.last_name.clone(),
            email: c.email.clone(),
            company: c.company.clone().unwrap_or_default(),
            business_phone: c.phone_formatted.clone(),
            mobile_phone: c.phone_formatted.clone(),
            primary_phone: c.phone_formatted.clone(),
            categories: OUTLOOK_CATEGORY.to_string(),
        })
        .collect()
}
