//! Phone and email slots, and the global phone uniqueness guard.

use serde::Serialize;

use super::domain::ClientId;

pub const PHONE_SLOTS: usize = 3;
pub const EMAIL_SLOTS: usize = 2;

/// Keeps the digits and a single leading `+`. Blank input yields an empty string.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if trimmed.starts_with('+') {
        format!("+{digits}")
    } else {
        digits
    }
}

/// Digits only, used for loose phone matching in free-text search.
pub fn phone_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Normalized phone candidates indexed by slot (`slots[0]` is position 1).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhoneSlots {
    slots: [Option<String>; PHONE_SLOTS],
}

impl PhoneSlots {
    /// Normalizes the raw slot values; blank slots stay empty. Extra values are ignored,
    /// input validation rejects them earlier.
    pub fn from_raw<S: AsRef<str>>(raw: &[S]) -> Self {
        let mut slots: [Option<String>; PHONE_SLOTS] = Default::default();
        for (slot, value) in slots.iter_mut().zip(raw) {
            let normalized = normalize_phone(value.as_ref());
            if !normalized.is_empty() {
                *slot = Some(normalized);
            }
        }
        Self { slots }
    }

    pub fn get(&self, position: u8) -> Option<&str> {
        let index = usize::from(position).checked_sub(1)?;
        self.slots.get(index)?.as_deref()
    }

    /// `(position, number)` pairs for filled slots, in slot order.
    pub fn filled(&self) -> impl Iterator<Item = (u8, &str)> + '_ {
        self.slots
            .iter()
            .zip(1u8..)
            .filter_map(|(slot, position)| slot.as_deref().map(|number| (position, number)))
    }
}

/// Trimmed email values indexed by slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailSlots {
    slots: [Option<String>; EMAIL_SLOTS],
}

impl EmailSlots {
    pub fn from_raw<S: AsRef<str>>(raw: &[S]) -> Self {
        let mut slots: [Option<String>; EMAIL_SLOTS] = Default::default();
        for (slot, value) in slots.iter_mut().zip(raw) {
            let trimmed = value.as_ref().trim();
            if !trimmed.is_empty() {
                *slot = Some(trimmed.to_string());
            }
        }
        Self { slots }
    }

    pub fn get(&self, position: u8) -> Option<&str> {
        let index = usize::from(position).checked_sub(1)?;
        self.slots.get(index)?.as_deref()
    }

    pub fn filled(&self) -> impl Iterator<Item = (u8, &str)> + '_ {
        self.slots
            .iter()
            .zip(1u8..)
            .filter_map(|(slot, position)| slot.as_deref().map(|address| (position, address)))
    }
}

/// Lookup of the client that currently owns a normalized phone number.
pub trait PhoneOwnership {
    fn phone_owner(&self, normalized: &str) -> Option<ClientId>;
}

/// One rejected phone slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhoneConflict {
    /// Two slots of the same submission carry the same number.
    WithinSubmission {
        position: u8,
        duplicate_of: u8,
        number: String,
    },
    /// The number already belongs to another client.
    OwnedByOtherClient {
        position: u8,
        number: String,
        owner: ClientId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{}", describe(.conflicts))]
pub struct DuplicatePhoneError {
    pub conflicts: Vec<PhoneConflict>,
}

impl DuplicatePhoneError {
    /// First client that already owns one of the submitted numbers.
    pub fn owner(&self) -> Option<ClientId> {
        self.conflicts.iter().find_map(|conflict| match conflict {
            PhoneConflict::OwnedByOtherClient { owner, .. } => Some(*owner),
            PhoneConflict::WithinSubmission { .. } => None,
        })
    }

    pub fn is_within_submission(&self) -> bool {
        self.conflicts
            .iter()
            .all(|conflict| matches!(conflict, PhoneConflict::WithinSubmission { .. }))
    }
}

fn describe(conflicts: &[PhoneConflict]) -> String {
    match conflicts.first() {
        Some(PhoneConflict::WithinSubmission { position, .. }) => {
            format!("phone {position} repeats another phone of the same client")
        }
        Some(PhoneConflict::OwnedByOtherClient { position, owner, .. }) => {
            format!("phone {position} is already assigned to client {owner}")
        }
        None => "duplicate phone".to_string(),
    }
}

/// Validates a set of phone candidates for a create (`editing = None`) or an edit.
///
/// Repeats inside the submission are reported on their own; the store is only
/// consulted once the submission itself is clean.
pub fn check_phones<O>(
    phones: &PhoneSlots,
    editing: Option<ClientId>,
    directory: &O,
) -> Result<(), DuplicatePhoneError>
where
    O: PhoneOwnership + ?Sized,
{
    let filled: Vec<(u8, &str)> = phones.filled().collect();

    let mut conflicts = Vec::new();
    for (index, (position, number)) in filled.iter().enumerate() {
        if let Some((earlier, _)) = filled[..index].iter().find(|(_, other)| other == number) {
            conflicts.push(PhoneConflict::WithinSubmission {
                position: *position,
                duplicate_of: *earlier,
                number: number.to_string(),
            });
        }
    }
    if !conflicts.is_empty() {
        return Err(DuplicatePhoneError { conflicts });
    }

    for (position, number) in filled {
        match directory.phone_owner(number) {
            Some(owner) if Some(owner) != editing => {
                conflicts.push(PhoneConflict::OwnedByOtherClient {
                    position,
                    number: number.to_string(),
                    owner,
                });
            }
            _ => {}
        }
    }

    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(DuplicatePhoneError { conflicts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Directory(HashMap<String, ClientId>);

    impl PhoneOwnership for Directory {
        fn phone_owner(&self, normalized: &str) -> Option<ClientId> {
            self.0.get(normalized).copied()
        }
    }

    fn directory(entries: &[(&str, u64)]) -> Directory {
        Directory(
            entries
                .iter()
                .map(|(number, owner)| (number.to_string(), ClientId(*owner)))
                .collect(),
        )
    }

    #[test]
    fn normalization_keeps_leading_plus_only() {
        assert_eq!(normalize_phone(" +34 600-111 222 "), "+34600111222");
        assert_eq!(normalize_phone("(600) 111.222"), "600111222");
        assert_eq!(normalize_phone("600+111"), "600111");
        assert_eq!(normalize_phone("   "), "");
    }

    #[test]
    fn slots_keep_their_positions() {
        let slots = PhoneSlots::from_raw(&["600 111 222", "", "+34 700"]);
        assert_eq!(slots.get(1), Some("600111222"));
        assert_eq!(slots.get(2), None);
        assert_eq!(slots.get(3), Some("+34700"));
        assert_eq!(slots.get(0), None);
        assert_eq!(
            slots.filled().collect::<Vec<_>>(),
            vec![(1, "600111222"), (3, "+34700")]
        );
    }

    #[test]
    fn repeated_number_in_submission_is_rejected() {
        let slots = PhoneSlots::from_raw(&["600111222", "600-111-222"]);
        let err = check_phones(&slots, None, &directory(&[])).expect_err("duplicate");
        assert!(err.is_within_submission());
        assert_eq!(
            err.conflicts,
            vec![PhoneConflict::WithinSubmission {
                position: 2,
                duplicate_of: 1,
                number: "600111222".to_string(),
            }]
        );
        assert_eq!(err.owner(), None);
    }

    #[test]
    fn number_owned_by_other_client_reports_owner() {
        let slots = PhoneSlots::from_raw(&["611000000", "600111222"]);
        let err = check_phones(&slots, None, &directory(&[("600111222", 7)]))
            .expect_err("owned elsewhere");
        assert_eq!(err.owner(), Some(ClientId(7)));
        assert!(err.to_string().contains("client 7"));
    }

    #[test]
    fn editing_client_may_keep_its_own_numbers() {
        let slots = PhoneSlots::from_raw(&["600111222"]);
        let numbers = directory(&[("600111222", 3)]);
        assert!(check_phones(&slots, Some(ClientId(3)), &numbers).is_ok());
        assert!(check_phones(&slots, Some(ClientId(4)), &numbers).is_err());
    }

    #[test]
    fn within_submission_duplicates_skip_the_directory() {
        let slots = PhoneSlots::from_raw(&["600111222", "600111222"]);
        let err = check_phones(&slots, None, &directory(&[("600111222", 9)]))
            .expect_err("duplicate");
        assert!(err.is_within_submission());
    }
}
