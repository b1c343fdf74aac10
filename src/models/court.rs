use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a slot: the exact `(startTime, endTime)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotTime {
    #[serde(rename = "startTime")]
    pub start_time: String,
    #[serde(rename = "endTime")]
    pub end_time: String,
}

impl SlotTime {
    pub fn new(start_time: impl Into<String>, end_time: impl Into<String>) -> Self {
        Self { start_time: start_time.into(), end_time: end_time.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    #[serde(rename = "startTime")]
    pub start_time: String,
    #[serde(rename = "endTime")]
    pub end_time: String,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

impl Slot {
    pub fn matches(&self, time: &SlotTime) -> bool {
        self.start_time == time.start_time && self.end_time == time.end_time
    }
}

/// Flips `available` on every slot whose times equal one of `targets`.
///
/// Returns how many slots actually changed; a slot already in the requested
/// state does not count.
pub fn set_availability(slots: &mut [Slot], targets: &[SlotTime], available: bool) -> usize {
    let mut changed = 0;
    for slot in slots.iter_mut() {
        if slot.available != available && targets.iter().any(|t| slot.matches(t)) {
            slot.available = available;
            changed += 1;
        }
    }
    changed
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Court {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "sportType")]
    pub sport_type: String,
    pub image: Option<String>,
    pub price: Option<f64>,
    pub slots: Vec<Slot>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewCourt {
    pub name: String,
    pub sport_type: String,
    pub image: Option<String>,
    pub price: Option<f64>,
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourtPatch {
    pub name: Option<String>,
    #[serde(rename = "sportType")]
    pub sport_type: Option<String>,
    pub image: Option<String>,
    pub price: Option<f64>,
    pub slots: Option<Vec<Slot>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn slot(start: &str, end: &str, available: bool) -> Slot {
        Slot { start_time: start.into(), end_time: end.into(), available }
    }

    #[test]
    fn matches_on_exact_pair_only() {
        let mut slots = vec![
            slot("08:00", "09:00", true),
            slot("09:00", "10:00", true),
            slot("08:00", "10:00", true),
        ];
        let changed = set_availability(&mut slots, &[SlotTime::new("08:00", "09:00")], false);

        assert_eq!(changed, 1);
        assert!(!slots[0].available);
        assert!(slots[1].available);
        // overlapping but not equal
        assert!(slots[2].available);
    }

    #[test]
    fn already_in_state_is_not_a_change() {
        let mut slots = vec![slot("08:00", "09:00", true)];
        let changed = set_availability(&mut slots, &[SlotTime::new("08:00", "09:00")], true);
        assert_eq!(changed, 0);
    }

    #[test]
    fn slot_defaults_to_available() {
        let s: Slot = serde_json::from_str(r#"{"startTime":"1","endTime":"2"}"#).unwrap();
        assert!(s.available);
    }

    proptest! {
        #[test]
        fn only_targeted_slots_change(
            flags in proptest::collection::vec(any::<bool>(), 1..20),
            pick in proptest::collection::vec(any::<bool>(), 20),
        ) {
            let mut slots: Vec<Slot> = flags
                .iter()
                .enumerate()
                .map(|(i, a)| slot(&format!("{i:02}:00"), &format!("{i:02}:59"), *a))
                .collect();
            let before = slots.clone();
            let targets: Vec<SlotTime> = before
                .iter()
                .zip(pick.iter())
                .filter(|(_, p)| **p)
                .map(|(s, _)| SlotTime::new(s.start_time.clone(), s.end_time.clone()))
                .collect();

            let changed = set_availability(&mut slots, &targets, false);

            let expected = before
                .iter()
                .filter(|s| s.available && targets.iter().any(|t| s.matches(t)))
                .count();
            prop_assert_eq!(changed, expected);
            for (old, new) in before.iter().zip(slots.iter()) {
                if targets.iter().any(|t| old.matches(t)) {
                    prop_assert!(!new.available);
                } else {
                    prop_assert_eq!(old, new);
                }
            }
        }
    }
}
