//! Board model
//!
//! The board is the single unit of truth shared by every connected client:
//! the doctors on staff, the locations they can be dispatched to, and the
//! assignment table placing doctors at locations. It is always replaced
//! wholesale, never patched field by field from outside the reducer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::EntityId;

/// A doctor on staff
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: EntityId,
    pub name: String,
    pub specialty: String,
}

/// A place doctors are dispatched to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: EntityId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: LocationKind,
}

/// Location category tag.
///
/// Tags outside the known set are carried verbatim in `Custom` so that a
/// board written by a newer client still loads.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LocationKind {
    Repos,
    Intervention,
    Absent,
    Other,
    Custom(String),
}

impl LocationKind {
    pub fn as_str(&self) -> &str {
        match self {
            LocationKind::Repos => "repos",
            LocationKind::Intervention => "intervention",
            LocationKind::Absent => "absent",
            LocationKind::Other => "other",
            LocationKind::Custom(tag) => tag,
        }
    }
}

impl From<String> for LocationKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "repos" => LocationKind::Repos,
            "intervention" => LocationKind::Intervention,
            "absent" => LocationKind::Absent,
            "other" => LocationKind::Other,
            _ => LocationKind::Custom(tag),
        }
    }
}

impl From<&str> for LocationKind {
    fn from(tag: &str) -> Self {
        LocationKind::from(tag.to_string())
    }
}

impl From<LocationKind> for String {
    fn from(kind: LocationKind) -> Self {
        match kind {
            LocationKind::Custom(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

/// Location id -> ordered doctor ids placed there
pub type Assignments = BTreeMap<EntityId, Vec<EntityId>>;

/// Built-in locations present on a fresh board: (id, display name, kind)
pub const BUILTIN_LOCATIONS: [(&str, &str, LocationKind); 3] = [
    ("repos", "Repos", LocationKind::Repos),
    ("intervention", "Intervention", LocationKind::Intervention),
    ("absent", "Absent", LocationKind::Absent),
];

/// The whole board
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub doctors: Vec<Doctor>,
    pub locations: Vec<Location>,
    pub assignments: Assignments,
}

impl State {
    /// Empty board
    pub fn new() -> Self {
        State::default()
    }

    /// Fresh board: no doctors, the built-in locations, all empty
    pub fn initial() -> Self {
        let mut state = State::new();
        for (id, name, kind) in BUILTIN_LOCATIONS {
            let id = EntityId::new(id);
            state.assignments.insert(id.clone(), Vec::new());
            state.locations.push(Location {
                id,
                name: name.to_string(),
                kind,
            });
        }
        state
    }

    pub fn doctor(&self, id: &EntityId) -> Option<&Doctor> {
        self.doctors.iter().find(|d| &d.id == id)
    }

    pub fn location(&self, id: &EntityId) -> Option<&Location> {
        self.locations.iter().find(|l| &l.id == id)
    }

    pub fn has_doctor(&self, id: &EntityId) -> bool {
        self.doctor(id).is_some()
    }

    pub fn has_location(&self, id: &EntityId) -> bool {
        self.location(id).is_some()
    }

    /// Doctor ids placed at a location, empty if the location is unknown
    pub fn assigned_to(&self, location: &EntityId) -> &[EntityId] {
        self.assignments
            .get(location)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Location a doctor is currently placed at
    pub fn location_of(&self, doctor: &EntityId) -> Option<&EntityId> {
        self.assignments
            .iter()
            .find(|(_, seq)| seq.contains(doctor))
            .map(|(location, _)| location)
    }

    /// Doctors not placed anywhere
    pub fn unassigned_doctors(&self) -> impl Iterator<Item = &Doctor> {
        self.doctors
            .iter()
            .filter(move |d| self.location_of(&d.id).is_none())
    }

    /// Every entity id mentioned on the board
    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.doctors
            .iter()
            .map(|d| &d.id)
            .chain(self.locations.iter().map(|l| &l.id))
            .chain(self.assignments.keys())
            .chain(self.assignments.values().flatten())
    }

    /// Largest numeric id on the board, 0 if there is none
    pub fn max_numeric_id(&self) -> u64 {
        self.ids().filter_map(EntityId::as_u64).max().unwrap_or(0)
    }

    /// True if any doctor or location already uses `id`
    pub fn id_in_use(&self, id: &EntityId) -> bool {
        self.has_doctor(id) || self.has_location(id) || self.assignments.contains_key(id)
    }
}
