//! Board invariants
//!
//! These hold after every reducer application:
//!
//! 1. **Single assignment** - a doctor appears in at most one location's
//!    sequence, at most once.
//! 2. **Table matches locations** - every assignment key is an existing
//!    location and every location has exactly one (possibly empty) entry.
//! 3. **Assigned doctors exist** - every doctor id in the table refers to a
//!    doctor on staff.
//! 4. **Unique ids** - no two doctors, and no two locations, share an id.
//!
//! Boards coming from outside the reducer (snapshots, `LOAD_DATA`) may break
//! them; [`State::normalized`] repairs such a board and reports what it fixed.

use std::collections::HashSet;
use std::fmt;

use crate::{Assignments, EntityId, State};

/// The board invariants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Invariant {
    SingleAssignment,
    TableMatchesLocations,
    AssignedDoctorsExist,
    UniqueIds,
}

impl Invariant {
    pub fn name(&self) -> &'static str {
        match self {
            Invariant::SingleAssignment => "Single Assignment",
            Invariant::TableMatchesLocations => "Assignment Table Matches Locations",
            Invariant::AssignedDoctorsExist => "Assigned Doctors Exist",
            Invariant::UniqueIds => "Unique Ids",
        }
    }
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One concrete breach found on a board
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Doctor listed again at `location` after an earlier placement
    DoubleBooked { doctor: EntityId, location: EntityId },
    /// Assignment entry whose key is not a location
    OrphanEntry { location: EntityId },
    /// Location with no assignment entry
    MissingEntry { location: EntityId },
    /// Assignment sequence naming a doctor not on staff
    UnknownDoctor { doctor: EntityId, location: EntityId },
    DuplicateDoctor { doctor: EntityId },
    DuplicateLocation { location: EntityId },
}

impl InvariantViolation {
    pub fn invariant(&self) -> Invariant {
        match self {
            InvariantViolation::DoubleBooked { .. } => Invariant::SingleAssignment,
            InvariantViolation::OrphanEntry { .. } | InvariantViolation::MissingEntry { .. } => {
                Invariant::TableMatchesLocations
            }
            InvariantViolation::UnknownDoctor { .. } => Invariant::AssignedDoctorsExist,
            InvariantViolation::DuplicateDoctor { .. }
            | InvariantViolation::DuplicateLocation { .. } => Invariant::UniqueIds,
        }
    }
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} violated: ", self.invariant())?;
        match self {
            InvariantViolation::DoubleBooked { doctor, location } => {
                write!(f, "doctor {doctor} placed again at {location}")
            }
            InvariantViolation::OrphanEntry { location } => {
                write!(f, "assignment entry {location} has no location")
            }
            InvariantViolation::MissingEntry { location } => {
                write!(f, "location {location} has no assignment entry")
            }
            InvariantViolation::UnknownDoctor { doctor, location } => {
                write!(f, "unknown doctor {doctor} placed at {location}")
            }
            InvariantViolation::DuplicateDoctor { doctor } => {
                write!(f, "doctor id {doctor} used twice")
            }
            InvariantViolation::DuplicateLocation { location } => {
                write!(f, "location id {location} used twice")
            }
        }
    }
}

impl std::error::Error for InvariantViolation {}

/// Types that can check themselves against the board invariants
pub trait InvariantCompliant {
    /// Returns `Ok(())` if compliant, or every violation found.
    fn verify_invariants(&self) -> Result<(), Vec<InvariantViolation>>;
}

impl InvariantCompliant for State {
    fn verify_invariants(&self) -> Result<(), Vec<InvariantViolation>> {
        let violations = self.check_invariants();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

impl State {
    /// Every invariant violation on this board
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        self.normalized().1
    }

    /// Repair the board so every invariant holds.
    ///
    /// Duplicate doctors and locations keep their first occurrence, missing
    /// entries are created empty, orphan entries and unknown doctors are
    /// dropped, and a doctor placed more than once keeps only the first
    /// placement in location order. A compliant board comes back unchanged.
    pub fn normalized(&self) -> (State, Vec<InvariantViolation>) {
        let mut violations = Vec::new();

        let mut seen = HashSet::new();
        let mut doctors = Vec::with_capacity(self.doctors.len());
        for doctor in &self.doctors {
            if seen.insert(&doctor.id) {
                doctors.push(doctor.clone());
            } else {
                violations.push(InvariantViolation::DuplicateDoctor {
                    doctor: doctor.id.clone(),
                });
            }
        }
        let staff = seen;

        let mut seen = HashSet::new();
        let mut locations = Vec::with_capacity(self.locations.len());
        for location in &self.locations {
            if seen.insert(&location.id) {
                locations.push(location.clone());
            } else {
                violations.push(InvariantViolation::DuplicateLocation {
                    location: location.id.clone(),
                });
            }
        }

        let mut placed: HashSet<&EntityId> = HashSet::new();
        let mut assignments = Assignments::new();
        for location in &locations {
            let Some(seq) = self.assignments.get(&location.id) else {
                violations.push(InvariantViolation::MissingEntry {
                    location: location.id.clone(),
                });
                assignments.insert(location.id.clone(), Vec::new());
                continue;
            };

            let mut kept = Vec::with_capacity(seq.len());
            for doctor in seq {
                if !staff.contains(doctor) {
                    violations.push(InvariantViolation::UnknownDoctor {
                        doctor: doctor.clone(),
                        location: location.id.clone(),
                    });
                } else if !placed.insert(doctor) {
                    violations.push(InvariantViolation::DoubleBooked {
                        doctor: doctor.clone(),
                        location: location.id.clone(),
                    });
                } else {
                    kept.push(doctor.clone());
                }
            }
            assignments.insert(location.id.clone(), kept);
        }

        for key in self.assignments.keys() {
            if !assignments.contains_key(key) {
                violations.push(InvariantViolation::OrphanEntry {
                    location: key.clone(),
                });
            }
        }

        let state = State {
            doctors,
            locations,
            assignments,
        };
        (state, violations)
    }
}

/// Panic with every violation if the board is not compliant.
///
/// Use this in tests to catch invariant breaches early.
#[track_caller]
pub fn assert_invariants(state: &State, context: &str) {
    if let Err(violations) = state.verify_invariants() {
        let lines: Vec<String> = violations.iter().map(ToString::to_string).collect();
        panic!("board invariants violated ({context}):\n  {}", lines.join("\n  "));
    }
}
