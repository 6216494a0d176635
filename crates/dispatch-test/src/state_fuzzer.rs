//! Action Fuzzer - Randomized action streams against the shared board
//!
//! Tests:
//! - Board invariants after every action
//! - Client convergence after every broadcast
//! - No-op safety for ids that do not exist
//! - One snapshot write per action

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;

use dispatch_core::{
    Action, Doctor, DoctorPatch, EntityId, InvariantViolation, Location, LocationKind,
    LocationPatch, State,
};

use crate::BoardSimulator;

/// Fuzzer configuration
#[derive(Clone, Debug)]
pub struct FuzzerConfig {
    /// Connected clients
    pub client_count: usize,
    /// Actions to generate
    pub action_count: usize,
    /// Probability an action targets an id that does not exist
    pub ghost_prob: f64,
    /// Probability of an unknown or malformed action
    pub noop_prob: f64,
    /// Probability of a wholesale LOAD_DATA with a messy board
    pub load_prob: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        FuzzerConfig {
            client_count: 3,
            action_count: 1000,
            ghost_prob: 0.1,
            noop_prob: 0.05,
            load_prob: 0.01,
            seed: 42,
        }
    }
}

impl FuzzerConfig {
    /// Light fuzzing for quick tests
    pub fn light() -> Self {
        FuzzerConfig {
            client_count: 2,
            action_count: 100,
            ghost_prob: 0.1,
            noop_prob: 0.05,
            load_prob: 0.0,
            seed: 42,
        }
    }

    /// Heavy fuzzing for thorough testing
    pub fn heavy() -> Self {
        FuzzerConfig {
            client_count: 8,
            action_count: 10000,
            ghost_prob: 0.2,
            noop_prob: 0.1,
            load_prob: 0.02,
            seed: 42,
        }
    }
}

/// Fuzzing result
#[derive(Debug, Default)]
pub struct FuzzResult {
    pub actions_applied: u64,
    /// Violations found, with the index of the action that produced them
    pub violations: Vec<(usize, InvariantViolation)>,
    /// Actions after which some client's view differed from the board
    pub divergences: usize,
    /// Ghost-id actions that changed the board
    pub ghost_mutations: usize,
    pub snapshot_writes: usize,
}

impl FuzzResult {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
            && self.divergences == 0
            && self.ghost_mutations == 0
            && self.snapshot_writes as u64 == self.actions_applied
    }
}

/// Generated action and whether it only references missing ids
struct FuzzAction {
    action: Action,
    ghost: bool,
}

/// Action fuzzer
pub struct StateFuzzer {
    config: FuzzerConfig,
    rng: StdRng,
    ghost_seq: u64,
}

impl StateFuzzer {
    pub fn new(config: FuzzerConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        StateFuzzer {
            config,
            rng,
            ghost_seq: 0,
        }
    }

    /// Run the fuzzer
    pub fn run(&mut self) -> FuzzResult {
        let mut sim = BoardSimulator::new(self.config.client_count.max(1));
        let mut result = FuzzResult::default();

        for step in 0..self.config.action_count {
            let before = sim.state().clone();
            let generated = self.generate(&before);
            let client = self.rng.gen_range(0..sim.client_count());

            let after = sim.submit(client, generated.action).clone();

            if generated.ghost && after != before {
                result.ghost_mutations += 1;
            }
            result
                .violations
                .extend(after.check_invariants().into_iter().map(|v| (step, v)));
            if !sim.report().converged() {
                result.divergences += 1;
            }
        }

        let report = sim.report();
        result.actions_applied = report.stats.actions_applied;
        result.snapshot_writes = report.snapshot_writes;
        result
    }

    fn generate(&mut self, board: &State) -> FuzzAction {
        if self.rng.gen::<f64>() < self.config.noop_prob {
            return FuzzAction {
                action: self.generate_noop(),
                ghost: true,
            };
        }
        if self.rng.gen::<f64>() < self.config.load_prob {
            return FuzzAction {
                action: Action::LoadData(self.generate_board()),
                ghost: false,
            };
        }

        let ghost = self.rng.gen::<f64>() < self.config.ghost_prob;
        let action = match self.rng.gen_range(0..8) {
            0 => Action::add_doctor(self.name("Dr."), self.specialty()),
            1 => Action::UpdateDoctor(DoctorPatch {
                id: self.doctor_id(board, ghost),
                name: self.rng.gen_bool(0.5).then(|| self.name("Dr.")),
                specialty: self.rng.gen_bool(0.5).then(|| self.specialty()),
            }),
            2 => Action::DeleteDoctor(self.doctor_id(board, ghost)),
            3 => Action::add_location(self.name("Salle"), self.location_kind()),
            4 => Action::UpdateLocation(LocationPatch {
                id: self.location_id(board, ghost),
                name: self.rng.gen_bool(0.5).then(|| self.name("Salle")),
                kind: self.rng.gen_bool(0.5).then(|| self.location_kind()),
            }),
            5 => Action::DeleteLocation(self.location_id(board, ghost)),
            6 => {
                let doctor = self.doctor_id(board, ghost);
                let source = board.location_of(&doctor).cloned();
                let destination = if self.rng.gen_bool(0.1) {
                    None
                } else {
                    Some(self.location_id(board, ghost))
                };
                Action::move_doctor(doctor, source, destination)
            }
            _ => {
                let doctor = self.doctor_id(board, ghost);
                let location = board
                    .location_of(&doctor)
                    .cloned()
                    .unwrap_or_else(|| self.location_id(board, ghost));
                Action::unassign(doctor, location)
            }
        };

        // Adding never references an existing id
        let ghost = ghost && !matches!(action, Action::AddDoctor(_) | Action::AddLocation(_));
        FuzzAction { action, ghost }
    }

    fn generate_noop(&mut self) -> Action {
        if self.rng.gen_bool(0.5) {
            Action::Unknown {
                kind: "UNDO".to_string(),
                payload: Value::Null,
            }
        } else {
            Action::Malformed {
                kind: dispatch_core::MOVE_DOCTOR.to_string(),
                reason: "missing field `doctorId`".to_string(),
            }
        }
    }

    /// A board with duplicates and dangling references for LOAD_DATA
    fn generate_board(&mut self) -> State {
        let mut state = State::initial();
        let doctors = self.rng.gen_range(0..6u64);
        for id in 1..=doctors {
            state.doctors.push(Doctor {
                id: EntityId::numeric(id),
                name: self.name("Dr."),
                specialty: self.specialty(),
            });
        }
        state.locations.push(Location {
            id: EntityId::numeric(100),
            name: self.name("Salle"),
            kind: LocationKind::Other,
        });

        let keys: Vec<EntityId> = state.locations.iter().map(|l| l.id.clone()).collect();
        for _ in 0..self.rng.gen_range(0..8) {
            let key = keys[self.rng.gen_range(0..keys.len())].clone();
            // Ids past the staff list are dangling on purpose
            let doctor = EntityId::numeric(self.rng.gen_range(1..=doctors + 2));
            state.assignments.entry(key).or_default().push(doctor);
        }
        if self.rng.gen_bool(0.3) {
            state
                .assignments
                .insert(EntityId::new("nowhere"), vec![EntityId::numeric(1)]);
        }
        state
    }

    fn doctor_id(&mut self, board: &State, ghost: bool) -> EntityId {
        if ghost || board.doctors.is_empty() {
            return self.ghost_id();
        }
        let idx = self.rng.gen_range(0..board.doctors.len());
        board.doctors[idx].id.clone()
    }

    fn location_id(&mut self, board: &State, ghost: bool) -> EntityId {
        if ghost || board.locations.is_empty() {
            return self.ghost_id();
        }
        let idx = self.rng.gen_range(0..board.locations.len());
        board.locations[idx].id.clone()
    }

    fn ghost_id(&mut self) -> EntityId {
        self.ghost_seq += 1;
        EntityId::new(format!("ghost-{}", self.ghost_seq))
    }

    fn name(&mut self, prefix: &str) -> String {
        format!("{prefix} {}", self.rng.gen_range(0..1000))
    }

    fn specialty(&mut self) -> String {
        const SPECIALTIES: [&str; 4] = ["Urgences", "Cardiologie", "Pédiatrie", "Anesthésie"];
        SPECIALTIES[self.rng.gen_range(0..SPECIALTIES.len())].to_string()
    }

    fn location_kind(&mut self) -> LocationKind {
        match self.rng.gen_range(0..4) {
            0 => LocationKind::Repos,
            1 => LocationKind::Intervention,
            2 => LocationKind::Absent,
            _ => LocationKind::Other,
        }
    }
}

/// Property helpers over single transitions
pub mod properties {
    use super::*;

    /// Every doctor appears in at most one assignment sequence
    pub fn single_assignment(state: &State) -> bool {
        let mut seen = std::collections::BTreeSet::new();
        state
            .assignments
            .values()
            .flatten()
            .all(|doctor| seen.insert(doctor.clone()))
    }

    /// After a delete, the id is gone from every sequence
    pub fn doctor_fully_removed(state: &State, doctor: &EntityId) -> bool {
        !state.has_doctor(doctor) && state.location_of(doctor).is_none()
    }

    /// Applying the same action twice equals applying it once
    pub fn idempotent(state: &State, action: &Action) -> bool {
        let once = dispatch_state::apply(state, action.clone());
        let twice = dispatch_state::apply(&once, action.clone());
        once == twice
    }
}
