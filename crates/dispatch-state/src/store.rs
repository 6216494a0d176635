//! Canonical store - the live board

use dispatch_core::{Action, EntityId, IdAllocator, State};

use crate::reducer;

/// Holds the single live board.
///
/// The store is owned by one serialized handler and is never shared, so it
/// needs no locking. A new board is swapped in only once fully built.
#[derive(Debug)]
pub struct CanonicalStore {
    state: State,
    ids: IdAllocator,
    version: u64,
}

impl CanonicalStore {
    pub fn new(state: State) -> Self {
        let ids = IdAllocator::seeded(state.max_numeric_id());
        CanonicalStore {
            state,
            ids,
            version: 0,
        }
    }

    /// Get the live board
    pub fn current(&self) -> &State {
        &self.state
    }

    /// Number of commits since the store was created
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Replace the live board
    pub fn commit(&mut self, next: State) {
        self.ids.observe_all(next.ids());
        self.state = next;
        self.version += 1;
    }

    /// Give `ADD_*` actions a fresh id from the allocator
    pub fn stamp(&mut self, action: Action) -> Action {
        match action {
            Action::AddDoctor(mut new) => {
                new.id = Some(self.fresh_id());
                Action::AddDoctor(new)
            }
            Action::AddLocation(mut new) => {
                new.id = Some(self.fresh_id());
                Action::AddLocation(new)
            }
            other => other,
        }
    }

    /// Stamp, reduce and commit one action
    pub fn dispatch(&mut self, action: Action) -> &State {
        let action = self.stamp(action);
        let next = reducer::apply(&self.state, action);
        self.commit(next);
        &self.state
    }

    fn fresh_id(&mut self) -> EntityId {
        while let Some(id) = self.ids.next_id() {
            if !self.state.id_in_use(&id) {
                return id;
            }
        }
        // Numeric space exhausted, let the reducer pick a textual id
        reducer::fresh_id(&self.state, None)
    }
}

impl Default for CanonicalStore {
    fn default() -> Self {
        Self::new(State::initial())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_never_repeat_after_delete() {
        let mut store = CanonicalStore::default();
        store.dispatch(Action::add_doctor("Dr. Dupont", "Cardiologie"));
        let first = store.current().doctors[0].id.clone();

        store.dispatch(Action::DeleteDoctor(first.clone()));
        store.dispatch(Action::add_doctor("Dr. Martin", "Pédiatrie"));
        let second = store.current().doctors[0].id.clone();

        assert_ne!(first, second);
        assert_eq!(store.version(), 3);
    }

    #[test]
    fn test_seeded_above_loaded_ids() {
        let mut seed = State::initial();
        seed.doctors.push(dispatch_core::Doctor {
            id: EntityId::numeric(1_700_000_000_000),
            name: "Dr. Leroy".to_string(),
            specialty: "Chirurgie".to_string(),
        });
        let mut store = CanonicalStore::new(seed);

        store.dispatch(Action::add_location("Bloc", "other"));
        let bloc = store.current().locations.last().unwrap();
        assert_eq!(bloc.id, EntityId::numeric(1_700_000_000_001));
    }

    #[test]
    fn test_commit_raises_allocator_floor() {
        let mut store = CanonicalStore::default();
        let mut loaded = State::initial();
        loaded.doctors.push(dispatch_core::Doctor {
            id: EntityId::numeric(90),
            name: "Dr. Petit".to_string(),
            specialty: "ORL".to_string(),
        });
        store.dispatch(Action::LoadData(loaded));
        store.dispatch(Action::DeleteDoctor(EntityId::numeric(90)));
        store.dispatch(Action::add_doctor("Dr. Roux", "Urgences"));

        assert_eq!(store.current().doctors[0].id, EntityId::numeric(91));
    }

    #[test]
    fn test_add_after_u64_max_id_is_loaded() {
        let mut store = CanonicalStore::default();
        let mut loaded = State::initial();
        loaded.doctors.push(dispatch_core::Doctor {
            id: EntityId::numeric(u64::MAX),
            name: "Dr. Garnier".to_string(),
            specialty: "Urgences".to_string(),
        });
        store.dispatch(Action::LoadData(loaded));

        store.dispatch(Action::add_doctor("Dr. Roux", "Urgences"));
        store.dispatch(Action::add_location("Bloc", "other"));

        let board = store.current();
        assert_eq!(board.doctors.len(), 2);
        let added = &board.doctors[1].id;
        assert_ne!(added, &EntityId::numeric(u64::MAX));
        assert_eq!(added.as_u64(), None);
        let bloc = &board.locations.last().unwrap().id;
        assert_ne!(bloc, added);
        assert!(board.check_invariants().is_empty());
        assert_eq!(store.version(), 3);
    }

    #[test]
    fn test_stamp_leaves_other_actions_alone() {
        let mut store = CanonicalStore::default();
        let action = Action::move_doctor(1, None, Some(EntityId::new("repos")));
        assert_eq!(store.stamp(action.clone()), action);
    }
}
