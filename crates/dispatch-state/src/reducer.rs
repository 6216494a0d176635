//! Board reducer
//!
//! [`apply`] computes the next board from the current one and an action.
//! It is total and free of side effects: actions naming unknown ids, and
//! actions the server could not decode, return the board unchanged.

use dispatch_core::{
    Action, Doctor, DoctorPatch, EntityId, Location, LocationPatch, MoveDoctor, NewDoctor,
    NewLocation, State, Unassign,
};

/// Apply one action, producing a new board
pub fn apply(state: &State, action: Action) -> State {
    match action {
        Action::LoadData(payload) => payload.normalized().0,
        Action::AddDoctor(new) => add_doctor(state, new),
        Action::UpdateDoctor(patch) => update_doctor(state, patch),
        Action::DeleteDoctor(id) => delete_doctor(state, &id),
        Action::AddLocation(new) => add_location(state, new),
        Action::UpdateLocation(patch) => update_location(state, patch),
        Action::DeleteLocation(id) => delete_location(state, &id),
        Action::MoveDoctor(mv) => move_doctor(state, mv),
        Action::RemoveDoctorFromLocation(un) => remove_from_location(state, un),
        Action::Unknown { .. } | Action::Malformed { .. } => state.clone(),
    }
}

/// Apply a sequence of actions in order
pub fn apply_all(state: &State, actions: impl IntoIterator<Item = Action>) -> State {
    actions
        .into_iter()
        .fold(state.clone(), |acc, action| apply(&acc, action))
}

/// Pick the id for a new entity.
///
/// A stamped id is used as long as nothing on the board already has it;
/// otherwise the id is derived from the board itself, one past the largest
/// numeric id in use.
pub fn fresh_id(state: &State, stamped: Option<EntityId>) -> EntityId {
    if let Some(id) = stamped.filter(|id| !state.id_in_use(id)) {
        return id;
    }

    let candidate = EntityId::numeric(state.max_numeric_id().saturating_add(1));
    if !state.id_in_use(&candidate) {
        return candidate;
    }

    // Numeric space exhausted
    (0u64..)
        .map(|n| EntityId::new(format!("id-{n}")))
        .find(|id| !state.id_in_use(id))
        .unwrap_or(candidate)
}

fn add_doctor(state: &State, new: NewDoctor) -> State {
    let mut next = state.clone();
    next.doctors.push(Doctor {
        id: fresh_id(state, new.id),
        name: new.name,
        specialty: new.specialty,
    });
    next
}

fn update_doctor(state: &State, patch: DoctorPatch) -> State {
    let mut next = state.clone();
    if let Some(doctor) = next.doctors.iter_mut().find(|d| d.id == patch.id) {
        if let Some(name) = patch.name {
            doctor.name = name;
        }
        if let Some(specialty) = patch.specialty {
            doctor.specialty = specialty;
        }
    }
    next
}

fn delete_doctor(state: &State, id: &EntityId) -> State {
    let mut next = state.clone();
    next.doctors.retain(|d| &d.id != id);
    for seq in next.assignments.values_mut() {
        seq.retain(|d| d != id);
    }
    next
}

fn add_location(state: &State, new: NewLocation) -> State {
    let id = fresh_id(state, new.id);
    let mut next = state.clone();
    next.assignments.insert(id.clone(), Vec::new());
    next.locations.push(Location {
        id,
        name: new.name,
        kind: new.kind,
    });
    next
}

fn update_location(state: &State, patch: LocationPatch) -> State {
    let mut next = state.clone();
    if let Some(location) = next.locations.iter_mut().find(|l| l.id == patch.id) {
        if let Some(name) = patch.name {
            location.name = name;
        }
        if let Some(kind) = patch.kind {
            location.kind = kind;
        }
    }
    next
}

fn delete_location(state: &State, id: &EntityId) -> State {
    let mut next = state.clone();
    next.locations.retain(|l| &l.id != id);
    next.assignments.remove(id);
    next
}

fn move_doctor(state: &State, mv: MoveDoctor) -> State {
    let mut next = state.clone();
    for seq in next.assignments.values_mut() {
        seq.retain(|d| d != &mv.doctor_id);
    }

    // Missing or unknown destination: the doctor stays unassigned
    if !state.has_doctor(&mv.doctor_id) {
        return next;
    }
    if let Some(seq) = mv
        .destination
        .as_ref()
        .and_then(|dest| next.assignments.get_mut(dest))
    {
        seq.push(mv.doctor_id);
    }
    next
}

fn remove_from_location(state: &State, un: Unassign) -> State {
    let mut next = state.clone();
    if let Some(seq) = next.assignments.get_mut(&un.location_id) {
        seq.retain(|d| d != &un.doctor_id);
    }
    next
}
