//! Action definitions
//!
//! Actions are the only way the board changes. On the wire an action is
//! `{"type": "<KIND>", "payload": ...}`; decoding never fails: an
//! unrecognized kind becomes [`Action::Unknown`] and a recognized kind with
//! a bad payload becomes [`Action::Malformed`], both of which the reducer
//! treats as no-ops.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{EntityId, LocationKind, State};

pub const LOAD_DATA: &str = "LOAD_DATA";
pub const ADD_DOCTOR: &str = "ADD_DOCTOR";
pub const UPDATE_DOCTOR: &str = "UPDATE_DOCTOR";
pub const DELETE_DOCTOR: &str = "DELETE_DOCTOR";
pub const ADD_LOCATION: &str = "ADD_LOCATION";
pub const UPDATE_LOCATION: &str = "UPDATE_LOCATION";
pub const DELETE_LOCATION: &str = "DELETE_LOCATION";
pub const MOVE_DOCTOR: &str = "MOVE_DOCTOR";
pub const REMOVE_DOCTOR_FROM_LOCATION: &str = "REMOVE_DOCTOR_FROM_LOCATION";

/// A request to transform the board
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawAction", into = "RawAction")]
pub enum Action {
    /// Replace the board wholesale (bootstrap/restore)
    LoadData(State),
    AddDoctor(NewDoctor),
    UpdateDoctor(DoctorPatch),
    DeleteDoctor(EntityId),
    AddLocation(NewLocation),
    UpdateLocation(LocationPatch),
    DeleteLocation(EntityId),
    MoveDoctor(MoveDoctor),
    RemoveDoctorFromLocation(Unassign),
    /// Kind this server does not recognize
    Unknown { kind: String, payload: Value },
    /// Recognized kind whose payload did not decode
    Malformed { kind: String, reason: String },
}

/// Payload of `ADD_DOCTOR`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDoctor {
    /// Server-assigned; never read from clients
    #[serde(skip)]
    pub id: Option<EntityId>,
    pub name: String,
    pub specialty: String,
}

/// Payload of `ADD_LOCATION`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLocation {
    /// Server-assigned; never read from clients
    #[serde(skip)]
    pub id: Option<EntityId>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: LocationKind,
}

/// Payload of `UPDATE_DOCTOR`: fields present are merged
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorPatch {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
}

/// Payload of `UPDATE_LOCATION`: fields present are merged
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationPatch {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<LocationKind>,
}

/// Payload of `MOVE_DOCTOR`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveDoctor {
    pub doctor_id: EntityId,
    /// Informational only; the doctor is pulled from every location
    #[serde(default)]
    pub source: Option<EntityId>,
    #[serde(default)]
    pub destination: Option<EntityId>,
}

/// Payload of `REMOVE_DOCTOR_FROM_LOCATION`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unassign {
    pub doctor_id: EntityId,
    pub location_id: EntityId,
}

impl Action {
    /// Wire tag of this action
    pub fn kind(&self) -> &str {
        match self {
            Action::LoadData(_) => LOAD_DATA,
            Action::AddDoctor(_) => ADD_DOCTOR,
            Action::UpdateDoctor(_) => UPDATE_DOCTOR,
            Action::DeleteDoctor(_) => DELETE_DOCTOR,
            Action::AddLocation(_) => ADD_LOCATION,
            Action::UpdateLocation(_) => UPDATE_LOCATION,
            Action::DeleteLocation(_) => DELETE_LOCATION,
            Action::MoveDoctor(_) => MOVE_DOCTOR,
            Action::RemoveDoctorFromLocation(_) => REMOVE_DOCTOR_FROM_LOCATION,
            Action::Unknown { kind, .. } | Action::Malformed { kind, .. } => kind,
        }
    }

    /// True for actions the reducer will ignore regardless of state
    pub fn is_noop(&self) -> bool {
        matches!(self, Action::Unknown { .. } | Action::Malformed { .. })
    }

    pub fn add_doctor(name: impl Into<String>, specialty: impl Into<String>) -> Self {
        Action::AddDoctor(NewDoctor {
            id: None,
            name: name.into(),
            specialty: specialty.into(),
        })
    }

    pub fn add_location(name: impl Into<String>, kind: impl Into<LocationKind>) -> Self {
        Action::AddLocation(NewLocation {
            id: None,
            name: name.into(),
            kind: kind.into(),
        })
    }

    pub fn move_doctor(
        doctor: impl Into<EntityId>,
        source: Option<EntityId>,
        destination: Option<EntityId>,
    ) -> Self {
        Action::MoveDoctor(MoveDoctor {
            doctor_id: doctor.into(),
            source,
            destination,
        })
    }

    pub fn unassign(doctor: impl Into<EntityId>, location: impl Into<EntityId>) -> Self {
        Action::RemoveDoctorFromLocation(Unassign {
            doctor_id: doctor.into(),
            location_id: location.into(),
        })
    }
}

/// Untyped wire form of an action
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawAction {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

fn decode<T: DeserializeOwned>(kind: String, payload: Value, wrap: fn(T) -> Action) -> Action {
    match serde_json::from_value(payload) {
        Ok(inner) => wrap(inner),
        Err(e) => Action::Malformed {
            kind,
            reason: e.to_string(),
        },
    }
}

impl From<RawAction> for Action {
    fn from(raw: RawAction) -> Self {
        let RawAction { kind, payload } = raw;
        match kind.as_str() {
            LOAD_DATA => decode(kind, payload, Action::LoadData),
            ADD_DOCTOR => decode(kind, payload, Action::AddDoctor),
            UPDATE_DOCTOR => decode(kind, payload, Action::UpdateDoctor),
            DELETE_DOCTOR => decode(kind, payload, Action::DeleteDoctor),
            ADD_LOCATION => decode(kind, payload, Action::AddLocation),
            UPDATE_LOCATION => decode(kind, payload, Action::UpdateLocation),
            DELETE_LOCATION => decode(kind, payload, Action::DeleteLocation),
            MOVE_DOCTOR => decode(kind, payload, Action::MoveDoctor),
            REMOVE_DOCTOR_FROM_LOCATION => decode(kind, payload, Action::RemoveDoctorFromLocation),
            _ => Action::Unknown { kind, payload },
        }
    }
}

impl Action {
    /// Decode any JSON value as an action.
    ///
    /// Never fails: a value that is not a `{"type": string}` object becomes
    /// [`Action::Malformed`], tagged with its `type` when that is a string.
    pub fn from_wire(value: Value) -> Action {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match serde_json::from_value::<RawAction>(value) {
            Ok(raw) => Action::from(raw),
            Err(e) => Action::Malformed {
                kind,
                reason: e.to_string(),
            },
        }
    }
}

impl From<Action> for RawAction {
    fn from(action: Action) -> Self {
        let kind = action.kind().to_string();
        let payload = match action {
            Action::LoadData(state) => serde_json::to_value(state),
            Action::AddDoctor(p) => serde_json::to_value(p),
            Action::UpdateDoctor(p) => serde_json::to_value(p),
            Action::DeleteDoctor(id) => serde_json::to_value(id),
            Action::AddLocation(p) => serde_json::to_value(p),
            Action::UpdateLocation(p) => serde_json::to_value(p),
            Action::DeleteLocation(id) => serde_json::to_value(id),
            Action::MoveDoctor(p) => serde_json::to_value(p),
            Action::RemoveDoctorFromLocation(p) => serde_json::to_value(p),
            Action::Unknown { payload, .. } => Ok(payload),
            Action::Malformed { .. } => Ok(Value::Null),
        };
        RawAction {
            kind,
            payload: payload.unwrap_or_default(),
        }
    }
}
