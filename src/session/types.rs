use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::machine::MachineId;

/// Default session lifetime in seconds.
pub const DEFAULT_TTL_SECONDS: u64 = 180;

/// Parallel, append-only audit trail of the turns applied to a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHistory {
    pub inputs: Vec<String>,
    pub machines: Vec<MachineId>,
    pub states: Vec<String>,
    pub responses: Vec<String>,
}

impl SessionHistory {
    pub fn record(&mut self, input: &str, machine: MachineId, state: &str, response: &str) {
        self.inputs.push(input.to_string());
        self.machines.push(machine);
        self.states.push(state.to_string());
        self.responses.push(response.to_string());
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// The unit of conversational state, keyed by the telco session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub phone_number: String,
    pub service_code: String,
    pub machine_id: MachineId,
    pub state: String,
    pub data: Map<String, Value>,
    pub history: SessionHistory,
    pub version: u64,
    pub ttl_seconds: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session at version 1.
    pub fn new(
        id: impl Into<String>,
        phone_number: impl Into<String>,
        service_code: impl Into<String>,
        machine_id: MachineId,
        state: impl Into<String>,
        ttl_seconds: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            phone_number: phone_number.into(),
            service_code: service_code.into(),
            machine_id,
            state: state.into(),
            data: Map::new(),
            history: SessionHistory::default(),
            version: 1,
            ttl_seconds,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Append the turn that produced the current machine and state.
    pub fn record_turn(&mut self, input: &str, response: &str) {
        self.history
            .record(input, self.machine_id, &self.state, response);
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| self.updated_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Apply one effective turn: new position and data, audit entry, version bump.
    pub fn apply(&mut self, update: SessionUpdate) {
        self.machine_id = update.machine_id;
        self.state = update.state;
        self.data = update.data;
        self.record_turn(&update.input, &update.response);
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionUpdate {
    pub machine_id: MachineId,
    pub state: String,
    /// Flow data after the turn; replaces the stored blob
    pub data: Map<String, Value>,
    pub input: String,
    pub response: String,
    /// Fails the update with `VersionConflict` when the stored version differs
    pub expected_version: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session() -> Session {
        let mut data = Map::new();
        data.insert("amount".to_string(), json!(5));
        Session::new("S1", "+254700000001", "*384#", MachineId::Transfer, "enteringAmount", 180)
            .with_data(data)
    }

    fn update(data: Map<String, Value>) -> SessionUpdate {
        SessionUpdate {
            machine_id: MachineId::Transfer,
            state: "checkingBalance".to_string(),
            data,
            input: "10".to_string(),
            response: "CON ok".to_string(),
            expected_version: Some(1),
        }
    }

    #[test]
    fn apply_moves_the_session_and_bumps_version() {
        let mut session = session();
        let mut data = session.data.clone();
        data.insert("recipient".to_string(), json!("+254700000002"));

        session.apply(update(data));

        assert_eq!(session.version, 2);
        assert_eq!(session.state, "checkingBalance");
        assert_eq!(session.data["amount"], 5);
        assert_eq!(session.data["recipient"], "+254700000002");
        assert_eq!(session.history.states, vec!["checkingBalance".to_string()]);
        assert_eq!(session.history.responses, vec!["CON ok".to_string()]);
    }

    #[test]
    fn removed_keys_do_not_survive_an_update() {
        let mut session = session();
        session.apply(update(Map::new()));
        assert!(session.data.is_empty());
    }

    #[test]
    fn expiry_follows_the_last_update() {
        let session = session();
        assert!(!session.is_expired(session.updated_at));
        assert!(session.is_expired(session.updated_at + Duration::seconds(180)));
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let value = serde_json::to_value(session()).unwrap();
        assert_eq!(value["machineId"], "transfer");
        assert_eq!(value["ttlSeconds"], 180);
        assert!(value["history"]["inputs"].is_array());
    }
}
