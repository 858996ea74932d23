use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ═══════════════════════════════════════════════════════════════
//  Registration
// ═══════════════════════════════════════════════════════════════

/// A validated tournament registration, as accepted by the gateway.
///
/// `name` identifies the tournament; `year` and `kind` categorize it
/// (at least one of them is present after validation). The roster is
/// optional and empty by default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    #[serde(alias = "title")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub roster: Vec<Entrant>,
}

impl Registration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            year: None,
            kind: None,
            roster: Vec::new(),
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_entrant(mut self, entrant: Entrant) -> Self {
        self.roster.push(entrant);
        self
    }
}

/// One competitor on a tournament roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entrant {
    pub id: i64,
    pub name: String,
    pub weight: f64,
    pub age: u32,
}

// ═══════════════════════════════════════════════════════════════
//  StoredRecord
// ═══════════════════════════════════════════════════════════════

/// A registration as persisted by a `RecordStore`.
///
/// `id`, `created_at` and `updated_at` are assigned by the store. The JSON
/// form of this struct is both the HTTP response body and the announcement
/// payload published to the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub registration: Registration,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    /// Serialize into the announcement payload.
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StoredRecord {
        let now = Utc::now();
        StoredRecord {
            id: Uuid::new_v4(),
            registration: Registration::new("Summer Cup")
                .with_year(2024)
                .with_entrant(Entrant { id: 1, name: "Ana".into(), weight: 57.5, age: 19 }),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn stored_record_json_is_flat() {
        let record = sample();
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["name"], "Summer Cup");
        assert_eq!(json["year"], 2024);
        assert_eq!(json["id"], record.id.to_string());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("type").is_none());
        assert_eq!(json["roster"][0]["name"], "Ana");
    }

    #[test]
    fn payload_parses_back_to_the_same_record() {
        let record = sample();
        let payload = record.to_payload().unwrap();
        let parsed: StoredRecord = serde_json::from_slice(&payload).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn title_is_accepted_as_name() {
        let reg: Registration =
            serde_json::from_str(r#"{"title":"Open","type":"judo","roster":[]}"#).unwrap();
        assert_eq!(reg.name, "Open");
        assert_eq!(reg.kind.as_deref(), Some("judo"));
    }
}
