//! The event record: the structured output unit of the pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Closed classification of what happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Protest,
    Demonstration,
    Attack,
    Explosion,
    Bombing,
    Shooting,
    TerroristActivity,
    Theft,
    Kidnapping,
    MilitaryOperation,
    CyberAttack,
    CyberIncident,
    DataBreach,
    Conference,
    Meeting,
    Summit,
    Accident,
    NaturalDisaster,
    Election,
    PoliticalEvent,
    Other,
}

impl EventType {
    /// All variants, for normalisation sweeps.
    pub const ALL: [EventType; 21] = [
        EventType::Protest,
        EventType::Demonstration,
        EventType::Attack,
        EventType::Explosion,
        EventType::Bombing,
        EventType::Shooting,
        EventType::TerroristActivity,
        EventType::Theft,
        EventType::Kidnapping,
        EventType::MilitaryOperation,
        EventType::CyberAttack,
        EventType::CyberIncident,
        EventType::DataBreach,
        EventType::Conference,
        EventType::Meeting,
        EventType::Summit,
        EventType::Accident,
        EventType::NaturalDisaster,
        EventType::Election,
        EventType::PoliticalEvent,
        EventType::Other,
    ];

    /// Wire name (snake_case).
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Protest => "protest",
            EventType::Demonstration => "demonstration",
            EventType::Attack => "attack",
            EventType::Explosion => "explosion",
            EventType::Bombing => "bombing",
            EventType::Shooting => "shooting",
            EventType::TerroristActivity => "terrorist_activity",
            EventType::Theft => "theft",
            EventType::Kidnapping => "kidnapping",
            EventType::MilitaryOperation => "military_operation",
            EventType::CyberAttack => "cyber_attack",
            EventType::CyberIncident => "cyber_incident",
            EventType::DataBreach => "data_breach",
            EventType::Conference => "conference",
            EventType::Meeting => "meeting",
            EventType::Summit => "summit",
            EventType::Accident => "accident",
            EventType::NaturalDisaster => "natural_disaster",
            EventType::Election => "election",
            EventType::PoliticalEvent => "political_event",
            EventType::Other => "other",
        }
    }

    /// Whether this type is subject to the violence consistency rule.
    pub fn is_violent(&self) -> bool {
        matches!(
            self,
            EventType::Bombing
                | EventType::Explosion
                | EventType::Attack
                | EventType::Shooting
                | EventType::TerroristActivity
                | EventType::Kidnapping
        )
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of who carried out a violent event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerpetratorType {
    TerroristGroup,
    StateActor,
    CriminalOrganization,
    Individual,
    MultipleParties,
    Unknown,
    NotApplicable,
}

impl PerpetratorType {
    /// All variants, for normalisation sweeps.
    pub const ALL: [PerpetratorType; 7] = [
        PerpetratorType::TerroristGroup,
        PerpetratorType::StateActor,
        PerpetratorType::CriminalOrganization,
        PerpetratorType::Individual,
        PerpetratorType::MultipleParties,
        PerpetratorType::Unknown,
        PerpetratorType::NotApplicable,
    ];

    /// Wire name (snake_case).
    pub fn as_str(&self) -> &'static str {
        match self {
            PerpetratorType::TerroristGroup => "terrorist_group",
            PerpetratorType::StateActor => "state_actor",
            PerpetratorType::CriminalOrganization => "criminal_organization",
            PerpetratorType::Individual => "individual",
            PerpetratorType::MultipleParties => "multiple_parties",
            PerpetratorType::Unknown => "unknown",
            PerpetratorType::NotApplicable => "not_applicable",
        }
    }
}

/// Where the event took place. Components hold `/`-joined strings when
/// an event spans multiple cities or countries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
}

impl Location {
    /// True when no component is set.
    pub fn is_empty(&self) -> bool {
        self.city.is_none() && self.region.is_none() && self.country.is_none()
    }
}

/// Death and injury counts. Only attached when at least one is nonzero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Casualties {
    pub killed: u32,
    pub injured: u32,
}

/// One extracted event: what happened, where, when, who.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_type: EventType,
    #[serde(default)]
    pub event_sub_type: Option<String>,
    pub title: String,
    pub summary: String,

    #[serde(default)]
    pub perpetrator: Option<String>,
    #[serde(default)]
    pub perpetrator_type: Option<PerpetratorType>,

    #[serde(default)]
    pub location: Location,

    /// Date-only; timezones are stripped on export
    #[serde(default)]
    pub event_date: Option<NaiveDate>,
    /// "09:30", "morning", or similar free text
    #[serde(default)]
    pub event_time: Option<String>,

    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub organizations: Vec<String>,

    #[serde(default)]
    pub casualties: Option<Casualties>,

    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub article_published_date: Option<NaiveDate>,
    #[serde(default)]
    pub collection_timestamp: Option<DateTime<Utc>>,

    /// Extraction confidence in [0, 1]; retained events are >= 0.3
    pub confidence: f64,

    /// Archived raw article body
    #[serde(default)]
    pub full_content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_wire_form() {
        let json = serde_json::to_string(&EventType::NaturalDisaster).unwrap();
        assert_eq!(json, "\"natural_disaster\"");

        let parsed: EventType = serde_json::from_str("\"cyber_attack\"").unwrap();
        assert_eq!(parsed, EventType::CyberAttack);
    }

    #[test]
    fn test_as_str_round_trips_through_serde() {
        for event_type in EventType::ALL {
            let json = serde_json::to_string(&event_type).unwrap();
            assert_eq!(json, format!("\"{}\"", event_type.as_str()));
        }
        for perp_type in PerpetratorType::ALL {
            let json = serde_json::to_string(&perp_type).unwrap();
            assert_eq!(json, format!("\"{}\"", perp_type.as_str()));
        }
    }

    #[test]
    fn test_violence_set() {
        assert!(EventType::Bombing.is_violent());
        assert!(EventType::TerroristActivity.is_violent());
        assert!(EventType::Kidnapping.is_violent());
        assert!(!EventType::Meeting.is_violent());
        assert!(!EventType::Protest.is_violent());
        assert!(!EventType::Theft.is_violent());
    }

    #[test]
    fn test_location_is_empty() {
        assert!(Location::default().is_empty());
        let loc = Location {
            city: Some("Kabul".into()),
            ..Location::default()
        };
        assert!(!loc.is_empty());
    }
}
