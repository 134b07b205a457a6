//! Flight detail record as returned by the click-handler endpoint.
//!
//! The endpoint emits `null` for most scalars it has no value for; those decode to the field
//! type's default so a sparse record still round-trips. Free-form members the poller never
//! inspects are kept as raw JSON.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightDetail {
    #[serde(default, deserialize_with = "nullable")]
    pub identification: Identification,
    #[serde(default, deserialize_with = "nullable")]
    pub status: Status,
    #[serde(default, deserialize_with = "nullable")]
    pub level: String,
    #[serde(default, deserialize_with = "nullable")]
    pub promote: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub aircraft: Aircraft,
    #[serde(default, deserialize_with = "nullable")]
    pub airline: Airline,
    #[serde(default)]
    pub owner: JsonValue,
    #[serde(default)]
    pub airspace: JsonValue,
    #[serde(default, deserialize_with = "nullable")]
    pub airport: Airports,
    #[serde(default, deserialize_with = "nullable")]
    pub flight_history: FlightHistory,
    #[serde(default)]
    pub ems: JsonValue,
    #[serde(default, deserialize_with = "nullable")]
    pub availability: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub time: FlightTimes,
    #[serde(default, deserialize_with = "nullable")]
    pub trail: Vec<TrailPoint>,
    #[serde(default, deserialize_with = "nullable")]
    pub first_timestamp: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub s: String,
}

impl FlightDetail {
    pub fn registration(&self) -> &str {
        &self.aircraft.registration
    }

    /// Real departure of the most recent leg in the aircraft's history, if any leg exists.
    pub fn first_departure(&self) -> Option<i64> {
        self.flight_history
            .aircraft
            .first()
            .map(|leg| leg.time.real.departure)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub row: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub number: FlightNumber,
    #[serde(default, deserialize_with = "nullable")]
    pub callsign: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightNumber {
    #[serde(default)]
    pub default: JsonValue,
    #[serde(default)]
    pub alternative: JsonValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default, deserialize_with = "nullable")]
    pub live: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub text: String,
    #[serde(default)]
    pub icon: JsonValue,
    #[serde(default)]
    pub estimated: JsonValue,
    #[serde(default, deserialize_with = "nullable")]
    pub ambiguous: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub generic: GenericStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenericStatus {
    #[serde(default, deserialize_with = "nullable")]
    pub status: StatusText,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusText {
    #[serde(default, deserialize_with = "nullable")]
    pub text: String,
    #[serde(default, deserialize_with = "nullable")]
    pub color: String,
    #[serde(default, deserialize_with = "nullable", rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aircraft {
    #[serde(default, deserialize_with = "nullable")]
    pub model: AircraftModel,
    #[serde(default, deserialize_with = "nullable")]
    pub country_id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub registration: String,
    #[serde(default)]
    pub age: JsonValue,
    #[serde(default)]
    pub msn: JsonValue,
    #[serde(default, deserialize_with = "nullable")]
    pub images: AircraftImages,
    #[serde(default, deserialize_with = "nullable")]
    pub hex: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AircraftModel {
    #[serde(default, deserialize_with = "nullable")]
    pub code: String,
    #[serde(default, deserialize_with = "nullable")]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AircraftImages {
    #[serde(default, deserialize_with = "nullable")]
    pub thumbnails: Vec<AircraftImage>,
    #[serde(default, deserialize_with = "nullable")]
    pub medium: Vec<AircraftImage>,
    #[serde(default, deserialize_with = "nullable")]
    pub large: Vec<AircraftImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AircraftImage {
    #[serde(default, deserialize_with = "nullable")]
    pub src: String,
    #[serde(default, deserialize_with = "nullable")]
    pub link: String,
    #[serde(default, deserialize_with = "nullable")]
    pub copyright: String,
    #[serde(default, deserialize_with = "nullable")]
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Airline {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub short: String,
    #[serde(default, deserialize_with = "nullable")]
    pub code: AirlineCode,
    #[serde(default, deserialize_with = "nullable")]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AirlineCode {
    #[serde(default)]
    pub iata: JsonValue,
    #[serde(default, deserialize_with = "nullable")]
    pub icao: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Airports {
    #[serde(default, deserialize_with = "nullable")]
    pub origin: Airport,
    #[serde(default, deserialize_with = "nullable")]
    pub destination: Airport,
    #[serde(default)]
    pub real: JsonValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub code: AirportCode,
    #[serde(default, deserialize_with = "nullable")]
    pub position: AirportPosition,
    #[serde(default, deserialize_with = "nullable")]
    pub timezone: Timezone,
    #[serde(default, deserialize_with = "nullable")]
    pub visible: bool,
    #[serde(default)]
    pub website: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<AirportInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AirportCode {
    #[serde(default, deserialize_with = "nullable")]
    pub iata: String,
    #[serde(default, deserialize_with = "nullable")]
    pub icao: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AirportPosition {
    #[serde(default, deserialize_with = "nullable")]
    pub latitude: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub longitude: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub altitude: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub country: Country,
    #[serde(default, deserialize_with = "nullable")]
    pub region: Region,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Country {
    #[serde(default)]
    pub id: JsonValue,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Region {
    #[serde(default, deserialize_with = "nullable")]
    pub city: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timezone {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub offset: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub offset_hours: String,
    #[serde(default, deserialize_with = "nullable")]
    pub abbr: String,
    #[serde(default, deserialize_with = "nullable")]
    pub abbr_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub is_dst: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AirportInfo {
    #[serde(default)]
    pub terminal: JsonValue,
    #[serde(default)]
    pub baggage: JsonValue,
    #[serde(default)]
    pub gate: JsonValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightHistory {
    #[serde(default, deserialize_with = "nullable")]
    pub aircraft: Vec<HistoryLeg>,
}

/// One previous leg flown by the same airframe, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryLeg {
    #[serde(default, deserialize_with = "nullable")]
    pub identification: HistoryIdentification,
    #[serde(default, deserialize_with = "nullable")]
    pub airport: HistoryAirports,
    #[serde(default, deserialize_with = "nullable")]
    pub time: HistoryTime,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryIdentification {
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub number: HistoryNumber,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryNumber {
    #[serde(default)]
    pub default: JsonValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryAirports {
    #[serde(default, deserialize_with = "nullable")]
    pub origin: Airport,
    #[serde(default, deserialize_with = "nullable")]
    pub destination: Airport,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryTime {
    #[serde(default, deserialize_with = "nullable")]
    pub real: RealDeparture,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealDeparture {
    #[serde(default, deserialize_with = "nullable")]
    pub departure: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightTimes {
    #[serde(default, deserialize_with = "nullable")]
    pub scheduled: ScheduledTimes,
    #[serde(default, deserialize_with = "nullable")]
    pub real: RealTimes,
    #[serde(default, deserialize_with = "nullable")]
    pub estimated: EstimatedTimes,
    #[serde(default, deserialize_with = "nullable")]
    pub other: OtherTimes,
    #[serde(default)]
    pub historical: JsonValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTimes {
    #[serde(default, deserialize_with = "nullable")]
    pub departure: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub arrival: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealTimes {
    #[serde(default, deserialize_with = "nullable")]
    pub departure: i64,
    #[serde(default)]
    pub arrival: JsonValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimatedTimes {
    #[serde(default)]
    pub departure: JsonValue,
    #[serde(default)]
    pub arrival: JsonValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OtherTimes {
    #[serde(default, deserialize_with = "nullable")]
    pub eta: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub updated: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrailPoint {
    #[serde(default, deserialize_with = "nullable")]
    pub lat: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub lng: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub alt: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub spd: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub ts: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub hd: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sparse_record_decodes_nulls_to_defaults() {
        let body = json!({
            "identification": {"id": "33a1f2c4", "row": 5000, "number": {"default": "EI154", "alternative": null}, "callsign": null},
            "aircraft": {"registration": "PR-XYZ", "countryId": null, "images": null},
            "airport": {"origin": null, "destination": null, "real": null},
            "flightHistory": {"aircraft": [
                {"identification": {"id": "339f"}, "time": {"real": {"departure": 1700000000}}},
                {"identification": {"id": "3390"}, "time": {"real": {"departure": null}}}
            ]},
            "time": {"scheduled": {"departure": null, "arrival": 1700003600}},
            "trail": [{"lat": 53.4, "lng": -6.2, "alt": 3500, "spd": 180, "ts": 1700000100, "hd": 271}],
            "firstTimestamp": 1699990000,
            "s": "abc"
        });

        let detail: FlightDetail = serde_json::from_value(body).expect("sparse detail");
        assert_eq!(detail.identification.id, "33a1f2c4");
        assert_eq!(detail.identification.callsign, "");
        assert_eq!(detail.registration(), "PR-XYZ");
        assert_eq!(detail.aircraft.country_id, 0);
        assert_eq!(detail.first_departure(), Some(1700000000));
        assert_eq!(detail.flight_history.aircraft[1].time.real.departure, 0);
        assert_eq!(detail.time.scheduled.arrival, 1700003600);
        assert_eq!(detail.trail.len(), 1);
        assert_eq!(detail.first_timestamp, 1699990000);
    }

    #[test]
    fn empty_history_has_no_first_departure() {
        let detail: FlightDetail =
            serde_json::from_value(json!({"flightHistory": {"aircraft": []}})).expect("detail");
        assert_eq!(detail.first_departure(), None);

        let detail: FlightDetail =
            serde_json::from_value(json!({"flightHistory": null})).expect("detail");
        assert_eq!(detail.first_departure(), None);
    }

    #[test]
    fn serialized_detail_keeps_wire_field_names() {
        let mut detail = FlightDetail::default();
        detail.aircraft.registration = "PR-XYZ".into();
        detail.status.generic.status.kind = "departure".into();

        let value = serde_json::to_value(&detail).expect("serialize");
        assert_eq!(value["aircraft"]["registration"], "PR-XYZ");
        assert_eq!(value["status"]["generic"]["status"]["type"], "departure");
        assert!(value.get("flightHistory").is_some());
        assert!(value.get("firstTimestamp").is_some());
    }

    #[test]
    fn wrongly_typed_registration_is_a_decode_error() {
        let result = serde_json::from_value::<FlightDetail>(json!({"aircraft": {"registration": 42}}));
        assert!(result.is_err());
    }
}
