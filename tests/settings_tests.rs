//! Settings deserialization tests

mod fixtures;

use crew_planner::model::WorkingHours;
use crew_planner::settings::OptimizationSettings;

use fixtures::hm;

#[test]
fn test_empty_object_takes_defaults() {
    let settings: OptimizationSettings = serde_json::from_str("{}").unwrap();
    let defaults = OptimizationSettings::default();

    assert_eq!(settings.prioritize_time, defaults.prioritize_time);
    assert_eq!(settings.respect_time_windows, defaults.respect_time_windows);
    assert!(!settings.allow_reassignment);
    assert_eq!(settings.max_travel_time, None);
    assert_eq!(settings.working_hours, None);
    assert_eq!(settings.exact_search_limit, defaults.exact_search_limit);
    assert_eq!(settings.weights(), defaults.weights());
}

#[test]
fn test_camel_case_fields_are_read() {
    let json = r#"{
        "prioritizeTime": false,
        "prioritizeDistance": true,
        "respectTimeWindows": false,
        "allowReassignment": true,
        "maxTravelTime": 30,
        "workingHours": { "start": "07:00:00", "end": "15:00:00" }
    }"#;
    let settings: OptimizationSettings = serde_json::from_str(json).unwrap();

    assert!(settings.prioritize_distance);
    assert!(!settings.respect_time_windows);
    assert!(settings.allow_reassignment);
    assert_eq!(settings.max_travel_time, Some(30));
    assert_eq!(
        settings.working_hours,
        Some(WorkingHours::new(hm(7, 0), hm(15, 0)))
    );

    let weights = settings.weights();
    assert!(weights.distance_per_km > weights.time_per_minute);
}

#[test]
fn test_negative_travel_cap_is_rejected() {
    let result = serde_json::from_str::<OptimizationSettings>(r#"{"maxTravelTime": -5}"#);
    assert!(result.is_err());
}
