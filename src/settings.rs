//! Optimization settings consumed by the optimizer and orchestrator.

use serde::Deserialize;

use crate::model::WorkingHours;

/// Settings for an optimization run.
///
/// Deserializes from the UI's camelCase settings object; missing fields take
/// their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptimizationSettings {
    /// Weight travel time above distance.
    pub prioritize_time: bool,
    /// Weight distance above travel time. Both set blends equally.
    pub prioritize_distance: bool,
    /// Treat task windows as hard earliest/latest service-start bounds. When
    /// false a task may start after its window closes; such stops are
    /// reported as window violations and never added by optimization.
    pub respect_time_windows: bool,
    /// Allow tasks to move between employees.
    pub allow_reassignment: bool,
    /// Per-leg travel cap in minutes.
    pub max_travel_time: Option<u32>,
    /// Replaces every employee's own working hours when set.
    pub working_hours: Option<WorkingHours>,
    /// Suggestions saving no more than this much cost are dropped.
    pub noise_threshold: f64,
    /// Maximum passes of local search for large routes.
    pub local_search_iterations: usize,
    /// Routes up to this many tasks are solved exactly.
    pub exact_search_limit: usize,
}

impl Default for OptimizationSettings {
    fn default() -> Self {
        Self {
            prioritize_time: true,
            prioritize_distance: false,
            respect_time_windows: true,
            allow_reassignment: false,
            max_travel_time: None,
            working_hours: None,
            noise_threshold: 0.01,
            local_search_iterations: 100,
            exact_search_limit: 12,
        }
    }
}

/// Linear cost weights: `distance_per_km * km + time_per_minute * minutes`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostWeights {
    pub distance_per_km: f64,
    pub time_per_minute: f64,
}

const DOMINANT_WEIGHT: f64 = 3.0;

impl OptimizationSettings {
    pub fn weights(&self) -> CostWeights {
        match (self.prioritize_time, self.prioritize_distance) {
            (true, true) => CostWeights {
                distance_per_km: 1.0,
                time_per_minute: 1.0,
            },
            (false, true) => CostWeights {
                distance_per_km: DOMINANT_WEIGHT,
                time_per_minute: 1.0,
            },
            // Time dominates unless distance was asked for.
            _ => CostWeights {
                distance_per_km: 1.0,
                time_per_minute: DOMINANT_WEIGHT,
            },
        }
    }

    pub(crate) fn max_leg_seconds(&self) -> Option<i32> {
        self.max_travel_time
            .map(|minutes| i32::try_from(minutes).unwrap_or(i32::MAX).saturating_mul(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prioritizes_time() {
        let weights = OptimizationSettings::default().weights();
        assert!(weights.time_per_minute > weights.distance_per_km);
    }

    #[test]
    fn test_both_priorities_blend_equally() {
        let settings = OptimizationSettings {
            prioritize_time: true,
            prioritize_distance: true,
            ..Default::default()
        };
        let weights = settings.weights();
        assert_eq!(weights.time_per_minute, weights.distance_per_km);
    }

    #[test]
    fn test_huge_travel_cap_saturates() {
        let settings = OptimizationSettings {
            max_travel_time: Some(u32::MAX),
            ..Default::default()
        };
        assert_eq!(settings.max_leg_seconds(), Some(i32::MAX));
    }

    #[test]
    fn test_distance_only() {
        let settings = OptimizationSettings {
            prioritize_time: false,
            prioritize_distance: true,
            ..Default::default()
        };
        let weights = settings.weights();
        assert!(weights.distance_per_km > weights.time_per_minute);
    }
}
