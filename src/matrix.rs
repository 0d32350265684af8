//! Travel matrix with haversine fallback.

use tracing::{debug, warn};

use crate::haversine::HaversineProvider;
use crate::model::Coordinate;
use crate::traits::{DistanceProvider, TravelEstimate};

/// Dense travel matrix indexed by location order.
#[derive(Debug, Clone)]
pub struct TravelMatrix {
    legs: Vec<Vec<TravelEstimate>>,
    /// True when the provider failed and the estimates are straight-line.
    pub degraded: bool,
}

impl TravelMatrix {
    /// Asks the provider for a matrix, degrading to haversine on any failure.
    pub fn build<P: DistanceProvider + ?Sized>(provider: &P, locations: &[Coordinate]) -> Self {
        match provider.matrix_for(locations) {
            Ok(legs) if is_square(&legs, locations.len()) => {
                debug!(locations = locations.len(), "travel matrix from provider");
                Self {
                    legs,
                    degraded: false,
                }
            }
            Ok(legs) => {
                warn!(
                    expected = locations.len(),
                    rows = legs.len(),
                    "provider returned a malformed matrix, falling back to haversine"
                );
                Self::haversine(locations)
            }
            Err(err) => {
                warn!(error = %err, "distance provider unavailable, falling back to haversine");
                Self::haversine(locations)
            }
        }
    }

    pub fn haversine(locations: &[Coordinate]) -> Self {
        let fallback = HaversineProvider::default();
        let legs = locations
            .iter()
            .map(|from| {
                locations
                    .iter()
                    .map(|to| fallback.estimate(*from, *to))
                    .collect()
            })
            .collect();
        Self {
            legs,
            degraded: true,
        }
    }

    pub fn get(&self, from: usize, to: usize) -> TravelEstimate {
        self.legs[from][to]
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }
}

fn is_square(legs: &[Vec<TravelEstimate>], n: usize) -> bool {
    legs.len() == n && legs.iter().all(|row| row.len() == n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;

    struct DownProvider;

    impl DistanceProvider for DownProvider {
        fn distance(&self, _: Coordinate, _: Coordinate) -> Result<TravelEstimate, ProviderError> {
            Err(ProviderError::Unavailable("offline".to_string()))
        }
    }

    struct ShortProvider;

    impl DistanceProvider for ShortProvider {
        fn distance(&self, _: Coordinate, _: Coordinate) -> Result<TravelEstimate, ProviderError> {
            Ok(TravelEstimate::default())
        }

        fn matrix_for(&self, _: &[Coordinate]) -> Result<Vec<Vec<TravelEstimate>>, ProviderError> {
            Ok(vec![vec![TravelEstimate::default()]])
        }
    }

    fn locations() -> Vec<Coordinate> {
        vec![Coordinate::new(36.1, -115.1), Coordinate::new(36.2, -115.2)]
    }

    #[test]
    fn test_failed_provider_degrades_to_haversine() {
        let matrix = TravelMatrix::build(&DownProvider, &locations());
        assert!(matrix.degraded);
        assert_eq!(matrix.len(), 2);
        assert!(matrix.get(0, 1).meters > 10_000.0);
        assert!(matrix.get(0, 1).seconds > 0);
    }

    #[test]
    fn test_wrong_shape_degrades_to_haversine() {
        let matrix = TravelMatrix::build(&ShortProvider, &locations());
        assert!(matrix.degraded);
        assert_eq!(matrix.len(), 2);
    }

    #[test]
    fn test_healthy_provider_is_used() {
        let matrix = TravelMatrix::build(&HaversineProvider::new(60.0), &locations());
        assert!(!matrix.degraded);
        assert_eq!(matrix.get(1, 1).seconds, 0);
    }
}
