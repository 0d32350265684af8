//! Seams to external collaborators.
//!
//! The planner only needs travel estimates between coordinates. Concrete
//! providers (OSRM, haversine, test doubles) implement [`DistanceProvider`].

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::model::Coordinate;

/// Travel estimate for a single leg.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TravelEstimate {
    pub meters: f64,
    pub seconds: i32,
}

impl TravelEstimate {
    pub fn minutes(&self) -> f64 {
        self.seconds as f64 / 60.0
    }
}

/// Provides travel distance and time between coordinates.
///
/// Implementations must be shareable across the optimizer's worker threads.
pub trait DistanceProvider: Send + Sync {
    fn distance(&self, from: Coordinate, to: Coordinate) -> Result<TravelEstimate, ProviderError>;

    /// Full matrix indexed by the provided location order.
    ///
    /// The default asks for every leg individually; providers with a bulk
    /// endpoint should override it.
    fn matrix_for(
        &self,
        locations: &[Coordinate],
    ) -> Result<Vec<Vec<TravelEstimate>>, ProviderError> {
        let mut matrix = Vec::with_capacity(locations.len());
        for (i, from) in locations.iter().enumerate() {
            let mut row = Vec::with_capacity(locations.len());
            for (j, to) in locations.iter().enumerate() {
                if i == j {
                    row.push(TravelEstimate::default());
                } else {
                    row.push(self.distance(*from, *to)?);
                }
            }
            matrix.push(row);
        }
        Ok(matrix)
    }
}

impl<P: DistanceProvider + ?Sized> DistanceProvider for &P {
    fn distance(&self, from: Coordinate, to: Coordinate) -> Result<TravelEstimate, ProviderError> {
        (**self).distance(from, to)
    }

    fn matrix_for(
        &self,
        locations: &[Coordinate],
    ) -> Result<Vec<Vec<TravelEstimate>>, ProviderError> {
        (**self).matrix_for(locations)
    }
}
