//! OSRM HTTP adapter for travel estimates.

use serde::Deserialize;

use crate::error::ProviderError;
use crate::model::Coordinate;
use crate::traits::{DistanceProvider, TravelEstimate};

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn table_url(&self, locations: &[Coordinate]) -> String {
        let coords = locations
            .iter()
            .map(|c| format!("{:.6},{:.6}", c.lng, c.lat))
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/table/v1/{}/{}?annotations=duration,distance",
            self.config.base_url, self.config.profile, coords
        )
    }
}

impl DistanceProvider for OsrmClient {
    fn distance(&self, from: Coordinate, to: Coordinate) -> Result<TravelEstimate, ProviderError> {
        let matrix = self.matrix_for(&[from, to])?;
        Ok(matrix[0][1])
    }

    fn matrix_for(
        &self,
        locations: &[Coordinate],
    ) -> Result<Vec<Vec<TravelEstimate>>, ProviderError> {
        if locations.is_empty() {
            return Ok(Vec::new());
        }

        let body = self
            .client
            .get(self.table_url(locations))
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmTableResponse>())?;

        if body.code != "Ok" {
            return Err(ProviderError::Unavailable(format!("OSRM answered {}", body.code)));
        }

        let durations = body
            .durations
            .ok_or_else(|| ProviderError::Malformed("missing durations".to_string()))?;
        let distances = body
            .distances
            .ok_or_else(|| ProviderError::Malformed("missing distances".to_string()))?;

        let n = locations.len();
        if durations.len() != n || distances.len() != n {
            return Err(ProviderError::Malformed(format!(
                "expected {} rows, got {} durations and {} distances",
                n,
                durations.len(),
                distances.len()
            )));
        }

        let mut matrix = Vec::with_capacity(n);
        for (duration_row, distance_row) in durations.into_iter().zip(distances) {
            if duration_row.len() != n || distance_row.len() != n {
                return Err(ProviderError::Malformed("ragged table row".to_string()));
            }
            let row = duration_row
                .into_iter()
                .zip(distance_row)
                .map(|(seconds, meters)| match (seconds, meters) {
                    (Some(seconds), Some(meters)) => Ok(TravelEstimate {
                        meters,
                        seconds: seconds.round() as i32,
                    }),
                    _ => Err(ProviderError::Malformed("unroutable pair".to_string())),
                })
                .collect::<Result<Vec<_>, _>>()?;
            matrix.push(row);
        }

        Ok(matrix)
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: String,
    durations: Option<Vec<Vec<Option<f64>>>>,
    distances: Option<Vec<Vec<Option<f64>>>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url_uses_lng_lat_order() {
        let client = OsrmClient::new(OsrmConfig::default()).unwrap();
        let url = client.table_url(&[Coordinate::new(36.1, -115.2), Coordinate::new(36.3, -115.4)]);
        assert_eq!(
            url,
            "http://localhost:5000/table/v1/car/-115.200000,36.100000;-115.400000,36.300000?annotations=duration,distance"
        );
    }

    #[test]
    fn test_unreachable_server_is_an_error() {
        let client = OsrmClient::new(OsrmConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            profile: "car".to_string(),
            timeout_secs: 1,
        })
        .unwrap();
        let result = client.matrix_for(&[Coordinate::new(0.0, 0.0), Coordinate::new(0.1, 0.1)]);
        assert!(result.is_err());
    }
}
