use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::{CircleParams, GeoPoint};
use crate::params::ActiveParameters;

pub const METERS_PER_KM: f64 = 1000.0;
/// 0-100 editing scale to the backend's 0-10 scale.
pub const INTENSITY_DIVISOR: f64 = 10.0;

/// A circle as the backend expects it: radius in km, intensity on 0-10.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCircle {
    pub center: GeoPoint,
    pub radius: f64,
    pub intensity: f64,
}

impl From<&CircleParams> for NormalizedCircle {
    fn from(c: &CircleParams) -> Self {
        Self {
            center: c.center,
            radius: c.radius / METERS_PER_KM,
            intensity: c.intensity / INTENSITY_DIVISOR,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "lowercase")]
pub enum SimulationRequest {
    Earthquake(NormalizedCircle),
    Hurricane {
        start: NormalizedCircle,
        end: NormalizedCircle,
    },
}

impl SimulationRequest {
    /// Validate every circle and normalize units.
    pub fn from_parameters(params: ActiveParameters<'_>) -> Result<Self, ValidationError> {
        match params {
            ActiveParameters::Earthquake(eq) => {
                eq.0.validate()?;
                Ok(Self::Earthquake(NormalizedCircle::from(&eq.0)))
            }
            ActiveParameters::Hurricane(h) => {
                h.start.validate()?;
                h.end.validate()?;
                Ok(Self::Hurricane {
                    start: NormalizedCircle::from(&h.start),
                    end: NormalizedCircle::from(&h.end),
                })
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Earthquake(_) => "earthquake",
            Self::Hurricane { .. } => "hurricane",
        }
    }
}

/// `POST /api/simulation/` body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationEnvelope {
    pub simulation_params: SimulationRequest,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResponse {
    #[serde(default)]
    pub cities: Vec<CityImpact>,
    #[serde(default)]
    pub edges: Vec<EdgeImpact>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CityImpact {
    pub city: String,
    pub lat: f64,
    pub lng: f64,
    pub population: u64,
    /// 0-100. Older backends call this `vulnerability`.
    #[serde(alias = "vulnerability")]
    pub damage: f64,
}

impl CityImpact {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeImpact {
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub damage: f64,
}

/// `POST /api/simulation/` reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationResponseEnvelope {
    pub simulation_response: SimulationResponse,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EarthquakeParameters, HurricaneParameters};
    use serde_json::json;

    #[test]
    fn earthquake_payload_is_normalized_and_tagged() {
        let eq = EarthquakeParameters(CircleParams::new(GeoPoint::new(34.0, -118.0), 10_000.0, 70.0));
        let req = SimulationRequest::from_parameters(ActiveParameters::Earthquake(&eq)).unwrap();
        let body = serde_json::to_value(SimulationEnvelope {
            simulation_params: req,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({
                "simulation_params": {
                    "type": "earthquake",
                    "params": {
                        "center": {"lat": 34.0, "lng": -118.0},
                        "radius": 10.0,
                        "intensity": 7.0
                    }
                }
            })
        );
    }

    #[test]
    fn hurricane_payload_normalizes_both_circles() {
        let h = HurricaneParameters {
            start: CircleParams::new(GeoPoint::new(1.0, 2.0), 10_000.0, 90.0),
            end: CircleParams::new(GeoPoint::new(1.4, 2.4), 5_000.0, 50.0),
        };
        let req = SimulationRequest::from_parameters(ActiveParameters::Hurricane(&h)).unwrap();
        assert_eq!(req.kind(), "hurricane");
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["type"], "hurricane");
        assert_eq!(v["params"]["start"]["radius"], 10.0);
        assert_eq!(v["params"]["start"]["intensity"], 9.0);
        assert_eq!(v["params"]["end"]["radius"], 5.0);
        assert_eq!(v["params"]["end"]["intensity"], 5.0);
    }

    #[test]
    fn normalization_scales_units() {
        for (r, i) in [(1.0, 0.0), (2_500.0, 33.0), (123_456.0, 100.0)] {
            let n = NormalizedCircle::from(&CircleParams::new(GeoPoint::default(), r, i));
            assert_eq!(n.radius, r / 1000.0);
            assert_eq!(n.intensity, i / 10.0);
            assert!((0.0..=10.0).contains(&n.intensity));
        }
    }

    #[test]
    fn invalid_parameters_are_not_sent() {
        let eq = EarthquakeParameters(CircleParams::new(GeoPoint::default(), -5.0, 70.0));
        assert_eq!(
            SimulationRequest::from_parameters(ActiveParameters::Earthquake(&eq)),
            Err(ValidationError::RadiusOutOfRange(-5.0))
        );
    }

    #[test]
    fn response_accepts_vulnerability_alias() {
        let r: SimulationResponseEnvelope = serde_json::from_value(json!({
            "simulation_response": {
                "cities": [
                    {"city": "Bryan", "lat": 30.67, "lng": -96.37, "population": 76201, "vulnerability": 12.5}
                ]
            }
        }))
        .unwrap();
        let cities = &r.simulation_response.cities;
        assert_eq!(cities[0].damage, 12.5);
        assert_eq!(cities[0].population, 76201);
        assert!(r.simulation_response.edges.is_empty());
    }
}
