use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Geographic position in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn offset(self, d_lat: f64, d_lng: f64) -> Self {
        Self::new(self.lat + d_lat, self.lng + d_lng)
    }

    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.lat.is_finite() && self.lng.is_finite() && (-90.0..=90.0).contains(&self.lat) {
            Ok(self)
        } else {
            Err(ValidationError::InvalidCoordinate {
                lat: self.lat,
                lng: self.lng,
            })
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisasterTaxonomy {
    Earthquake,
    Hurricane,
}

impl DisasterTaxonomy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Earthquake => "earthquake",
            Self::Hurricane => "hurricane",
        }
    }
}

impl std::str::FromStr for DisasterTaxonomy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "earthquake" => Ok(Self::Earthquake),
            "hurricane" => Ok(Self::Hurricane),
            other => Err(format!("unknown disaster type: {other}")),
        }
    }
}

/// One circular extent. Radius in meters, intensity on a 0-100 scale.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CircleParams {
    pub center: GeoPoint,
    pub radius: f64,
    pub intensity: f64,
}

pub const MAX_INTENSITY: f64 = 100.0;

pub fn validate_radius(radius: f64) -> Result<f64, ValidationError> {
    if radius.is_finite() && radius > 0.0 {
        Ok(radius)
    } else {
        Err(ValidationError::RadiusOutOfRange(radius))
    }
}

pub fn validate_intensity(intensity: f64) -> Result<f64, ValidationError> {
    if intensity.is_finite() && (0.0..=MAX_INTENSITY).contains(&intensity) {
        Ok(intensity)
    } else {
        Err(ValidationError::IntensityOutOfRange(intensity))
    }
}

impl CircleParams {
    pub fn new(center: GeoPoint, radius: f64, intensity: f64) -> Self {
        Self {
            center,
            radius,
            intensity,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.center.validate()?;
        validate_radius(self.radius)?;
        validate_intensity(self.intensity)?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EarthquakeParameters(pub CircleParams);

/// Storm path: strength and extent interpolate from `start` to `end`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HurricaneParameters {
    pub start: CircleParams,
    pub end: CircleParams,
}

/// Which editable circle a parameter change targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircleRole {
    Earthquake,
    HurricaneStart,
    HurricaneEnd,
}

impl CircleRole {
    pub fn taxonomy(self) -> DisasterTaxonomy {
        match self {
            Self::Earthquake => DisasterTaxonomy::Earthquake,
            Self::HurricaneStart | Self::HurricaneEnd => DisasterTaxonomy::Hurricane,
        }
    }
}
