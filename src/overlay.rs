use serde::Serialize;

use crate::color::{intensity_to_rgb_color, severity_color};
use crate::geometry::tube::tube_path;
use crate::model::{CircleParams, CircleRole, DisasterTaxonomy, GeoPoint, HurricaneParameters};
use crate::params::DisasterParameterModel;
use crate::simulation::SimulationResponse;
use crate::wizard::{WizardState, WizardStep};

pub const CIRCLE_FILL_OPACITY: f64 = 0.3;
pub const TUBE_LINE_COLOR: &str = "#555555";
pub const TUBE_LINE_OPACITY: f64 = 0.1;
pub const TUBE_LINE_WEIGHT: f64 = 10.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Style {
    pub stroke: String,
    pub fill: Option<String>,
    pub opacity: f64,
    pub fill_opacity: f64,
    pub weight: f64,
}

impl Style {
    fn severity(intensity: f64) -> Self {
        let color = severity_color(intensity);
        Self {
            stroke: color.clone(),
            fill: Some(color),
            opacity: 1.0,
            fill_opacity: CIRCLE_FILL_OPACITY,
            weight: 3.0,
        }
    }

    /// Result styling: undamaged is green, destroyed is red.
    fn damage(damage: f64) -> Self {
        let color = intensity_to_rgb_color(100.0 - damage);
        Self {
            stroke: color.clone(),
            fill: Some(color),
            opacity: 1.0,
            fill_opacity: 0.8,
            weight: 3.0,
        }
    }

    fn tube_line() -> Self {
        Self {
            stroke: TUBE_LINE_COLOR.to_string(),
            fill: None,
            opacity: TUBE_LINE_OPACITY,
            fill_opacity: 0.0,
            weight: TUBE_LINE_WEIGHT,
        }
    }
}

/// Everything the map draws, in geographic coordinates.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layer {
    Circle {
        role: CircleRole,
        circle: CircleParams,
        style: Style,
    },
    Polyline {
        points: Vec<GeoPoint>,
        style: Style,
    },
    Marker {
        position: GeoPoint,
        label: String,
        style: Style,
    },
    /// Gradient band between the storm circles; the geometry depends on the
    /// projection and is derived by the renderer.
    Shadow { hurricane: HurricaneParameters },
}

/// A consumer that turns layers into some output (SVG text, pixels, ...).
pub trait Renderer {
    type Output;

    fn draw(&mut self, layer: &Layer);
    fn finish(self) -> Self::Output;
}

pub fn render<R: Renderer>(layers: &[Layer], mut renderer: R) -> R::Output {
    for layer in layers {
        renderer.draw(layer);
    }
    renderer.finish()
}

fn circle_layer(role: CircleRole, circle: &CircleParams) -> Layer {
    Layer::Circle {
        role,
        circle: *circle,
        style: Style::severity(circle.intensity),
    }
}

/// Layers for the current wizard state. Empty at `DisasterChoice`.
pub fn build(
    state: WizardState,
    params: &DisasterParameterModel,
    response: Option<&SimulationResponse>,
) -> Vec<Layer> {
    let Some(disaster) = state.chosen_disaster else {
        return Vec::new();
    };
    if state.wizard_step == WizardStep::DisasterChoice {
        return Vec::new();
    }

    let mut layers = Vec::new();
    match disaster {
        DisasterTaxonomy::Earthquake => {
            layers.push(circle_layer(CircleRole::Earthquake, &params.earthquake().0));
        }
        DisasterTaxonomy::Hurricane => {
            let h = params.hurricane();
            layers.push(Layer::Shadow { hurricane: *h });
            for [a, b] in tube_path(h) {
                layers.push(Layer::Polyline {
                    points: vec![a, b],
                    style: Style::tube_line(),
                });
            }
            layers.push(circle_layer(CircleRole::HurricaneStart, &h.start));
            layers.push(circle_layer(CircleRole::HurricaneEnd, &h.end));
        }
    }

    if state.wizard_step == WizardStep::Results {
        if let Some(response) = response {
            layers.extend(response.edges.iter().map(|e| Layer::Polyline {
                points: vec![e.start, e.end],
                style: Style::damage(e.damage),
            }));
            layers.extend(response.cities.iter().map(|c| Layer::Marker {
                position: c.position(),
                label: format!("{} ({})", c.city, c.population),
                style: Style::damage(c.damage),
            }));
        }
    }
    layers
}
