use std::path::PathBuf;

use hazardmap::config::Settings;
use hazardmap::overlay::render;
use hazardmap::render::{RasterRenderer, save_png};
use hazardmap::simulation::{HttpBackend, SimulationCoordinator};
use hazardmap::svg::SvgRenderer;
use hazardmap::{DisasterTaxonomy, GeoPoint, MapView, SimulationOutcome, WizardSession};

const VIEW_W: u32 = 1024;
const VIEW_H: u32 = 768;

#[tokio::main]
async fn main() {
    hazardmap::init_tracing();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let offline = match args.iter().position(|a| a == "--offline") {
        Some(i) => {
            args.remove(i);
            true
        }
        None => false,
    };

    let disaster: DisasterTaxonomy = match args.first().map(|s| s.parse::<DisasterTaxonomy>()) {
        Some(Ok(d)) => d,
        Some(Err(e)) => {
            eprintln!("{e}");
            eprintln!("usage: hazardmap <earthquake|hurricane> [lat] [lng] [out_dir] [--offline]");
            std::process::exit(2);
        }
        None => DisasterTaxonomy::Earthquake,
    };

    let settings = Settings::load().unwrap_or_else(|e| {
        eprintln!("{e}");
        std::process::exit(1);
    });

    let lat: f64 = args
        .get(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(settings.defaults.map_center.lat);
    let lng: f64 = args
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(settings.defaults.map_center.lng);
    let out_dir: PathBuf = args
        .get(3)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("artifacts"));

    std::fs::create_dir_all(&out_dir).expect("failed to create output directory");

    let mut session = WizardSession::new(settings.defaults.clone());
    let view = MapView {
        center: GeoPoint::new(lat, lng),
        zoom: settings.defaults.map_zoom,
    };
    if let Err(e) = session.set_map_view(view) {
        eprintln!("{e}");
        std::process::exit(2);
    }
    session
        .choose_disaster(disaster)
        .expect("fresh session accepts a disaster choice");

    if !offline {
        let backend = HttpBackend::from_settings(&settings).unwrap_or_else(|e| {
            eprintln!("{e}");
            std::process::exit(1);
        });
        let coordinator = SimulationCoordinator::new(backend, &settings.api);
        match coordinator.simulate(&mut session).await {
            Ok(SimulationOutcome::Completed) => {}
            Ok(SimulationOutcome::Failed { message }) => eprintln!("Simulation failed: {message}"),
            Ok(SimulationOutcome::Discarded { .. }) => {}
            Err(e) => eprintln!("Simulation not started: {e}"),
        }
    }

    let layers = session.overlay();
    let projection = session.view().projection(VIEW_W, VIEW_H);

    let svg = render(&layers, SvgRenderer::new(projection, VIEW_W, VIEW_H));
    let svg_path = out_dir.join("overlay.svg");
    std::fs::write(&svg_path, svg).expect("failed to write overlay");
    eprintln!("Saved {}", svg_path.display());

    if disaster == DisasterTaxonomy::Hurricane {
        let (w, h) = (VIEW_W as usize, VIEW_H as usize);
        let rgba = render(&layers, RasterRenderer::new(projection, w, h));
        let png_path = out_dir.join("shadow.png");
        save_png(&png_path, &rgba, w, h).expect("failed to save image");
        eprintln!("Saved {}", png_path.display());
    }

    if let Some(response) = session.response() {
        println!("{:<30} {:>12} {:>8}", "city", "population", "damage");
        for c in &response.cities {
            println!("{:<30} {:>12} {:>8.1}", c.city, c.population, c.damage);
        }
        println!("{} damaged edges", response.edges.len());
    }

    eprintln!("\nStep: {:?}", session.state().wizard_step);
}
