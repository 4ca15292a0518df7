pub mod canvas;
pub mod image;
pub mod text;

use crate::mood::MoodPalette;
use crate::overlay::OverlayLayer;
use crate::simulation::Simulation;

use self::canvas::Canvas;

/// Composite one frame: background, then overlays, then critters.
pub fn compose(canvas: &mut Canvas, sim: &Simulation, overlays: &OverlayLayer) {
    MoodPalette::for_activity(sim.activity()).paint(canvas);
    overlays.draw(canvas);
    sim.draw(canvas);
}
