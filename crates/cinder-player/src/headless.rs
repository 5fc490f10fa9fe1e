//! Headless draw target and console crash inspector

use cinder_runtime::{CrashInspector, CrashReport, DrawTarget, InspectorAction, Result};
use glam::{Mat4, Vec2, Vec3};
use std::any::Any;

/// Collects draw calls instead of rasterizing them
#[derive(Debug)]
pub struct HeadlessTarget {
    camera: Vec2,
    half_extent: Vec2,
    points: Vec<Vec3>,
    frames: u64,
}

impl HeadlessTarget {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            camera: Vec2::ZERO,
            half_extent: Vec2::new(width, height) * 0.5,
            points: Vec::new(),
            frames: 0,
        }
    }

    /// Start a new frame, discarding the previous one's draw calls
    pub fn begin_frame(&mut self) {
        self.points.clear();
        self.frames += 1;
    }

    pub fn set_camera(&mut self, position: Vec2) {
        self.camera = position;
    }

    pub fn draw_point(&mut self, point: Vec3) {
        self.points.push(point);
    }

    /// Points drawn this frame, in screen space
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for HeadlessTarget {
    fn default() -> Self {
        Self::new(640.0, 360.0)
    }
}

impl DrawTarget for HeadlessTarget {
    fn transform(&self) -> Mat4 {
        // Integer camera offset, then center on the virtual screen
        let camera = self.camera.round();
        Mat4::from_translation(self.half_extent.extend(0.0))
            * Mat4::from_translation((-camera).extend(0.0))
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Prints the crash report once and asks the host to exit
#[derive(Debug, Default)]
pub struct ConsoleInspector {
    printed: bool,
}

impl CrashInspector for ConsoleInspector {
    fn activate(&mut self, report: &CrashReport) -> Result<()> {
        eprintln!("Simulation stopped: {}", report.root_cause());
        Ok(())
    }

    fn update(&mut self, report: &CrashReport, _delta: f64) -> Result<InspectorAction> {
        if !self.printed {
            eprintln!("{}", report);
            self.printed = true;
        }
        Ok(InspectorAction::Exit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_centers_camera() {
        let mut target = HeadlessTarget::new(100.0, 50.0);
        target.set_camera(Vec2::new(10.4, -3.6));
        let p = target.transform().transform_point3(Vec3::new(10.0, -4.0, 0.0));
        assert!((p - Vec3::new(50.0, 25.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn begin_frame_clears_points() {
        let mut target = HeadlessTarget::default();
        target.draw_point(Vec3::ONE);
        assert_eq!(target.points().len(), 1);
        target.begin_frame();
        assert!(target.points().is_empty());
        assert_eq!(target.frames(), 1);
    }
}
