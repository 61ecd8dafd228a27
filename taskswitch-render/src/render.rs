use ab_glyph::FontVec;
use anyhow::{ensure, Result};
use tiny_skia::{Color, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke, Transform};

use taskswitch_core::{CueType, DisplayState, FixationView, TargetLocation, TrialView};

use crate::text::TextCache;

fn black() -> Color {
    Color::from_rgba8(0, 0, 0, 255)
}
fn white() -> Color {
    Color::from_rgba8(255, 255, 255, 255)
}
fn green() -> Color {
    Color::from_rgba8(0, 255, 0, 255)
}
fn red() -> Color {
    Color::from_rgba8(255, 0, 0, 255)
}

/// Stimulus geometry in pixels. The original sizes are in degrees of
/// visual angle; here they scale with display height (≈36 px/deg at
/// 1080p, the usual desk viewing distance).
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    pub center: (f32, f32),
    pub marker_px: f32,
    pub marker_stroke: f32,
    pub annulus_diameter: f32,
    pub annulus_ring: f32,
    pub flanker_left: (f32, f32),
    pub flanker_right: (f32, f32),
    pub cue_width: f32,
    pub cue_height: f32,
    pub cue_stroke: f32,
}

impl Layout {
    pub fn new(width: u32, height: u32) -> Self {
        let px_per_deg = height as f32 / 30.0;
        let center = (width as f32 / 2.0, height as f32 / 2.0);
        let flanker_offset = 8.0 * px_per_deg;
        let cue_offset = 5.0 * px_per_deg;
        Self {
            width,
            height,
            center,
            marker_px: px_per_deg,
            marker_stroke: (0.1 * px_per_deg).max(2.0),
            annulus_diameter: px_per_deg,
            annulus_ring: 0.4 * px_per_deg,
            flanker_left: (center.0 - flanker_offset, center.1),
            flanker_right: (center.0 + flanker_offset, center.1),
            cue_width: (width as f32 - cue_offset).max(1.0),
            cue_height: (height as f32 - cue_offset).max(1.0),
            cue_stroke: (0.1 * px_per_deg).max(2.0),
        }
    }

    fn flanker(&self, loc: TargetLocation) -> (f32, f32) {
        match loc {
            TargetLocation::Left => self.flanker_left,
            TargetLocation::Right => self.flanker_right,
        }
    }
}

/// Immediate-mode tiny-skia renderer: static stimuli are rasterized once,
/// each frame fills the canvas and blits what the `DisplayState` names.
pub struct SkiaRenderer {
    layout: Layout,
    canvas: Pixmap,
    font: FontVec,
    text_cache: TextCache,
    cue_green: Pixmap,
    cue_red: Pixmap,
    empty_marker: Pixmap,
    filled_marker: Pixmap,
    fixation: Pixmap,
    error_fixation: Pixmap,
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32, font: FontVec) -> Result<Self> {
        ensure!(width > 0 && height > 0, "degenerate surface {width}x{height}");
        let layout = Layout::new(width, height);
        let canvas = Pixmap::new(width, height).expect("canvas pixmap");
        let mut renderer = Self {
            layout,
            canvas,
            font,
            text_cache: TextCache::new(28.0),
            cue_green: Pixmap::new(1, 1).unwrap(),
            cue_red: Pixmap::new(1, 1).unwrap(),
            empty_marker: Pixmap::new(1, 1).unwrap(),
            filled_marker: Pixmap::new(1, 1).unwrap(),
            fixation: Pixmap::new(1, 1).unwrap(),
            error_fixation: Pixmap::new(1, 1).unwrap(),
        };
        renderer.build_static_pixmaps();
        Ok(renderer)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.layout = Layout::new(width, height);
        self.canvas = Pixmap::new(width, height).expect("canvas pixmap");
        self.build_static_pixmaps();
    }

    fn build_static_pixmaps(&mut self) {
        let l = self.layout;
        self.cue_green = stroked_rect(l.cue_width, l.cue_height, l.cue_stroke, green());
        self.cue_red = stroked_rect(l.cue_width, l.cue_height, l.cue_stroke, red());
        self.empty_marker = marker(l.marker_px, l.marker_stroke, white(), false);
        self.filled_marker = marker(l.marker_px, l.marker_stroke, white(), true);
        self.fixation = annulus(l.annulus_diameter, l.annulus_ring, white());
        self.error_fixation = annulus(l.annulus_diameter, l.annulus_ring, red());
    }

    /// Composites one frame into `frame` (RGBA8, same size as the
    /// canvas). Draw-then-present: the caller flips afterwards.
    pub fn render_frame(&mut self, display: &DisplayState, frame: &mut [u8]) -> Result<()> {
        ensure!(
            frame.len() == self.canvas.data().len(),
            "frame buffer is {} bytes, canvas needs {}",
            frame.len(),
            self.canvas.data().len()
        );

        self.canvas.fill(black());
        match display {
            DisplayState::Blank => {}
            DisplayState::Message(text) => {
                let pm = self.text_cache.get_or_render(&self.font, text);
                blit_centered(&mut self.canvas, &pm, self.layout.center);
            }
            DisplayState::Trial(view) => self.draw_trial(*view),
        }
        frame.copy_from_slice(self.canvas.data());
        Ok(())
    }

    fn draw_trial(&mut self, view: TrialView) {
        let l = self.layout;

        let cue = match view.cue {
            CueType::Compatible => &self.cue_green,
            CueType::Incompatible => &self.cue_red,
        };
        blit_centered(&mut self.canvas, cue, l.center);

        blit_centered(&mut self.canvas, &self.empty_marker, l.flanker_left);
        blit_centered(&mut self.canvas, &self.empty_marker, l.flanker_right);
        if let Some(target) = view.target {
            blit_centered(&mut self.canvas, &self.filled_marker, l.flanker(target));
        }

        match view.fixation {
            FixationView::Normal => blit_centered(&mut self.canvas, &self.fixation, l.center),
            FixationView::Error => {
                blit_centered(&mut self.canvas, &self.error_fixation, l.center)
            }
            FixationView::ReactionTime(rt_ms) => {
                let pm = self
                    .text_cache
                    .get_or_render(&self.font, &rt_ms.to_string());
                blit_centered(&mut self.canvas, &pm, l.center);
            }
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }
}

fn blit_centered(canvas: &mut Pixmap, pm: &Pixmap, pos: (f32, f32)) {
    let x = (pos.0 - pm.width() as f32 / 2.0).round() as i32;
    let y = (pos.1 - pm.height() as f32 / 2.0).round() as i32;
    canvas.draw_pixmap(
        x,
        y,
        pm.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
}

/// Hollow rectangle with an inner stroke, used for the cue border.
fn stroked_rect(width: f32, height: f32, stroke: f32, color: Color) -> Pixmap {
    let mut pm = Pixmap::new(width.ceil() as u32, height.ceil() as u32).expect("cue pixmap");
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = false;

    let inset = stroke / 2.0;
    if let Some(rect) = Rect::from_xywh(inset, inset, width - stroke, height - stroke) {
        let path = PathBuilder::from_rect(rect);
        pm.stroke_path(
            &path,
            &paint,
            &Stroke {
                width: stroke,
                ..Stroke::default()
            },
            Transform::identity(),
            None,
        );
    }
    pm
}

/// Square placeholder marker; filled when it becomes the target.
fn marker(size: f32, stroke: f32, color: Color, filled: bool) -> Pixmap {
    let mut pm = Pixmap::new(size.ceil() as u32, size.ceil() as u32).expect("marker pixmap");
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = false;

    if filled {
        if let Some(rect) = Rect::from_xywh(0.0, 0.0, size, size) {
            pm.fill_rect(rect, &paint, Transform::identity(), None);
        }
    } else if let Some(rect) =
        Rect::from_xywh(stroke / 2.0, stroke / 2.0, size - stroke, size - stroke)
    {
        let path = PathBuilder::from_rect(rect);
        pm.stroke_path(
            &path,
            &paint,
            &Stroke {
                width: stroke,
                ..Stroke::default()
            },
            Transform::identity(),
            None,
        );
    }
    pm
}

/// Fixation ring (annulus) centered in its own pixmap.
fn annulus(outer_diameter: f32, ring: f32, color: Color) -> Pixmap {
    let size = outer_diameter.ceil() as u32;
    let mut pm = Pixmap::new(size.max(1), size.max(1)).expect("annulus pixmap");
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;

    let c = outer_diameter / 2.0;
    let radius = (outer_diameter - ring) / 2.0;
    let mut pb = PathBuilder::new();
    pb.push_circle(c, c, radius.max(1.0));
    if let Some(path) = pb.finish() {
        pm.stroke_path(
            &path,
            &paint,
            &Stroke {
                width: ring,
                ..Stroke::default()
            },
            Transform::identity(),
            None,
        );
    }
    pm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_scales_with_the_display() {
        let layout = Layout::new(1920, 1080);
        assert_eq!(layout.center, (960.0, 540.0));
        assert!(layout.flanker_left.0 < layout.center.0);
        assert!(layout.flanker_right.0 > layout.center.0);
        assert!(layout.cue_width < 1920.0);
        assert!(layout.cue_height < 1080.0);
    }

    #[test]
    fn static_pixmaps_carry_their_colours() {
        let cue = stroked_rect(100.0, 80.0, 4.0, green());
        // The border is drawn, the interior stays transparent.
        let data = cue.data();
        assert!(data.chunks_exact(4).any(|p| p[1] > 0));
        let mid = ((40 * 100 + 50) * 4) as usize;
        assert_eq!(&data[mid..mid + 4], &[0, 0, 0, 0]);

        let fix = annulus(36.0, 14.0, white());
        assert!(fix.data().iter().any(|&b| b > 0));

        let filled = marker(36.0, 4.0, white(), true);
        let center = ((18 * 36 + 18) * 4) as usize;
        assert_eq!(filled.data()[center + 3], 255);
    }
}
