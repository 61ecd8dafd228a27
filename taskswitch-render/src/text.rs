use std::collections::HashMap;
use std::rc::Rc;

use ab_glyph::{point, Font, FontVec, Glyph, PxScale, ScaleFont};
use tiny_skia::{Color, Pixmap, PremultipliedColorU8};

/// Rasterizes a single line of text into a tightly bounded, transparent,
/// premultiplied pixmap.
pub fn render_text_pixmap(text: &str, font_size: f32, font: &FontVec, color: Color) -> Pixmap {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    // Lay out with the baseline at the ascent.
    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    // Union of the outlined pixel bounds.
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for g in &glyphs {
        if let Some(out) = font.outline_glyph(g.clone()) {
            let b = out.px_bounds();
            min_x = min_x.min(b.min.x);
            min_y = min_y.min(b.min.y);
            max_x = max_x.max(b.max.x);
            max_y = max_y.max(b.max.y);
        }
    }
    if min_x == f32::INFINITY {
        return Pixmap::new(1, 1).expect("pixmap");
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h).expect("pixmap");

    let cr = color.red();
    let cg = color.green();
    let cb = color.blue();
    let ca = color.alpha();

    let stride = pm.width() as usize;
    let dst = pm.pixels_mut();
    for g in &glyphs {
        if let Some(out) = font.outline_glyph(g.clone()) {
            let b = out.px_bounds();
            out.draw(|x, y, cov| {
                if cov <= f32::EPSILON {
                    return;
                }
                let ix = (x as f32 + b.min.x - min_x).floor() as i32;
                let iy = (y as f32 + b.min.y - min_y).floor() as i32;
                if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                    return;
                }
                let i = iy as usize * stride + ix as usize;

                // Premultiply by coverage; where glyph boxes overlap keep
                // the stronger coverage instead of compounding it.
                let a = (cov * ca).clamp(0.0, 1.0);
                if (dst[i].alpha() as f32) / 255.0 >= a {
                    return;
                }
                let px = PremultipliedColorU8::from_rgba(
                    (cr * a * 255.0) as u8,
                    (cg * a * 255.0) as u8,
                    (cb * a * 255.0) as u8,
                    (a * 255.0) as u8,
                );
                if let Some(px) = px {
                    dst[i] = px;
                }
            });
        }
    }

    pm
}

/// Cache of rendered text pixmaps keyed by content; RT feedback reuses the
/// same few hundred strings across a session.
pub struct TextCache {
    size_px: f32,
    map: HashMap<String, Rc<Pixmap>>,
}

impl TextCache {
    pub fn new(size_px: f32) -> Self {
        Self {
            size_px,
            map: HashMap::new(),
        }
    }

    pub fn get_or_render(&mut self, font: &FontVec, text: &str) -> Rc<Pixmap> {
        if let Some(pm) = self.map.get(text) {
            return Rc::clone(pm);
        }
        let pm = Rc::new(render_text_pixmap(
            text,
            self.size_px,
            font,
            Color::from_rgba8(255, 255, 255, 255),
        ));
        self.map.insert(text.to_string(), Rc::clone(&pm));
        pm
    }
}
