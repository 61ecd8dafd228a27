pub mod render;
pub mod text;

pub use render::{Layout, SkiaRenderer};
pub use text::render_text_pixmap;
