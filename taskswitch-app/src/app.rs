use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use ab_glyph::FontVec;
use anyhow::{Context, Result};
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::ThreadRng;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Fullscreen, Window, WindowId},
};

use taskswitch_audio::CpalMixer;
use taskswitch_core::TargetLocation;
use taskswitch_experiment::{ExperimentConfig, Session};
use taskswitch_render::SkiaRenderer;
use taskswitch_timing::HighPrecisionTimer;

const CONFIG_PATH: &str = "taskswitch.json";

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/Library/Fonts/Arial Unicode.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Exit,
    Respond(TargetLocation),
    Advance,
}

/// Z and `/` are response keys only while a block runs; everywhere else
/// they count as "any key" so the welcome and debrief screens react to
/// the keys a participant's hands are already resting on.
fn classify_key(k: winit::keyboard::KeyCode, in_block: bool) -> KeyAction {
    use winit::keyboard::KeyCode;
    match k {
        KeyCode::Escape => KeyAction::Exit,
        KeyCode::KeyZ if in_block => KeyAction::Respond(TargetLocation::Left),
        KeyCode::Slash if in_block => KeyAction::Respond(TargetLocation::Right),
        _ => KeyAction::Advance,
    }
}

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    session: Session<HighPrecisionTimer, ThreadRng, CpalMixer>,
    renderer: Option<SkiaRenderer>,
    current_size: Option<PhysicalSize<u32>>,
    scale_factor: f64,
    last_frame: Option<Instant>,

    should_exit: bool,
}

impl App {
    pub fn new() -> Result<Self> {
        let config = if Path::new(CONFIG_PATH).exists() {
            println!("Loading configuration from {CONFIG_PATH}");
            ExperimentConfig::load(CONFIG_PATH)?
        } else {
            ExperimentConfig::default()
        };

        let timer = HighPrecisionTimer::new();
        let rng = rand::rng();
        let mixer = CpalMixer::new().context("opening the audio output device")?;
        let session = Session::new(config, timer, rng, mixer)?;

        Ok(Self {
            window: None,
            pixels: None,
            session,
            renderer: None,
            current_size: None,
            scale_factor: 1.0,
            last_frame: None,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        println!("=== TASK SWITCHING EXPERIMENT ===");
        println!("Platform: {}", std::env::consts::OS);
        println!("Architecture: {}", std::env::consts::ARCH);
        println!("Respond with Z (left) and / (right). ESC aborts.\n");

        event_loop.run_app(&mut self)?;
        Ok(())
    }

    fn load_font() -> Result<FontVec> {
        for path in FONT_CANDIDATES {
            if let Ok(bytes) = std::fs::read(path) {
                return FontVec::try_from_vec(bytes)
                    .with_context(|| format!("parsing font at {path}"));
            }
        }
        anyhow::bail!("no usable system font found; tried {FONT_CANDIDATES:?}")
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow::anyhow!("No monitor available"))?;

        let window_attributes = Window::default_attributes()
            .with_title("Task Switching")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor.clone()))))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();
        let scale_factor = window.scale_factor();

        self.current_size = Some(physical_size);
        self.scale_factor = scale_factor;

        println!("Display Configuration:");
        println!(
            "  Physical size: {}×{}",
            physical_size.width, physical_size.height
        );
        println!("  Scale factor: {:.2}", scale_factor);
        if let Some(rate) = primary_monitor.refresh_rate_millihertz() {
            println!("  Reported refresh rate: {:.1} Hz", rate as f64 / 1000.0);
        }

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());

        self.pixels = Some(Pixels::new(
            physical_size.width,
            physical_size.height,
            surface_texture,
        )?);

        let font = Self::load_font()?;
        self.renderer = Some(SkiaRenderer::new(
            physical_size.width,
            physical_size.height,
            font,
        )?);

        window.set_cursor_visible(false);
        window.request_redraw();

        self.window = Some(window);

        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pix), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };

        let display = self.session.display_state();
        renderer.render_frame(&display, pix.frame_mut())?;
        pix.render()?;

        // Frame-to-frame interval, sampled right after the present so it
        // tracks the vsync cadence the calibration wants to measure.
        let now = Instant::now();
        if let Some(last) = self.last_frame.replace(now) {
            self.session.note_frame(now - last);
        }

        self.session.update()?;

        Ok(())
    }

    fn handle_input(&mut self, key: winit::keyboard::PhysicalKey, event_loop: &ActiveEventLoop) {
        use winit::keyboard::PhysicalKey;
        let PhysicalKey::Code(k) = key else { return };
        match classify_key(k, self.session.phase().is_block()) {
            KeyAction::Exit => self.cleanup_and_exit(event_loop),
            KeyAction::Respond(loc) => self.session.handle_response(loc),
            KeyAction::Advance => {
                if self.session.is_done() {
                    self.cleanup_and_exit(event_loop);
                } else {
                    self.session.handle_any_key();
                }
            }
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        self.current_size = Some(new_size);
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                eprintln!("Failed to resize surface: {}", e);
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                eprintln!("Failed to resize buffer: {}", e);
            }
        }
        if let Some(renderer) = &mut self.renderer {
            renderer.resize(new_size.width, new_size.height);
        }
        println!("Display resized to: {}×{}", new_size.width, new_size.height);
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if !self.session.is_done() {
            self.session.abort();
        }
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }

        println!("\nGoodbye.");

        self.should_exit = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                eprintln!("Failed to create window and surface: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    eprintln!("Render failed: {e:#}");
                    self.cleanup_and_exit(event_loop);
                    return;
                }
                if let Some(win) = &self.window {
                    win.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                self.handle_input(event.physical_key, event_loop);
            }
            WindowEvent::Resized(sz) => self.handle_resize(sz),
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.scale_factor = scale_factor;
                if let Some(window) = &self.window {
                    self.handle_resize(window.inner_size());
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::KeyCode;

    #[test]
    fn response_keys_respond_only_inside_a_block() {
        assert_eq!(
            classify_key(KeyCode::KeyZ, true),
            KeyAction::Respond(TargetLocation::Left)
        );
        assert_eq!(
            classify_key(KeyCode::Slash, true),
            KeyAction::Respond(TargetLocation::Right)
        );
        // On welcome/debrief screens the same keys act as "any key".
        assert_eq!(classify_key(KeyCode::KeyZ, false), KeyAction::Advance);
        assert_eq!(classify_key(KeyCode::Slash, false), KeyAction::Advance);
    }

    #[test]
    fn escape_always_exits() {
        assert_eq!(classify_key(KeyCode::Escape, true), KeyAction::Exit);
        assert_eq!(classify_key(KeyCode::Escape, false), KeyAction::Exit);
    }
}
