use macroquad::{
    camera::{
        set_camera,
        set_default_camera,
        Camera2D,
    },
    color,
    math::vec2,
    prelude::{
        render_target,
        Rect,
    },
    shapes::draw_rectangle,
    texture::{
        draw_texture_ex,
        DrawTextureParams,
        FilterMode,
        RenderTarget,
    },
    window::{
        clear_background,
        screen_height,
        screen_width,
    },
};

use crate::constants;

/// Toggle-only monochrome pixel grid the draw opcode renders through.
///
/// Coordinates wrap modulo the screen size before any pixel is touched,
/// so callers may pass values outside the grid (including negatives).
pub trait DisplaySurface {
    fn clear(&mut self);

    /// Toggle the pixel at `(x, y)`. Returns true if the pixel was set
    /// before the toggle, i.e. it just became unset.
    fn toggle(&mut self, x: i32, y: i32) -> bool;

    fn present(&mut self);
}

/// The logical 64x32 pixel grid, with no rendering attached. This is the
/// authoritative display state; host backends wrap it and paint from it.
pub struct FrameBuffer {
    pixels: [bool; constants::SCREEN_WIDTH * constants::SCREEN_HEIGHT],
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            pixels: [false; constants::SCREEN_WIDTH * constants::SCREEN_HEIGHT],
        }
    }

    fn wrap(x: i32, y: i32) -> usize {
        let x = (x.rem_euclid(constants::SCREEN_WIDTH as i32)) as usize;
        let y = (y.rem_euclid(constants::SCREEN_HEIGHT as i32)) as usize;
        y * constants::SCREEN_WIDTH + x
    }

    pub fn is_set(&self, x: i32, y: i32) -> bool {
        self.pixels[Self::wrap(x, y)]
    }

    pub fn set_pixel_count(&self) -> usize {
        self.pixels.iter().filter(|p| **p).count()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySurface for FrameBuffer {
    fn clear(&mut self) {
        self.pixels.fill(false);
    }

    fn toggle(&mut self, x: i32, y: i32) -> bool {
        let idx = Self::wrap(x, y);
        self.pixels[idx] = !self.pixels[idx];
        !self.pixels[idx]
    }

    fn present(&mut self) {}
}

/// Macroquad backed surface: keeps the logical grid in a [`FrameBuffer`]
/// and repaints a render target on `present`, which the frame loop blits
/// to the window once per host frame.
pub struct MacroquadDisplay {
    buffer: FrameBuffer,
    scale: i32,
    target: RenderTarget,
    camera: Camera2D,
}

impl MacroquadDisplay {
    pub fn new(scale: i32) -> Self {
        let width = constants::SCREEN_WIDTH as i32 * scale;
        let height = constants::SCREEN_HEIGHT as i32 * scale;

        let target = render_target(width as u32, height as u32);
        target.texture.set_filter(FilterMode::Nearest);
        let mut camera = Camera2D::from_display_rect(Rect::new(0., 0., width as f32, height as f32));
        camera.render_target = Some(target.clone());

        Self {
            buffer: FrameBuffer::new(),
            scale,
            target,
            camera,
        }
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    fn repaint(&self) {
        set_camera(&self.camera);
        clear_background(color::BLACK);

        for y in 0..constants::SCREEN_HEIGHT as i32 {
            for x in 0..constants::SCREEN_WIDTH as i32 {
                if self.buffer.is_set(x, y) {
                    draw_rectangle(
                        (x * self.scale) as f32,
                        (y * self.scale) as f32,
                        self.scale as f32,
                        self.scale as f32,
                        color::GREEN,
                    );
                }
            }
        }
    }

    /// Draw the last presented frame to the window. Called once per host
    /// frame from the run loop.
    pub fn blit(&self) {
        set_default_camera();
        draw_texture_ex(
            &self.target.texture,
            0.,
            0.,
            color::WHITE,
            DrawTextureParams {
                dest_size: Some(vec2(screen_width(), screen_height())),
                flip_y: true,
                ..Default::default()
            },
        );
    }
}

impl DisplaySurface for MacroquadDisplay {
    fn clear(&mut self) {
        self.buffer.clear();
        self.repaint();
    }

    fn toggle(&mut self, x: i32, y: i32) -> bool {
        self.buffer.toggle(x, y)
    }

    fn present(&mut self) {
        self.repaint();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_sets_then_erases() {
        let mut buffer = FrameBuffer::new();

        assert!(!buffer.toggle(3, 4), "first toggle turns the pixel on");
        assert!(buffer.is_set(3, 4));
        assert!(buffer.toggle(3, 4), "second toggle reports the pixel became unset");
        assert!(!buffer.is_set(3, 4));
    }

    #[test]
    fn coordinates_wrap_at_both_edges() {
        let mut buffer = FrameBuffer::new();

        buffer.toggle(constants::SCREEN_WIDTH as i32, constants::SCREEN_HEIGHT as i32);
        assert!(buffer.is_set(0, 0));

        buffer.toggle(-1, -1);
        assert!(buffer.is_set(constants::SCREEN_WIDTH as i32 - 1, constants::SCREEN_HEIGHT as i32 - 1));
    }

    #[test]
    fn clear_resets_every_pixel() {
        let mut buffer = FrameBuffer::new();
        buffer.toggle(0, 0);
        buffer.toggle(10, 20);

        buffer.clear();
        assert_eq!(buffer.set_pixel_count(), 0);
    }
}
