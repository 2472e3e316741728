//! Render surface contract.
//!
//! The engine owns one [`RenderSurface`]: it sizes the backing store for the
//! device pixel ratio, sets the scale so scenes draw in logical (CSS) pixels
//! and clears it each frame. Everything else on it is drawn by the active
//! scene.
//!
//! [`RecordingSurface`] keeps the draw calls in memory for headless runs and
//! tests.

use std::cell::RefCell;
use std::rc::Rc;

use crate::components::rect::Rect;

pub trait RenderSurface {
    /// Resize the backing store, in device pixels.
    fn resize(&mut self, pixel_width: u32, pixel_height: u32);
    /// Scale applied to subsequent drawing.
    fn set_scale(&mut self, sx: f32, sy: f32);
    fn clear(&mut self, color: &str);
    fn fill_rect(&mut self, rect: Rect, color: &str);
    fn stroke_rect(&mut self, rect: Rect, color: &str, line_width: f32);
    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: &str, line_width: f32);
    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: &str, size: f32);
    /// Draw a loaded image asset, optionally a sub-rectangle of it.
    fn draw_image(&mut self, asset_id: &str, src: Option<Rect>, dest: Rect);
    /// Backing-store size in device pixels.
    fn size(&self) -> (u32, u32);
}

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCmd {
    Resize { width: u32, height: u32 },
    Scale { sx: f32, sy: f32 },
    Clear { color: String },
    FillRect { rect: Rect, color: String },
    StrokeRect { rect: Rect, color: String, line_width: f32 },
    Line { from: (f32, f32), to: (f32, f32), color: String, line_width: f32 },
    Text { text: String, x: f32, y: f32, color: String, size: f32 },
    Image { asset_id: String, src: Option<Rect>, dest: Rect },
}

/// Surface that draws nothing. Used for headless runs and as the
/// placeholder while the engine lends its real surface to a scene.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSurface;

impl RenderSurface for NullSurface {
    fn resize(&mut self, _: u32, _: u32) {}
    fn set_scale(&mut self, _: f32, _: f32) {}
    fn clear(&mut self, _: &str) {}
    fn fill_rect(&mut self, _: Rect, _: &str) {}
    fn stroke_rect(&mut self, _: Rect, _: &str, _: f32) {}
    fn line(&mut self, _: (f32, f32), _: (f32, f32), _: &str, _: f32) {}
    fn fill_text(&mut self, _: &str, _: f32, _: f32, _: &str, _: f32) {}
    fn draw_image(&mut self, _: &str, _: Option<Rect>, _: Rect) {}
    fn size(&self) -> (u32, u32) {
        (0, 0)
    }
}

/// Surface that records draw calls. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    log: Rc<RefCell<Vec<DrawCmd>>>,
    size: Rc<RefCell<(u32, u32)>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every command recorded so far.
    pub fn commands(&self) -> Vec<DrawCmd> {
        self.log.borrow().clone()
    }

    /// Drain the log.
    pub fn take(&self) -> Vec<DrawCmd> {
        std::mem::take(&mut *self.log.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.log.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.borrow().is_empty()
    }

    fn push(&self, cmd: DrawCmd) {
        self.log.borrow_mut().push(cmd);
    }
}

impl RenderSurface for RecordingSurface {
    fn resize(&mut self, pixel_width: u32, pixel_height: u32) {
        *self.size.borrow_mut() = (pixel_width, pixel_height);
        self.push(DrawCmd::Resize {
            width: pixel_width,
            height: pixel_height,
        });
    }

    fn set_scale(&mut self, sx: f32, sy: f32) {
        self.push(DrawCmd::Scale { sx, sy });
    }

    fn clear(&mut self, color: &str) {
        self.push(DrawCmd::Clear {
            color: color.to_string(),
        });
    }

    fn fill_rect(&mut self, rect: Rect, color: &str) {
        self.push(DrawCmd::FillRect {
            rect,
            color: color.to_string(),
        });
    }

    fn stroke_rect(&mut self, rect: Rect, color: &str, line_width: f32) {
        self.push(DrawCmd::StrokeRect {
            rect,
            color: color.to_string(),
            line_width,
        });
    }

    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: &str, line_width: f32) {
        self.push(DrawCmd::Line {
            from,
            to,
            color: color.to_string(),
            line_width,
        });
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: &str, size: f32) {
        self.push(DrawCmd::Text {
            text: text.to_string(),
            x,
            y,
            color: color.to_string(),
            size,
        });
    }

    fn draw_image(&mut self, asset_id: &str, src: Option<Rect>, dest: Rect) {
        self.push(DrawCmd::Image {
            asset_id: asset_id.to_string(),
            src,
            dest,
        });
    }

    fn size(&self) -> (u32, u32) {
        *self.size.borrow()
    }
}
