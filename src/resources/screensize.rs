//! Surface geometry.
//!
//! Stores where the render surface sits on the host page and how big its
//! backing store is. Input uses it to turn client coordinates into
//! canvas-relative device pixels.

/// Placement of the render surface in client space plus its pixel size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceBounds {
    /// Left edge of the surface in client coordinates.
    pub offset_x: f32,
    /// Top edge of the surface in client coordinates.
    pub offset_y: f32,
    /// Displayed width in CSS pixels.
    pub css_width: f32,
    /// Displayed height in CSS pixels.
    pub css_height: f32,
    /// Backing-store width in device pixels.
    pub pixel_width: f32,
    /// Backing-store height in device pixels.
    pub pixel_height: f32,
}

impl SurfaceBounds {
    /// Surface at the client origin, `width`x`height` CSS pixels scaled by
    /// `device_pixel_ratio`.
    pub fn new(width: u32, height: u32, device_pixel_ratio: f32) -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            css_width: width as f32,
            css_height: height as f32,
            pixel_width: (width as f32 * device_pixel_ratio).round(),
            pixel_height: (height as f32 * device_pixel_ratio).round(),
        }
    }

    pub fn with_offset(mut self, x: f32, y: f32) -> Self {
        self.offset_x = x;
        self.offset_y = y;
        self
    }

    /// Client coordinates to canvas pixels:
    /// `(client - offset) * (pixel_size / css_size)`.
    pub fn to_canvas(&self, client_x: f32, client_y: f32) -> (f32, f32) {
        let sx = scale(self.pixel_width, self.css_width);
        let sy = scale(self.pixel_height, self.css_height);
        (
            (client_x - self.offset_x) * sx,
            (client_y - self.offset_y) * sy,
        )
    }

    /// Whether a canvas-pixel position lies on the surface.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= 0.0 && y >= 0.0 && x < self.pixel_width && y < self.pixel_height
    }
}

impl Default for SurfaceBounds {
    fn default() -> Self {
        Self::new(800, 600, 1.0)
    }
}

fn scale(pixels: f32, css: f32) -> f32 {
    if css > 0.0 { pixels / css } else { 1.0 }
}
