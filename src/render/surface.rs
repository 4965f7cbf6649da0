//! Drawing surfaces for the visualizations.
//!
//! [`PixelCanvas`] is an in-memory RGB raster; [`CanvasView`] presents it in
//! the terminal with half-block cells, two vertical pixels per cell.

use ratatui::{buffer::Buffer, layout::Rect, style::Color, widgets::Widget};

/// 24-bit color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB` or `RRGGBB`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Composites `self` over `base` with the given opacity.
    pub fn over(self, base: Rgb, alpha: f32) -> Rgb {
        let alpha = alpha.clamp(0.0, 1.0);
        let mix = |top: u8, bottom: u8| {
            (top as f32 * alpha + bottom as f32 * (1.0 - alpha)).round() as u8
        };
        Rgb::new(mix(self.r, base.r), mix(self.g, base.g), mix(self.b, base.b))
    }
}

impl From<Rgb> for Color {
    fn from(c: Rgb) -> Self {
        Color::Rgb(c.r, c.g, c.b)
    }
}

/// Drawing operations available to a visualization.
///
/// Coordinates are in pixels with the origin at the top-left corner.
pub trait Surface {
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// Resets every pixel to the background.
    fn clear(&mut self);

    /// Moves every pixel toward the background by `amount` in [0, 1].
    /// A zero or negative amount leaves the surface unchanged.
    fn fade(&mut self, amount: f32);

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb, alpha: f32);

    /// Draws connected line segments through `points`.
    fn polyline(&mut self, points: &[(f32, f32)], color: Rgb, alpha: f32);
}

/// In-memory RGB raster.
#[derive(Debug, Clone)]
pub struct PixelCanvas {
    width: usize,
    height: usize,
    background: Rgb,
    pixels: Vec<Rgb>,
}

impl PixelCanvas {
    pub fn new(width: usize, height: usize, background: Rgb) -> Self {
        Self {
            width,
            height,
            background,
            pixels: vec![background; width * height],
        }
    }

    /// Canvas sized to fill `area` when presented with [`CanvasView`].
    pub fn for_area(area: Rect, background: Rgb) -> Self {
        Self::new(area.width as usize, area.height as usize * 2, background)
    }

    /// Changes the dimensions, discarding the current content.
    pub fn resize(&mut self, width: usize, height: usize) {
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![self.background; width * height];
    }

    pub fn background(&self) -> Rgb {
        self.background
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgb> {
        (x < self.width && y < self.height).then(|| self.pixels[y * self.width + x])
    }

    /// Number of pixels that differ from the background.
    pub fn painted_pixels(&self) -> usize {
        self.pixels
            .iter()
            .filter(|&&p| p != self.background)
            .count()
    }

    fn blend(&mut self, x: i64, y: i64, color: Rgb, alpha: f32) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let idx = y as usize * self.width + x as usize;
        self.pixels[idx] = color.over(self.pixels[idx], alpha);
    }
}

impl Surface for PixelCanvas {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn clear(&mut self) {
        self.pixels.fill(self.background);
    }

    fn fade(&mut self, amount: f32) {
        if amount <= 0.0 {
            return;
        }
        let background = self.background;
        for pixel in &mut self.pixels {
            let faded = background.over(*pixel, amount);
            // Rounding can stall a fade one step short of the background.
            *pixel = if faded == *pixel { background } else { faded };
        }
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb, alpha: f32) {
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let x0 = x.floor().max(0.0) as i64;
        let y0 = y.floor().max(0.0) as i64;
        let x1 = (x + w).ceil().min(self.width as f32) as i64;
        let y1 = (y + h).ceil().min(self.height as f32) as i64;
        for py in y0..y1 {
            for px in x0..x1 {
                self.blend(px, py, color, alpha);
            }
        }
    }

    fn polyline(&mut self, points: &[(f32, f32)], color: Rgb, alpha: f32) {
        match points {
            [] => {}
            [(x, y)] => self.blend(x.round() as i64, y.round() as i64, color, alpha),
            _ => {
                for segment in points.windows(2) {
                    let (x0, y0) = (segment[0].0.round() as i64, segment[0].1.round() as i64);
                    let (x1, y1) = (segment[1].0.round() as i64, segment[1].1.round() as i64);
                    // Bresenham; the shared endpoint is drawn by the next segment.
                    let (dx, dy) = ((x1 - x0).abs(), -(y1 - y0).abs());
                    let (sx, sy) = (if x0 < x1 { 1 } else { -1 }, if y0 < y1 { 1 } else { -1 });
                    let (mut x, mut y, mut err) = (x0, y0, dx + dy);
                    while (x, y) != (x1, y1) {
                        self.blend(x, y, color, alpha);
                        let e2 = 2 * err;
                        if e2 >= dy {
                            err += dy;
                            x += sx;
                        }
                        if e2 <= dx {
                            err += dx;
                            y += sy;
                        }
                    }
                }
                if let Some(&(x, y)) = points.last() {
                    self.blend(x.round() as i64, y.round() as i64, color, alpha);
                }
            }
        }
    }
}

/// Presents a [`PixelCanvas`] using upper-half-block cells.
pub struct CanvasView<'a> {
    canvas: &'a PixelCanvas,
}

impl<'a> CanvasView<'a> {
    pub fn new(canvas: &'a PixelCanvas) -> Self {
        Self { canvas }
    }
}

impl Widget for CanvasView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let background = self.canvas.background();
        for row in 0..area.height {
            for col in 0..area.width {
                let x = col as usize;
                let top = self.canvas.pixel(x, row as usize * 2).unwrap_or(background);
                let bottom = self
                    .canvas
                    .pixel(x, row as usize * 2 + 1)
                    .unwrap_or(background);
                if let Some(cell) = buf.cell_mut((area.x + col, area.y + row)) {
                    cell.set_symbol("▀").set_fg(top.into()).set_bg(bottom.into());
                }
            }
        }
    }
}
