use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::common::BitMatrix;

// Options
//------------------------------------------------------------------------------

/// How a module matrix becomes pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Pixels per module side.
    pub module_size: u32,
    /// Light modules around the symbol.
    pub quiet_zone: u32,
    pub dark: [u8; 3],
    pub light: [u8; 3],
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { module_size: 1, quiet_zone: 0, dark: [0; 3], light: [255; 3] }
    }
}

impl RenderOptions {
    pub fn new(module_size: u32) -> Self {
        Self { module_size: module_size.max(1), ..Default::default() }
    }

    pub fn quiet_zone(mut self, modules: u32) -> Self {
        self.quiet_zone = modules;
        self
    }

    pub fn colors(mut self, dark: [u8; 3], light: [u8; 3]) -> Self {
        self.dark = dark;
        self.light = light;
        self
    }

    fn canvas_size(&self, matrix: &BitMatrix) -> (u32, u32) {
        let pad = 2 * self.quiet_zone;
        let w = (matrix.width() as u32 + pad) * self.module_size;
        let h = (matrix.height() as u32 + pad) * self.module_size;
        (w, h)
    }

    // Module at pixel (x, y), None inside the quiet zone
    fn module_at(&self, matrix: &BitMatrix, x: u32, y: u32) -> Option<bool> {
        let mx = (x / self.module_size).checked_sub(self.quiet_zone)? as usize;
        let my = (y / self.module_size).checked_sub(self.quiet_zone)? as usize;
        (mx < matrix.width() && my < matrix.height()).then(|| matrix.get(mx, my))
    }
}

fn luma([r, g, b]: [u8; 3]) -> u8 {
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
}

// Render
//------------------------------------------------------------------------------

/// Gray image of `matrix`, set bits drawn dark.
pub fn to_image(matrix: &BitMatrix, options: &RenderOptions) -> GrayImage {
    let (w, h) = options.canvas_size(matrix);
    let (dark, light) = (Luma([luma(options.dark)]), Luma([luma(options.light)]));
    GrayImage::from_fn(w, h, |x, y| match options.module_at(matrix, x, y) {
        Some(true) => dark,
        _ => light,
    })
}

pub fn to_rgb_image(matrix: &BitMatrix, options: &RenderOptions) -> RgbImage {
    let (w, h) = options.canvas_size(matrix);
    RgbImage::from_fn(w, h, |x, y| match options.module_at(matrix, x, y) {
        Some(true) => Rgb(options.dark),
        _ => Rgb(options.light),
    })
}

/// Text rendering for terminals, light modules as full blocks.
pub fn to_str(matrix: &BitMatrix, options: &RenderOptions) -> String {
    let (w, h) = options.canvas_size(matrix);
    let mut canvas = String::with_capacity(((w + 1) * h) as usize * 3);
    for y in 0..h {
        for x in 0..w {
            canvas.push(if options.module_at(matrix, x, y) == Some(true) { ' ' } else { '█' });
        }
        canvas.push('\n');
    }
    canvas
}

impl BitMatrix {
    /// Gray image with `scale` pixels per module and no quiet zone.
    pub fn to_image(&self, scale: u32) -> GrayImage {
        to_image(self, &RenderOptions::new(scale))
    }
}
