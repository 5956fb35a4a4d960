/// Static radial glow: white at the centre fading to black at the inscribed
/// circle, with a small black hole punched in the middle.
pub struct GradientTexture {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl GradientTexture {
    pub fn new(width: usize, height: usize) -> Self {
        let cx = width as f32 / 2.0;
        let cy = height as f32 / 2.0;
        let radius = width.min(height) as f32 / 2.0;
        let hole = radius / 8.0;

        let mut pixels = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            for x in 0..width {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                let distance = (dx * dx + dy * dy).sqrt();
                let g = if distance <= hole || radius <= 0.0 {
                    0
                } else {
                    let t = (distance / radius).min(1.0);
                    ((1.0 - t) * 255.0).round() as u8
                };
                pixels.extend_from_slice(&[g, g, g, 255]);
            }
        }

        Self { width, height, pixels }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// RGBA8, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let offset = (y * self.width + x) * 4;
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
            self.pixels[offset + 3],
        ]
    }
}

impl Default for GradientTexture {
    fn default() -> Self {
        Self::new(512, 512)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centre_is_punched_out() {
        let texture = GradientTexture::new(64, 64);
        assert_eq!(texture.pixel(32, 32), [0, 0, 0, 255]);
    }

    #[test]
    fn brightest_just_outside_the_hole() {
        let texture = GradientTexture::new(64, 64);
        // Hole radius is 4 pixels; the pixel centred 5.5 px out is ~83% white.
        let ring = texture.pixel(37, 32);
        assert!(ring[0] > 200, "ring {:?}", ring);
        assert!(texture.pixel(45, 32)[0] < ring[0]);
    }

    #[test]
    fn outside_the_circle_is_black() {
        let texture = GradientTexture::new(64, 32);
        assert_eq!(texture.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(texture.pixel(63, 16), [0, 0, 0, 255]);
        assert_eq!(texture.pixels().len(), 64 * 32 * 4);
    }
}
