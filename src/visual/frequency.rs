/// Spectrum strip: one gray column per frequency bin, redrawn from scratch each update.
pub struct FrequencyTexture {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl FrequencyTexture {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height * 4],
        }
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

    /// Byte values are read as percentages of full brightness, saturating at 100.
    fn gray(value: u8) -> u8 {
        let percent = value.min(100) as u32;
        ((percent * 255 + 50) / 100) as u8
    }

    pub fn update(&mut self, frequency_data: &[u8]) {
        self.pixels.fill(0);
        let columns = frequency_data.len().min(self.width);
        for row in 0..self.height {
            let row_start = row * self.width * 4;
            for (x, &value) in frequency_data[..columns].iter().enumerate() {
                let g = Self::gray(value);
                let offset = row_start + x * 4;
                self.pixels[offset..offset + 4].copy_from_slice(&[g, g, g, 255]);
            }
        }
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

impl Default for FrequencyTexture {
    fn default() -> Self {
        Self::new(1024, 200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_follow_bin_values() {
        let mut texture = FrequencyTexture::new(4, 2);
        texture.update(&[0, 50, 255]);
        assert_eq!(texture.pixel(0, 1), [0, 0, 0, 255]);
        assert_eq!(texture.pixel(1, 0), [128, 128, 128, 255]);
        assert_eq!(texture.pixel(2, 1), [255, 255, 255, 255]);
        // Columns past the data stay transparent.
        assert_eq!(texture.pixel(3, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn update_clears_previous_frame() {
        let mut texture = FrequencyTexture::new(3, 1);
        texture.update(&[100, 100, 100]);
        texture.update(&[100]);
        assert_eq!(texture.pixel(1, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn extra_bins_are_ignored() {
        let mut texture = FrequencyTexture::new(2, 1);
        texture.update(&[10, 20, 30, 40]);
        assert_eq!(texture.pixels().len(), 8);
    }
}
