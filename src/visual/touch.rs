use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailPoint {
    /// Horizontal position in texture UV space, 0 at the left edge.
    pub x: f32,
    /// Vertical position in texture UV space, 0 at the bottom edge.
    pub y: f32,
    pub age: u32,
    pub force: f32,
}

/// Fading trail of pointer positions drawn as soft white blobs on black.
pub struct TouchTexture {
    size: usize,
    max_age: u32,
    radius: f32,
    trail: Vec<TrailPoint>,
    luminance: Vec<f32>,
}

fn ease_out_sine(t: f32) -> f32 {
    (t * PI / 2.0).sin()
}

impl TouchTexture {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            max_age: 120,
            radius: 0.15,
            trail: Vec::new(),
            luminance: vec![0.0; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn trail(&self) -> &[TrailPoint] {
        &self.trail
    }

    /// Records a pointer position. Faster movement leaves a stronger mark.
    pub fn add_touch(&mut self, x: f32, y: f32) {
        let force = match self.trail.last() {
            Some(last) => {
                let dx = last.x - x;
                let dy = last.y - y;
                ((dx * dx + dy * dy) * 10000.0).min(1.0)
            }
            None => 0.0,
        };
        self.trail.push(TrailPoint { x, y, age: 0, force });
    }

    /// Ages the trail by one frame and redraws it.
    pub fn update(&mut self) {
        self.luminance.fill(0.0);

        let max_age = self.max_age;
        for point in self.trail.iter_mut() {
            point.age += 1;
        }
        self.trail.retain(|point| point.age <= max_age);

        for i in 0..self.trail.len() {
            let point = self.trail[i];
            self.draw_touch(&point);
        }
    }

    fn intensity(&self, point: &TrailPoint) -> f32 {
        let rise = self.max_age as f32 * 0.3;
        let fall = self.max_age as f32 * 0.7;
        let age = point.age as f32;
        let envelope = if age < rise {
            ease_out_sine(age / rise)
        } else {
            ease_out_sine(1.0 - (age - rise) / fall)
        };
        envelope * point.force
    }

    fn draw_touch(&mut self, point: &TrailPoint) {
        let radius = self.size as f32 * self.radius * self.intensity(point);
        if radius <= 0.0 {
            return;
        }
        let inner = radius * 0.25;
        let cx = point.x * self.size as f32;
        let cy = (1.0 - point.y) * self.size as f32;

        let max_index = self.size.saturating_sub(1) as f32;
        let x0 = (cx - radius).floor().clamp(0.0, max_index) as usize;
        let x1 = (cx + radius).ceil().clamp(0.0, max_index) as usize;
        let y0 = (cy - radius).floor().clamp(0.0, max_index) as usize;
        let y1 = (cy + radius).ceil().clamp(0.0, max_index) as usize;

        for py in y0..=y1 {
            for px in x0..=x1 {
                let dx = px as f32 + 0.5 - cx;
                let dy = py as f32 + 0.5 - cy;
                let distance = (dx * dx + dy * dy).sqrt();
                if distance > radius {
                    continue;
                }
                let t = if distance <= inner {
                    0.0
                } else {
                    (distance - inner) / (radius - inner)
                };
                // White fading to transparent, blended over what is already there.
                let alpha = 0.2 * (1.0 - t);
                let dst = &mut self.luminance[py * self.size + px];
                *dst = alpha + *dst * (1.0 - alpha);
            }
        }
    }

    pub fn luminance(&self, x: usize, y: usize) -> f32 {
        self.luminance[y * self.size + x]
    }

    /// Opaque RGBA8 copy of the current frame.
    pub fn to_rgba(&self) -> Vec<u8> {
        self.luminance
            .iter()
            .flat_map(|&l| {
                let g = (l.clamp(0.0, 1.0) * 255.0).round() as u8;
                [g, g, g, 255]
            })
            .collect()
    }
}
