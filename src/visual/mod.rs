pub mod frequency;
pub mod gradient;
pub mod touch;
pub mod uniforms;

pub use frequency::FrequencyTexture;
pub use gradient::GradientTexture;
pub use touch::{TouchTexture, TrailPoint};
pub use uniforms::BandUniforms;
