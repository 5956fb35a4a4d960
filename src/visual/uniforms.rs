use bytemuck::{Pod, Zeroable};

use crate::audio::ModulationTriple;

/// Uniform block handed to particle shaders each frame.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct BandUniforms {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub time: f32,
}

impl BandUniforms {
    pub fn new(triple: ModulationTriple, elapsed_seconds: f32) -> Self {
        Self {
            bass: triple.bass,
            mid: triple.mid,
            treble: triple.treble,
            time: elapsed_seconds,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_four_packed_floats() {
        assert_eq!(std::mem::size_of::<BandUniforms>(), 16);
        let uniforms = BandUniforms::new(ModulationTriple { bass: 56.0, mid: 1.0, treble: 14.0 }, 2.5);
        let floats: &[f32] = bytemuck::cast_slice(uniforms.as_bytes());
        assert_eq!(floats, &[56.0, 1.0, 14.0, 2.5]);
    }
}
