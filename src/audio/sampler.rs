use super::graph::BandAnalysers;

/// Byte magnitude spectra of the three bands, captured at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencySample {
    pub bass: Vec<u8>,
    pub mid: Vec<u8>,
    pub treble: Vec<u8>,
}

impl FrequencySample {
    pub fn capture(analysers: &BandAnalysers) -> Self {
        let mut sample = Self::default();
        sample.refresh(analysers);
        sample
    }

    /// Overwrites the buffers in place, resizing each to its analyser's bin count.
    pub fn refresh(&mut self, analysers: &BandAnalysers) {
        for (buffer, analyser) in [
            (&mut self.bass, &analysers.bass),
            (&mut self.mid, &analysers.mid),
            (&mut self.treble, &analysers.treble),
        ] {
            buffer.resize(analyser.frequency_bin_count(), 0);
            analyser.get_byte_frequency_data(buffer);
        }
    }
}
