use super::model::{NoteEvent, TimeSignature};
use crate::config::DEFAULT_PPQ;

/// Splits a time-ordered note sequence into fixed-width measures.
#[derive(Debug, Clone, Copy)]
pub struct MeasureGrouper {
    /// Added to a note's start tick before dividing, so notes recorded a tick
    /// early still land in the measure they belong to.
    epsilon_ticks: u64,
}

impl MeasureGrouper {
    pub fn new(epsilon_ticks: u32) -> Self {
        Self {
            epsilon_ticks: epsilon_ticks as u64,
        }
    }

    /// Replaces a denominator that is not a power of two with a quarter-note
    /// unit.
    pub fn normalize(time_signature: TimeSignature) -> TimeSignature {
        if time_signature.unit.is_power_of_two() {
            time_signature
        } else {
            tracing::warn!(
                "Unsupported time signature {}, using a quarter-note unit",
                time_signature
            );
            TimeSignature {
                beats: time_signature.beats,
                unit: 4,
            }
        }
    }

    pub fn ticks_per_measure(time_signature: TimeSignature, ppq: u16) -> f64 {
        let ts = Self::normalize(time_signature);
        let ticks_per_beat = ppq as f64 * (4.0 / ts.unit as f64);
        ticks_per_beat * ts.beats as f64
    }

    /// Returns, per measure, the indices of the notes it holds. There is always
    /// at least one (possibly empty) measure.
    pub fn group(
        &self,
        notes: &[NoteEvent],
        time_signature: TimeSignature,
        ppq: u16,
    ) -> Vec<Vec<usize>> {
        let ppq = if ppq == 0 {
            tracing::warn!("ppq is 0, grouping with {}", DEFAULT_PPQ);
            DEFAULT_PPQ
        } else {
            ppq
        };

        let ticks_per_measure = Self::ticks_per_measure(time_signature, ppq);
        if ticks_per_measure <= 0.0 {
            tracing::warn!("Measure length is 0 ticks, placing every note in one measure");
            return vec![(0..notes.len()).collect()];
        }

        let mut measures = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        let mut current_idx: u64 = 0;

        for (i, note) in notes.iter().enumerate() {
            let note_idx =
                ((note.start_tick + self.epsilon_ticks) as f64 / ticks_per_measure).floor() as u64;
            while current_idx < note_idx {
                measures.push(std::mem::take(&mut current));
                current_idx += 1;
            }
            current.push(i);
        }
        measures.push(current);

        measures
    }
}

impl Default for MeasureGrouper {
    fn default() -> Self {
        Self::new(1)
    }
}
