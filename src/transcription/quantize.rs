use super::model::{BaseDuration, NotatedDuration};
use crate::config::QuantizeSettings;

/// Canonical values as multiples of a quarter note, longest first.
const LADDER: [(f64, BaseDuration, u8); 10] = [
    (4.0, BaseDuration::Whole, 0),
    (3.0, BaseDuration::Half, 1),
    (2.0, BaseDuration::Half, 0),
    (1.5, BaseDuration::Quarter, 1),
    (1.0, BaseDuration::Quarter, 0),
    (0.75, BaseDuration::Eighth, 1),
    (0.5, BaseDuration::Eighth, 0),
    (0.375, BaseDuration::Sixteenth, 1),
    (0.25, BaseDuration::Sixteenth, 0),
    (0.125, BaseDuration::ThirtySecond, 0),
];

const FLOOR: NotatedDuration = NotatedDuration {
    base: BaseDuration::Sixteenth,
    dots: 0,
};

#[derive(Debug, Clone, Copy)]
pub struct Quantizer {
    tolerance: f64,
}

impl Quantizer {
    pub fn new(settings: &QuantizeSettings) -> Self {
        Self {
            tolerance: settings.tolerance,
        }
    }

    /// Classifies a tick duration. Lossy: anything shorter than the
    /// thirty-second threshold comes back as a sixteenth.
    pub fn quantize(&self, duration_ticks: u64, ppq: u16) -> NotatedDuration {
        if ppq == 0 {
            return FLOOR;
        }
        let q = ppq as f64;
        let ticks = duration_ticks as f64;

        LADDER
            .iter()
            .find(|(ratio, _, _)| ticks >= q * ratio * self.tolerance)
            .map(|&(_, base, dots)| NotatedDuration { base, dots })
            .unwrap_or(FLOOR)
    }
}

impl Default for Quantizer {
    fn default() -> Self {
        Self::new(&QuantizeSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(ticks: u64) -> (&'static str, u8) {
        let d = Quantizer::default().quantize(ticks, 480);
        (d.base.symbol(), d.dots)
    }

    #[test]
    fn reference_values_at_480_ppq() {
        assert_eq!(q(1920), ("w", 0));
        assert_eq!(q(720), ("h", 1));
        assert_eq!(q(60), ("32", 0));
    }

    #[test]
    fn exact_values_map_to_themselves() {
        assert_eq!(q(960), ("h", 0));
        assert_eq!(q(480), ("q", 0));
        assert_eq!(q(360), ("8", 1));
        assert_eq!(q(240), ("8", 0));
        assert_eq!(q(180), ("16", 1));
        assert_eq!(q(120), ("16", 0));
    }

    #[test]
    fn tolerance_absorbs_short_performances() {
        // 0.9 * 480 = 432
        assert_eq!(q(433), ("q", 0));
        assert_eq!(q(431), ("8", 1));
        // 0.9 * 1920 = 1728
        assert_eq!(q(1729), ("w", 0));
        assert_eq!(q(1727), ("h", 1));
    }

    #[test]
    fn very_short_notes_floor_to_sixteenth() {
        assert_eq!(q(1), ("16", 0));
        assert_eq!(q(53), ("16", 0));
        assert_eq!(q(55), ("32", 0));
    }

    #[test]
    fn longer_than_whole_is_whole() {
        assert_eq!(q(10_000), ("w", 0));
    }

    #[test]
    fn zero_ppq_floors() {
        let d = Quantizer::default().quantize(480, 0);
        assert_eq!(d.base, BaseDuration::Sixteenth);
        assert_eq!(d.dots, 0);
    }

    #[test]
    fn custom_tolerance() {
        let strict = Quantizer::new(&QuantizeSettings { tolerance: 1.0 });
        assert_eq!(strict.quantize(479, 480).base, BaseDuration::Eighth);
        assert_eq!(strict.quantize(479, 480).dots, 1);
        assert_eq!(strict.quantize(480, 480).base, BaseDuration::Quarter);
    }
}
