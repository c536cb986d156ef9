//! Horizontal accuracy rescaling to 68 % confidence.

/// Confidence assumed for a circular uncertainty.
pub const CIRCULAR_CONFIDENCE: u8 = 63;

/// Target confidence of every reported accuracy.
pub const TARGET_CONFIDENCE: u8 = 68;

/// Upper confidence bound of each bucket and the multiplier that lifts it to 68 %.
const SCALERS: [(u8, f32); 3] = [(39, 1.517), (50, 1.287), (63, 1.072)];

/// Scale `accuracy` declared at `confidence` percent to 68 %. Values already at
/// or above 68 % pass through. A circular uncertainty is always taken as 63 %.
pub fn scale_to_68(accuracy: f32, confidence: u8, circular: bool) -> f32 {
    if confidence >= TARGET_CONFIDENCE {
        return accuracy;
    }
    let effective = if circular { CIRCULAR_CONFIDENCE } else { confidence };
    SCALERS
        .iter()
        .find(|(bound, _)| effective <= *bound)
        .map_or(accuracy, |(_, factor)| accuracy * factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn lowest_bucket() {
        assert!(close(scale_to_68(10.0, 39, false), 15.17));
        assert!(close(scale_to_68(10.0, 1, false), 15.17));
    }

    #[test]
    fn middle_buckets() {
        assert!(close(scale_to_68(10.0, 40, false), 12.87));
        assert!(close(scale_to_68(10.0, 63, false), 10.72));
    }

    #[test]
    fn at_or_above_target_is_unchanged() {
        assert_eq!(scale_to_68(10.0, 68, false), 10.0);
        assert_eq!(scale_to_68(10.0, 95, true), 10.0);
    }

    #[test]
    fn circular_is_read_as_63() {
        assert!(close(scale_to_68(10.0, 39, true), 10.72));
    }

    #[test]
    fn gap_between_63_and_68_is_unchanged() {
        assert_eq!(scale_to_68(10.0, 65, false), 10.0);
    }
}
