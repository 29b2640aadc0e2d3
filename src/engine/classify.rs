use crate::config::Thresholds;
use crate::models::MasteryStatus;

pub fn classify(percent: f64, thresholds: &Thresholds) -> MasteryStatus {
    if percent < thresholds.weak {
        MasteryStatus::Weak
    } else if percent < thresholds.average {
        MasteryStatus::Average
    } else if percent < thresholds.mastery {
        MasteryStatus::Strong
    } else {
        MasteryStatus::Excellent
    }
}

/// A quiz at or above mastery extends the streak.
pub fn is_mastery_attempt(percent: f64, thresholds: &Thresholds) -> bool {
    percent >= thresholds.mastery
}

/// A quiz below the average band wipes the streak.
pub fn breaks_streak(percent: f64, thresholds: &Thresholds) -> bool {
    percent < thresholds.weak
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Thresholds {
        Thresholds::default()
    }

    #[test]
    fn default_bands() {
        let t = defaults();
        assert_eq!(classify(0.0, &t), MasteryStatus::Weak);
        assert_eq!(classify(49.9, &t), MasteryStatus::Weak);
        assert_eq!(classify(50.0, &t), MasteryStatus::Average);
        assert_eq!(classify(64.9, &t), MasteryStatus::Average);
        assert_eq!(classify(65.0, &t), MasteryStatus::Strong);
        assert_eq!(classify(79.9, &t), MasteryStatus::Strong);
        assert_eq!(classify(80.0, &t), MasteryStatus::Excellent);
        assert_eq!(classify(100.0, &t), MasteryStatus::Excellent);
    }

    #[test]
    fn classification_is_order_independent() {
        let t = defaults();
        let inputs = [72.0, 12.0, 80.0, 55.5, 72.0, 12.0];
        let forward: Vec<_> = inputs.iter().map(|p| classify(*p, &t)).collect();
        let backward: Vec<_> = inputs.iter().rev().map(|p| classify(*p, &t)).collect();
        let reversed: Vec<_> = backward.into_iter().rev().collect();
        assert_eq!(forward, reversed);
    }

    #[test]
    fn monotonic_in_percent() {
        let t = defaults();
        let mut last = MasteryStatus::Weak;
        for p in 0..=100 {
            let status = classify(p as f64, &t);
            assert!(status >= last, "status dropped at {}%", p);
            last = status;
        }
    }

    #[test]
    fn custom_thresholds_are_honoured() {
        let t = Thresholds {
            weak: 40.0,
            average: 60.0,
            mastery: 90.0,
        };
        assert_eq!(classify(45.0, &t), MasteryStatus::Average);
        assert_eq!(classify(85.0, &t), MasteryStatus::Strong);
        assert_eq!(classify(90.0, &t), MasteryStatus::Excellent);
    }

    #[test]
    fn streak_predicates() {
        let t = defaults();
        assert!(is_mastery_attempt(80.0, &t));
        assert!(!is_mastery_attempt(79.0, &t));
        assert!(breaks_streak(49.0, &t));
        assert!(!breaks_streak(50.0, &t));
        assert!(!breaks_streak(70.0, &t));
    }
}
