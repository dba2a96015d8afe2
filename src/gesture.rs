use crate::{config::GestureConfig, types::Hand};

/// How the seal was formed on the current frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Seal {
    /// Index and middle tip of one hand touching.
    SameHand,
    /// Index tip of one hand touching the middle tip of the other.
    TwoHand,
}

/// Stateless seal check; every frame is judged on its own landmarks.
#[derive(Clone, Copy, Debug)]
pub struct SealDetector {
    touch_threshold: f32,
}

impl SealDetector {
    pub fn new(touch_threshold: f32) -> Self {
        Self { touch_threshold }
    }

    pub fn from_config(config: &GestureConfig) -> Self {
        Self::new(config.touch_threshold)
    }

    pub fn classify(&self, hands: &[Hand]) -> Option<Seal> {
        let same_hand = hands.iter().any(|hand| {
            match (hand.index_tip(), hand.middle_tip()) {
                (Some(index), Some(middle)) => self.touching(index.distance(&middle)),
                _ => false,
            }
        });
        if same_hand {
            return Some(Seal::SameHand);
        }

        if let [a, b] = hands {
            let crossed = |from: &Hand, to: &Hand| match (from.index_tip(), to.middle_tip()) {
                (Some(index), Some(middle)) => self.touching(index.distance(&middle)),
                _ => false,
            };
            if crossed(a, b) || crossed(b, a) {
                return Some(Seal::TwoHand);
            }
        }

        None
    }

    pub fn is_active(&self, hands: &[Hand]) -> bool {
        self.classify(hands).is_some()
    }

    fn touching(&self, distance: f32) -> bool {
        distance < self.touch_threshold
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{Landmark, NUM_HAND_LANDMARKS};

    /// Hand with the index tip at `index` and middle tip at `middle`.
    pub(crate) fn hand_with_tips(index: (f32, f32), middle: (f32, f32)) -> Hand {
        let mut points = vec![Landmark::new(0.5, 0.9); NUM_HAND_LANDMARKS];
        points[8] = Landmark::new(index.0, index.1);
        points[12] = Landmark::new(middle.0, middle.1);
        Hand::new(points)
    }

    #[test]
    fn same_hand_touch_below_threshold_activates() {
        let detector = SealDetector::new(0.05);
        let hand = hand_with_tips((0.40, 0.40), (0.42, 0.40));
        assert_eq!(detector.classify(&[hand]), Some(Seal::SameHand));
    }

    #[test]
    fn distance_equal_to_threshold_is_not_a_touch() {
        let detector = SealDetector::new(0.25);
        // 0.25 is exact in binary, so the distance lands on the threshold.
        let hand = hand_with_tips((0.25, 0.5), (0.5, 0.5));
        assert!(!detector.is_active(&[hand]));
    }

    #[test]
    fn zero_hands_is_inactive() {
        assert!(!SealDetector::new(0.05).is_active(&[]));
    }

    #[test]
    fn hands_missing_tips_are_ignored() {
        let detector = SealDetector::new(0.05);
        let partial = Hand::new(vec![Landmark::new(0.5, 0.5); 9]);
        assert!(!detector.is_active(&[partial]));
    }

    #[test]
    fn two_hand_clasp_activates_through_cross_check() {
        let detector = SealDetector::new(0.05);
        let a = hand_with_tips((0.30, 0.50), (0.30, 0.60));
        let b = hand_with_tips((0.70, 0.50), (0.33, 0.50));
        assert_eq!(detector.classify(&[a.clone(), b.clone()]), Some(Seal::TwoHand));
        assert_eq!(detector.classify(&[b, a]), Some(Seal::TwoHand));
    }

    #[test]
    fn cross_check_needs_exactly_two_hands() {
        let detector = SealDetector::new(0.05);
        let a = hand_with_tips((0.30, 0.50), (0.30, 0.60));
        let b = hand_with_tips((0.70, 0.50), (0.33, 0.50));
        let c = hand_with_tips((0.90, 0.10), (0.90, 0.30));
        assert!(!detector.is_active(&[a, b, c]));
    }

    #[test]
    fn apart_hands_stay_inactive() {
        let detector = SealDetector::new(0.05);
        let a = hand_with_tips((0.20, 0.50), (0.20, 0.60));
        let b = hand_with_tips((0.80, 0.50), (0.80, 0.60));
        assert!(!detector.is_active(&[a, b]));
    }
}
