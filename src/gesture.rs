//! Per-hand gesture classification from landmark geometry.
//!
//! The classifier is stateless: every call looks only at the hand it is given.
//! The thumbs-up test is an approximation in image space, not a 3-D pose. It
//! assumes an upright hand and a mirrored x axis, so a rotated or back-facing
//! hand can be misread as an open hand.

use crate::types::{FingertipCoord, GestureKind, GestureResult, Hand, joint};

/// Thumb–index distance (normalized units) under which a hand counts as pinching.
pub const PINCH_THRESHOLD: f32 = 0.05;

pub fn classify(hand: &Hand) -> GestureResult {
    let (Some(thumb_tip), Some(index_tip)) = (hand.get(joint::THUMB_TIP), hand.get(joint::INDEX_TIP))
    else {
        return GestureResult::none();
    };

    let pinch_distance = thumb_tip.distance(&index_tip);

    let kind = if pinch_distance < PINCH_THRESHOLD {
        GestureKind::Pinch
    } else if is_thumbs_up(hand) {
        GestureKind::ThumbsUp
    } else {
        GestureKind::OpenHand
    };

    GestureResult {
        kind,
        pinch_distance,
        fingertips: fingertip_coords(hand),
    }
}

/// Classifies each hand on its own; the result at slot `i` belongs to `hands[i]`.
pub fn classify_hands(hands: &[Hand]) -> Vec<GestureResult> {
    hands.iter().map(classify).collect()
}

fn is_thumbs_up(hand: &Hand) -> bool {
    match (
        hand.get(joint::THUMB_TIP),
        hand.get(joint::THUMB_IP),
        hand.get(joint::INDEX_TIP),
        hand.get(joint::INDEX_PIP),
    ) {
        (Some(thumb_tip), Some(thumb_ip), Some(index_tip), Some(index_pip)) => {
            index_tip.y < index_pip.y && thumb_tip.x < thumb_ip.x
        }
        _ => false,
    }
}

/// Visible fingertips, each tagged with its finger so a gap never shifts the
/// later ones.
fn fingertip_coords(hand: &Hand) -> Vec<FingertipCoord> {
    (1u8..)
        .zip(joint::FINGERTIPS)
        .filter_map(|(finger, idx)| {
            hand.get(idx).map(|lm| FingertipCoord {
                finger,
                x: round2(1.0 - lm.x),
                y: round2(lm.y),
            })
        })
        .collect()
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
