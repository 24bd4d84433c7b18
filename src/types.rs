use std::fmt;

/// Landmark indices of the 21-point hand skeleton.
pub mod joint {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_MCP: usize = 5;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_DIP: usize = 7;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_DIP: usize = 11;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_MCP: usize = 13;
    pub const RING_PIP: usize = 14;
    pub const RING_DIP: usize = 15;
    pub const RING_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;

    pub const COUNT: usize = 21;

    /// Tips reported in the fingertip readout, thumb first.
    pub const FINGERTIPS: [usize; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(rgba: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            rgba,
            width,
            height,
        }
    }

    /// Solid-colour frame, mostly useful for tests and placeholders.
    pub fn filled(width: u32, height: u32, color: [u8; 4]) -> Self {
        let rgba = color
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(rgba, width, height)
    }

    pub fn is_well_formed(&self) -> bool {
        self.rgba.len() == (self.width as usize) * (self.height as usize) * 4
    }
}

/// A normalized hand joint position. `x` and `y` are in `[0, 1]` image space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: Option<f32>,
}

impl Landmark {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: None }
    }

    pub const fn with_depth(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z: Some(z) }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn distance(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
    Unknown,
}

impl Handedness {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.5 {
            Handedness::Right
        } else if score > 0.0 {
            Handedness::Left
        } else {
            Handedness::Unknown
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Handedness::Left => "Left",
            Handedness::Right => "Right",
            Handedness::Unknown => "Unknown",
        }
    }
}

/// One detected hand: landmarks in fixed skeleton order.
///
/// Positions are never reordered or filtered. A landmark that is absent (short
/// list) or non-finite is reported as missing by [`Hand::get`].
#[derive(Clone, Debug, PartialEq)]
pub struct Hand {
    landmarks: Vec<Landmark>,
    pub confidence: f32,
    pub handedness: Handedness,
}

impl Hand {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self {
            landmarks,
            confidence: 1.0,
            handedness: Handedness::Unknown,
        }
    }

    pub fn with_meta(mut self, confidence: f32, handedness: Handedness) -> Self {
        self.confidence = confidence;
        self.handedness = handedness;
        self
    }

    pub fn get(&self, index: usize) -> Option<Landmark> {
        self.landmarks.get(index).copied().filter(Landmark::is_finite)
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    /// Present landmarks with their skeleton index.
    pub fn present(&self) -> impl Iterator<Item = (usize, Landmark)> + '_ {
        self.landmarks
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, lm)| lm.is_finite())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GestureKind {
    #[default]
    None,
    Pinch,
    ThumbsUp,
    OpenHand,
}

impl GestureKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            GestureKind::None => "None",
            GestureKind::Pinch => "Pinch",
            GestureKind::ThumbsUp => "Thumbs Up",
            GestureKind::OpenHand => "Open Hand",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            GestureKind::None => "⋯ ",
            GestureKind::Pinch => "🤏 ",
            GestureKind::ThumbsUp => "👍 ",
            GestureKind::OpenHand => "🖐 ",
        }
    }
}

impl fmt::Display for GestureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Mirrored fingertip position, rounded to two decimals.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FingertipCoord {
    /// 1 for the thumb through 5 for the pinky.
    pub finger: u8,
    pub x: f32,
    pub y: f32,
}

impl fmt::Display for FingertipCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x: {:.2}, y: {:.2})", self.x, self.y)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GestureResult {
    pub kind: GestureKind,
    pub pinch_distance: f32,
    pub fingertips: Vec<FingertipCoord>,
}

impl GestureResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn label(&self) -> &'static str {
        self.kind.display_name()
    }

    pub fn display_text(&self) -> String {
        format!(
            "{}{} ({:.3})",
            self.kind.emoji(),
            self.kind.display_name(),
            self.pinch_distance
        )
    }

    pub fn distance_text(&self) -> String {
        format!("{:.3}", self.pinch_distance)
    }

    /// One "Finger n: (x, y)" line per visible fingertip, thumb first.
    pub fn fingertip_lines(&self) -> Vec<String> {
        self.fingertips
            .iter()
            .map(|coord| format!("Finger {}: {coord}", coord.finger))
            .collect()
    }
}
