//! Numeric script fields.
//!
//! A field is validated when the script loads and resolved when the
//! instruction runs, since beat-based values depend on the tempo in force at
//! that moment and random values are drawn fresh every time.

use std::f32::consts::PI;

use rand::Rng;

/// A parsed numeric field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    Literal(f32),
    /// `R<lo>-<hi>`: uniform in `[lo, hi)`.
    Random { lo: f32, hi: f32 },
    /// `b<n>`: `n` beats.
    Beats(f32),
    /// `p<n>`: `n × π`.
    Pi(f32),
    /// `c<n>`: angular speed completing a full turn in `n` beats.
    Turn(f32),
}

impl Number {
    pub fn parse(text: &str) -> Option<Self> {
        let mut chars = text.chars();
        let number = match chars.next()? {
            'R' => {
                let rest = chars.as_str();
                // Skip the first character so a negative lower bound keeps its sign.
                let split = rest
                    .char_indices()
                    .skip(1)
                    .find(|&(_, c)| c == '-')
                    .map(|(i, _)| i)?;
                let lo = rest[..split].parse().ok()?;
                let hi = rest[split + 1..].parse().ok()?;
                Number::Random { lo, hi }
            }
            'b' => Number::Beats(chars.as_str().parse().ok()?),
            'p' => Number::Pi(chars.as_str().parse().ok()?),
            'c' => Number::Turn(chars.as_str().parse().ok()?),
            _ => Number::Literal(text.parse().ok()?),
        };
        let finite = match number {
            Number::Literal(v) | Number::Beats(v) | Number::Pi(v) | Number::Turn(v) => v.is_finite(),
            Number::Random { lo, hi } => lo.is_finite() && hi.is_finite(),
        };
        finite.then_some(number)
    }

    /// Concrete value under `tempo` beats per minute.
    pub fn resolve(&self, tempo: f32, rng: &mut impl Rng) -> f32 {
        let seconds_per_beat = if tempo > 0.0 { 60.0 / tempo } else { 0.0 };
        match *self {
            Number::Literal(v) => v,
            Number::Random { lo, hi } => {
                if hi > lo {
                    rng.gen_range(lo..hi)
                } else {
                    lo
                }
            }
            Number::Beats(n) => n * seconds_per_beat,
            Number::Pi(n) => n * PI,
            Number::Turn(n) => {
                let seconds = n * seconds_per_beat;
                if seconds == 0.0 {
                    0.0
                } else {
                    2.0 * PI / seconds
                }
            }
        }
    }
}

impl From<f32> for Number {
    fn from(v: f32) -> Self {
        Number::Literal(v)
    }
}
