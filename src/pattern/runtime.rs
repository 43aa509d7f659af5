//! Decoding a packed pattern into concrete shooting behaviour.
//!
//! Timing digits are musical: a delay digit doubles or halves the cadence
//! relative to one beat of the current tempo.  Geometry digits interpolate
//! linearly between fixed bounds.

use glam::Vec2;
use rand::Rng;

use super::codec::{Field, PackedPattern, PatternFields};
use crate::scheduler::{Firing, PeriodicAction};

// ── Decoder bounds ────────────────────────────────────────────────────────────

/// Shortest gap between the end of one burst and the next.
const MIN_DELAY: f32 = 0.01;
const MIN_ANGLE_SPEED: f32 = 0.0;
const MAX_ANGLE_SPEED: f32 = 360.0;
const MIN_SPEED: f32 = 10.0;
const MAX_SPEED: f32 = 200.0;
/// Speed used for the top speed digit instead of the interpolated bound.
const TOP_SPEED: f32 = 400.0;
const MIN_START_HOMING_DISTANCE: f32 = 0.0;
const MAX_START_HOMING_DISTANCE: f32 = 40.0;
/// At least one frame of homing.
const MIN_HOMING_TIME: f32 = 0.04;
const MAX_HOMING_TIME: f32 = 10.0;
const MIN_TIME_TO_LIVE_FACTOR: f32 = 0.1;
const MAX_TIME_TO_LIVE_FACTOR: f32 = 3.0;

const INITIAL_DELAY_BIAS: i32 = 5;
const PERIOD_BIAS: i32 = 7;

// ── Special textures ──────────────────────────────────────────────────────────

/// Textures above this value are bombs rather than plain bullets.
pub const BOMB_TEXTURE_THRESHOLD: u64 = 127;
/// Bombs orbiting their emitter.
pub const CIRCLING_EMITTER_TEXTURE: u64 = 129;
/// Bombs orbiting the point they were fired from.
pub const CIRCLING_SPAWN_TEXTURE: u64 = 130;
/// Semi-transparent shots.
pub const TRANSLUCENT_TEXTURE: u64 = 3;

/// Radius growth of circling shots, units per second.
pub const CIRCLING_GROWTH: f32 = 40.0;
/// Angular rate of circling shots, degrees per second.
pub const CIRCLING_RATE: f32 = 100.0;
/// Circling shots around the emitter stay within this many emitter widths.
const CIRCLING_EMITTER_RADIUS_FACTOR: f32 = 1.5;
const CIRCLING_SPAWN_MAX_RADIUS: f32 = 10_000.0;
/// Where an orphaned circling shot is parked until it expires.
pub const PARKING_POSITION: Vec2 = Vec2::new(-100.0, -100.0);

fn lerp_digit(digit: u8, steps: u8, from: f32, to: f32) -> f32 {
    from + digit as f32 * (to - from) / (steps - 1) as f32
}

// ── Emitter & shot descriptors ────────────────────────────────────────────────

/// What a pattern needs to know about the actor firing it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Emitter {
    pub id: u64,
    pub position: Vec2,
    /// Position one frame earlier, for the movement heading.
    pub previous_position: Vec2,
    pub width: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pivot {
    Emitter,
    SpawnPoint,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShotMotion {
    /// Flies along its velocity, steering toward the target while
    /// `homing_from < time <= homing_to`.
    Homing {
        max_angular_speed: f32,
        homing_from: f32,
        homing_to: f32,
    },
    /// Orbits a pivot at a growing radius.
    Circling {
        emitter: u64,
        pivot: Pivot,
        phase_deg: f32,
        max_radius: f32,
    },
}

/// A projectile the host should create.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShotSpec {
    pub position: Vec2,
    pub velocity: Vec2,
    pub time_to_live: f32,
    pub texture: u64,
    pub alpha: f32,
    pub motion: ShotMotion,
}

impl ShotMotion {
    pub fn is_homing_at(&self, time: f32) -> bool {
        match *self {
            ShotMotion::Homing {
                homing_from,
                homing_to,
                ..
            } => time > homing_from && time <= homing_to,
            ShotMotion::Circling { .. } => false,
        }
    }
}

// ── Runtime pattern ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct RuntimePattern {
    packed: PackedPattern,
    shots: u32,
    /// Seconds before the first shot; infinite when the pattern never fires.
    pub initial_delay: f32,
    period: f32,
    burst_spacing: f32,
    speed: f32,
    angular_speed: f32,
    spread_start: f32,
    angle_per_shot: f32,
    homing_declared: bool,
    homing_from: f32,
    homing_to: f32,
    time_to_live: f32,
    texture: u64,
}

impl RuntimePattern {
    pub fn decode(packed: PackedPattern, world_width: f32, tempo: f32) -> Self {
        let fields = PatternFields::unpack(packed);
        let digit = |f: Field| fields.digit(f);

        let shots = digit(Field::Shots) as u32;
        let seconds_per_beat = if tempo > 0.0 { 60.0 / tempo } else { 0.5 };
        let initial_delay = seconds_per_beat
            * 2f32.powi(digit(Field::InitialDelay) as i32 - INITIAL_DELAY_BIAS);
        let period = seconds_per_beat * 2f32.powi(digit(Field::Period) as i32 - PERIOD_BIAS);
        let burst_spacing = if shots == 0 {
            0.0
        } else {
            lerp_digit(digit(Field::BurstSpacing), 10, 0.0, period / shots as f32)
        };
        let speed = match digit(Field::Speed) {
            9 => TOP_SPEED,
            d => lerp_digit(d, 10, MIN_SPEED, MAX_SPEED),
        };
        let angular_speed = lerp_digit(digit(Field::HomingSpeed), 10, MIN_ANGLE_SPEED, MAX_ANGLE_SPEED);

        let spread_arc = 360.0 * digit(Field::Spread) as f32 / 9.0;
        let angle_per_shot = if shots == 0 { 0.0 } else { spread_arc / shots as f32 };
        let spread_start = (spread_arc - angle_per_shot) / 2.0;

        let homing_from = lerp_digit(
            digit(Field::HomingStart),
            10,
            MIN_START_HOMING_DISTANCE,
            MAX_START_HOMING_DISTANCE,
        ) / speed;
        let homing_duration = digit(Field::HomingDuration);
        let homing_to = if homing_duration == 0 {
            f32::INFINITY
        } else {
            homing_from + lerp_digit(homing_duration - 1, 9, MIN_HOMING_TIME, MAX_HOMING_TIME)
        };
        let time_to_live = world_width / speed
            * lerp_digit(
                digit(Field::TimeToLive),
                10,
                MIN_TIME_TO_LIVE_FACTOR,
                MAX_TIME_TO_LIVE_FACTOR,
            );

        Self {
            packed,
            shots,
            initial_delay: if shots == 0 { f32::INFINITY } else { initial_delay },
            period,
            burst_spacing,
            speed,
            angular_speed,
            spread_start,
            angle_per_shot,
            homing_declared: homing_duration != 0,
            homing_from,
            homing_to,
            time_to_live,
            texture: fields.texture(),
        }
    }

    pub fn packed(&self) -> PackedPattern {
        self.packed
    }

    pub fn shots_per_burst(&self) -> u32 {
        self.shots
    }

    pub fn period(&self) -> f32 {
        self.period
    }

    pub fn burst_spacing(&self) -> f32 {
        self.burst_spacing
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn angular_speed(&self) -> f32 {
        self.angular_speed
    }

    pub fn homing_window(&self) -> (f32, f32) {
        (self.homing_from, self.homing_to)
    }

    pub fn time_to_live(&self) -> f32 {
        self.time_to_live
    }

    pub fn texture_index(&self) -> u64 {
        self.texture
    }

    pub fn fires(&self) -> bool {
        self.shots > 0
    }

    /// Delay after the `count`-th shot: the burst spacing inside a burst,
    /// the rest of the period after the last shot of a burst.
    pub fn next_delay(&self, count: u32) -> f32 {
        if self.shots == 0 {
            return f32::INFINITY;
        }
        if count % self.shots == 0 {
            let rest = self.period - self.burst_spacing * self.shots as f32;
            // Fully spaced bursts leave nothing after the last shot.
            if rest > MIN_DELAY {
                rest
            } else {
                self.burst_spacing.max(MIN_DELAY)
            }
        } else {
            self.burst_spacing
        }
    }

    /// A trigger for this pattern; `action` runs once per shot.
    pub fn trigger<C: ?Sized>(
        &self,
        action: impl FnMut(&mut C, Firing) -> bool + 'static,
    ) -> PeriodicAction<C> {
        let cadence = self.clone();
        PeriodicAction::new(
            move |count, _| cadence.next_delay(count),
            Some(self.initial_delay),
            action,
        )
    }

    /// Heading offset of the `index`-th shot of a burst, in degrees.
    fn spread_offset(&self, index: u32) -> f32 {
        if self.spread_start != 0.0 && self.angle_per_shot != 0.0 {
            let slot = if self.shots == 0 { 0 } else { index % self.shots };
            -self.spread_start + self.angle_per_shot * slot as f32
        } else {
            0.0
        }
    }

    /// Projectiles for the `shot_index`-th shot (0-based, counted across bursts).
    pub fn shoot(
        &self,
        emitter: &Emitter,
        target: Vec2,
        shot_index: u32,
        rng: &mut impl Rng,
    ) -> Vec<ShotSpec> {
        if self.shots == 0 {
            return Vec::new();
        }
        let rotation = self.spread_offset(shot_index);

        if self.texture == CIRCLING_EMITTER_TEXTURE || self.texture == CIRCLING_SPAWN_TEXTURE {
            let (pivot, max_radius) = if self.texture == CIRCLING_EMITTER_TEXTURE {
                (Pivot::Emitter, emitter.width * CIRCLING_EMITTER_RADIUS_FACTOR)
            } else {
                (Pivot::SpawnPoint, CIRCLING_SPAWN_MAX_RADIUS)
            };
            return vec![ShotSpec {
                position: emitter.position,
                velocity: Vec2::ZERO,
                time_to_live: self.time_to_live,
                texture: self.texture,
                alpha: 1.0,
                motion: ShotMotion::Circling {
                    emitter: emitter.id,
                    pivot,
                    phase_deg: rotation,
                    max_radius,
                },
            }];
        }

        let heading = if self.homing_declared {
            target - emitter.position
        } else {
            emitter.position - emitter.previous_position
        };
        // Arbitrary tie-break for an emitter that has not moved.
        let heading = if heading.length_squared() == 0.0 {
            Vec2::new(1.0 - rng.gen::<f32>() * 2.0, 1.0 - rng.gen::<f32>() * 2.0)
        } else {
            heading
        };
        let velocity = rotate_deg(heading.normalize_or_zero() * self.speed, rotation);

        vec![ShotSpec {
            position: emitter.position,
            velocity,
            time_to_live: self.time_to_live,
            texture: self.texture,
            alpha: if self.texture == TRANSLUCENT_TEXTURE { 0.5 } else { 1.0 },
            motion: ShotMotion::Homing {
                max_angular_speed: self.angular_speed,
                homing_from: self.homing_from,
                homing_to: self.homing_to,
            },
        }]
    }
}

// ── Geometry helpers ──────────────────────────────────────────────────────────

/// Angle of `v` in degrees, in `[0, 360)`.
pub fn angle_deg(v: Vec2) -> f32 {
    let a = v.y.atan2(v.x).to_degrees();
    if a < 0.0 {
        a + 360.0
    } else {
        a
    }
}

pub fn rotate_deg(v: Vec2, degrees: f32) -> Vec2 {
    Vec2::from_angle(degrees.to_radians()).rotate(v)
}

fn min_abs(a: f32, b: f32) -> f32 {
    if a.abs() > b.abs() {
        b
    } else {
        a
    }
}

/// Signed turn, in degrees, that brings `heading` toward `desired` along the
/// shorter arc without exceeding `max_speed * dt`.
pub fn homing_turn(heading_deg: f32, desired_deg: f32, max_speed: f32, dt: f32) -> f32 {
    let diff = desired_deg - heading_deg;
    let shortest = min_abs(min_abs(diff, diff + 360.0), diff - 360.0);
    let limit = (max_speed * dt).abs();
    shortest.clamp(-limit, limit)
}

/// New velocity of a homing shot at `position` chasing `target`.
pub fn steer(velocity: Vec2, position: Vec2, target: Vec2, max_speed: f32, dt: f32) -> Vec2 {
    let to_target = target - position;
    if velocity.length_squared() == 0.0 || to_target.length_squared() == 0.0 {
        return velocity;
    }
    let turn = homing_turn(angle_deg(velocity), angle_deg(to_target), max_speed, dt);
    rotate_deg(velocity, turn)
}

/// Offset of a circling shot from its pivot after `time` seconds.
pub fn circling_offset(time: f32, phase_deg: f32, max_radius: f32) -> Vec2 {
    let radius = (time * CIRCLING_GROWTH).min(max_radius);
    rotate_deg(Vec2::new(radius, 0.0), phase_deg + time * CIRCLING_RATE)
}
