//! The boundary between the level interpreter and the game embedding it.
//!
//! The interpreter never draws, plays audio or tracks collisions itself; it
//! calls back into a [`LevelHost`] and hands it an [`EnemySpawn`] request for
//! every enemy it wants on screen.

use std::cell::Cell;
use std::rc::Rc;

use glam::Vec2;

use crate::channel::SharedChannel;
use crate::trajectory::{ActorTrajectory, Side};

// ── Callback contract ─────────────────────────────────────────────────────────

/// Callbacks the interpreter needs from its environment.
///
/// Only enemy spawning and the world size are mandatory; presentation
/// callbacks default to doing nothing.
pub trait LevelHost {
    fn world_width(&self) -> f32;
    fn world_height(&self) -> f32;

    /// The host keeps `spawn.token` alive for as long as the enemy exists.
    fn spawn_enemy(&mut self, spawn: EnemySpawn);

    fn set_background(&mut self, _name: &str) {}
    fn show_text(&mut self, _text: &TextConfig) {}
    fn set_render_mode(&mut self, _mode: i32, _stage: i32) {}
    fn set_tint(&mut self, _tint: Tint) {}
    fn play_music(&mut self, _path: &str, _volume: f32, _tempo: f32) {}
    fn fade_music_out(&mut self, _seconds: f32) {}
    fn report_goal(&mut self, _kind: &str, _count: i32) {}
    fn on_sequence_end(&mut self) {}
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextConfig {
    pub lines: Vec<String>,
    /// Position as fractions of the world size.
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tint {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

// ── Live enemy accounting ─────────────────────────────────────────────────────

/// Counts enemies the host has not yet removed.
#[derive(Clone, Debug, Default)]
pub struct LiveEnemyCounter {
    live: Rc<Cell<usize>>,
}

impl LiveEnemyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> usize {
        self.live.get()
    }

    /// Registers one more live enemy.
    pub fn issue(&self) -> LiveEnemyToken {
        self.live.set(self.live.get() + 1);
        LiveEnemyToken {
            live: Rc::clone(&self.live),
        }
    }
}

/// Held by the host for each spawned enemy; dropping it reports the removal.
#[derive(Debug)]
pub struct LiveEnemyToken {
    live: Rc<Cell<usize>>,
}

impl Drop for LiveEnemyToken {
    fn drop(&mut self) {
        self.live.set(self.live.get().saturating_sub(1));
    }
}

// ── Rewards ───────────────────────────────────────────────────────────────────

/// When a spawn group pays out its reward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RewardCondition {
    /// When the last member is defeated.
    All,
    /// On every defeat.
    Each,
    /// From the `n`-th defeat on.
    Count(u32),
    Never,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reward {
    pub kind: char,
    pub condition: RewardCondition,
}

impl Reward {
    pub const NONE: Reward = Reward {
        kind: ' ',
        condition: RewardCondition::Never,
    };

    /// `<kind><condition>` where condition is `all`, `each`, `never`, `none`
    /// or a count.  A count of zero never pays out, and so does the bare
    /// word `none`.
    pub fn parse(text: &str) -> Option<Reward> {
        let mut chars = text.chars();
        let kind = chars.next()?;
        let condition = match chars.as_str() {
            "all" => RewardCondition::All,
            "each" => RewardCondition::Each,
            // `one` is what is left of a whole-field `none`.
            "never" | "none" | "one" | "" => RewardCondition::Never,
            n => match n.parse::<u32>().ok()? {
                0 => RewardCondition::Never,
                n => RewardCondition::Count(n),
            },
        };
        Some(Reward { kind, condition })
    }

    /// A counter shared by the `members` enemies of one group.
    pub fn counter(&self, members: usize) -> RewardCounter {
        let remaining = match self.condition {
            RewardCondition::All => members as i64,
            RewardCondition::Each => 1,
            RewardCondition::Count(n) => (n as i64).min(members as i64),
            RewardCondition::Never => i64::MAX,
        };
        RewardCounter {
            kind: self.kind,
            never: self.condition == RewardCondition::Never,
            remaining: Rc::new(Cell::new(remaining)),
        }
    }
}

/// Group-wide reward countdown; every member holds a clone.
#[derive(Clone, Debug)]
pub struct RewardCounter {
    kind: char,
    never: bool,
    remaining: Rc<Cell<i64>>,
}

impl RewardCounter {
    /// Records a defeat and returns the reward it earned, if any.
    pub fn on_defeat(&self) -> Option<char> {
        if self.never {
            return None;
        }
        let remaining = self.remaining.get() - 1;
        self.remaining.set(remaining);
        (remaining <= 0).then_some(self.kind)
    }

    pub fn remaining(&self) -> i64 {
        self.remaining.get()
    }
}

// ── Spawn request ─────────────────────────────────────────────────────────────

/// Everything the host needs to put one enemy on screen.
#[derive(Debug)]
pub struct EnemySpawn {
    /// Index of the member within its spawn group.
    pub member: usize,
    /// Zero-based enemy type, `A` = 0.
    pub enemy_type: u8,
    pub side: Side,
    /// Position along `side` as a fraction of its length.
    pub side_factor: f32,
    pub hit_points: u32,
    pub invincibility: f32,
    pub is_boss: bool,
    pub trajectory: ActorTrajectory,
    /// Pattern changes for this enemy, pre-loaded with its initial pattern.
    pub patterns: SharedChannel,
    pub reward: RewardCounter,
    pub token: LiveEnemyToken,
}

impl EnemySpawn {
    /// Spawn point on the world edge, y-up.
    pub fn origin(&self, world_width: f32, world_height: f32) -> Vec2 {
        edge_point(self.side, self.side_factor, world_width, world_height)
    }
}

pub fn edge_point(side: Side, factor: f32, world_width: f32, world_height: f32) -> Vec2 {
    match side {
        Side::Top => Vec2::new(factor * world_width, world_height),
        Side::Bottom => Vec2::new(factor * world_width, 0.0),
        Side::Left => Vec2::new(0.0, factor * world_height),
        Side::Right => Vec2::new(world_width, factor * world_height),
    }
}

/// Hit points and invincibility seconds for an enemy letter.
pub fn enemy_stats(letter: char) -> (u32, f32) {
    match letter {
        'C' => (2, 1.0),
        'D' => (3, 1.0),
        'E' => (30, 0.0),
        'F' => (50, 0.0),
        _ => (1, 0.0),
    }
}
