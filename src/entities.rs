/// Arena entity types for the reference host — plain data, no logic.
///
/// The arena is stepped in place by `compute`; enemies own the handles the
/// level interpreter gave them (trajectory, reward counter, live-enemy token)
/// so dropping an enemy is what reports its removal.

use std::cell::Cell;
use std::rc::Rc;

use glam::Vec2;

use crate::host::{LiveEnemyToken, RewardCounter, TextConfig, Tint};
use crate::pattern::{PackedPattern, RuntimePattern, ShotMotion};
use crate::scheduler::PeriodicAction;
use crate::trajectory::{ActorState, ActorTrajectory};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArenaStatus {
    Playing,
    /// The script reached `end`.
    SequenceEnded,
    GameOver,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShotOwner {
    Player,
    Enemy,
}

// ── Player ────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Player {
    pub position: Vec2,
    pub lives: u32,
    /// Seconds of invulnerability left after being hit.
    pub recovering: f32,
}

// ── Enemies ───────────────────────────────────────────────────────────────────

/// Shot indices fired by a trigger during one step.
pub type TriggerOutbox = Vec<u32>;

pub struct Enemy {
    pub id: u64,
    pub enemy_type: u8,
    pub actor: ActorState,
    pub previous_position: Vec2,
    pub hit_points: u32,
    pub initial_hit_points: u32,
    pub invincibility: f32,
    /// Seconds until the enemy can be damaged again.
    pub invincible_for: f32,
    /// Time since the current trajectory stage began.
    pub stage_time: f32,
    pub offscreen_for: f32,
    pub is_boss: bool,
    pub trajectory: ActorTrajectory,
    pub reward: RewardCounter,
    pub pattern: RuntimePattern,
    pub trigger: PeriodicAction<TriggerOutbox>,
    /// Latest pattern delivered by the enemy's channel, not yet applied.
    pub mailbox: Rc<Cell<Option<PackedPattern>>>,
    pub token: LiveEnemyToken,
}

impl Enemy {
    pub fn position(&self) -> Vec2 {
        self.actor.position
    }
}

impl Drop for Enemy {
    fn drop(&mut self) {
        if let Ok(mut channel) = self.trajectory.channel().try_borrow_mut() {
            channel.unsubscribe(self.id);
        }
    }
}

impl std::fmt::Debug for Enemy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enemy")
            .field("id", &self.id)
            .field("enemy_type", &self.enemy_type)
            .field("position", &self.actor.position)
            .field("hit_points", &self.hit_points)
            .field("stage", &self.trajectory.stage())
            .field("pattern", &self.pattern.packed())
            .finish()
    }
}

// ── Projectiles ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Shot {
    pub owner: ShotOwner,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Where the shot was fired from; pivot of circling shots.
    pub origin: Vec2,
    pub age: f32,
    pub time_to_live: f32,
    pub texture: u64,
    pub alpha: f32,
    pub motion: ShotMotion,
}

/// A reward dropped by a defeated enemy or a completed stage.
#[derive(Clone, Debug, PartialEq)]
pub struct Pickup {
    pub position: Vec2,
    pub kind: char,
}

// ── Arena ─────────────────────────────────────────────────────────────────────

/// Presentation state set by script callbacks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Presentation {
    pub background: String,
    pub text: Option<TextConfig>,
    pub tint: Option<Tint>,
    pub render_mode: (i32, i32),
    /// Track, volume, tempo.
    pub music: Option<(String, f32, f32)>,
    pub music_fade: Option<f32>,
    pub goal: Option<(String, i32)>,
}

#[derive(Debug)]
pub struct Arena {
    pub width: f32,
    pub height: f32,
    pub player: Player,
    pub enemies: Vec<Enemy>,
    pub shots: Vec<Shot>,
    pub pickups: Vec<Pickup>,
    pub presentation: Presentation,
    pub status: ArenaStatus,
    pub score: u32,
    /// Tempo pattern timings are decoded with.
    pub tempo: f32,
    /// Seconds an enemy may stay off-screen before it is dropped.
    pub offscreen_grace: f32,
    pub next_id: u64,
    pub frame: u64,
}
