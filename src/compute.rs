/// Game logic of the reference host.
///
/// `Arena` implements `LevelHost`, so the interpreter spawns straight into
/// it.  `step_arena` then advances enemies, shots and pickups by one frame.
/// All randomness comes through the injected RNG so tests can seed it.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use glam::Vec2;
use rand::Rng;
use tracing::debug;

use crate::config::EngineConfig;
use crate::entities::{
    Arena, ArenaStatus, Enemy, Pickup, Player, Presentation, Shot, ShotOwner, TriggerOutbox,
};
use crate::host::{EnemySpawn, LevelHost, TextConfig, Tint};
use crate::pattern::runtime::{circling_offset, steer, Pivot, PARKING_POSITION};
use crate::pattern::{Emitter, PackedPattern, RuntimePattern, ShotMotion, ShotSpec};
use crate::scheduler::{Firing, PeriodicAction};
use crate::trajectory::ActorState;

// ── Tuning ────────────────────────────────────────────────────────────────────

const ENEMY_WIDTH: f32 = 16.0;
const ENEMY_HIT_RADIUS: f32 = 8.0;
const PLAYER_HIT_RADIUS: f32 = 3.0;
const PICKUP_RADIUS: f32 = 10.0;
const PLAYER_SPEED: f32 = 120.0;
const PLAYER_SHOT_SPEED: f32 = 240.0;
const PLAYER_SHOT_TTL: f32 = 2.0;
const MAX_PLAYER_SHOTS: usize = 6;
const PLAYER_RECOVERY: f32 = 1.5;
const PICKUP_DRIFT: f32 = -30.0;
/// Distance outside the world an entity may be before it counts as off-screen.
const OFFSCREEN_MARGIN: f32 = 24.0;

const SCORE_PER_HIT_POINT: u32 = 100;
const SCORE_PER_PICKUP: u32 = 250;

// ── Constructors ──────────────────────────────────────────────────────────────

pub fn init_arena(config: &EngineConfig) -> Arena {
    Arena {
        width: config.world_width,
        height: config.world_height,
        player: Player {
            position: Vec2::new(config.world_width * 0.15, config.world_height * 0.5),
            lives: 3,
            recovering: 0.0,
        },
        enemies: Vec::new(),
        shots: Vec::new(),
        pickups: Vec::new(),
        presentation: Presentation::default(),
        status: ArenaStatus::Playing,
        score: 0,
        tempo: config.default_tempo,
        offscreen_grace: config.offscreen_grace,
        next_id: 0,
        frame: 0,
    }
}

/// A trigger firing `pattern`, reporting the index of every shot.
pub fn arm(pattern: &RuntimePattern) -> PeriodicAction<TriggerOutbox> {
    pattern.trigger(|fired: &mut TriggerOutbox, firing: Firing| {
        fired.push(firing.count - 1);
        true
    })
}

impl Shot {
    pub fn from_spec(spec: ShotSpec) -> Self {
        Shot {
            owner: ShotOwner::Enemy,
            position: spec.position,
            velocity: spec.velocity,
            origin: spec.position,
            age: 0.0,
            time_to_live: spec.time_to_live,
            texture: spec.texture,
            alpha: spec.alpha,
            motion: spec.motion,
        }
    }
}

// ── Level callbacks ───────────────────────────────────────────────────────────

impl LevelHost for Arena {
    fn world_width(&self) -> f32 {
        self.width
    }

    fn world_height(&self) -> f32 {
        self.height
    }

    fn spawn_enemy(&mut self, spawn: EnemySpawn) {
        let id = self.next_id;
        self.next_id += 1;
        let origin = spawn.origin(self.width, self.height);

        // The channel replays its current pattern on subscribe.
        let mailbox = Rc::new(Cell::new(None));
        let inbox = Rc::clone(&mailbox);
        spawn
            .patterns
            .borrow_mut()
            .subscribe(id, move |p: PackedPattern| inbox.set(Some(p)));
        let initial = mailbox.take().unwrap_or(PackedPattern(0));
        let pattern = RuntimePattern::decode(initial, self.width, self.tempo);
        debug!(id, enemy_type = spawn.enemy_type, %initial, "enemy spawned");

        self.enemies.push(Enemy {
            id,
            enemy_type: spawn.enemy_type,
            actor: ActorState::at(origin),
            previous_position: origin,
            hit_points: spawn.hit_points,
            initial_hit_points: spawn.hit_points,
            invincibility: spawn.invincibility,
            invincible_for: 0.0,
            stage_time: 0.0,
            offscreen_for: 0.0,
            is_boss: spawn.is_boss,
            trajectory: spawn.trajectory,
            reward: spawn.reward,
            trigger: arm(&pattern),
            pattern,
            mailbox,
            token: spawn.token,
        });
    }

    fn set_background(&mut self, name: &str) {
        self.presentation.background = name.to_string();
    }

    fn show_text(&mut self, text: &TextConfig) {
        self.presentation.text = Some(text.clone());
    }

    fn set_render_mode(&mut self, mode: i32, stage: i32) {
        self.presentation.render_mode = (mode, stage);
    }

    fn set_tint(&mut self, tint: Tint) {
        self.presentation.tint = Some(tint);
    }

    fn play_music(&mut self, path: &str, volume: f32, tempo: f32) {
        self.tempo = tempo;
        self.presentation.music = Some((path.to_string(), volume, tempo));
        self.presentation.music_fade = None;
    }

    fn fade_music_out(&mut self, seconds: f32) {
        self.presentation.music_fade = Some(seconds);
    }

    fn report_goal(&mut self, kind: &str, count: i32) {
        self.presentation.goal = Some((kind.to_string(), count));
    }

    fn on_sequence_end(&mut self) {
        self.status = ArenaStatus::SequenceEnded;
    }
}

// ── Player input ──────────────────────────────────────────────────────────────

/// Moves the player along `direction` for `dt` seconds, clamped to the world.
pub fn move_player(arena: &mut Arena, direction: Vec2, dt: f32) {
    let step = direction.normalize_or_zero() * PLAYER_SPEED * dt;
    let max = Vec2::new(arena.width, arena.height);
    arena.player.position = (arena.player.position + step).clamp(Vec2::ZERO, max);
}

/// Fires one player shot to the right, capped at `MAX_PLAYER_SHOTS` in flight.
pub fn player_shoot(arena: &mut Arena) {
    let active = arena
        .shots
        .iter()
        .filter(|s| s.owner == ShotOwner::Player)
        .count();
    if active >= MAX_PLAYER_SHOTS {
        return;
    }
    let position = arena.player.position;
    arena.shots.push(Shot {
        owner: ShotOwner::Player,
        position,
        velocity: Vec2::new(PLAYER_SHOT_SPEED, 0.0),
        origin: position,
        age: 0.0,
        time_to_live: PLAYER_SHOT_TTL,
        texture: 0,
        alpha: 1.0,
        motion: ShotMotion::Homing {
            max_angular_speed: 0.0,
            homing_from: 0.0,
            homing_to: 0.0,
        },
    });
}

// ── Damage ────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HitOutcome {
    /// The enemy was invincible.
    Absorbed,
    Hurt,
    /// A stage of a multi-stage enemy was beaten; it continues with the next.
    StageCleared(Option<char>),
    Defeated(Option<char>),
}

pub fn hit_enemy(enemy: &mut Enemy, damage: u32) -> HitOutcome {
    if enemy.invincible_for > 0.0 || enemy.hit_points == 0 {
        return HitOutcome::Absorbed;
    }
    enemy.hit_points = enemy.hit_points.saturating_sub(damage);
    if enemy.hit_points > 0 {
        enemy.invincible_for = enemy.invincibility;
        return HitOutcome::Hurt;
    }
    if !enemy.trajectory.is_last_stage() {
        let reward = enemy.trajectory.complete_stage();
        enemy.hit_points = enemy.initial_hit_points;
        enemy.stage_time = 0.0;
        enemy.invincible_for = enemy.invincibility;
        return HitOutcome::StageCleared(reward);
    }
    HitOutcome::Defeated(enemy.reward.on_defeat())
}

// ── Per-frame step ────────────────────────────────────────────────────────────

/// Advances the arena by `dt` seconds.  Paused frames change nothing.
pub fn step_arena(arena: &mut Arena, dt: f32, rng: &mut impl Rng) {
    if dt <= 0.0 || arena.status == ArenaStatus::GameOver {
        return;
    }
    arena.frame += 1;
    arena.player.recovering = (arena.player.recovering - dt).max(0.0);

    step_enemies(arena, dt, rng);
    step_shots(arena, dt);
    resolve_player_shots(arena);
    resolve_enemy_shots(arena);
    step_pickups(arena, dt);
    drop_offscreen_enemies(arena, dt);
}

fn step_enemies(arena: &mut Arena, dt: f32, rng: &mut impl Rng) {
    let target = arena.player.position;
    for enemy in arena.enemies.iter_mut() {
        enemy.invincible_for = (enemy.invincible_for - dt).max(0.0);
        enemy.stage_time += dt;
        enemy.previous_position = enemy.actor.position;
        enemy.trajectory.update(&mut enemy.actor, enemy.stage_time);

        if let Some(packed) = enemy.mailbox.take() {
            if packed != enemy.pattern.packed() {
                debug!(id = enemy.id, %packed, "pattern swapped");
                enemy.pattern = RuntimePattern::decode(packed, arena.width, arena.tempo);
                enemy.trigger = arm(&enemy.pattern);
            }
        }

        let mut fired = TriggerOutbox::new();
        enemy.trigger.update(&mut fired, dt);
        let emitter = Emitter {
            id: enemy.id,
            position: enemy.actor.position,
            previous_position: enemy.previous_position,
            width: ENEMY_WIDTH,
        };
        for index in fired {
            let specs = enemy.pattern.shoot(&emitter, target, index, rng);
            arena.shots.extend(specs.into_iter().map(Shot::from_spec));
        }
    }
}

fn step_shots(arena: &mut Arena, dt: f32) {
    let emitters: HashMap<u64, Vec2> = arena
        .enemies
        .iter()
        .map(|e| (e.id, e.actor.position))
        .collect();
    let target = arena.player.position;

    for shot in arena.shots.iter_mut() {
        shot.age += dt;
        match shot.motion {
            ShotMotion::Homing {
                max_angular_speed, ..
            } => {
                if shot.owner == ShotOwner::Enemy && shot.motion.is_homing_at(shot.age) {
                    shot.velocity = steer(shot.velocity, shot.position, target, max_angular_speed, dt);
                }
                shot.position += shot.velocity * dt;
            }
            ShotMotion::Circling {
                emitter,
                pivot,
                phase_deg,
                max_radius,
            } => {
                let center = match pivot {
                    Pivot::Emitter => emitters.get(&emitter).copied(),
                    Pivot::SpawnPoint => Some(shot.origin),
                };
                shot.position = match center {
                    Some(center) => center + circling_offset(shot.age, phase_deg, max_radius),
                    None => PARKING_POSITION,
                };
            }
        }
    }

    let (width, height) = (arena.width, arena.height);
    arena
        .shots
        .retain(|s| s.age < s.time_to_live && within(s.position, width, height, OFFSCREEN_MARGIN));
}

fn resolve_player_shots(arena: &mut Arena) {
    let mut spent = Vec::new();
    for (si, shot) in arena.shots.iter().enumerate() {
        if shot.owner != ShotOwner::Player {
            continue;
        }
        let Some(enemy) = arena
            .enemies
            .iter_mut()
            .find(|e| e.hit_points > 0 && e.actor.position.distance(shot.position) <= ENEMY_HIT_RADIUS)
        else {
            continue;
        };
        spent.push(si);
        let position = enemy.actor.position;
        let reward = match hit_enemy(enemy, 1) {
            HitOutcome::Absorbed | HitOutcome::Hurt => None,
            HitOutcome::StageCleared(reward) => reward,
            HitOutcome::Defeated(reward) => {
                arena.score += SCORE_PER_HIT_POINT * enemy.initial_hit_points;
                reward
            }
        };
        if let Some(kind) = reward {
            arena.pickups.push(Pickup { position, kind });
        }
    }
    remove_indices(&mut arena.shots, &spent);
    // Dropping a defeated enemy releases its live-enemy token.
    arena.enemies.retain(|e| e.hit_points > 0);
}

fn resolve_enemy_shots(arena: &mut Arena) {
    if arena.player.recovering > 0.0 {
        return;
    }
    let player = arena.player.position;
    let Some(index) = arena
        .shots
        .iter()
        .position(|s| s.owner == ShotOwner::Enemy && s.position.distance(player) <= PLAYER_HIT_RADIUS)
    else {
        return;
    };
    arena.shots.remove(index);
    arena.player.lives = arena.player.lives.saturating_sub(1);
    arena.player.recovering = PLAYER_RECOVERY;
    if arena.player.lives == 0 {
        arena.status = ArenaStatus::GameOver;
    }
}

fn step_pickups(arena: &mut Arena, dt: f32) {
    let player = arena.player.position;
    let mut collected = 0;
    for pickup in arena.pickups.iter_mut() {
        pickup.position.x += PICKUP_DRIFT * dt;
    }
    arena.pickups.retain(|p| {
        if p.position.distance(player) <= PICKUP_RADIUS {
            collected += 1;
            false
        } else {
            p.position.x >= -OFFSCREEN_MARGIN
        }
    });
    arena.score += collected * SCORE_PER_PICKUP;
}

fn drop_offscreen_enemies(arena: &mut Arena, dt: f32) {
    let (width, height, grace) = (arena.width, arena.height, arena.offscreen_grace);
    for enemy in arena.enemies.iter_mut() {
        if within(enemy.actor.position, width, height, OFFSCREEN_MARGIN) {
            enemy.offscreen_for = 0.0;
        } else {
            enemy.offscreen_for += dt;
        }
    }
    arena.enemies.retain(|e| e.offscreen_for <= grace);
}

fn within(position: Vec2, width: f32, height: f32, margin: f32) -> bool {
    position.x >= -margin
        && position.x <= width + margin
        && position.y >= -margin
        && position.y <= height + margin
}

fn remove_indices<T>(items: &mut Vec<T>, indices: &[usize]) {
    let mut index = 0;
    items.retain(|_| {
        let keep = !indices.contains(&index);
        index += 1;
        keep
    });
}
