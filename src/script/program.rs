//! The level interpreter.
//!
//! `update(dt)` is the only entry point once a script is loaded.  Every frame
//! it first runs as many instructions as pending wait time allows, then ticks
//! the `repeat` schedulers and finally the `spawn` schedulers, so a group
//! started this frame can spawn its first member before the frame ends.

use std::rc::Rc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::channel::PatternChannel;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::host::{enemy_stats, EnemySpawn, LevelHost, LiveEnemyCounter, TextConfig, Tint};
use crate::scheduler::{Firing, PeriodicAction};
use crate::script::instruction::{Instruction, SpawnGroupSource};
use crate::trajectory::{ActorTrajectory, CompileContext};

/// Group sources due to be spawned, collected by `repeat` schedulers along
/// with how late in the frame each became due.
type GroupOutbox = Vec<(Rc<SpawnGroupSource>, f32)>;
/// Spawn requests collected by spawn schedulers before reaching the host.
type SpawnOutbox = Vec<EnemySpawn>;

pub struct LevelProgram {
    instructions: Vec<Instruction>,
    /// Index of the next instruction to run.
    current: usize,
    /// Instructions before this index are skipped (set by `goto`).
    next_valid: usize,
    /// Seconds until the next instruction; may go negative within a frame.
    wait: f32,
    waiting_for_clear: bool,
    clock: f32,
    tempo: f32,
    live: LiveEnemyCounter,
    repeaters: Vec<PeriodicAction<GroupOutbox>>,
    spawners: Vec<PeriodicAction<SpawnOutbox>>,
    rng: StdRng,
}

impl LevelProgram {
    /// Parses `source`, failing on the first malformed line.
    pub fn load(source: &str, config: &EngineConfig) -> Result<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(source, config.default_tempo, rng)
    }

    pub fn with_rng(source: &str, tempo: f32, rng: StdRng) -> Result<Self> {
        let instructions = source
            .lines()
            .enumerate()
            .map(|(i, line)| Instruction::parse(line, i + 1))
            .collect::<Result<Vec<_>>>()?;
        info!(lines = instructions.len(), tempo, "level loaded");
        Ok(Self {
            instructions,
            current: 0,
            next_valid: 0,
            wait: 0.0,
            waiting_for_clear: false,
            clock: 0.0,
            tempo,
            live: LiveEnemyCounter::new(),
            repeaters: Vec::new(),
            spawners: Vec::new(),
            rng,
        })
    }

    /// Advances the level by `dt` seconds.  A zero or negative `dt` is a
    /// paused frame and changes nothing.
    pub fn update(&mut self, dt: f32, host: &mut impl LevelHost) {
        if dt <= 0.0 {
            return;
        }
        self.clock += dt;

        if self.waiting_for_clear {
            if self.live.get() > 0 {
                self.tick_schedulers(dt, host);
                return;
            }
            self.waiting_for_clear = false;
            // Re-base on the level clock so the next instruction lands on
            // the same period the script was counting in.
            if self.wait > 0.0 {
                self.wait -= self.clock % self.wait;
            }
            debug!(clock = self.clock, wait = self.wait, "enemies cleared");
        } else {
            self.wait -= dt;
        }

        while self.wait <= 0.0 && self.current < self.instructions.len() {
            let index = self.current;
            self.current += 1;
            if index < self.next_valid {
                continue;
            }
            self.execute(index, dt, host);
            if self.waiting_for_clear {
                break;
            }
        }

        self.tick_schedulers(dt, host);
    }

    fn execute(&mut self, index: usize, dt: f32, host: &mut impl LevelHost) {
        let instruction = self.instructions[index].clone();
        // Part of this frame that elapsed before the instruction was due.
        let offset = (dt + self.wait).clamp(0.0, dt);
        if !matches!(instruction, Instruction::Comment) {
            debug!(line = index + 1, keyword = instruction.keyword(), "executing");
        }
        let tempo = self.tempo;
        match instruction {
            Instruction::Comment => {}
            Instruction::Goto(line) => self.next_valid = line.saturating_sub(1),
            Instruction::Goal { kind, count } => host.report_goal(&kind, count),
            Instruction::SetBackground(name) => host.set_background(&name),
            Instruction::SetRenderMode { mode, stage } => host.set_render_mode(mode, stage),
            Instruction::PlayMusic {
                path,
                volume,
                tempo: new_tempo,
            } => {
                let volume = volume.resolve(tempo, &mut self.rng);
                let new_tempo = new_tempo.resolve(tempo, &mut self.rng);
                if new_tempo > 0.0 {
                    self.tempo = new_tempo;
                } else {
                    warn!(line = index + 1, new_tempo, "non-positive tempo ignored");
                }
                host.play_music(&path, volume, self.tempo);
            }
            Instruction::FadeMusic(seconds) => {
                host.fade_music_out(seconds.resolve(tempo, &mut self.rng));
            }
            Instruction::SetTint { r, g, b } => host.set_tint(Tint {
                r: r.resolve(tempo, &mut self.rng),
                g: g.resolve(tempo, &mut self.rng),
                b: b.resolve(tempo, &mut self.rng),
            }),
            Instruction::ShowText { lines, x, y } => host.show_text(&TextConfig {
                lines,
                x: x.resolve(tempo, &mut self.rng),
                y: y.resolve(tempo, &mut self.rng),
            }),
            Instruction::Spawn(group) => self.start_group(&group, offset, &*host),
            Instruction::Repeat { gap, total, group } => {
                let gap = gap.resolve(tempo, &mut self.rng);
                let total = total.resolve(tempo, &mut self.rng);
                let period = group.window.resolve(tempo, &mut self.rng) + gap;
                let group = Rc::new(group);
                self.repeaters.push(PeriodicAction::new(
                    move |_, _| period,
                    Some(offset),
                    move |outbox: &mut GroupOutbox, firing: Firing| {
                        outbox.push((Rc::clone(&group), firing.lag));
                        // The group that starts past `total` still spawns.
                        let started_at = (firing.count - 1) as f32 * period;
                        period > 0.0 && started_at <= total
                    },
                ));
            }
            Instruction::Wait(seconds) => self.wait += seconds.resolve(tempo, &mut self.rng),
            Instruction::WaitUntilCleared(modulus) => {
                self.wait = modulus.resolve(tempo, &mut self.rng);
                self.waiting_for_clear = true;
            }
            Instruction::End => host.on_sequence_end(),
        }
    }

    fn tick_schedulers(&mut self, dt: f32, host: &mut impl LevelHost) {
        let mut groups = GroupOutbox::new();
        self.repeaters.retain_mut(|r| r.update(&mut groups, dt));
        for (group, lag) in groups {
            self.start_group(&group, (dt - lag).clamp(0.0, dt), &*host);
        }

        let mut spawns = SpawnOutbox::new();
        self.spawners.retain_mut(|s| s.update(&mut spawns, dt));
        for spawn in spawns {
            host.spawn_enemy(spawn);
        }
    }

    /// Resolves `group` and opens a scheduler spawning one member per period.
    /// `offset` is the part of the current frame that passed before the group
    /// started; the first member spawns once the scheduler has covered it.
    fn start_group(&mut self, group: &SpawnGroupSource, offset: f32, host: &impl LevelHost) {
        let members = group.members.len();
        if members == 0 {
            return;
        }
        let tempo = self.tempo;
        let period = group.window.resolve(tempo, &mut self.rng).max(0.0) / members as f32;
        let ctx = CompileContext {
            tempo,
            world_width: host.world_width(),
            world_height: host.world_height(),
        };
        let program = Rc::new(group.trajectory.compile(&ctx, &mut self.rng));
        let factors: Vec<f32> = group
            .factors
            .iter()
            .map(|f| f.resolve(tempo, &mut self.rng))
            .collect();
        if factors.is_empty() {
            warn!("spawn group without side factors, using the middle of the edge");
        }
        debug!(members, period, side = ?group.side, "spawn group started");

        let reward = group.reward.counter(members);
        let live = self.live.clone();
        let side = group.side;
        let codes = group.members.clone();
        self.spawners.push(PeriodicAction::new(
            move |_, _| period,
            Some(offset),
            move |outbox: &mut SpawnOutbox, firing: Firing| {
                let index = firing.count as usize - 1;
                let Some(code) = codes.get(index) else {
                    return false;
                };
                let (hit_points, invincibility) = enemy_stats(code.letter);
                let channel = PatternChannel::shared(code.pattern.packed());
                outbox.push(EnemySpawn {
                    member: index,
                    enemy_type: code.enemy_type(),
                    side,
                    side_factor: side_factor(&factors, index, members),
                    hit_points,
                    invincibility,
                    is_boss: program.is_boss(),
                    trajectory: ActorTrajectory::new(Rc::clone(&program), Rc::clone(&channel)),
                    patterns: channel,
                    reward: reward.clone(),
                    token: live.issue(),
                });
                index + 1 < members
            },
        ));
    }

    pub fn tempo(&self) -> f32 {
        self.tempo
    }

    /// Seconds of non-paused time since the level started.
    pub fn clock(&self) -> f32 {
        self.clock
    }

    /// Enemies spawned and not yet released by the host.
    pub fn live_enemies(&self) -> usize {
        self.live.get()
    }

    pub fn is_waiting_for_clear(&self) -> bool {
        self.waiting_for_clear
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Active `spawn` and `repeat` schedulers.
    pub fn active_schedulers(&self) -> usize {
        self.spawners.len() + self.repeaters.len()
    }

    /// True once every instruction ran and no scheduler is left.
    pub fn is_finished(&self) -> bool {
        self.current >= self.instructions.len() && self.active_schedulers() == 0
    }
}

/// Position along the spawn edge of member `index` of `members`, blending
/// linearly between the two nearest declared factors.
pub fn side_factor(factors: &[f32], index: usize, members: usize) -> f32 {
    match factors {
        [] => 0.5,
        [only] => *only,
        _ if members <= 1 => factors[0],
        _ => {
            let last = factors.len() - 1;
            let position = index as f32 / (members - 1) as f32 * last as f32;
            let lower = (position.floor() as usize).min(last);
            if lower == last {
                factors[last]
            } else {
                let blend = position - lower as f32;
                factors[lower] + (factors[lower + 1] - factors[lower]) * blend
            }
        }
    }
}
