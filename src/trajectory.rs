//! Trajectory mini-language embedded in `spawn` lines.
//!
//! Tokens are read left to right while keeping a current time window.  Every
//! motion primitive captures the window it was declared in; primitives of one
//! stage are applied together, each adding its displacement to the actor's
//! spawn point.  Parenthesised blocks become a single looping effect.
//!
//! Loading only validates structure.  Numbers are resolved when the owning
//! spawn instruction runs, producing a [`TrajectoryProgram`] that every member
//! of the group evaluates through its own [`ActorTrajectory`].

use std::rc::Rc;

use glam::Vec2;
use rand::Rng;
use tracing::debug;

use crate::channel::SharedChannel;
use crate::error::{Result, ScriptError};
use crate::pattern::{PackedPattern, PatternText};
use crate::script::number::Number;

/// Safety cap on full loop iterations replayed for one evaluation.
const MAX_LOOP_ITERATIONS: u32 = 100_000;

// ── Sides ─────────────────────────────────────────────────────────────────────

/// Screen edge or motion direction; `Top` is +y.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

impl Side {
    /// Unknown names fall back to `Right`.
    pub fn parse(name: &str) -> Side {
        match name {
            "top" => Side::Top,
            "bottom" => Side::Bottom,
            "left" => Side::Left,
            _ => Side::Right,
        }
    }

    pub fn unit(self) -> Vec2 {
        match self {
            Side::Top => Vec2::Y,
            Side::Bottom => Vec2::NEG_Y,
            Side::Left => Vec2::NEG_X,
            Side::Right => Vec2::X,
        }
    }
}

// ── Source tokens ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum TrajectoryToken {
    After(Number),
    CancelAfter(Number),
    For(Number),
    Open,
    Close,
    Linear {
        side: Side,
        speed: Number,
    },
    Sine {
        side: Side,
        start: Number,
        speed: Number,
        amplitude: Number,
    },
    Cosine {
        side: Side,
        start: Number,
        speed: Number,
        amplitude: Number,
    },
    /// Target as fractions of the world size.
    MoveTo {
        x: Number,
        y: Number,
    },
    Shoot(PatternText),
    Stage(String),
    Boss,
}

fn arg<'a>(words: &[&'a str], index: usize, keyword: &str, line: usize) -> Result<&'a str> {
    words.get(index).copied().ok_or_else(|| ScriptError::MissingField {
        line,
        keyword: keyword.to_string(),
        expected: index + 1,
        found: words.len(),
    })
}

fn number(words: &[&str], index: usize, keyword: &str, line: usize) -> Result<Number> {
    let text = arg(words, index, keyword, line)?;
    Number::parse(text).ok_or_else(|| ScriptError::Number {
        line,
        text: text.to_string(),
    })
}

impl TrajectoryToken {
    /// Parses one field of a spawn line.  Unknown keywords yield `None`.
    pub fn parse(field: &str, line: usize) -> Result<Option<Self>> {
        let words: Vec<&str> = field.split(' ').filter(|w| !w.is_empty()).collect();
        let Some(&keyword) = words.first() else {
            return Ok(None);
        };
        let side = || Side::parse(words.get(1).copied().unwrap_or(""));
        let token = match keyword {
            "after" => TrajectoryToken::After(number(&words, 1, keyword, line)?),
            "cancelafter" => TrajectoryToken::CancelAfter(number(&words, 1, keyword, line)?),
            "for" => TrajectoryToken::For(number(&words, 1, keyword, line)?),
            "(" => TrajectoryToken::Open,
            ")" => TrajectoryToken::Close,
            "lin" => TrajectoryToken::Linear {
                side: side(),
                speed: number(&words, 2, keyword, line)?,
            },
            "sin" | "cos" => {
                let start = number(&words, 2, keyword, line)?;
                let speed = number(&words, 3, keyword, line)?;
                let amplitude = number(&words, 4, keyword, line)?;
                if keyword == "sin" {
                    TrajectoryToken::Sine { side: side(), start, speed, amplitude }
                } else {
                    TrajectoryToken::Cosine { side: side(), start, speed, amplitude }
                }
            }
            "move" => TrajectoryToken::MoveTo {
                x: number(&words, 1, keyword, line)?,
                y: number(&words, 2, keyword, line)?,
            },
            "shoot" => {
                let text = arg(&words, 1, keyword, line)?;
                let pattern = PatternText::parse(text).ok_or_else(|| ScriptError::Pattern {
                    line,
                    text: text.to_string(),
                })?;
                TrajectoryToken::Shoot(pattern)
            }
            "stage" => TrajectoryToken::Stage(arg(&words, 1, keyword, line)?.to_string()),
            "boss" => TrajectoryToken::Boss,
            other => {
                debug!(line, keyword = other, "unknown trajectory keyword skipped");
                return Ok(None);
            }
        };
        Ok(Some(token))
    }
}

/// Validated trajectory tokens of one spawn line.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrajectorySource {
    tokens: Vec<TrajectoryToken>,
}

impl TrajectorySource {
    /// Parses the trailing fields of a spawn line and rejects unbalanced
    /// blocks and stages declared inside a block.
    pub fn parse(fields: &[&str], line: usize) -> Result<Self> {
        let mut tokens = Vec::new();
        for field in fields {
            if let Some(token) = TrajectoryToken::parse(field, line)? {
                tokens.push(token);
            }
        }
        Self::from_tokens(tokens, line)
    }

    pub fn from_tokens(tokens: Vec<TrajectoryToken>, line: usize) -> Result<Self> {
        let mut depth = 0usize;
        for token in &tokens {
            match token {
                TrajectoryToken::Open => depth += 1,
                TrajectoryToken::Close => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or(ScriptError::UnexpectedClose { line })?;
                }
                TrajectoryToken::Stage(_) if depth > 0 => {
                    return Err(ScriptError::StageInsideNesting { line });
                }
                _ => {}
            }
        }
        if depth > 0 {
            return Err(ScriptError::UnbalancedNesting { line, open: depth });
        }
        Ok(Self { tokens })
    }

    pub fn tokens(&self) -> &[TrajectoryToken] {
        &self.tokens
    }

    pub fn is_boss(&self) -> bool {
        self.tokens.iter().any(|t| matches!(t, TrajectoryToken::Boss))
    }

    /// Resolves numbers and builds the evaluable program.
    pub fn compile(&self, ctx: &CompileContext, rng: &mut impl Rng) -> TrajectoryProgram {
        let mut stages = Vec::new();
        let mut current: Vec<Effect> = Vec::new();
        let mut window = Window::OPEN;
        let mut stack: Vec<(Window, Vec<Effect>)> = Vec::new();
        let mut latches = 0usize;
        let mut boss = false;

        for token in &self.tokens {
            match token {
                TrajectoryToken::After(x) => {
                    window.from += x.resolve(ctx.tempo, rng);
                    window.to = f32::INFINITY;
                    window.cancelling = false;
                }
                TrajectoryToken::CancelAfter(x) => {
                    window.from += x.resolve(ctx.tempo, rng);
                    window.to = f32::INFINITY;
                    window.cancelling = true;
                }
                TrajectoryToken::For(x) => window.to = window.from + x.resolve(ctx.tempo, rng),
                TrajectoryToken::Open => {
                    stack.push((window, std::mem::take(&mut current)));
                    window = Window::OPEN;
                }
                TrajectoryToken::Close => {
                    // Structure was validated on load, so the stack is never empty here.
                    if let Some((outer_window, outer)) = stack.pop() {
                        let body = std::mem::replace(&mut current, outer);
                        let period = window.loop_length();
                        window = outer_window;
                        current.push(Effect {
                            window,
                            motion: Motion::Repeat { body, period },
                        });
                    }
                }
                TrajectoryToken::Linear { side, speed } => current.push(Effect {
                    window,
                    motion: Motion::Linear {
                        side: *side,
                        speed: speed.resolve(ctx.tempo, rng),
                    },
                }),
                TrajectoryToken::Sine { side, start, speed, amplitude } => current.push(Effect {
                    window,
                    motion: Motion::Sine {
                        side: *side,
                        start: start.resolve(ctx.tempo, rng),
                        speed: speed.resolve(ctx.tempo, rng),
                        amplitude: amplitude.resolve(ctx.tempo, rng),
                    },
                }),
                TrajectoryToken::Cosine { side, start, speed, amplitude } => current.push(Effect {
                    window,
                    motion: Motion::Cosine {
                        side: *side,
                        start: start.resolve(ctx.tempo, rng),
                        speed: speed.resolve(ctx.tempo, rng),
                        amplitude: amplitude.resolve(ctx.tempo, rng),
                    },
                }),
                TrajectoryToken::MoveTo { x, y } => current.push(Effect {
                    window,
                    motion: Motion::MoveTo {
                        target: Vec2::new(
                            x.resolve(ctx.tempo, rng) * ctx.world_width,
                            y.resolve(ctx.tempo, rng) * ctx.world_height,
                        ),
                        duration: window.to - window.from,
                    },
                }),
                TrajectoryToken::Shoot(pattern) => {
                    current.push(Effect {
                        window,
                        motion: Motion::ChangePattern {
                            pattern: pattern.packed(),
                            latch: latches,
                        },
                    });
                    latches += 1;
                }
                TrajectoryToken::Stage(name) => {
                    stages.push(Stage {
                        effects: std::mem::take(&mut current),
                        reward: name.chars().next(),
                    });
                    window = Window::OPEN;
                }
                TrajectoryToken::Boss => boss = true,
            }
        }
        stages.push(Stage {
            effects: current,
            reward: None,
        });

        TrajectoryProgram {
            stages,
            boss,
            latches,
        }
    }
}

/// Values the compiler needs from the running level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompileContext {
    pub tempo: f32,
    pub world_width: f32,
    pub world_height: f32,
}

// ── Compiled program ──────────────────────────────────────────────────────────

/// Time window a primitive is active in, relative to its stage (or block).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Window {
    pub from: f32,
    pub to: f32,
    /// Suppress the effect entirely once `time > to` instead of holding it.
    pub cancelling: bool,
}

impl Window {
    pub const OPEN: Window = Window {
        from: 0.0,
        to: f32::INFINITY,
        cancelling: false,
    };

    /// Time local to the window, or `None` when the effect contributes nothing.
    pub fn local_time(&self, time: f32) -> Option<f32> {
        if time < self.from {
            None
        } else if time < self.to {
            Some(time - self.from)
        } else if self.cancelling {
            None
        } else {
            Some(self.to - self.from)
        }
    }

    /// Length of one iteration when this is the final window of a block.
    /// An open-ended final window runs the block once.
    fn loop_length(&self) -> f32 {
        if self.to.is_finite() && self.to > 0.0 {
            self.to
        } else {
            f32::INFINITY
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Motion {
    Linear {
        side: Side,
        speed: f32,
    },
    Sine {
        side: Side,
        start: f32,
        speed: f32,
        amplitude: f32,
    },
    Cosine {
        side: Side,
        start: f32,
        speed: f32,
        amplitude: f32,
    },
    MoveTo {
        target: Vec2,
        duration: f32,
    },
    ChangePattern {
        pattern: PackedPattern,
        latch: usize,
    },
    /// Re-runs `body` on time modulo `period`.
    Repeat {
        body: Vec<Effect>,
        period: f32,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Effect {
    pub window: Window,
    pub motion: Motion,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stage {
    pub effects: Vec<Effect>,
    /// Reward for defeating the actor in this stage.
    pub reward: Option<char>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrajectoryProgram {
    stages: Vec<Stage>,
    boss: bool,
    latches: usize,
}

/// Mutable view of an actor while its trajectory is evaluated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActorState {
    pub position: Vec2,
    pub initial_position: Vec2,
}

impl ActorState {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            initial_position: position,
        }
    }
}

struct Evaluation<'a> {
    latches: &'a mut [bool],
    channel: Option<&'a SharedChannel>,
}

impl TrajectoryProgram {
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn is_boss(&self) -> bool {
        self.boss
    }

    /// Positions `actor` for `time` seconds into `stage` without publishing
    /// pattern changes.
    pub fn evaluate(&self, stage: usize, actor: &mut ActorState, time: f32) {
        let mut latches = vec![false; self.latches];
        let mut eval = Evaluation {
            latches: &mut latches,
            channel: None,
        };
        self.run_stage(stage, actor, time, &mut eval);
    }

    fn run_stage(&self, stage: usize, actor: &mut ActorState, time: f32, eval: &mut Evaluation) {
        actor.position = actor.initial_position;
        if let Some(stage) = self.stages.get(stage) {
            apply_all(&stage.effects, actor, time, eval, true);
        }
    }
}

fn apply_all(effects: &[Effect], actor: &mut ActorState, time: f32, eval: &mut Evaluation, live: bool) {
    for effect in effects {
        apply(effect, actor, time, eval, live);
    }
}

/// `live` is false while replaying completed loop iterations, which only
/// contribute displacement.
fn apply(effect: &Effect, actor: &mut ActorState, time: f32, eval: &mut Evaluation, live: bool) {
    if let Motion::ChangePattern { pattern, latch } = effect.motion {
        if !live {
            return;
        }
        let window = effect.window;
        if time < window.from {
            eval.latches[latch] = false;
        } else if !(window.cancelling && time > window.to) && !eval.latches[latch] {
            if let Some(channel) = eval.channel {
                channel.borrow_mut().publish(pattern);
            }
            eval.latches[latch] = true;
        }
        return;
    }

    let Some(t) = effect.window.local_time(time) else {
        return;
    };
    match &effect.motion {
        Motion::Linear { side, speed } => actor.position += side.unit() * (t * speed),
        Motion::Sine {
            side,
            start,
            speed,
            amplitude,
        } => actor.position += side.unit() * ((start + t * speed).sin() * amplitude),
        Motion::Cosine {
            side,
            start,
            speed,
            amplitude,
        } => actor.position += side.unit() * ((start + t * speed).cos() * amplitude),
        Motion::MoveTo { target, duration } => {
            if t >= *duration {
                actor.position = *target;
            } else {
                actor.position += (*target - actor.position) * (t / duration);
            }
        }
        Motion::Repeat { body, period } => {
            if period.is_finite() {
                let full = ((t / period).floor() as u32).min(MAX_LOOP_ITERATIONS);
                for _ in 0..full {
                    apply_all(body, actor, *period, eval, false);
                }
                apply_all(body, actor, t - full as f32 * period, eval, live);
            } else {
                apply_all(body, actor, t, eval, live);
            }
        }
        Motion::ChangePattern { .. } => {}
    }
}

// ── Per-actor handle ──────────────────────────────────────────────────────────

/// The trajectory handed to the host for one spawned actor.
#[derive(Clone, Debug)]
pub struct ActorTrajectory {
    program: Rc<TrajectoryProgram>,
    stage: usize,
    latches: Vec<bool>,
    channel: SharedChannel,
}

impl ActorTrajectory {
    pub fn new(program: Rc<TrajectoryProgram>, channel: SharedChannel) -> Self {
        let latches = vec![false; program.latches];
        Self {
            program,
            stage: 0,
            latches,
            channel,
        }
    }

    /// Positions `actor` for `time` seconds into the current stage and
    /// publishes any pattern change that became due.
    pub fn update(&mut self, actor: &mut ActorState, time: f32) {
        let mut eval = Evaluation {
            latches: &mut self.latches,
            channel: Some(&self.channel),
        };
        self.program.run_stage(self.stage, actor, time, &mut eval);
    }

    /// Moves to the next stage, returning the reward for the one just
    /// completed.  Returns `None` and stays put on the last stage.
    pub fn complete_stage(&mut self) -> Option<char> {
        if self.stage + 1 >= self.program.stages.len() {
            return None;
        }
        let reward = self.program.stages[self.stage].reward;
        self.stage += 1;
        self.latches.iter_mut().for_each(|l| *l = false);
        reward
    }

    pub fn stage(&self) -> usize {
        self.stage
    }

    pub fn stage_count(&self) -> usize {
        self.program.stages.len()
    }

    pub fn is_last_stage(&self) -> bool {
        self.stage + 1 >= self.program.stages.len()
    }

    pub fn is_boss(&self) -> bool {
        self.program.boss
    }

    pub fn channel(&self) -> &SharedChannel {
        &self.channel
    }

    pub fn program(&self) -> &TrajectoryProgram {
        &self.program
    }
}
