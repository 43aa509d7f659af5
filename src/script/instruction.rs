//! One script line, parsed.
//!
//! Fields are separated by exactly two spaces; inside a field, words are
//! separated by one.  The first field is the keyword.  Unknown keywords are
//! kept as comments so newer scripts still load.

use tracing::debug;

use crate::error::{Result, ScriptError};
use crate::host::Reward;
use crate::pattern::PatternText;
use crate::script::number::Number;
use crate::trajectory::{Side, TrajectorySource};

pub const FIELD_SEPARATOR: &str = "  ";

#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Comment,
    /// 1-based line to resume from.
    Goto(usize),
    Goal {
        kind: String,
        count: i32,
    },
    SetBackground(String),
    SetRenderMode {
        mode: i32,
        stage: i32,
    },
    PlayMusic {
        path: String,
        volume: Number,
        tempo: Number,
    },
    FadeMusic(Number),
    SetTint {
        r: Number,
        g: Number,
        b: Number,
    },
    ShowText {
        lines: Vec<String>,
        x: Number,
        y: Number,
    },
    Spawn(SpawnGroupSource),
    Repeat {
        gap: Number,
        total: Number,
        group: SpawnGroupSource,
    },
    Wait(Number),
    WaitUntilCleared(Number),
    End,
}

/// One enemy of a spawn group: its type letter and starting pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct MemberCode {
    pub letter: char,
    pub pattern: PatternText,
}

impl MemberCode {
    pub fn parse(text: &str, line: usize) -> Result<Self> {
        let mut chars = text.chars();
        let letter = chars
            .next()
            .filter(char::is_ascii_uppercase)
            .ok_or_else(|| ScriptError::MemberCode {
                line,
                text: text.to_string(),
            })?;
        let rest = chars.as_str();
        let pattern = PatternText::parse(rest).ok_or_else(|| ScriptError::Pattern {
            line,
            text: rest.to_string(),
        })?;
        Ok(Self { letter, pattern })
    }

    /// Zero-based type code, `A` = 0.
    pub fn enemy_type(&self) -> u8 {
        self.letter as u8 - b'A'
    }
}

/// The shared tail of `spawn` and `repeat` lines.
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnGroupSource {
    /// Seconds over which the members are spread.
    pub window: Number,
    pub members: Vec<MemberCode>,
    pub reward: Reward,
    pub side: Side,
    pub factors: Vec<Number>,
    pub trajectory: TrajectorySource,
}

impl SpawnGroupSource {
    /// `fields` starts at the window field.
    fn parse(fields: &[&str], line: usize) -> Result<Self> {
        let window = number(fields[0], line)?;
        let members = words(fields[1])
            .map(|code| MemberCode::parse(code, line))
            .collect::<Result<Vec<_>>>()?;
        let reward = Reward::parse(fields[2]).ok_or_else(|| ScriptError::Number {
            line,
            text: fields[2].to_string(),
        })?;
        let side = Side::parse(fields[3]);
        let factors = words(fields[4])
            .map(|f| number(f, line))
            .collect::<Result<Vec<_>>>()?;
        let trajectory = TrajectorySource::parse(&fields[5..], line)?;
        Ok(Self {
            window,
            members,
            reward,
            side,
            factors,
            trajectory,
        })
    }
}

fn words(field: &str) -> impl Iterator<Item = &str> {
    field.split(' ').filter(|w| !w.is_empty())
}

fn number(text: &str, line: usize) -> Result<Number> {
    Number::parse(text.trim()).ok_or_else(|| ScriptError::Number {
        line,
        text: text.to_string(),
    })
}

fn integer<T: std::str::FromStr>(text: &str, line: usize) -> Result<T> {
    text.trim().parse().map_err(|_| ScriptError::Number {
        line,
        text: text.to_string(),
    })
}

/// Fails unless `args` has at least `expected` entries.
fn require(args: &[&str], expected: usize, keyword: &str, line: usize) -> Result<()> {
    if args.len() < expected {
        return Err(ScriptError::MissingField {
            line,
            keyword: keyword.to_string(),
            expected,
            found: args.len(),
        });
    }
    Ok(())
}

impl Instruction {
    /// Script keyword the instruction was written with.
    pub fn keyword(&self) -> &'static str {
        match self {
            Instruction::Comment => "#",
            Instruction::Goto(_) => "goto",
            Instruction::Goal { .. } => "goal",
            Instruction::SetBackground(_) => "setting",
            Instruction::SetRenderMode { .. } => "mode",
            Instruction::PlayMusic { .. } => "music play",
            Instruction::FadeMusic(_) => "music fade",
            Instruction::SetTint { .. } => "tint",
            Instruction::ShowText { .. } => "text",
            Instruction::Spawn(_) => "spawn",
            Instruction::Repeat { .. } => "repeat",
            Instruction::Wait(_) => "wait",
            Instruction::WaitUntilCleared(_) => "waitdefeated",
            Instruction::End => "end",
        }
    }

    /// Parses the `line`-th (1-based) line of a script.
    pub fn parse(text: &str, line: usize) -> Result<Self> {
        let text = text.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = text.split(FIELD_SEPARATOR).collect();
        let keyword = fields[0].trim();
        let args = &fields[1..];

        let instruction = match keyword {
            "" | "#" => Instruction::Comment,
            k if k.starts_with('#') => Instruction::Comment,
            "goto" => {
                require(args, 1, keyword, line)?;
                Instruction::Goto(integer(args[0], line)?)
            }
            "goal" => {
                require(args, 2, keyword, line)?;
                Instruction::Goal {
                    kind: args[0].to_string(),
                    count: integer(args[1], line)?,
                }
            }
            "setting" => {
                require(args, 1, keyword, line)?;
                Instruction::SetBackground(args[0].to_string())
            }
            "mode" => {
                require(args, 2, keyword, line)?;
                Instruction::SetRenderMode {
                    mode: integer(args[0], line)?,
                    stage: integer(args[1], line)?,
                }
            }
            "music" => {
                require(args, 1, keyword, line)?;
                match args[0] {
                    "play" => {
                        require(args, 3, "music play", line)?;
                        let tempo = match args.get(3) {
                            Some(t) => number(t, line)?,
                            None => Number::Literal(120.0),
                        };
                        Instruction::PlayMusic {
                            path: args[1].to_string(),
                            volume: number(args[2], line)?,
                            tempo,
                        }
                    }
                    "fade" => {
                        require(args, 2, "music fade", line)?;
                        Instruction::FadeMusic(number(args[1], line)?)
                    }
                    other => {
                        debug!(line, command = other, "unknown music command ignored");
                        Instruction::Comment
                    }
                }
            }
            "tint" => {
                require(args, 3, keyword, line)?;
                Instruction::SetTint {
                    r: number(args[0], line)?,
                    g: number(args[1], line)?,
                    b: number(args[2], line)?,
                }
            }
            "text" => {
                require(args, 3, keyword, line)?;
                Instruction::ShowText {
                    lines: args[0].split('\\').map(str::to_string).collect(),
                    x: number(args[1], line)?,
                    y: number(args[2], line)?,
                }
            }
            "spawn" => {
                require(args, 5, keyword, line)?;
                Instruction::Spawn(SpawnGroupSource::parse(args, line)?)
            }
            "repeat" => {
                require(args, 7, keyword, line)?;
                Instruction::Repeat {
                    gap: number(args[0], line)?,
                    total: number(args[1], line)?,
                    group: SpawnGroupSource::parse(&args[2..], line)?,
                }
            }
            "wait" => {
                require(args, 1, keyword, line)?;
                Instruction::Wait(number(args[0], line)?)
            }
            "waitdefeated" => {
                require(args, 1, keyword, line)?;
                Instruction::WaitUntilCleared(number(args[0], line)?)
            }
            "end" => Instruction::End,
            other => {
                debug!(line, keyword = other, "unknown instruction ignored");
                Instruction::Comment
            }
        };
        Ok(instruction)
    }
}
