mod display;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{stdout, BufWriter, Write};
use std::path::Path;
use std::process;
use std::sync::{mpsc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use crossterm::{
    cursor,
    event::{
        self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    terminal, ExecutableCommand,
};
use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shmup_script::compute::{init_arena, move_player, player_shoot, step_arena};
use shmup_script::entities::{Arena, ArenaStatus};
use shmup_script::pattern::{Field, PatternFields, PatternText, RuntimePattern};
use shmup_script::{EngineConfig, LevelProgram};

use display::Viewport;

const PLAY_USAGE: &str = "shmup_script play <level.txt> [config.json]";
const CHECK_USAGE: &str = "shmup_script check <level.txt>";
const PATTERN_USAGE: &str = "shmup_script pattern <mnemonic-or-number>";

/// Longest frame fed to the simulation, so a stalled terminal does not
/// fast-forward the level.
const MAX_FRAME_SECONDS: f32 = 0.1;

// ── Held-key input ────────────────────────────────────────────────────────────

/// A key is considered "held" if its last press/repeat event arrived within
/// this many frames.  Covers terminals that don't emit key-release events.
const HOLD_WINDOW: u64 = 4;

/// Min frames between player shots while Z is held.
const SHOOT_COOLDOWN: u32 = 6;

fn is_held(key_frame: &HashMap<KeyCode, u64>, keys: &[KeyCode], frame: u64) -> bool {
    keys.iter().any(|key| {
        key_frame
            .get(key)
            .map(|&last| frame.saturating_sub(last) <= HOLD_WINDOW)
            .unwrap_or(false)
    })
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);

    match args.next().as_deref() {
        Some("play") => {
            let script = args.next().context(PLAY_USAGE)?;
            let config = args
                .next()
                .map(|path| EngineConfig::load(Path::new(&path)))
                .unwrap_or_default();
            play(&script, config)
        }
        Some("check") => {
            let script = args.next().context(CHECK_USAGE)?;
            check(&script)
        }
        Some("pattern") => {
            let code = args.next().context(PATTERN_USAGE)?;
            pattern(&code)
        }
        _ => bail!(
            "Level script player\n\nUsage:\n  {PLAY_USAGE}\n  {CHECK_USAGE}\n  {PATTERN_USAGE}"
        ),
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn read_script(path: &str) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))
}

// ── check ─────────────────────────────────────────────────────────────────────

fn check(path: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();

    let source = read_script(path)?;
    let program = LevelProgram::load(&source, &EngineConfig::default())
        .with_context(|| format!("Failed to load {path}"))?;

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for instruction in program.instructions() {
        *counts.entry(instruction.keyword()).or_default() += 1;
    }
    println!("{path}: {} lines OK", program.instructions().len());
    for (keyword, count) in counts {
        println!("  {keyword:<14}{count:>5}");
    }
    Ok(())
}

// ── pattern ───────────────────────────────────────────────────────────────────

fn pattern(code: &str) -> Result<()> {
    let text = PatternText::parse(code).with_context(|| format!("Malformed pattern {code}"))?;
    let packed = text.packed();
    let fields = PatternFields::unpack(packed);
    let config = EngineConfig::default();
    let runtime = RuntimePattern::decode(packed, config.world_width, config.default_tempo);

    println!("packed: {packed}");
    let named = [
        ("shots", Field::Shots),
        ("initial delay", Field::InitialDelay),
        ("period", Field::Period),
        ("speed", Field::Speed),
        ("spread", Field::Spread),
        ("burst spacing", Field::BurstSpacing),
        ("homing speed", Field::HomingSpeed),
        ("homing start", Field::HomingStart),
        ("homing duration", Field::HomingDuration),
        ("time to live", Field::TimeToLive),
        ("texture", Field::Texture),
    ];
    for (name, field) in named {
        println!("  {name:<16}{:>5}", fields.get(field));
    }
    let (homing_from, homing_to) = runtime.homing_window();
    println!(
        "at {} bpm: {} shot(s) every {:.3}s (spacing {:.3}s, first after {:.3}s), speed {:.1}, homing {:.2}..{:.2}s, ttl {:.2}s",
        config.default_tempo,
        runtime.shots_per_burst(),
        runtime.period(),
        runtime.burst_spacing(),
        runtime.initial_delay,
        runtime.speed(),
        homing_from,
        homing_to,
        runtime.time_to_live(),
    );
    Ok(())
}

// ── play ──────────────────────────────────────────────────────────────────────

fn play(path: &str, config: EngineConfig) -> Result<()> {
    let source = read_script(path)?;

    // The terminal is in raw mode while playing, so logs go to a file.
    let log = fs::File::create("shmup_script.log").context("Failed to create shmup_script.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(log))
        .init();

    let mut program =
        LevelProgram::load(&source, &config).with_context(|| format!("Failed to load {path}"))?;
    info!(path, "starting level");

    let mut out = BufWriter::new(stdout());
    terminal::enable_raw_mode()?;
    out.execute(terminal::EnterAlternateScreen)?;
    out.execute(cursor::Hide)?;
    let keyboard_enhanced = out
        .execute(PushKeyboardEnhancementFlags(
            KeyboardEnhancementFlags::REPORT_EVENT_TYPES,
        ))
        .is_ok();

    // Dedicate a thread to blocking event reads so the loop never blocks on I/O.
    let (tx, rx) = mpsc::channel::<Event>();
    thread::spawn(move || {
        while let Ok(ev) = event::read() {
            if tx.send(ev).is_err() {
                break;
            }
        }
    });

    let mut arena = init_arena(&config);
    let result = game_loop(&mut out, &mut program, &mut arena, &config, &rx);

    if keyboard_enhanced {
        let _ = out.execute(PopKeyboardEnhancementFlags);
    }
    let _ = out.execute(cursor::Show);
    let _ = out.execute(terminal::LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();

    result?;
    println!("Final score: {}", arena.score);
    Ok(())
}

fn game_loop<W: Write>(
    out: &mut W,
    program: &mut LevelProgram,
    arena: &mut Arena,
    config: &EngineConfig,
    rx: &mpsc::Receiver<Event>,
) -> Result<()> {
    let frame_time = Duration::from_millis(config.frame_ms);
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut key_frame: HashMap<KeyCode, u64> = HashMap::new();
    let mut shoot_cooldown: u32 = 0;
    let mut paused = false;
    let mut frame: u64 = 0;
    let mut last = Instant::now();

    loop {
        let frame_start = Instant::now();
        frame += 1;

        while let Ok(Event::Key(KeyEvent {
            code,
            kind,
            modifiers,
            ..
        })) = rx.try_recv()
        {
            match kind {
                KeyEventKind::Press => {
                    key_frame.insert(code.clone(), frame);
                    match code {
                        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => return Ok(()),
                        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                            return Ok(())
                        }
                        KeyCode::Char(' ') => paused = !paused,
                        _ => {}
                    }
                }
                KeyEventKind::Repeat => {
                    key_frame.insert(code.clone(), frame);
                }
                KeyEventKind::Release => {
                    key_frame.remove(&code);
                }
            }
        }

        // A paused frame is fed as a zero-length step so everything keeps
        // rendering without advancing.
        let elapsed = last.elapsed().as_secs_f32().min(MAX_FRAME_SECONDS);
        last = Instant::now();
        let dt = if paused || arena.status != ArenaStatus::Playing {
            0.0
        } else {
            elapsed
        };

        if dt > 0.0 {
            let mut direction = Vec2::ZERO;
            if is_held(&key_frame, &[KeyCode::Left, KeyCode::Char('a')], frame) {
                direction.x -= 1.0;
            }
            if is_held(&key_frame, &[KeyCode::Right, KeyCode::Char('d')], frame) {
                direction.x += 1.0;
            }
            if is_held(&key_frame, &[KeyCode::Up, KeyCode::Char('w')], frame) {
                direction.y += 1.0;
            }
            if is_held(&key_frame, &[KeyCode::Down, KeyCode::Char('s')], frame) {
                direction.y -= 1.0;
            }
            move_player(arena, direction, dt);
            if shoot_cooldown == 0 && is_held(&key_frame, &[KeyCode::Char('z')], frame) {
                player_shoot(arena);
                shoot_cooldown = SHOOT_COOLDOWN;
            }
            shoot_cooldown = shoot_cooldown.saturating_sub(1);
        }

        program.update(dt, arena);
        step_arena(arena, dt, &mut rng);

        let (cols, rows) = terminal::size()?;
        display::render(out, arena, Viewport { cols, rows }, paused)?;

        let spent = frame_start.elapsed();
        if spent < frame_time {
            thread::sleep(frame_time - spent);
        }
    }
}
