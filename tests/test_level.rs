use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use shmup_script::host::{Reward, RewardCondition, TextConfig, Tint};
use shmup_script::pattern::{compile_mnemonic, PackedPattern, PatternText};
use shmup_script::script::program::side_factor;
use shmup_script::script::{Instruction, MemberCode};
use shmup_script::trajectory::ActorState;
use shmup_script::{EngineConfig, EnemySpawn, LevelHost, LevelProgram, ScriptError, Side};

// ── Recording host ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Background(String),
    Text(TextConfig),
    Mode(i32, i32),
    Tint(Tint),
    Music(String, f32, f32),
    Fade(f32),
    Goal(String, i32),
    End,
}

/// Keeps every spawned enemy alive until `release` is called.
struct Recorder {
    spawns: Vec<EnemySpawn>,
    events: Vec<Event>,
}

impl Recorder {
    fn new() -> Self {
        Self {
            spawns: Vec::new(),
            events: Vec::new(),
        }
    }

    fn ended(&self) -> bool {
        self.events.contains(&Event::End)
    }

    fn texts(&self) -> usize {
        self.events.iter().filter(|e| matches!(e, Event::Text(_))).count()
    }

    /// Drops every enemy, reporting them all as removed.
    fn release(&mut self) {
        self.spawns.clear();
    }
}

impl LevelHost for Recorder {
    fn world_width(&self) -> f32 {
        320.0
    }
    fn world_height(&self) -> f32 {
        180.0
    }
    fn spawn_enemy(&mut self, spawn: EnemySpawn) {
        self.spawns.push(spawn);
    }
    fn set_background(&mut self, name: &str) {
        self.events.push(Event::Background(name.to_string()));
    }
    fn show_text(&mut self, text: &TextConfig) {
        self.events.push(Event::Text(text.clone()));
    }
    fn set_render_mode(&mut self, mode: i32, stage: i32) {
        self.events.push(Event::Mode(mode, stage));
    }
    fn set_tint(&mut self, tint: Tint) {
        self.events.push(Event::Tint(tint));
    }
    fn play_music(&mut self, path: &str, volume: f32, tempo: f32) {
        self.events.push(Event::Music(path.to_string(), volume, tempo));
    }
    fn fade_music_out(&mut self, seconds: f32) {
        self.events.push(Event::Fade(seconds));
    }
    fn report_goal(&mut self, kind: &str, count: i32) {
        self.events.push(Event::Goal(kind.to_string(), count));
    }
    fn on_sequence_end(&mut self) {
        self.events.push(Event::End);
    }
}

fn load(script: &str) -> LevelProgram {
    LevelProgram::with_rng(script, 120.0, StdRng::seed_from_u64(42)).expect("script loads")
}

fn load_err(script: &str) -> ScriptError {
    LevelProgram::with_rng(script, 120.0, StdRng::seed_from_u64(42))
        .err()
        .expect("script is rejected")
}

// ── Spawning ──────────────────────────────────────────────────────────────────

#[test]
fn spawn_group_spreads_members_over_its_window() {
    // Three plain enemies over three seconds, no reward, right edge at half height
    let mut program = load("spawn  3.0  AA AA AA  p0  right  0.5");
    let mut host = Recorder::new();

    let mut counts = Vec::new();
    for _ in 0..8 {
        program.update(0.5, &mut host);
        counts.push(host.spawns.len());
    }
    // First member at once, the others one second apart
    assert_eq!(counts, vec![1, 2, 2, 3, 3, 3, 3, 3]);

    for (i, spawn) in host.spawns.iter().enumerate() {
        assert_eq!(spawn.member, i);
        assert_eq!(spawn.enemy_type, 0);
        assert_eq!(spawn.hit_points, 1);
        assert_eq!(spawn.invincibility, 0.0);
        assert_eq!(spawn.side, Side::Right);
        assert_eq!(spawn.side_factor, 0.5);
        assert!(!spawn.is_boss);
        assert_eq!(spawn.origin(320.0, 180.0), Vec2::new(320.0, 90.0));
        assert_eq!(spawn.reward.on_defeat(), None);
    }
    assert_eq!(program.live_enemies(), 3);
    assert!(program.is_finished());
}

#[test]
fn second_code_without_a_pattern_is_its_own_member() {
    // "AA A" reads as two members, so they spawn 1.5 s apart
    let mut program = load("spawn  3.0  AA A  p0  right  0.5");
    let mut host = Recorder::new();
    let mut counts = Vec::new();
    for _ in 0..8 {
        program.update(0.5, &mut host);
        counts.push(host.spawns.len());
    }
    assert_eq!(counts, vec![1, 1, 2, 2, 2, 2, 2, 2]);
    assert_eq!(
        host.spawns[1].patterns.borrow().last_pattern(),
        Some(PackedPattern(0))
    );
}

#[test]
fn spawn_timing_does_not_depend_on_frame_size() {
    let mut program = load("spawn  3.0  AA AA AA  p0  right  0.5");
    let mut host = Recorder::new();
    program.update(3.0, &mut host);
    assert_eq!(host.spawns.len(), 3);
}

#[test]
fn spawn_after_a_wait_starts_on_time() {
    let mut program = load("wait  1.0\nspawn  3.0  A A A  p0  right  0.5");
    let mut host = Recorder::new();
    let mut counts = Vec::new();
    for _ in 0..4 {
        program.update(1.0, &mut host);
        counts.push(host.spawns.len());
    }
    assert_eq!(counts, vec![1, 2, 3, 3]);
}

#[test]
fn member_codes_carry_type_and_pattern() {
    // "AA A" is two members: one firing pattern A, one with no pattern
    let instruction = Instruction::parse("spawn  3.0  AA A  p0  right  0.5", 1).unwrap();
    let Instruction::Spawn(group) = instruction else {
        panic!("expected a spawn instruction");
    };
    assert_eq!(
        group.members,
        vec![
            MemberCode {
                letter: 'A',
                pattern: PatternText::Mnemonic("A".to_string())
            },
            MemberCode {
                letter: 'A',
                pattern: PatternText::Packed(PackedPattern(0))
            },
        ]
    );
    assert_eq!(MemberCode::parse("F123", 1).unwrap().enemy_type(), 5);
}

#[test]
fn members_start_with_their_own_pattern_and_stats() {
    let mut program = load("spawn  0  DB3 F1234  p0  left  0.3  boss");
    let mut host = Recorder::new();
    program.update(0.1, &mut host);
    assert_eq!(host.spawns.len(), 2);

    let d = &host.spawns[0];
    assert_eq!((d.hit_points, d.invincibility), (3, 1.0));
    assert_eq!(d.patterns.borrow().last_pattern(), Some(compile_mnemonic("B3")));

    let f = &host.spawns[1];
    assert_eq!(f.enemy_type, 5);
    assert_eq!((f.hit_points, f.invincibility), (50, 0.0));
    assert_eq!(f.patterns.borrow().last_pattern(), Some(PackedPattern(1234)));
    assert!(f.is_boss);

    // Every member gets a channel of its own
    d.patterns.borrow_mut().publish(PackedPattern(9));
    assert_eq!(f.patterns.borrow().last_pattern(), Some(PackedPattern(1234)));
}

#[test]
fn trajectory_uses_the_world_size() {
    let mut program = load("spawn  0  A  p0  right  0.5  for 1  move 0 0.5");
    let mut host = Recorder::new();
    program.update(0.1, &mut host);

    let spawn = &mut host.spawns[0];
    let mut actor = ActorState::at(spawn.origin(320.0, 180.0));
    spawn.trajectory.update(&mut actor, 2.0);
    assert_eq!(actor.position, Vec2::new(0.0, 90.0));
}

#[test]
fn released_enemies_leave_the_live_count() {
    let mut program = load("spawn  0  A A  p0  right  0.5");
    let mut host = Recorder::new();
    program.update(0.1, &mut host);
    assert_eq!(program.live_enemies(), 2);
    host.spawns.pop();
    assert_eq!(program.live_enemies(), 1);
    host.release();
    assert_eq!(program.live_enemies(), 0);
}

#[test]
fn group_shares_one_reward_counter() {
    let mut program = load("spawn  0  A A A  sall  right  0.5");
    let mut host = Recorder::new();
    program.update(0.1, &mut host);
    let rewards: Vec<_> = host.spawns.iter().map(|s| s.reward.on_defeat()).collect();
    assert_eq!(rewards, vec![None, None, Some('s')]);
}

// ── Repeat ────────────────────────────────────────────────────────────────────

#[test]
fn repeat_restarts_the_group_until_its_total() {
    // Window 1 + gap 1: groups at t = 0, 2 and 4; the one starting past 3 still runs
    let mut program = load("repeat  1.0  3.0  1.0  A A  p0  top  0.2 0.8");
    let mut host = Recorder::new();

    program.update(0.25, &mut host);
    assert_eq!(host.spawns.len(), 1);

    for _ in 0..27 {
        program.update(0.25, &mut host);
    }
    let factors: Vec<f32> = host.spawns.iter().map(|s| s.side_factor).collect();
    assert_eq!(factors, vec![0.2, 0.8, 0.2, 0.8, 0.2, 0.8]);
    assert_eq!(host.spawns[0].side, Side::Top);
    assert_eq!(host.spawns[0].origin(320.0, 180.0), Vec2::new(64.0, 180.0));
    assert_eq!(program.active_schedulers(), 0);
}

// ── Waiting ───────────────────────────────────────────────────────────────────

#[test]
fn wait_delays_the_next_instruction() {
    let mut program = load("wait  2.0\nend");
    let mut host = Recorder::new();
    program.update(1.0, &mut host);
    assert!(!host.ended());
    program.update(1.0, &mut host);
    assert!(host.ended());

    let mut program = load("wait  2.0\nend");
    let mut host = Recorder::new();
    program.update(3.0, &mut host);
    assert!(host.ended());
}

#[test]
fn paused_frames_change_nothing() {
    let mut program = load("end");
    let mut host = Recorder::new();
    for _ in 0..5 {
        program.update(0.0, &mut host);
    }
    program.update(-1.0, &mut host);
    assert!(!host.ended());
    assert_eq!(program.clock(), 0.0);

    program.update(0.01, &mut host);
    assert!(host.ended());
}

#[test]
fn waitdefeated_holds_while_enemies_live() {
    let mut program = load("spawn  0  A  p0  right  0.5\nwaitdefeated  5.0\ntext  Hello  0.5  0.5");
    let mut host = Recorder::new();

    for _ in 0..100 {
        program.update(0.5, &mut host);
    }
    assert_eq!(host.spawns.len(), 1);
    assert!(program.is_waiting_for_clear());
    assert_eq!(host.texts(), 0);

    // Cleared at t = 50.5: resume on the next multiple of 5
    host.release();
    program.update(0.5, &mut host);
    assert!(!program.is_waiting_for_clear());
    program.update(4.0, &mut host);
    assert_eq!(host.texts(), 0);
    program.update(0.5, &mut host);
    assert_eq!(host.texts(), 1);
}

#[test]
fn waitdefeated_with_nothing_alive_resumes_next_frame() {
    let mut program = load("waitdefeated  0\nend");
    let mut host = Recorder::new();
    program.update(0.1, &mut host);
    assert!(!host.ended());
    program.update(0.1, &mut host);
    assert!(host.ended());
}

#[test]
fn schedulers_keep_running_while_waiting_for_clear() {
    let mut program = load("spawn  2.0  A A  p0  right  0.5\nwaitdefeated  1\nend");
    let mut host = Recorder::new();
    program.update(0.5, &mut host);
    assert_eq!(host.spawns.len(), 1);
    program.update(1.0, &mut host);
    assert_eq!(host.spawns.len(), 2);
    assert!(!host.ended());
}

// ── Flow control ──────────────────────────────────────────────────────────────

#[test]
fn goto_skips_ahead() {
    let mut program = load("goto  3\ntext  skipped  0  0\nend");
    let mut host = Recorder::new();
    program.update(0.1, &mut host);
    assert_eq!(host.texts(), 0);
    assert!(host.ended());
}

#[test]
fn goto_leaves_running_groups_alone() {
    let mut program = load("spawn  2.0  A A  p0  right  0.5\ngoto  4\nwait  100\nend");
    let mut host = Recorder::new();
    program.update(0.5, &mut host);
    assert!(host.ended());
    program.update(1.0, &mut host);
    assert_eq!(host.spawns.len(), 2);
}

// ── Presentation callbacks ────────────────────────────────────────────────────

#[test]
fn presentation_instructions_reach_the_host_in_order() {
    let script = "setting  ruins\nmode  2  1\ntint  1  0.5  0.25\ngoal  kill  40\ntext  GET READY\\GO  0.5  0.4";
    let mut program = load(script);
    let mut host = Recorder::new();
    program.update(0.1, &mut host);
    assert_eq!(
        host.events,
        vec![
            Event::Background("ruins".to_string()),
            Event::Mode(2, 1),
            Event::Tint(Tint { r: 1.0, g: 0.5, b: 0.25 }),
            Event::Goal("kill".to_string(), 40),
            Event::Text(TextConfig {
                lines: vec!["GET READY".to_string(), "GO".to_string()],
                x: 0.5,
                y: 0.4,
            }),
        ]
    );
}

#[test]
fn music_sets_the_tempo() {
    let mut program = load("music  play  song.ogg  0.8  140\nmusic  play  bad.ogg  1  0\nmusic  fade  2.5");
    let mut host = Recorder::new();
    program.update(0.1, &mut host);
    assert_eq!(program.tempo(), 140.0);
    assert_eq!(
        host.events,
        vec![
            Event::Music("song.ogg".to_string(), 0.8, 140.0),
            Event::Music("bad.ogg".to_string(), 1.0, 140.0),
            Event::Fade(2.5),
        ]
    );
}

#[test]
fn music_without_tempo_uses_the_default() {
    let mut program = load("music  play  intro.ogg  1");
    let mut host = Recorder::new();
    program.update(0.1, &mut host);
    assert_eq!(program.tempo(), 120.0);
}

#[test]
fn beats_follow_the_current_tempo() {
    // One beat at 60 bpm is a second
    let mut program = load("music  play  slow.ogg  1  60\nwait  b1\nend");
    let mut host = Recorder::new();
    program.update(0.5, &mut host);
    assert!(!host.ended());
    program.update(0.5, &mut host);
    assert!(host.ended());
}

// ── Loading ───────────────────────────────────────────────────────────────────

#[test]
fn short_instruction_is_rejected_with_its_line() {
    let err = load_err("# intro\nspawn  3.0  A");
    assert_eq!(
        err,
        ScriptError::MissingField {
            line: 2,
            keyword: "spawn".to_string(),
            expected: 5,
            found: 2,
        }
    );
}

#[test]
fn malformed_fields_are_rejected() {
    assert_eq!(
        load_err("wait  soon"),
        ScriptError::Number {
            line: 1,
            text: "soon".to_string()
        }
    );
    assert!(matches!(load_err("goto  x"), ScriptError::Number { .. }));
    assert!(matches!(
        load_err("spawn  1  a  p0  right  0.5"),
        ScriptError::MemberCode { line: 1, .. }
    ));
    assert_eq!(
        load_err("\n\nspawn  1  A  p0  right  0.5  (  lin left 5"),
        ScriptError::UnbalancedNesting { line: 3, open: 1 }
    );
}

#[test]
fn unknown_keywords_are_comments() {
    let program = load("dance  wildly\nmusic  scratch\nend");
    assert_eq!(program.instructions()[0], Instruction::Comment);
    assert_eq!(program.instructions()[1], Instruction::Comment);
    assert_eq!(program.instructions()[2], Instruction::End);
}

#[test]
fn seeded_config_makes_random_fields_repeatable() {
    let config = EngineConfig {
        seed: Some(7),
        ..EngineConfig::default()
    };
    let script = "spawn  0  A  p0  right  R0-1";
    let factor = |_: ()| {
        let mut program = LevelProgram::load(script, &config).unwrap();
        let mut host = Recorder::new();
        program.update(0.1, &mut host);
        host.spawns[0].side_factor
    };
    let first = factor(());
    assert_eq!(first, factor(()));
    assert!((0.0..1.0).contains(&first));
}

// ── Side factors & rewards ────────────────────────────────────────────────────

#[test]
fn side_factor_blends_between_declared_points() {
    let spread: Vec<f32> = (0..5).map(|i| side_factor(&[0.0, 1.0], i, 5)).collect();
    assert_eq!(spread, vec![0.0, 0.25, 0.5, 0.75, 1.0]);

    let vee: Vec<f32> = (0..5).map(|i| side_factor(&[0.0, 1.0, 0.0], i, 5)).collect();
    assert_eq!(vee, vec![0.0, 0.5, 1.0, 0.5, 0.0]);

    assert_eq!(side_factor(&[0.3], 4, 5), 0.3);
    assert_eq!(side_factor(&[], 0, 3), 0.5);
    assert_eq!(side_factor(&[0.2, 0.9], 0, 1), 0.2);
}

#[test]
fn reward_conditions_parse() {
    let parse = |t: &str| Reward::parse(t).map(|r| r.condition);
    assert_eq!(parse("pall"), Some(RewardCondition::All));
    assert_eq!(parse("peach"), Some(RewardCondition::Each));
    assert_eq!(parse("p3"), Some(RewardCondition::Count(3)));
    assert_eq!(parse("p0"), Some(RewardCondition::Never));
    assert_eq!(parse("pnone"), Some(RewardCondition::Never));
    // The whole field written as `none`
    assert_eq!(parse("none"), Some(RewardCondition::Never));
    assert_eq!(parse("p"), Some(RewardCondition::Never));
    assert_eq!(parse("pmany"), None);
    assert_eq!(parse(""), None);
}

#[test]
fn spawn_without_reward_loads() {
    let mut program = load("spawn  1.0  AA  none  right  0.5");
    let mut host = Recorder::new();
    program.update(0.1, &mut host);
    assert_eq!(host.spawns.len(), 1);
    assert_eq!(host.spawns[0].reward.on_defeat(), None);
}

#[test]
fn reward_counters_pay_out_per_condition() {
    let defeats = |text: &str, members: usize, n: usize| {
        let counter = Reward::parse(text).unwrap().counter(members);
        (0..n).map(|_| counter.on_defeat()).collect::<Vec<_>>()
    };
    assert_eq!(defeats("xeach", 3, 3), vec![Some('x'); 3]);
    assert_eq!(defeats("x2", 3, 3), vec![None, Some('x'), Some('x')]);
    // Clamped to the group size
    assert_eq!(defeats("x5", 2, 2), vec![None, Some('x')]);
    assert_eq!(defeats("xnever", 2, 4), vec![None; 4]);
}
