use glam::Vec2;

use shmup_script::compute::init_arena;
use shmup_script::entities::*;
use shmup_script::host::{TextConfig, Tint};
use shmup_script::EngineConfig;

#[test]
fn entity_enums_compare() {
    // Enums derive PartialEq — equality comparisons must work
    assert_eq!(ArenaStatus::Playing, ArenaStatus::Playing);
    assert_ne!(ArenaStatus::Playing, ArenaStatus::SequenceEnded);
    assert_ne!(ArenaStatus::SequenceEnded, ArenaStatus::GameOver);
    assert_eq!(ShotOwner::Player, ShotOwner::Player);
    assert_ne!(ShotOwner::Player, ShotOwner::Enemy);
}

#[test]
fn presentation_starts_blank() {
    let p = Presentation::default();
    assert!(p.background.is_empty());
    assert_eq!(p.text, None);
    assert_eq!(p.tint, None);
    assert_eq!(p.render_mode, (0, 0));
    assert_eq!(p.music, None);
    assert_eq!(p.goal, None);
}

#[test]
fn presentation_clone_is_independent() {
    let mut original = Presentation::default();
    original.text = Some(TextConfig {
        lines: vec!["READY".to_string()],
        x: 0.5,
        y: 0.5,
    });
    let mut cloned = original.clone();

    // Mutating the clone must not affect the original
    cloned.background = "caves".to_string();
    cloned.tint = Some(Tint { r: 1.0, g: 0.0, b: 0.0 });
    if let Some(text) = cloned.text.as_mut() {
        text.lines.push("GO".to_string());
    }

    assert!(original.background.is_empty());
    assert_eq!(original.tint, None);
    assert_eq!(original.text.map(|t| t.lines.len()), Some(1));
}

#[test]
fn arena_follows_config_dimensions() {
    let config = EngineConfig {
        world_width: 640.0,
        world_height: 360.0,
        offscreen_grace: 2.0,
        ..EngineConfig::default()
    };
    let a = init_arena(&config);
    assert_eq!((a.width, a.height), (640.0, 360.0));
    assert_eq!(a.offscreen_grace, 2.0);
    assert!(a.player.position.x < a.width / 2.0);
}

#[test]
fn pickup_equality() {
    let a = Pickup {
        position: Vec2::new(1.0, 2.0),
        kind: 'x',
    };
    assert_eq!(a.clone(), a);
    assert_ne!(
        a,
        Pickup {
            position: Vec2::new(1.0, 2.0),
            kind: 'y'
        }
    );
}
