/// Rendering layer — all terminal I/O lives here.
///
/// Each function receives a mutable writer and an immutable view of the
/// arena.  World coordinates (y-up) are mapped onto the terminal's play area
/// inside the border; nothing here changes game state.

use std::io::Write;

use crossterm::{
    cursor,
    style::{self, Color, Print},
    terminal,
    QueueableCommand,
};
use glam::Vec2;
use shmup_script::entities::{Arena, ArenaStatus, Enemy, Pickup, Shot, ShotOwner};
use shmup_script::pattern::runtime::BOMB_TEXTURE_THRESHOLD;

// ── Colour palette ────────────────────────────────────────────────────────────

const C_BORDER: Color = Color::DarkBlue;
const C_HUD_SCORE: Color = Color::Yellow;
const C_HUD_LIVES: Color = Color::Red;
const C_HUD_INFO: Color = Color::Cyan;
const C_PLAYER: Color = Color::White;
const C_ENEMY: Color = Color::Green;
const C_ENEMY_TOUGH: Color = Color::Red;
const C_BOSS: Color = Color::Magenta;
const C_SHOT_PLAYER: Color = Color::Cyan;
const C_SHOT_ENEMY: Color = Color::Magenta;
const C_BOMB: Color = Color::Red;
const C_PICKUP: Color = Color::Yellow;
const C_TEXT: Color = Color::White;
const C_HINT: Color = Color::DarkGrey;

/// Terminal cells available for the arena and how world units map onto them.
#[derive(Clone, Copy, Debug)]
pub struct Viewport {
    pub cols: u16,
    pub rows: u16,
}

impl Viewport {
    /// Cell for a world position, or `None` outside the play area.
    fn cell(&self, arena: &Arena, position: Vec2) -> Option<(u16, u16)> {
        let inner_w = self.cols.saturating_sub(3) as f32;
        let inner_h = self.rows.saturating_sub(5) as f32;
        let fx = position.x / arena.width;
        let fy = 1.0 - position.y / arena.height;
        if !(0.0..=1.0).contains(&fx) || !(0.0..=1.0).contains(&fy) {
            return None;
        }
        Some((1 + (fx * inner_w) as u16, 2 + (fy * inner_h) as u16))
    }
}

// ── Public entry point ────────────────────────────────────────────────────────

/// Render one complete frame.
pub fn render<W: Write>(
    out: &mut W,
    arena: &Arena,
    view: Viewport,
    paused: bool,
) -> std::io::Result<()> {
    out.queue(terminal::Clear(terminal::ClearType::All))?;

    draw_border(out, view)?;
    draw_hud(out, arena, view)?;

    for pickup in &arena.pickups {
        draw_pickup(out, arena, view, pickup)?;
    }
    for enemy in &arena.enemies {
        draw_enemy(out, arena, view, enemy)?;
    }
    for shot in &arena.shots {
        draw_shot(out, arena, view, shot)?;
    }
    draw_player(out, arena, view)?;
    draw_script_text(out, arena, view)?;
    draw_controls_hint(out, view)?;

    match arena.status {
        ArenaStatus::GameOver => draw_banner(out, view, "GAME  OVER", Color::Red)?,
        ArenaStatus::SequenceEnded => draw_banner(out, view, "LEVEL COMPLETE", Color::Green)?,
        ArenaStatus::Playing if paused => draw_banner(out, view, "PAUSED", Color::Yellow)?,
        ArenaStatus::Playing => {}
    }

    out.queue(style::ResetColor)?;
    out.queue(cursor::MoveTo(0, view.rows.saturating_sub(1)))?;
    out.flush()?;
    Ok(())
}

// ── Border & HUD ──────────────────────────────────────────────────────────────

fn draw_border<W: Write>(out: &mut W, view: Viewport) -> std::io::Result<()> {
    let w = view.cols as usize;
    let h = view.rows;

    out.queue(style::SetForegroundColor(C_BORDER))?;
    out.queue(cursor::MoveTo(0, 1))?;
    out.queue(Print(format!("┌{}┐", "─".repeat(w.saturating_sub(2)))))?;
    out.queue(cursor::MoveTo(0, h.saturating_sub(2)))?;
    out.queue(Print(format!("└{}┘", "─".repeat(w.saturating_sub(2)))))?;
    for row in 2..h.saturating_sub(2) {
        out.queue(cursor::MoveTo(0, row))?;
        out.queue(Print("│"))?;
        out.queue(cursor::MoveTo(view.cols.saturating_sub(1), row))?;
        out.queue(Print("│"))?;
    }
    Ok(())
}

fn draw_hud<W: Write>(out: &mut W, arena: &Arena, view: Viewport) -> std::io::Result<()> {
    out.queue(cursor::MoveTo(1, 0))?;
    out.queue(style::SetForegroundColor(C_HUD_SCORE))?;
    out.queue(Print(format!("Score:{:>6}", arena.score)))?;

    let p = &arena.presentation;
    let mut info = format!("[ {} ] {:.0} bpm", p.background, arena.tempo);
    if let Some((kind, count)) = &p.goal {
        info.push_str(&format!("  goal: {kind} {count}"));
    }
    let ix = (view.cols / 2).saturating_sub(info.chars().count() as u16 / 2);
    out.queue(cursor::MoveTo(ix, 0))?;
    out.queue(style::SetForegroundColor(C_HUD_INFO))?;
    out.queue(Print(&info))?;

    let lives = format!("Lives:{}", "♥".repeat(arena.player.lives as usize));
    let lx = view.cols.saturating_sub(lives.chars().count() as u16 + 1);
    out.queue(cursor::MoveTo(lx, 0))?;
    out.queue(style::SetForegroundColor(C_HUD_LIVES))?;
    out.queue(Print(&lives))?;
    Ok(())
}

// ── Entities ──────────────────────────────────────────────────────────────────

fn draw_player<W: Write>(out: &mut W, arena: &Arena, view: Viewport) -> std::io::Result<()> {
    let Some((x, y)) = view.cell(arena, arena.player.position) else {
        return Ok(());
    };
    // Blink while recovering from a hit.
    if arena.player.recovering > 0.0 && arena.frame % 4 < 2 {
        return Ok(());
    }
    out.queue(cursor::MoveTo(x, y))?;
    out.queue(style::SetForegroundColor(C_PLAYER))?;
    out.queue(Print("►"))?;
    Ok(())
}

fn draw_enemy<W: Write>(
    out: &mut W,
    arena: &Arena,
    view: Viewport,
    enemy: &Enemy,
) -> std::io::Result<()> {
    let Some((x, y)) = view.cell(arena, enemy.position()) else {
        return Ok(());
    };
    let (sprite, color) = if enemy.is_boss {
        ("«█»", C_BOSS)
    } else if enemy.initial_hit_points > 1 {
        ("(◎)", C_ENEMY_TOUGH)
    } else {
        ("«◄", C_ENEMY)
    };
    out.queue(cursor::MoveTo(x.saturating_sub(1).max(1), y))?;
    out.queue(style::SetForegroundColor(color))?;
    out.queue(Print(sprite))?;
    Ok(())
}

fn draw_shot<W: Write>(out: &mut W, arena: &Arena, view: Viewport, shot: &Shot) -> std::io::Result<()> {
    let Some((x, y)) = view.cell(arena, shot.position) else {
        return Ok(());
    };
    let (glyph, color) = match shot.owner {
        ShotOwner::Player => ("─", C_SHOT_PLAYER),
        ShotOwner::Enemy if shot.texture > BOMB_TEXTURE_THRESHOLD => ("✱", C_BOMB),
        ShotOwner::Enemy if shot.alpha < 1.0 => ("∘", C_SHOT_ENEMY),
        ShotOwner::Enemy => ("•", C_SHOT_ENEMY),
    };
    out.queue(cursor::MoveTo(x, y))?;
    out.queue(style::SetForegroundColor(color))?;
    out.queue(Print(glyph))?;
    Ok(())
}

fn draw_pickup<W: Write>(
    out: &mut W,
    arena: &Arena,
    view: Viewport,
    pickup: &Pickup,
) -> std::io::Result<()> {
    let Some((x, y)) = view.cell(arena, pickup.position) else {
        return Ok(());
    };
    out.queue(cursor::MoveTo(x, y))?;
    out.queue(style::SetForegroundColor(C_PICKUP))?;
    out.queue(Print(pickup.kind))?;
    Ok(())
}

// ── Script text & overlays ────────────────────────────────────────────────────

fn draw_script_text<W: Write>(out: &mut W, arena: &Arena, view: Viewport) -> std::io::Result<()> {
    let Some(text) = &arena.presentation.text else {
        return Ok(());
    };
    let anchor = Vec2::new(text.x * arena.width, text.y * arena.height);
    let Some((x, y)) = view.cell(arena, anchor) else {
        return Ok(());
    };
    out.queue(style::SetForegroundColor(C_TEXT))?;
    for (i, line) in text.lines.iter().enumerate() {
        out.queue(cursor::MoveTo(x, y + i as u16))?;
        out.queue(Print(line))?;
    }
    Ok(())
}

fn draw_controls_hint<W: Write>(out: &mut W, view: Viewport) -> std::io::Result<()> {
    out.queue(cursor::MoveTo(1, view.rows.saturating_sub(1)))?;
    out.queue(style::SetForegroundColor(C_HINT))?;
    out.queue(Print("←↑↓→ / WASD : Move   Z : Shoot   SPACE : Pause   Q : Quit"))?;
    Ok(())
}

fn draw_banner<W: Write>(out: &mut W, view: Viewport, message: &str, color: Color) -> std::io::Result<()> {
    let width = message.chars().count() + 8;
    let lines = [
        format!("╔{}╗", "═".repeat(width)),
        format!("║    {message}    ║"),
        format!("╚{}╝", "═".repeat(width)),
    ];
    let cx = view.cols / 2;
    let start_row = (view.rows / 2).saturating_sub(1);
    out.queue(style::SetForegroundColor(color))?;
    for (i, line) in lines.iter().enumerate() {
        let col = cx.saturating_sub(line.chars().count() as u16 / 2);
        out.queue(cursor::MoveTo(col, start_row + i as u16))?;
        out.queue(Print(line))?;
    }
    Ok(())
}
