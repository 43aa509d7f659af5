//! Packed pattern wire format and the mnemonic compiler.
//!
//! A pattern travels as a decimal integer whose digits are positional fields
//! (least significant first).  Internally it is an array of single digits
//! plus an open-ended texture index, so fields can be addressed by name.

use std::fmt;

use tracing::trace;

// ── Fields ────────────────────────────────────────────────────────────────────

/// Number of single-digit fields below the texture index.
pub const DIGIT_FIELDS: usize = 10;

/// Decimal place of the first texture digit.
const TEXTURE_PLACE: u32 = DIGIT_FIELDS as u32;

/// Semantic fields of a packed pattern, in wire order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    /// Shots per burst; 0 never fires.
    Shots,
    InitialDelay,
    Period,
    Speed,
    /// Spread arc, 0 = all shots on one heading, 9 = full circle.
    Spread,
    /// Delay between the shots of one burst.
    BurstSpacing,
    HomingSpeed,
    HomingStart,
    /// 0 = homing never expires.
    HomingDuration,
    TimeToLive,
    /// Remaining high digits.
    Texture,
}

impl Field {
    fn digit_index(self) -> Option<usize> {
        match self {
            Field::Shots => Some(0),
            Field::InitialDelay => Some(1),
            Field::Period => Some(2),
            Field::Speed => Some(3),
            Field::Spread => Some(4),
            Field::BurstSpacing => Some(5),
            Field::HomingSpeed => Some(6),
            Field::HomingStart => Some(7),
            Field::HomingDuration => Some(8),
            Field::TimeToLive => Some(9),
            Field::Texture => None,
        }
    }
}

/// The packed integer exchanged between scripts and runtime patterns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackedPattern(pub u64);

impl fmt::Display for PackedPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unpacked, directly indexable form of a [`PackedPattern`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PatternFields {
    digits: [u8; DIGIT_FIELDS],
    texture: u64,
}

impl PatternFields {
    pub fn new(digits: [u8; DIGIT_FIELDS], texture: u64) -> Self {
        let mut digits = digits;
        for d in &mut digits {
            *d = (*d).min(9);
        }
        Self { digits, texture }
    }

    pub fn unpack(packed: PackedPattern) -> Self {
        let mut remaining = packed.0;
        let mut digits = [0u8; DIGIT_FIELDS];
        for d in &mut digits {
            *d = (remaining % 10) as u8;
            remaining /= 10;
        }
        Self {
            digits,
            texture: remaining,
        }
    }

    /// Packs back to the wire integer, saturating if the texture index is
    /// too large to fit.
    pub fn pack(&self) -> PackedPattern {
        let mut value = self
            .texture
            .saturating_mul(10u64.pow(TEXTURE_PLACE));
        let mut place = 1u64;
        for &d in &self.digits {
            value = value.saturating_add(d as u64 * place);
            place *= 10;
        }
        PackedPattern(value)
    }

    pub fn get(&self, field: Field) -> u64 {
        match field.digit_index() {
            Some(i) => self.digits[i] as u64,
            None => self.texture,
        }
    }

    pub fn digit(&self, field: Field) -> u8 {
        match field.digit_index() {
            Some(i) => self.digits[i],
            None => (self.texture % 10) as u8,
        }
    }

    pub fn texture(&self) -> u64 {
        self.texture
    }

    pub fn set(&mut self, field: Field, value: u64) {
        match field.digit_index() {
            Some(i) => self.digits[i] = value.min(9) as u8,
            None => self.texture = value,
        }
    }

    pub fn apply(&mut self, edit: &FieldEdit) {
        let current = self.get(edit.field);
        let max = if edit.field == Field::Texture { u64::MAX } else { 9 };
        let next = match edit.op {
            EditOp::Set(v) => v,
            EditOp::Increment => current.saturating_add(1).min(max),
            EditOp::Decrement => current.saturating_sub(1),
        };
        self.set(edit.field, next);
    }
}

impl From<PackedPattern> for PatternFields {
    fn from(packed: PackedPattern) -> Self {
        PatternFields::unpack(packed)
    }
}

impl From<PatternFields> for PackedPattern {
    fn from(fields: PatternFields) -> Self {
        fields.pack()
    }
}

// ── Mnemonic tables ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditOp {
    Set(u64),
    /// Saturates at 9.
    Increment,
    /// Saturates at 0.
    Decrement,
}

/// One rewrite of one field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldEdit {
    pub field: Field,
    pub op: EditOp,
}

impl FieldEdit {
    const fn set(field: Field, value: u64) -> Self {
        Self { field, op: EditOp::Set(value) }
    }
    const fn inc(field: Field) -> Self {
        Self { field, op: EditOp::Increment }
    }
    const fn dec(field: Field) -> Self {
        Self { field, op: EditOp::Decrement }
    }
}

/// Baseline configurations selected by the first letter of a mnemonic.
/// Digits are listed in wire order: shots, initial delay, period, speed,
/// spread, burst spacing, homing speed, homing start, homing duration, ttl.
const BASES: &[(char, [u8; DIGIT_FIELDS], u64)] = &[
    ('A', [0, 0, 0, 0, 0, 0, 0, 0, 0, 0], 0), // does not shoot
    ('B', [1, 4, 9, 2, 0, 0, 0, 1, 1, 9], 0), // slowly at the player
    ('C', [1, 4, 9, 2, 0, 0, 0, 0, 0, 9], 0), // slowly forward
    ('D', [1, 1, 7, 4, 0, 0, 0, 1, 1, 9], 0), // faster at the player
    ('E', [1, 1, 7, 2, 0, 0, 2, 1, 1, 9], 0), // slow, short homing
    ('F', [1, 1, 7, 3, 0, 0, 3, 9, 3, 9], 0), // late, longer homing
    ('G', [1, 1, 7, 4, 0, 0, 3, 1, 3, 9], 0), // faster, longer homing
    ('H', [1, 5, 5, 5, 0, 0, 0, 0, 0, 1], 0), // quick short spree forward
    ('J', [5, 5, 7, 5, 1, 0, 9, 9, 9, 0], 0),
    ('K', [1, 0, 3, 5, 0, 0, 9, 1, 1, 9], 0), // quick long spree at the player
    ('L', [1, 5, 0, 9, 0, 0, 0, 0, 0, 3], 2), // slow laser along movement
    ('S', [1, 5, 0, 2, 0, 0, 0, 0, 0, 3], 3), // cloud of steam
    ('Z', [1, 5, 9, 1, 0, 0, 0, 0, 0, 3], 2),
];

const MODIFIERS: &[(char, &[FieldEdit])] = &[
    ('2', &[FieldEdit::set(Field::Shots, 2)]),
    ('3', &[FieldEdit::set(Field::Shots, 3)]),
    ('4', &[FieldEdit::set(Field::Shots, 4)]),
    ('5', &[FieldEdit::set(Field::Shots, 5)]),
    ('6', &[FieldEdit::set(Field::Shots, 6)]),
    ('7', &[FieldEdit::set(Field::Shots, 7)]),
    ('8', &[FieldEdit::set(Field::Shots, 8)]),
    ('9', &[FieldEdit::set(Field::Shots, 9)]),
    ('F', &[FieldEdit::dec(Field::Period)]),        // faster
    ('G', &[FieldEdit::inc(Field::Period)]),        // grubby
    ('D', &[FieldEdit::set(Field::InitialDelay, 0)]), // don't wait
    ('S', &[FieldEdit::set(Field::Spread, 2)]),
    ('W', &[FieldEdit::set(Field::Spread, 5)]),
    ('R', &[FieldEdit::set(Field::Spread, 9)]),     // round
    ('Q', &[FieldEdit::set(Field::BurstSpacing, 5)]), // queued over half a period
    ('T', &[FieldEdit::set(Field::BurstSpacing, 9)]), // queued over the full period
    (
        'H',
        &[
            FieldEdit::set(Field::HomingStart, 1),
            FieldEdit::set(Field::HomingDuration, 1),
        ],
    ),
    ('L', &[FieldEdit::dec(Field::HomingDuration)]),
    ('N', &[FieldEdit::set(Field::TimeToLive, 9)]), // neverending
    ('M', &[FieldEdit::dec(Field::TimeToLive)]),
    ('K', &[FieldEdit::inc(Field::Speed)]),
    ('P', &[FieldEdit::dec(Field::Speed)]),
    ('B', &[FieldEdit::set(Field::Texture, 128)]), // bombs
    ('Z', &[FieldEdit::set(Field::Texture, 129)]), // shield of bombs around the emitter
    ('X', &[FieldEdit::set(Field::Texture, 130)]), // circle of bombs
];

/// Baseline fields for a mnemonic's first letter; unknown letters never fire.
pub fn base_fields(c: char) -> PatternFields {
    BASES
        .iter()
        .find(|(letter, _, _)| *letter == c)
        .map(|(_, digits, texture)| PatternFields::new(*digits, *texture))
        .unwrap_or_default()
}

/// Edits applied by a modifier character, if it is one.
pub fn modifier_edits(c: char) -> Option<&'static [FieldEdit]> {
    MODIFIERS
        .iter()
        .find(|(letter, _)| *letter == c)
        .map(|(_, edits)| *edits)
}

/// Compile a mnemonic such as `"D3SF"` into its fields.
///
/// The first character picks a baseline, every following character edits it
/// in order.  Unknown modifier characters are ignored.
pub fn compile_fields(mnemonic: &str) -> PatternFields {
    let mut chars = mnemonic.chars();
    let mut fields = match chars.next() {
        Some(c) => base_fields(c),
        None => return PatternFields::default(),
    };
    for c in chars {
        match modifier_edits(c) {
            Some(edits) => {
                for edit in edits {
                    fields.apply(edit);
                }
            }
            None => trace!(modifier = %c, mnemonic, "unknown pattern modifier ignored"),
        }
    }
    fields
}

pub fn compile_mnemonic(mnemonic: &str) -> PackedPattern {
    compile_fields(mnemonic).pack()
}

// ── Pattern text ──────────────────────────────────────────────────────────────

/// Pattern as written in a script: either a mnemonic or a literal integer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatternText {
    Mnemonic(String),
    Packed(PackedPattern),
}

impl PatternText {
    /// Auto-detects the form by whether the first character is a letter.
    /// Empty text is the pattern that never fires.
    pub fn parse(text: &str) -> Option<Self> {
        match text.chars().next() {
            None => Some(PatternText::Packed(PackedPattern(0))),
            Some(c) if c.is_alphabetic() => Some(PatternText::Mnemonic(text.to_string())),
            Some(_) => text.parse().ok().map(|v| PatternText::Packed(PackedPattern(v))),
        }
    }

    pub fn packed(&self) -> PackedPattern {
        match self {
            PatternText::Mnemonic(m) => compile_mnemonic(m),
            PatternText::Packed(p) => *p,
        }
    }
}
