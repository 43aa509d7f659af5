//! Shooting patterns: the packed wire format, the mnemonic compiler and the
//! decoder producing runtime behaviour.

pub mod codec;
pub mod runtime;

pub use codec::{compile_mnemonic, Field, PackedPattern, PatternFields, PatternText};
pub use runtime::{Emitter, RuntimePattern, ShotMotion, ShotSpec};
