//! Level scripts: numeric fields, line parsing and the interpreter.

pub mod instruction;
pub mod number;
pub mod program;

pub use instruction::{Instruction, MemberCode, SpawnGroupSource};
pub use number::Number;
pub use program::LevelProgram;
