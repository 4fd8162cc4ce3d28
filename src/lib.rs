//! Quest Lang: a line-oriented scripting language about recruiting variables,
//! going on quests and rolling dice with the gold earned along the way.

pub mod config;
pub mod dice;
pub mod error;
pub mod expression;
pub mod interpreter;
pub mod lexer;
pub mod quest;
pub mod scope;
pub mod token;
pub mod value;

pub use config::Config;
pub use error::QuestError;
pub use interpreter::{Interpreter, InterpreterMode};
pub use lexer::{tokenize_line, Lexer};
pub use token::{Kind, Token};
pub use value::Value;
