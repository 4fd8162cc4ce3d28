use crate::token::Token;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::error::Error;

#[derive(Debug)]
pub enum QuestError {
    FileNotFound(String),
    IO(io::Error),
    Lexing(LexingError),
    Syntax(SyntaxError),
    Evaluation(EvaluationError),
    Arity(ArityError),
}

impl Error for QuestError {}

impl fmt::Display for QuestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QuestError::IO(err) => write!(f, "IOError: {}", err),
            QuestError::FileNotFound(err) => write!(f, "FileNotFoundError: {}", err),
            QuestError::Lexing(err) => write!(f, "{}", err),
            QuestError::Syntax(err) => write!(f, "{}", err),
            QuestError::Evaluation(err) => write!(f, "{}", err),
            QuestError::Arity(err) => write!(f, "{}", err),
        }
    }
}

impl From<io::Error> for QuestError {
    fn from(err: io::Error) -> Self {
        QuestError::IO(err)
    }
}

impl From<LexingError> for QuestError {
    fn from(err: LexingError) -> Self {
        QuestError::Lexing(err)
    }
}

impl From<SyntaxError> for QuestError {
    fn from(err: SyntaxError) -> Self {
        QuestError::Syntax(err)
    }
}

impl From<EvaluationError> for QuestError {
    fn from(err: EvaluationError) -> Self {
        QuestError::Evaluation(err)
    }
}

impl From<ArityError> for QuestError {
    fn from(err: ArityError) -> Self {
        QuestError::Arity(err)
    }
}

#[derive(Debug)]
pub struct LexingError {
    pub(crate) path: PathBuf,
    pub(crate) message: String,
    pub(crate) line: usize,
    pub(crate) position: usize,
}

impl Error for LexingError {}

impl LexingError {
    pub fn new(path: PathBuf, message: String, line: usize, position: usize) -> Self {
        Self {
            path,
            message,
            line,
            position
        }
    }
}

#[derive(Debug)]
pub struct SyntaxError {
    pub(crate) path: PathBuf,
    pub(crate) message: String,
    pub(crate) line: usize,
    pub(crate) position: usize,
}

impl Error for SyntaxError {}

impl SyntaxError {
    pub fn from_token(path: PathBuf, token: &Token, message: String) -> Self {
        Self {
            path,
            message,
            line: token.line,
            position: token.position,
        }
    }

    /// The line ran out before a required token showed up.
    pub fn at_end(path: PathBuf, line: usize, position: usize, message: String) -> Self {
        Self {
            path,
            message,
            line,
            position,
        }
    }
}

/// Raised for expressions that cannot produce a value.
#[derive(Debug)]
pub struct EvaluationError {
    pub(crate) path: PathBuf,
    pub(crate) message: String,
    pub(crate) line: usize,
    pub(crate) position: usize,
}

impl Error for EvaluationError {}

impl EvaluationError {
    pub fn new(path: PathBuf, message: String, line: usize, position: usize) -> Self {
        Self {
            path,
            message,
            line,
            position
        }
    }

    pub fn from_token(path: PathBuf, token: &Token, message: String) -> Self {
        Self::new(path, message, token.line, token.position)
    }
}

#[derive(Debug)]
pub struct ArityError {
    pub(crate) path: PathBuf,
    pub(crate) quest: String,
    pub(crate) expected: usize,
    pub(crate) found: usize,
    pub(crate) line: usize,
    pub(crate) position: usize,
}

impl Error for ArityError {}

impl fmt::Display for LexingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "LexingError: {}\n  --> {}:{}:{}",
            self.message,
            self.path.display(),
            self.line,
            self.position,
        )
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "SyntaxError: {}\n  --> {}:{}:{}",
            self.message,
            self.path.display(),
            self.line,
            self.position,
        )
    }
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "EvaluationError: {}\n  --> {}:{}:{}",
            self.message,
            self.path.display(),
            self.line,
            self.position,
        )
    }
}

impl fmt::Display for ArityError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "ArityError: Incorrect number of arguments for quest {}: expected {} but got {}\n  --> {}:{}:{}",
            self.quest,
            self.expected,
            self.found,
            self.path.display(),
            self.line,
            self.position,
        )
    }
}
