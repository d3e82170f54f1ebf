//! Invocation grammar.
//!
//! The first argument of an invocation selects what to do with the
//! semaphore: one of the flags `-V`, `-c`, `-v`, `-d`, or a signed increment
//! that the kernel applies as a `short`.

use std::fmt;
use std::str::FromStr;

use crate::error::ClsemError;

/// Program name used in version output and diagnostics.
pub const PROGRAM: &str = "clsem";

/// General usage line.
pub const USAGE: &str = "Usage: clsem [-c|-v|-d|n] path [id]";

/// One invocation's operation, parsed from the first positional argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `-V`: print name and version.
    Version,
    /// `-c`: create the semaphore and print its id.
    Create,
    /// `-v`: print the semaphore value.
    Value,
    /// `-d`: delete the semaphore.
    Delete,
    /// Signed integer: adjust the semaphore by this amount.
    Adjust(i16),
}

impl Operation {
    /// Usage line for this operation.
    #[must_use]
    pub const fn usage(self) -> &'static str {
        match self {
            Self::Version => "Usage: clsem -V",
            Self::Create => "Usage: clsem -c path [id]",
            Self::Value => "Usage: clsem -v path [id]",
            Self::Delete => "Usage: clsem -d path [id]",
            Self::Adjust(_) => "Usage: clsem increment path [id]",
        }
    }
}

impl FromStr for Operation {
    type Err = ClsemError;

    fn from_str(op: &str) -> Result<Self, Self::Err> {
        match op {
            "-V" => Ok(Self::Version),
            "-c" => Ok(Self::Create),
            "-v" => Ok(Self::Value),
            "-d" => Ok(Self::Delete),
            _ => parse_delta(op).map(Self::Adjust),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version => f.write_str("-V"),
            Self::Create => f.write_str("-c"),
            Self::Value => f.write_str("-v"),
            Self::Delete => f.write_str("-d"),
            Self::Adjust(delta) => write!(f, "{delta:+}"),
        }
    }
}

/// Parses a signed increment. The kernel takes a `short`.
fn parse_delta(op: &str) -> Result<i16, ClsemError> {
    let digits = op.strip_prefix(['+', '-']).unwrap_or(op);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ClsemError::usage(USAGE));
    }
    op.parse::<i16>().map_err(|_| {
        ClsemError::usage(format!(
            "increment {op} is out of range ({}..={})",
            i16::MIN,
            i16::MAX
        ))
    })
}
