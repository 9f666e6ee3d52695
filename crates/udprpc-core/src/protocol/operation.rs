//! Closed set of operation codes.

use std::fmt;
use std::str::FromStr;

use crate::error::RpcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    None,
    Read,
    Write,
    Update,
    Delete,
    Monitor,
    Echo,
    Rating,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Operation::None,
        Operation::Read,
        Operation::Write,
        Operation::Update,
        Operation::Delete,
        Operation::Monitor,
        Operation::Echo,
        Operation::Rating,
    ];

    pub fn code(self) -> i32 {
        match self {
            Operation::None => -1,
            Operation::Read => 0,
            Operation::Write => 1,
            Operation::Update => 2,
            Operation::Delete => 3,
            Operation::Monitor => 4,
            Operation::Echo => 5,
            Operation::Rating => 6,
        }
    }

    /// Unknown codes map to [`Operation::None`].
    pub fn from_code(code: i32) -> Self {
        Self::ALL
            .into_iter()
            .find(|op| op.code() == code)
            .unwrap_or(Operation::None)
    }

    /// Operations that may change a monitored resource.
    pub fn is_mutating(self) -> bool {
        matches!(self, Operation::Write | Operation::Update | Operation::Delete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::None => "NONE",
            Operation::Read => "READ",
            Operation::Write => "WRITE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::Monitor => "MONITOR",
            Operation::Echo => "ECHO",
            Operation::Rating => "RATING",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = RpcError;

    /// Case-insensitive operation name (`read`, `MONITOR`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RpcError::BadRequest(format!("unknown operation: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_code(op.code()), op);
        }
    }

    #[test]
    fn unknown_codes_are_none() {
        assert_eq!(Operation::from_code(7), Operation::None);
        assert_eq!(Operation::from_code(-42), Operation::None);
        assert_eq!(Operation::from_code(i32::MAX), Operation::None);
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("read".parse::<Operation>().ok(), Some(Operation::Read));
        assert_eq!("MONITOR".parse::<Operation>().ok(), Some(Operation::Monitor));
        assert!("bogus".parse::<Operation>().is_err());
    }

    #[test]
    fn only_bookings_mutate() {
        let mutating: Vec<_> = Operation::ALL.into_iter().filter(|o| o.is_mutating()).collect();
        assert_eq!(mutating, [Operation::Write, Operation::Update, Operation::Delete]);
    }
}
