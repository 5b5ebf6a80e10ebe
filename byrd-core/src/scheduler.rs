use std::fmt;

use serde::{Deserialize, Serialize};

/// The three periodic lifecycle jobs. Each keeps its own checkpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SweepJob {
    Activate,
    Expire,
    Extend,
}

impl SweepJob {
    pub const ALL: [SweepJob; 3] = [SweepJob::Activate, SweepJob::Expire, SweepJob::Extend];

    pub fn as_str(&self) -> &'static str {
        match self {
            SweepJob::Activate => "activate",
            SweepJob::Expire => "expire",
            SweepJob::Extend => "extend",
        }
    }
}

impl fmt::Display for SweepJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
