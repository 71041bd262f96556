use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Finished,
    Error
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Finished => write!(f, "FINISHED"),
            Status::Error => write!(f, "ERROR")
        }
    }
}

/// Outcome of one check, handed back to whoever invoked the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: Status,
    pub message: String
}

impl Verdict {
    pub fn finished(message: impl Into<String>) -> Self {
        Self{status: Status::Finished, message: message.into()}
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self{status: Status::Error, message: message.into()}
    }

    pub fn is_finished(&self) -> bool {
        self.status == Status::Finished
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

pub struct CheckResult {
    pub name: String,
    pub check: String,
    pub verdict: Result<Verdict, String>,
    pub labels: HashMap<String, String>
}
