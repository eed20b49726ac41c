use std::fmt;

/// Terminal outcome of a job, as reported in the `status` tag.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobStatus {
    Finished,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        use JobStatus::*;

        match self {
            Finished => "finished",
            Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

