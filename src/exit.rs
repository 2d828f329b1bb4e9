use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    InvalidInput,
    AnalysisFailed,
    FindingsAtThreshold,
}

impl ExitCode {
    pub const fn as_i32(self) -> i32 {
        match self {
            ExitCode::Success => 0,
            ExitCode::InvalidInput => 2,
            ExitCode::AnalysisFailed => 10,
            ExitCode::FindingsAtThreshold => 20,
        }
    }
}

#[derive(Debug)]
pub struct ExitError {
    pub code: ExitCode,
    pub err: anyhow::Error,
}

impl ExitError {
    pub fn new(code: ExitCode, err: anyhow::Error) -> Self {
        Self { code, err }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.err.fmt(f)
    }
}

impl std::error::Error for ExitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.err.as_ref())
    }
}

pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(exit) = err.downcast_ref::<ExitError>() {
        return exit.code.as_i32();
    }
    ExitCode::AnalysisFailed.as_i32()
}

pub fn invalid_input(message: impl Into<String>) -> anyhow::Error {
    ExitError::new(ExitCode::InvalidInput, anyhow::anyhow!(message.into())).into()
}

pub fn invalid_input_err(err: anyhow::Error) -> anyhow::Error {
    ExitError::new(ExitCode::InvalidInput, err).into()
}

pub fn findings_at_threshold(message: impl Into<String>) -> anyhow::Error {
    ExitError::new(
        ExitCode::FindingsAtThreshold,
        anyhow::anyhow!(message.into()),
    )
    .into()
}
