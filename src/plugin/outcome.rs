use std::fmt;

/// Result of one lifecycle operation on one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Ok,
    /// Name absent from the registry.
    NotFound,
    AlreadyInstalled,
    NotInstalled,
    /// Name can never be removed.
    ProtectedEntry,
    /// Registry line could not be parsed.
    MalformedEntry,
    /// VCS or filesystem operation failed.
    GeneralFailure,
}

impl ResultCode {
    pub fn label(&self) -> &'static str {
        match self {
            ResultCode::Ok => "ok",
            ResultCode::NotFound => "not found",
            ResultCode::AlreadyInstalled => "already installed",
            ResultCode::NotInstalled => "not installed",
            ResultCode::ProtectedEntry => "protected",
            ResultCode::MalformedEntry => "malformed entry",
            ResultCode::GeneralFailure => "failed",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ResultCode::Ok)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// The name the caller asked for.
    pub target: String,
    pub code: ResultCode,
    /// Diagnostics for failures, or what changed on success.
    pub detail: Option<String>,
}

impl Outcome {
    pub fn new(target: impl Into<String>, code: ResultCode) -> Self {
        Self {
            target: target.into(),
            code,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target, self.code)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}
