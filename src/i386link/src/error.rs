use thiserror::Error;

/// Diagnostic categories. Every variant renders as the single-line `Error: `
/// message printed on the diagnostic channel; the exit code a failure
/// produces is a property of the pipeline stage that raised it, not of the
/// variant (see `main`), since a `MalformedInput` during object reading and
/// during layout carry different exit codes.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("{0}")]
    Cli(String),

    #[error("{0}")]
    Io(String),

    #[error("{0}")]
    Malformed(String),

    #[error("{0}")]
    Resolution(String),

    #[error("unsupported relocation type 0x{0:02x}")]
    UnsupportedRelocation(u8),
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::Io(err.to_string())
    }
}

impl LinkError {
    /// The exit code this error's *kind* maps to under §6.3. `Io` defaults
    /// to the object-read code (2), since every `Io` failure reachable
    /// before the output file is created is one; `main` overrides this to
    /// 4 for the one write-stage `Io` failure that can happen after.
    pub fn exit_code(&self) -> i32 {
        match self {
            LinkError::Cli(_) => 1,
            LinkError::Io(_) => 2,
            LinkError::Malformed(_) => 2,
            LinkError::Resolution(_) => 3,
            LinkError::UnsupportedRelocation(_) => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;

/// Emits a warning on the diagnostic channel (§7): always printed to
/// stderr verbatim, and also routed through `log` so an installed
/// subscriber captures it alongside the pipeline's `debug`/`trace` trace.
pub fn emit_warning(message: &str) {
    eprintln!("Warning: {message}");
    log::warn!("{message}");
}
