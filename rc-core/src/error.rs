use std::borrow::Cow;

/// Error type shared by every layer of the codec core.
///
/// Variants map directly onto the handful of failure kinds a caller needs to
/// branch on: bad arguments, truncated input, corrupt input, an unsupported
/// combination of parameters, a wrong password, a caller-imposed limit being
/// hit, and cooperative cancellation through a progress callback. Kinds never
/// carry paths or line numbers, only a short machine-independent context
/// string.
#[derive(Debug)]
pub enum Error {
    /// A caller-supplied parameter is out of range or internally inconsistent.
    InvalidArgument(Cow<'static, str>),
    /// The input ended before the format said it would.
    UnexpectedEof,
    /// The input violated a format invariant; `context` names which one.
    Corrupt(Cow<'static, str>),
    /// The requested combination of codec/filter/feature is not implemented.
    Unsupported(Cow<'static, str>),
    /// Decryption key material did not validate. Deliberately indistinguishable
    /// from corrupt ciphertext at the byte level to avoid an oracle.
    PasswordIncorrect,
    /// A caller-imposed resource limit (output size, memory) was reached.
    LimitExceeded,
    /// The caller's progress callback asked for cancellation.
    Cancelled,
    /// Propagated I/O failure from the underlying reader/writer.
    Io(std::io::Error),
}

impl Error {
    pub fn invalid_argument(context: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidArgument(context.into())
    }

    pub fn corrupt(context: impl Into<Cow<'static, str>>) -> Self {
        Self::Corrupt(context.into())
    }

    pub fn unsupported(context: impl Into<Cow<'static, str>>) -> Self {
        Self::Unsupported(context.into())
    }

    /// `true` for the kinds a caller can legitimately retry with different
    /// parameters (as opposed to a corrupt stream or a bug).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::PasswordIncorrect | Self::LimitExceeded
        )
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::UnexpectedEof
        } else {
            Self::Io(e)
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            Error::UnexpectedEof => {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "unexpected end of input")
            }
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
