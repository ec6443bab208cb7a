#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    BadPointer,
    BadParam,
    NotInitialized,
    CorruptContext,
    OutOfMemory,
}

impl Error {
    pub fn description(&self) -> &'static str {
        match self {
            Error::BadPointer => "Required buffer is missing",
            Error::BadParam => "Invalid parameter",
            Error::NotInitialized => "Context has not been initialized",
            Error::CorruptContext => "Context is inconsistent",
            Error::OutOfMemory => "Output buffer is too small",
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl std::error::Error for Error {}

#[cfg(feature = "codec")]
impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;

        let kind = match err {
            Error::BadParam => ErrorKind::InvalidInput,
            Error::OutOfMemory => ErrorKind::OutOfMemory,
            Error::BadPointer | Error::NotInitialized | Error::CorruptContext => ErrorKind::Other,
        };

        std::io::Error::new(kind, err)
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Error::OutOfMemory.to_string(), "Output buffer is too small");
        assert_eq!(Error::NotInitialized.to_string(), Error::NotInitialized.description());
    }
}
