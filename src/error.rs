/// Logging adapters for errors that are reported and then dropped.
pub trait ResultOkLogExt<T, E> {
    /// Logs the error at error level and discards it.
    fn ok_log(self) -> Option<T>;

    /// Logs the error at `level`, prefixed with `context`, and discards it.
    fn ok_log_with(self, level: log::Level, context: &str) -> Option<T>;
}

impl<T, E> ResultOkLogExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error,
{
    fn ok_log(self) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::error!("{err}");
                None
            }
        }
    }

    fn ok_log_with(self, level: log::Level, context: &str) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::log!(level, "{context}: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_log_passes_values_through() {
        let ok: Result<u32, std::io::Error> = Ok(7);
        assert_eq!(ok.ok_log(), Some(7));
        let err: Result<u32, std::io::Error> = Err(std::io::Error::other("boom"));
        assert_eq!(err.ok_log_with(log::Level::Warn, "ctx"), None);
    }
}
