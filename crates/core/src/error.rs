// crates/core/src/error.rs
use thiserror::Error;

/// Errors surfaced by `EventStore` operations that touch the persistent log
/// or listener registry. The store never fails `add_event` itself — these
/// exist for the collaborators that *can* fail (save/close on the log).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("persistent log unavailable for project {project}: {source}")]
    PersistentLog {
        project: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ring capacity must be greater than zero")]
    ZeroCapacity,
}

/// Errors from the API Discovery Engine's URL handling.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("could not parse URL {url}: {message}")]
    UrlParse { url: String, message: String },
}

impl DiscoveryError {
    pub fn url_parse(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UrlParse {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Errors from the Query Monitor's statement parsing helpers.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid regex pattern for {context}: {source}")]
    Pattern {
        context: &'static str,
        #[source]
        source: regex::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_error_display() {
        let err = DiscoveryError::url_parse("not a url", "relative URL without a base");
        assert!(err.to_string().contains("not a url"));
    }

    #[test]
    fn store_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = StoreError::PersistentLog {
            project: "demo".into(),
            source: io_err,
        };
        assert!(err.to_string().contains("demo"));
    }
}
