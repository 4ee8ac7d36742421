//! Byte retrieval for query execution and dataset download.

use crate::config::ClientConfig;
use crate::error::{DalError, Result};
use std::path::Path;

/// Synchronous GET collaborator.
pub trait Transport: Send {
    /// Fetches `url` into memory.
    fn get(&self, url: &str) -> Result<Vec<u8>>;

    /// Streams `url` into the file at `path`; returns the bytes written.
    fn get_to_file(&self, url: &str, path: &Path) -> Result<u64>;

    fn name(&self) -> &'static str {
        "Transport"
    }
}

pub(crate) fn validate_target(url: &str, path: &Path) -> Result<()> {
    if url.trim().is_empty() {
        return Err(DalError::InvalidUrl(url.to_string()));
    }
    if path.as_os_str().is_empty() {
        return Err(DalError::InvalidFilename(path.display().to_string()));
    }
    Ok(())
}

pub(crate) fn create_file(path: &Path) -> Result<std::fs::File> {
    std::fs::File::create(path).map_err(|e| DalError::CannotOpenFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use super::{create_file, validate_target, Transport};
    use crate::config::ClientConfig;
    use crate::error::{DalError, Result};
    use log::debug;
    use std::io::Read;
    use std::path::Path;
    use ureq::{Agent, AgentBuilder};

    /// Blocking HTTP(S) transport over `ureq`.
    pub struct HttpTransport {
        agent: Agent,
        max_response_bytes: u64,
    }

    impl HttpTransport {
        pub fn new(config: &ClientConfig) -> Self {
            let agent = AgentBuilder::new()
                .timeout(config.timeout)
                .user_agent(&config.user_agent)
                .build();
            Self {
                agent,
                max_response_bytes: config.max_response_bytes,
            }
        }

        fn open(&self, url: &str) -> Result<ureq::Response> {
            if url.trim().is_empty() {
                return Err(DalError::InvalidUrl(url.to_string()));
            }
            debug!("GET {}", url);
            self.agent
                .get(url)
                .call()
                .map_err(|e| map_ureq_error(url, e))
        }
    }

    impl Transport for HttpTransport {
        fn get(&self, url: &str) -> Result<Vec<u8>> {
            let response = self.open(url)?;
            let mut body = Vec::new();
            response
                .into_reader()
                .take(self.max_response_bytes.saturating_add(1))
                .read_to_end(&mut body)
                .map_err(|e| map_io_error(url, e))?;
            if body.len() as u64 > self.max_response_bytes {
                return Err(DalError::FileTooLarge {
                    limit: self.max_response_bytes,
                });
            }
            Ok(body)
        }

        fn get_to_file(&self, url: &str, path: &Path) -> Result<u64> {
            validate_target(url, path)?;
            let response = self.open(url)?;
            let mut file = create_file(path)?;
            let written = std::io::copy(&mut response.into_reader(), &mut file)
                .map_err(|e| map_io_error(url, e))?;
            debug!("Wrote {} bytes from {} to {}", written, url, path.display());
            Ok(written)
        }

        fn name(&self) -> &'static str {
            "HttpTransport"
        }
    }

    fn map_io_error(url: &str, err: std::io::Error) -> DalError {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                DalError::HttpTimeout(url.to_string())
            }
            _ => DalError::Transport(format!("{}: {}", url, err)),
        }
    }

    fn map_ureq_error(url: &str, err: ureq::Error) -> DalError {
        match err {
            ureq::Error::Status(status, _) => DalError::HttpError {
                status,
                url: url.to_string(),
            },
            ureq::Error::Transport(transport) => match transport.kind() {
                ureq::ErrorKind::InvalidUrl | ureq::ErrorKind::UnknownScheme => {
                    DalError::InvalidUrl(url.to_string())
                }
                ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed => {
                    DalError::HostNoConnect(url.to_string())
                }
                ureq::ErrorKind::TooManyRedirects => DalError::HttpRedirectLoop(url.to_string()),
                ureq::ErrorKind::Io if is_timeout(&transport) => {
                    DalError::HttpTimeout(url.to_string())
                }
                _ => DalError::Transport(format!("{}: {}", url, transport)),
            },
        }
    }

    fn is_timeout(transport: &ureq::Transport) -> bool {
        std::error::Error::source(transport)
            .and_then(|source| source.downcast_ref::<std::io::Error>())
            .is_some_and(|io| {
                matches!(
                    io.kind(),
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                )
            })
    }

}

/// Stand-in used when the crate is built without HTTP support.
pub struct UnavailableTransport;

impl Transport for UnavailableTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        Err(DalError::Transport(format!(
            "no transport configured for {}",
            url
        )))
    }

    fn get_to_file(&self, url: &str, path: &Path) -> Result<u64> {
        validate_target(url, path)?;
        self.get(url).map(|_| 0)
    }

    fn name(&self) -> &'static str {
        "UnavailableTransport"
    }
}

/// The transport a connection uses unless one is supplied.
pub fn default_transport(config: &ClientConfig) -> Box<dyn Transport> {
    #[cfg(feature = "http")]
    {
        Box::new(HttpTransport::new(config))
    }
    #[cfg(not(feature = "http"))]
    {
        let _ = config;
        Box::new(UnavailableTransport)
    }
}
