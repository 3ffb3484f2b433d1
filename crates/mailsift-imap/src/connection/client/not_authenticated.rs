//! Greeting and login.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::Client;
use super::states::{Authenticated, NotAuthenticated};
use crate::command::{Command, TagGenerator};
use crate::connection::framed::FramedStream;
use crate::parser::{Response, ResponseCode, Status, Untagged, parse_response};
use crate::types::Capability;
use crate::{Error, Result};

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads the server greeting from a freshly connected stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting is missing, malformed, or a BYE.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut framed = FramedStream::new(stream);
        let greeting = framed.read_response().await?;

        let capabilities = match parse_response(&greeting)? {
            Response::Untagged(Untagged::Status {
                status: Status::Ok | Status::PreAuth,
                code,
                text,
            }) => {
                debug!(greeting = %text, "connected");
                match code {
                    Some(ResponseCode::Capability(caps)) => caps,
                    _ => Vec::new(),
                }
            }
            Response::Untagged(Untagged::Status {
                status: Status::Bye,
                text,
                ..
            }) => return Err(Error::Bye(text)),
            other => {
                return Err(Error::Protocol(format!("unexpected greeting: {other:?}")));
            }
        };

        Ok(Self {
            stream: framed,
            tags: TagGenerator::default(),
            capabilities,
            state: NotAuthenticated,
        })
    }

    /// Logs in with a user name and password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the server refuses the credentials or has
    /// disabled LOGIN, and other errors on transport failure.
    pub async fn login(mut self, username: &str, password: &str) -> Result<Client<S, Authenticated>> {
        if self.has_capability(&Capability::LoginDisabled) {
            return Err(Error::Auth("server has disabled LOGIN".to_string()));
        }

        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        match self.execute(&command).await {
            Ok(_) => {}
            Err(Error::No(text) | Error::Bad(text)) => return Err(Error::Auth(text)),
            Err(e) => return Err(e),
        }
        debug!(username, "logged in");
        Ok(self.into_state(Authenticated))
    }
}
