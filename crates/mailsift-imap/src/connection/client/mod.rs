//! Type-state IMAP client.
//!
//! - `NotAuthenticated`: right after the greeting
//! - `Authenticated`: after LOGIN
//! - `Selected`: after SELECT/EXAMINE
//!
//! Each state only exposes the commands the protocol allows in it.

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace, warn};

pub use self::states::{Authenticated, MailboxAccess, NotAuthenticated, Selected};
use super::framed::FramedStream;
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseCode, Status, Untagged, parse_response};
use crate::types::Capability;
use crate::{Error, Result};

/// An IMAP connection in protocol state `State`.
pub struct Client<S, State> {
    stream: FramedStream<S>,
    tags: TagGenerator,
    capabilities: Vec<Capability>,
    state: State,
}

impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("capabilities", &self.capabilities)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Everything the server said while completing one command.
#[derive(Debug, Default)]
pub(crate) struct Completion {
    pub(crate) untagged: Vec<Untagged>,
    pub(crate) code: Option<ResponseCode>,
}

/// Side information gathered while waiting for a completion.
#[derive(Debug, Default)]
struct Seen {
    bye: Option<String>,
    malformed: Option<Error>,
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Capabilities last reported by the server.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// True if the server advertised `cap`.
    #[must_use]
    pub fn has_capability(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    /// Asks the server for its capabilities and caches them.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn capability(&mut self) -> Result<Vec<Capability>> {
        self.execute(&Command::Capability).await?;
        Ok(self.capabilities.clone())
    }

    /// Ends the session. A server that closes the connection right after its
    /// BYE is not treated as an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects LOGOUT or the transport fails
    /// before BYE.
    pub async fn logout(mut self) -> Result<()> {
        match self.execute(&Command::Logout).await {
            Ok(_) | Err(Error::Bye(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn into_state<T>(self, state: T) -> Client<S, T> {
        Client {
            stream: self.stream,
            tags: self.tags,
            capabilities: self.capabilities,
            state,
        }
    }

    /// Sends `command` and collects responses until its tagged completion.
    pub(crate) async fn execute(&mut self, command: &Command) -> Result<Completion> {
        let tag = self.tags.next_tag();
        let literal_plus = self.has_capability(&Capability::LiteralPlus);
        let request = command.serialize(&tag, literal_plus);
        debug!(command = command.name(), %tag, "sending command");

        let mut completion = Completion::default();
        let mut seen = Seen::default();
        for (i, part) in request.parts().iter().enumerate() {
            if i > 0 {
                self.await_continuation(&tag, &mut completion, &mut seen).await?;
            }
            self.stream.write_all(part).await?;
        }

        loop {
            match self.next_response(&tag, &mut seen).await? {
                Response::Tagged {
                    status, code, text, ..
                } => {
                    self.observe_code(code.as_ref());
                    completion.code = code;
                    check_status(status, text)?;
                    return match seen.malformed {
                        Some(e) => Err(e),
                        None => Ok(completion),
                    };
                }
                Response::Untagged(untagged) => {
                    self.observe(untagged, &mut completion, &mut seen.bye);
                }
                Response::Continuation(_) => {
                    return Err(Error::Protocol(format!(
                        "unexpected continuation request during {}",
                        command.name()
                    )));
                }
            }
        }
    }

    async fn await_continuation(
        &mut self,
        tag: &str,
        completion: &mut Completion,
        seen: &mut Seen,
    ) -> Result<()> {
        loop {
            match self.next_response(tag, seen).await? {
                Response::Continuation(_) => return Ok(()),
                Response::Tagged { status, text, .. } => {
                    check_status(status, text)?;
                    return Err(Error::Protocol(
                        "command completed before its literal was sent".to_string(),
                    ));
                }
                Response::Untagged(untagged) => self.observe(untagged, completion, &mut seen.bye),
            }
        }
    }

    /// Reads the next response relevant to `tag`, skipping foreign tagged
    /// lines. Malformed untagged data is remembered in `seen` and fails the
    /// command once its completion has been read.
    async fn next_response(&mut self, tag: &str, seen: &mut Seen) -> Result<Response> {
        loop {
            let line = match self.stream.read_response().await {
                Ok(line) => line,
                Err(Error::Io(e)) => {
                    return Err(seen.bye.take().map_or(Error::Io(e), Error::Bye));
                }
                Err(e) => return Err(e),
            };
            trace!(line = %String::from_utf8_lossy(&line).trim_end(), "received");

            let ours = line.starts_with(tag.as_bytes()) && line.get(tag.len()) == Some(&b' ');
            match parse_response(&line) {
                Ok(Response::Tagged { tag: other, .. }) if other != tag => {
                    debug!(%other, "ignoring completion for another tag");
                }
                Ok(response) => return Ok(response),
                Err(e) if ours => return Err(e),
                Err(e) if line.starts_with(b"* ") => {
                    warn!(error = %e, "malformed untagged response");
                    seen.malformed.get_or_insert(e);
                }
                Err(e) => debug!(error = %e, "skipping unparseable response"),
            }
        }
    }

    fn observe(&mut self, untagged: Untagged, completion: &mut Completion, bye: &mut Option<String>) {
        match &untagged {
            Untagged::Capability(caps) => self.capabilities.clone_from(caps),
            Untagged::Status {
                status: Status::Bye,
                text,
                ..
            } => *bye = Some(text.clone()),
            Untagged::Status { code, .. } => self.observe_code(code.as_ref()),
            _ => {}
        }
        completion.untagged.push(untagged);
    }

    fn observe_code(&mut self, code: Option<&ResponseCode>) {
        if let Some(ResponseCode::Capability(caps)) = code {
            self.capabilities.clone_from(caps);
        }
    }
}

fn check_status(status: Status, text: String) -> Result<()> {
    match status {
        Status::Ok | Status::PreAuth => Ok(()),
        Status::No => Err(Error::No(text)),
        Status::Bad => Err(Error::Bad(text)),
        Status::Bye => Err(Error::Bye(text)),
    }
}
