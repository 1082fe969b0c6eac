//! Now-playing information from MPD over its line protocol.
//!
//! The session alternates between two phases. In the command phase any
//! command may be sent and its full response is read before the next one. In
//! the idle phase an `idle player` request is outstanding and the socket is
//! only read, never written, until MPD reports a change. Breaking that
//! alternation desyncs the connection for good, so every violation is a
//! protocol error and the caller drops the session.

use crate::error::{Result, StatusError};
use log::debug;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use tokio::net::TcpStream;

const GREETING: &str = "OK MPD ";
const IDLE_COMMAND: &str = "idle player";

/// One `key: value` response line.
pub type Pair = (String, String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Command,
    Idle,
}

fn lookup<'a>(pairs: &'a [Pair], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Format `status` and `currentsong` responses for the player field.
pub fn format_now_playing(status: &[Pair], song: &[Pair]) -> Option<String> {
    let state = lookup(status, "state");
    if state == Some("stop") {
        return None;
    }

    let parts: Vec<&str> = ["Name", "Title"]
        .iter()
        .filter_map(|key| lookup(song, key))
        .collect();
    if parts.is_empty() {
        return None;
    }

    let mut text = parts.join(": ");
    if state == Some("pause") {
        text.push_str(" [paused]");
    }
    Some(text)
}

/// A connection to MPD kept open for the whole run.
pub struct MpdSession<S = TcpStream> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    phase: Phase,
}

impl MpdSession<TcpStream> {
    /// Connect to `host:port` and check the greeting.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|err| StatusError::unavailable(format!("MPD at {host}:{port}"), err))?;
        Self::handshake(stream).await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> MpdSession<S> {
    /// Wrap an already connected stream and consume the server greeting.
    pub async fn handshake(stream: S) -> Result<Self> {
        let (read, write) = tokio::io::split(stream);
        let mut session = Self {
            reader: BufReader::new(read),
            writer: write,
            phase: Phase::Command,
        };

        let greeting = session.read_line().await?;
        if !greeting.starts_with(GREETING) {
            return Err(StatusError::protocol(format!(
                "unexpected greeting '{greeting}', not an MPD server"
            )));
        }
        debug!("connected: {greeting}");
        Ok(session)
    }

    /// Query the initial value and start waiting for player changes.
    pub async fn start(&mut self) -> Result<Option<String>> {
        let value = self.now_playing().await?;
        self.enter_idle().await?;
        Ok(value)
    }

    /// Wait until the server has sent something. Cancel safe.
    pub async fn readable(&mut self) -> std::io::Result<()> {
        let buffered = self.reader.fill_buf().await?;
        if buffered.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "MPD closed the connection",
            ));
        }
        Ok(())
    }

    /// Handle a readable socket: end idle, query, then idle again.
    pub async fn on_readable(&mut self) -> Result<Option<String>> {
        self.end_idle().await?;
        let value = self.now_playing().await?;
        self.enter_idle().await?;
        Ok(value)
    }

    /// Current player state, only valid in the command phase.
    pub async fn now_playing(&mut self) -> Result<Option<String>> {
        let status = self.command("status").await?;
        let song = self.command("currentsong").await?;
        Ok(format_now_playing(&status, &song))
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    async fn enter_idle(&mut self) -> Result<()> {
        self.require_command_phase(IDLE_COMMAND)?;
        self.send(IDLE_COMMAND).await?;
        self.phase = Phase::Idle;
        Ok(())
    }

    async fn end_idle(&mut self) -> Result<()> {
        if self.phase != Phase::Idle {
            return Err(StatusError::protocol("no idle request is outstanding"));
        }
        let changed = self.read_response().await?;
        debug!("idle returned {changed:?}");
        self.phase = Phase::Command;
        Ok(())
    }

    async fn command(&mut self, command: &str) -> Result<Vec<Pair>> {
        self.require_command_phase(command)?;
        self.send(command).await?;
        self.read_response().await
    }

    fn require_command_phase(&self, command: &str) -> Result<()> {
        if self.phase == Phase::Idle {
            return Err(StatusError::protocol(format!(
                "'{command}' sent while idle is outstanding"
            )));
        }
        Ok(())
    }

    async fn send(&mut self, command: &str) -> Result<()> {
        self.writer
            .write_all(format!("{command}\n").as_bytes())
            .await
            .map_err(|err| StatusError::io(format!("cannot send '{command}'"), err))?;
        self.writer
            .flush()
            .await
            .map_err(|err| StatusError::io(format!("cannot send '{command}'"), err))
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|err| StatusError::io("cannot read from MPD", err))?;
        if read == 0 {
            return Err(StatusError::protocol("MPD closed the connection"));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn read_response(&mut self) -> Result<Vec<Pair>> {
        let mut pairs = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line == "OK" {
                return Ok(pairs);
            }
            if line.starts_with("ACK") {
                return Err(StatusError::protocol(line));
            }
            let (key, value) = line
                .split_once(": ")
                .ok_or_else(|| StatusError::protocol(format!("malformed response line '{line}'")))?;
            pairs.push((key.to_string(), value.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt};

    fn pairs(items: &[(&str, &str)]) -> Vec<Pair> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn stopped_player_is_absent() {
        let status = pairs(&[("volume", "80"), ("state", "stop")]);
        let song = pairs(&[("Title", "Anything")]);
        assert_eq!(format_now_playing(&status, &song), None);
    }

    #[test]
    fn joins_stream_name_and_title() {
        let status = pairs(&[("state", "play")]);
        let song = pairs(&[("file", "http://radio"), ("Title", "Song"), ("Name", "Radio One")]);
        assert_eq!(
            format_now_playing(&status, &song).as_deref(),
            Some("Radio One: Song")
        );
    }

    #[test]
    fn paused_player_is_marked() {
        let status = pairs(&[("state", "pause")]);
        let song = pairs(&[("Title", "Song")]);
        assert_eq!(
            format_now_playing(&status, &song).as_deref(),
            Some("Song [paused]")
        );
    }

    #[test]
    fn song_without_tags_is_absent() {
        let status = pairs(&[("state", "play")]);
        let song = pairs(&[("file", "track01.flac")]);
        assert_eq!(format_now_playing(&status, &song), None);
    }

    #[tokio::test]
    async fn rejects_foreign_greeting() {
        let (client, mut server) = duplex(256);
        server.write_all(b"SSH-2.0-OpenSSH\n").await.unwrap();

        let result = MpdSession::handshake(client).await;
        assert!(matches!(result, Err(StatusError::Protocol { .. })));
    }

    #[tokio::test]
    async fn ack_response_is_a_protocol_error() {
        let (client, mut server) = duplex(1024);
        server.write_all(b"OK MPD 0.23.5\n").await.unwrap();
        let mut session = MpdSession::handshake(client).await.unwrap();

        server
            .write_all(b"ACK [4@0] {status} you don't have permission\n")
            .await
            .unwrap();
        assert!(matches!(
            session.now_playing().await,
            Err(StatusError::Protocol { .. })
        ));
    }

    #[tokio::test]
    async fn start_leaves_session_idle() {
        let (client, mut server) = duplex(1024);
        server.write_all(b"OK MPD 0.23.5\n").await.unwrap();
        let mut session = MpdSession::handshake(client).await.unwrap();

        server
            .write_all(b"state: play\nOK\nTitle: Song\nOK\n")
            .await
            .unwrap();
        assert_eq!(session.start().await.unwrap().as_deref(), Some("Song"));
        assert!(session.is_idle());
        assert!(matches!(
            session.now_playing().await,
            Err(StatusError::Protocol { .. })
        ));

        drop(session);
        let mut sent = String::new();
        server.read_to_string(&mut sent).await.unwrap();
        assert_eq!(sent, "status\ncurrentsong\nidle player\n");
    }

    #[tokio::test]
    async fn closed_connection_is_not_readable() {
        let (client, mut server) = duplex(1024);
        server.write_all(b"OK MPD 0.23.5\n").await.unwrap();
        let mut session = MpdSession::handshake(client).await.unwrap();
        drop(server);

        let err = session.readable().await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }
}
