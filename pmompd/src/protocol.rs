//! MPD text protocol over a short-lived TCP connection.
//!
//! ```text
//! S: OK MPD 0.23.5
//! C: status
//! S: volume: 80
//! S: state: play
//! S: OK
//! C: play 42
//! S: ACK [2@0] {play} Bad song index
//! ```

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, trace};

use crate::errors::MpdError;

const GREETING_PREFIX: &str = "OK MPD ";

/// Ordered `key: value` pairs of one response.
pub type Pairs = Vec<(String, String)>;

/// Quotes one command argument.
pub fn quote_arg(arg: &str) -> Result<String, MpdError> {
    if arg.contains('\n') || arg.contains('\r') {
        return Err(MpdError::Protocol(format!(
            "argument contains a line break: {:?}",
            arg
        )));
    }
    let escaped = arg.replace('\\', "\\\\").replace('"', "\\\"");
    Ok(format!("\"{}\"", escaped))
}

/// Builds one command line (without the trailing newline).
pub fn format_command(command: &str, args: &[&str]) -> Result<String, MpdError> {
    let mut line = command.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&quote_arg(arg)?);
    }
    Ok(line)
}

/// Parses `ACK [code@index] {command} message`.
pub fn parse_ack(line: &str) -> Result<MpdError, MpdError> {
    let rest = line
        .strip_prefix("ACK [")
        .ok_or_else(|| MpdError::Protocol(format!("not an ACK line: {}", line)))?;
    let (code_index, rest) = rest
        .split_once(']')
        .ok_or_else(|| MpdError::Protocol(format!("malformed ACK: {}", line)))?;
    let code = code_index
        .split('@')
        .next()
        .and_then(|code| code.trim().parse::<u32>().ok())
        .ok_or_else(|| MpdError::Protocol(format!("malformed ACK code: {}", line)))?;

    let rest = rest.trim_start();
    let (command, message) = match rest.strip_prefix('{').and_then(|r| r.split_once('}')) {
        Some((command, message)) => (command.to_string(), message.trim().to_string()),
        None => (String::new(), rest.trim().to_string()),
    };

    Ok(MpdError::Ack {
        code,
        command,
        message,
    })
}

/// Parses one `key: value` line.
pub fn parse_pair(line: &str) -> Result<(String, String), MpdError> {
    line.split_once(": ")
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| MpdError::Protocol(format!("unexpected response line: {}", line)))
}

/// Looks a key up in a response (first occurrence, case-insensitive).
pub fn find<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

/// One open connection to the daemon.
pub(crate) struct Session {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    version: String,
}

impl Session {
    /// Connects and consumes the greeting.
    ///
    /// Every failure up to and including the greeting is reported as
    /// [`MpdError::ServiceUnreachable`].
    pub(crate) fn open(host: &str, port: u16, timeout: Duration) -> Result<Self, MpdError> {
        let address = if host.contains(':') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{host}:{port}")
        };

        let stream = connect(&address, timeout)?;
        let writer = stream
            .try_clone()
            .map_err(|err| MpdError::unreachable(&address, err))?;
        let mut reader = BufReader::new(stream);

        let mut greeting = String::new();
        match reader.read_line(&mut greeting) {
            Ok(0) => return Err(MpdError::unreachable(&address, "connection closed before greeting")),
            Ok(_) => {}
            Err(err) => return Err(MpdError::unreachable(&address, err)),
        }
        let greeting = greeting.trim_end();
        let version = greeting
            .strip_prefix(GREETING_PREFIX)
            .ok_or_else(|| {
                MpdError::unreachable(&address, format!("unexpected greeting {:?}", greeting))
            })?
            .trim()
            .to_string();

        trace!(address = %address, version = %version, "MPD session opened");
        Ok(Self {
            reader,
            writer,
            version,
        })
    }

    pub(crate) fn version(&self) -> &str {
        &self.version
    }

    /// Sends one command and collects its `key: value` response.
    pub(crate) fn command(&mut self, command: &str, args: &[&str]) -> Result<Pairs, MpdError> {
        let line = format_command(command, args)?;
        self.send_line(&line)?;
        self.read_response()
    }

    /// Sends several commands as one `command_list`, applied atomically by
    /// the daemon. Stops at the first failing command.
    pub(crate) fn command_list(&mut self, commands: &[String]) -> Result<(), MpdError> {
        let mut batch = String::from("command_list_begin\n");
        for command in commands {
            batch.push_str(command);
            batch.push('\n');
        }
        batch.push_str("command_list_end\n");

        trace!(commands = commands.len(), "Sending MPD command list");
        self.writer.write_all(batch.as_bytes())?;
        self.writer.flush()?;
        self.read_response().map(|_| ())
    }

    /// Politely ends the session. Errors are irrelevant at this point.
    pub(crate) fn close(mut self) {
        let _ = self.writer.write_all(b"close\n");
        let _ = self.writer.flush();
        let _ = self.writer.shutdown(Shutdown::Both);
    }

    fn send_line(&mut self, line: &str) -> Result<(), MpdError> {
        trace!(command = %line, "Sending MPD command");
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn read_response(&mut self) -> Result<Pairs, MpdError> {
        let mut pairs = Vec::new();
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(MpdError::protocol("connection closed in the middle of a response"));
            }
            let line = line.trim_end_matches(['\n', '\r']);

            if line == "OK" {
                return Ok(pairs);
            }
            if line.starts_with("ACK ") {
                return Err(parse_ack(line)?);
            }
            pairs.push(parse_pair(line)?);
        }
    }
}

fn connect(address: &str, timeout: Duration) -> Result<TcpStream, MpdError> {
    let addrs = address
        .to_socket_addrs()
        .map_err(|err| MpdError::unreachable(address, format!("cannot resolve: {}", err)))?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream
                    .set_read_timeout(Some(timeout))
                    .and_then(|_| stream.set_write_timeout(Some(timeout)))
                    .map_err(|err| MpdError::unreachable(address, err))?;
                return Ok(stream);
            }
            Err(err) => {
                debug!(address = %address, via = %addr, "MPD connection attempt failed: {}", err);
                last_err = Some(err);
            }
        }
    }

    match last_err {
        Some(err) => Err(MpdError::unreachable(address, err)),
        None => Err(MpdError::unreachable(address, "no socket address resolved")),
    }
}
