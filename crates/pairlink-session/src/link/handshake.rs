//! Hello exchange that activates a socket link.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use pairlink_frame::{FrameError, FrameReader, FrameWriter, CONTROL};
use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};
use crate::link::LinkConfig;

const MAX_PROTOCOL_LEN: usize = 32;
const MAX_VERSION_LEN: usize = 16;
const MAX_HELLO_PAYLOAD: usize = 4 * 1024;

/// Sent by both ends on the CONTROL kind, connecting side first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hello {
    pub protocol: String,
    pub version: String,
    #[serde(rename = "appInstalled")]
    pub app_installed: bool,
}

impl Hello {
    fn from_config(config: &LinkConfig) -> Self {
        Self {
            protocol: config.protocol_name.clone(),
            version: config.protocol_version.clone(),
            app_installed: config.app_installed,
        }
    }
}

/// What the local end learned about its peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloOutcome {
    pub peer_version: String,
    pub peer_app_installed: bool,
}

/// Connecting side: send our hello, then check the listener's answer.
pub fn hello_connect<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    config: &LinkConfig,
) -> Result<HelloOutcome> {
    validate_version(&config.protocol_version)?;
    send_hello(writer, &Hello::from_config(config))?;

    let theirs = recv_hello(reader, config.handshake_timeout)?;
    check_protocol(&theirs, config)?;
    if !is_version_compatible(&config.protocol_version, &theirs.version)? {
        return Err(LinkError::Handshake(format!(
            "incompatible version '{}' (local '{}')",
            theirs.version, config.protocol_version
        )));
    }

    Ok(HelloOutcome {
        peer_version: theirs.version,
        peer_app_installed: theirs.app_installed,
    })
}

/// Listening side: check the connector's hello, then answer with ours.
pub fn hello_accept<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    config: &LinkConfig,
) -> Result<HelloOutcome> {
    validate_version(&config.protocol_version)?;

    let theirs = recv_hello(reader, config.handshake_timeout)?;
    check_protocol(&theirs, config)?;
    if !is_version_compatible(&theirs.version, &config.protocol_version)? {
        return Err(LinkError::Handshake(format!(
            "incompatible version '{}' (listener '{}')",
            theirs.version, config.protocol_version
        )));
    }
    send_hello(writer, &Hello::from_config(config))?;

    Ok(HelloOutcome {
        peer_version: theirs.version,
        peer_app_installed: theirs.app_installed,
    })
}

fn send_hello<W: Write>(writer: &mut FrameWriter<W>, hello: &Hello) -> Result<()> {
    let payload = serde_json::to_vec(hello)?;
    writer.send(CONTROL, 0, &payload)?;
    Ok(())
}

fn recv_hello<R: Read>(reader: &mut FrameReader<R>, timeout: Duration) -> Result<Hello> {
    let deadline = Instant::now() + timeout;
    loop {
        if Instant::now() >= deadline {
            return Err(LinkError::Timeout(timeout));
        }

        match reader.read_frame() {
            Ok(frame) => {
                if frame.kind != CONTROL {
                    return Err(LinkError::Handshake(format!(
                        "expected CONTROL frame before hello, got kind {}",
                        frame.kind
                    )));
                }
                if frame.payload.len() > MAX_HELLO_PAYLOAD {
                    return Err(LinkError::Handshake(format!(
                        "hello too large: {} (max {})",
                        frame.payload.len(),
                        MAX_HELLO_PAYLOAD
                    )));
                }
                let hello: Hello = serde_json::from_slice(&frame.payload)?;
                return Ok(hello);
            }
            Err(FrameError::Io(err))
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(FrameError::ConnectionClosed) => {
                return Err(LinkError::Disconnected(
                    "connection closed during hello".to_string(),
                ));
            }
            Err(err) => return Err(LinkError::Frame(err)),
        }
    }
}

fn check_protocol(theirs: &Hello, config: &LinkConfig) -> Result<()> {
    if theirs.protocol.is_empty() || theirs.protocol.len() > MAX_PROTOCOL_LEN {
        return Err(LinkError::Handshake(format!(
            "invalid protocol name length: {}",
            theirs.protocol.len()
        )));
    }
    if theirs.protocol != config.protocol_name {
        return Err(LinkError::Handshake(format!(
            "unknown protocol '{}' (expected '{}')",
            theirs.protocol, config.protocol_name
        )));
    }
    validate_version(&theirs.version)
}

fn validate_version(version: &str) -> Result<()> {
    if version.is_empty() || version.len() > MAX_VERSION_LEN {
        return Err(LinkError::Handshake(format!(
            "invalid protocol version length: {}",
            version.len()
        )));
    }
    parse_version(version).map(|_| ())
}

/// Same major, and the connector is at least as new as the listener.
fn is_version_compatible(connector: &str, listener: &str) -> Result<bool> {
    let (connector_major, connector_minor) = parse_version(connector)?;
    let (listener_major, listener_minor) = parse_version(listener)?;
    Ok(connector_major == listener_major && connector_minor >= listener_minor)
}

fn parse_version(version: &str) -> Result<(u16, u16)> {
    let invalid = |why: &str| LinkError::Handshake(format!("invalid version '{version}': {why}"));

    let (major, minor) = version
        .split_once('.')
        .ok_or_else(|| invalid("expected '<major>.<minor>'"))?;
    if minor.contains('.') {
        return Err(invalid("expected '<major>.<minor>'"));
    }
    let major = major
        .parse::<u16>()
        .map_err(|_| invalid("non-numeric major"))?;
    let minor = minor
        .parse::<u16>()
        .map_err(|_| invalid("non-numeric minor"))?;
    Ok((major, minor))
}

#[cfg(test)]
mod tests {
    use std::thread;

    use pairlink_frame::MESSAGE;
    use pairlink_transport::LinkStream;

    use super::*;

    fn ends(stream: LinkStream) -> (FrameReader<LinkStream>, FrameWriter<LinkStream>) {
        let reader = FrameReader::new(stream.try_clone().unwrap());
        (reader, FrameWriter::new(stream))
    }

    fn run(
        connector: LinkConfig,
        listener: LinkConfig,
    ) -> (Result<HelloOutcome>, Result<HelloOutcome>) {
        let (left, right) = LinkStream::pair().unwrap();
        let server = thread::spawn(move || {
            let (mut reader, mut writer) = ends(left);
            hello_accept(&mut reader, &mut writer, &listener)
        });
        let (mut reader, mut writer) = ends(right);
        let client = hello_connect(&mut reader, &mut writer, &connector);
        (client, server.join().unwrap())
    }

    #[test]
    fn hello_exchanges_install_flags() {
        let (client, server) = run(
            LinkConfig::default().with_app_installed(false),
            LinkConfig::default(),
        );
        let client = client.unwrap();
        let server = server.unwrap();
        assert!(client.peer_app_installed);
        assert!(!server.peer_app_installed);
        assert_eq!(client.peer_version, "1.0");
    }

    #[test]
    fn newer_minor_connector_is_accepted() {
        let (client, server) = run(
            LinkConfig::default().with_protocol_version("1.3"),
            LinkConfig::default(),
        );
        assert!(client.is_ok());
        assert_eq!(server.unwrap().peer_version, "1.3");
    }

    #[test]
    fn major_mismatch_is_rejected() {
        let (client, server) = run(
            LinkConfig::default().with_protocol_version("2.0"),
            LinkConfig::default(),
        );
        assert!(matches!(server, Err(LinkError::Handshake(_))));
        assert!(matches!(client, Err(LinkError::Disconnected(_))));
    }

    #[test]
    fn wrong_protocol_name_is_rejected() {
        let connector = LinkConfig {
            protocol_name: "otherproto".to_string(),
            ..LinkConfig::default()
        };
        let (_, server) = run(connector, LinkConfig::default());
        assert!(matches!(server, Err(LinkError::Handshake(msg)) if msg.contains("otherproto")));
    }

    #[test]
    fn non_control_frame_before_hello_is_rejected() {
        let (left, right) = LinkStream::pair().unwrap();
        let (mut reader, _) = ends(left);
        let (_, mut writer) = ends(right);
        writer.send(MESSAGE, 1, b"{}").unwrap();

        assert!(matches!(
            recv_hello(&mut reader, Duration::from_secs(1)),
            Err(LinkError::Handshake(_))
        ));
    }

    #[test]
    fn version_parsing() {
        assert_eq!(parse_version("1.0").unwrap(), (1, 0));
        assert!(parse_version("1").is_err());
        assert!(parse_version("1.0.0").is_err());
        assert!(parse_version("a.b").is_err());
        assert!(is_version_compatible("1.2", "1.1").unwrap());
        assert!(!is_version_compatible("1.0", "1.1").unwrap());
    }
}
