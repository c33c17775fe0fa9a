//! UDP syslog audit handler.
//!
//! Delivers the same JSON blocks as the file handler over UDP with RFC 3164
//! framing: `<priority>MMM dd HH:MM:SS hostname tag: payload`.

use chrono::Utc;
use std::net::{SocketAddr, UdpSocket};

use crate::logger::{AuditError, AuditHandler};
use crate::record::AuditRecord;

/// Default priority: facility local0 (16), severity informational (6).
const DEFAULT_PRIORITY: u8 = 16 * 8 + 6;

/// Sends audit records to a syslog server over UDP.
pub struct SyslogUdpHandler {
    socket: UdpSocket,
    target: SocketAddr,
    hostname: String,
    tag: String,
    priority: u8,
}

impl SyslogUdpHandler {
    /// Creates a handler sending to `target` from an ephemeral local port.
    pub fn new(target: SocketAddr, hostname: &str, tag: &str) -> Result<Self, AuditError> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        Ok(Self {
            socket,
            target,
            hostname: hostname.to_string(),
            tag: tag.to_string(),
            priority: DEFAULT_PRIORITY,
        })
    }

    /// Overrides the syslog priority byte.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Formats one datagram for a record.
    fn frame(&self, record: &AuditRecord) -> String {
        // RFC 3164 day-of-month is space padded.
        let stamp = record
            .timestamp
            .with_timezone(&Utc)
            .format("%b %e %H:%M:%S");
        format!(
            "<{}>{} {} {}: {}",
            self.priority,
            stamp,
            self.hostname,
            self.tag,
            record.to_json()
        )
    }
}

impl AuditHandler for SyslogUdpHandler {
    fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let datagram = self.frame(record);
        self.socket.send_to(datagram.as_bytes(), self.target)?;
        tracing::trace!(target = %self.target, bytes = datagram.len(), "sent audit syslog datagram");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AccessMechanism;
    use std::time::Duration;

    fn record() -> AuditRecord {
        AuditRecord::new(AccessMechanism::Native, true, &[]).with_domain_uuid("u-syslog")
    }

    fn receiver() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind(("127.0.0.1", 0)).unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    #[test]
    fn datagram_carries_framed_json() {
        let (receiver, addr) = receiver();
        let handler = SyslogUdpHandler::new(addr, "testhost", "appdom").unwrap();
        handler.append(&record()).unwrap();

        let mut buf = [0u8; 64 * 1024];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        let datagram = std::str::from_utf8(&buf[..len]).unwrap();

        assert!(datagram.starts_with(&format!("<{DEFAULT_PRIORITY}>")));
        assert!(datagram.contains("testhost appdom: "));

        let json_start = datagram.find("appdom: ").unwrap() + "appdom: ".len();
        let json: serde_json::Value = serde_json::from_str(&datagram[json_start..]).unwrap();
        assert_eq!(json.get("domainUUID").unwrap(), "u-syslog");
    }

    #[test]
    fn frame_uses_rfc3164_datestamp() {
        let (_receiver, addr) = receiver();
        let handler = SyslogUdpHandler::new(addr, "h", "t").unwrap();
        let framed = handler.frame(&record());
        // <pri>MMM dd HH:MM:SS ...
        let after_pri = framed.split('>').nth(1).unwrap();
        let month = &after_pri[..3];
        assert!(month.chars().all(|c| c.is_ascii_alphabetic()));
        assert_eq!(&after_pri[15..16], " ");
    }

    #[test]
    fn custom_priority() {
        let (receiver, addr) = receiver();
        let handler = SyslogUdpHandler::new(addr, "h", "t").unwrap().with_priority(30);
        handler.append(&record()).unwrap();

        let mut buf = [0u8; 4096];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        let datagram = std::str::from_utf8(&buf[..len]).unwrap();
        assert!(datagram.starts_with("<30>"));
    }
}
