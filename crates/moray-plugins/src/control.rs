//! Worker control channel
//!
//! An out-of-band connection between a worker and its coordinator, used
//! only for completion signalling; result data travels through the
//! knowledge base. Each launch owns one pair: the worker end moves into
//! the spawned process, the monitor end stays with the scheduler.

use std::io::{Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::time::Duration;
use tracing::trace;

/// Wire tag for the completion marker
const MSG_FINISHED: u8 = 0x46;

/// Message received on the monitor end of a control channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// The plugin instance has finished, successfully or not
    Finished,
}

/// Worker end of a control channel
#[derive(Debug)]
pub struct WorkerChannel {
    stream: UnixStream,
}

/// Monitor end of a control channel
#[derive(Debug)]
pub struct MonitorChannel {
    stream: UnixStream,
}

/// Create a connected control-channel pair
pub fn control_pair() -> std::io::Result<(WorkerChannel, MonitorChannel)> {
    let (worker, monitor) = UnixStream::pair()?;
    Ok((
        WorkerChannel { stream: worker },
        MonitorChannel { stream: monitor },
    ))
}

impl WorkerChannel {
    /// Send the completion marker.
    ///
    /// Sent exactly once per launch, from inside the worker, on every exit
    /// path.
    pub fn send_finished(&mut self) -> std::io::Result<()> {
        self.stream.write_all(&[MSG_FINISHED])?;
        self.stream.flush()?;
        trace!("Completion marker sent");
        Ok(())
    }
}

impl AsRawFd for WorkerChannel {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

impl MonitorChannel {
    /// Bound the next `recv` call; `None` blocks indefinitely
    pub fn set_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        self.stream.set_read_timeout(timeout)
    }

    /// Receive the next control message.
    ///
    /// Blocks until a message arrives, the timeout elapses, or the peer end
    /// closes without sending (both surface as `Err`).
    pub fn recv(&mut self) -> std::io::Result<ControlMessage> {
        let mut buf = [0u8; 1];
        self.stream.read_exact(&mut buf)?;
        match buf[0] {
            MSG_FINISHED => Ok(ControlMessage::Finished),
            other => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown control message 0x{other:02x}"),
            )),
        }
    }
}
