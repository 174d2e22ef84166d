//! Process Workers (unix)
//!
//! Parent and child halves of the isolated pool.
//!
//! ## Channel
//! Each child is started with one end of a Unix socket pair as its stdin.
//! ```text
//! parent ── 1 byte + SCM_RIGHTS(fd) ──▶ child     "serve this connection"
//! parent ◀── DONE (1 byte) ──────────── child     "finished, send the next"
//! ```
//! Closing the parent end is the shutdown signal: the child's next receive
//! sees end-of-stream and the process exits.
//!
//! A child that dies is reaped and replaced; only the connection it held
//! is lost.

use std::io::{self, Read, Write};
use std::mem;
use std::net::TcpStream;
use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use crossbeam::channel::Receiver;

use crate::config::{Config, Timeouts};
use crate::storage::FileService;

use super::pool::serve_connection;

/// Flag that switches the server binary into worker mode
pub const WORKER_FLAG: &str = "--worker";

/// Completion notice sent by a child after each connection
const DONE: u8 = 0x01;

// =============================================================================
// Parent side
// =============================================================================

/// Launches worker processes
#[derive(Debug, Clone)]
pub struct WorkerSpawner {
    /// Executable to run in worker mode
    program: PathBuf,

    /// Service directory each worker opens for itself
    service_dir: PathBuf,

    /// Socket timeouts the worker applies to connections
    timeouts: Timeouts,
}

impl WorkerSpawner {
    pub fn new(program: impl Into<PathBuf>, service_dir: impl Into<PathBuf>, timeouts: Timeouts) -> Self {
        Self {
            program: program.into(),
            service_dir: service_dir.into(),
            timeouts,
        }
    }

    /// Spawner for the configured program, or the running executable
    pub fn from_config(config: &Config) -> io::Result<Self> {
        let program = match &config.worker_program {
            Some(path) => path.clone(),
            None => std::env::current_exe()?,
        };
        Ok(Self::new(program, &config.service_dir, config.timeouts()))
    }

    /// Start one worker process
    pub fn spawn(&self, id: usize) -> io::Result<WorkerProcess> {
        let (channel, child_end) = UnixStream::pair()?;

        let child = Command::new(&self.program)
            .arg(WORKER_FLAG)
            .arg("--dir")
            .arg(&self.service_dir)
            .arg("--read-timeout-ms")
            .arg(timeout_arg(self.timeouts.read))
            .arg("--write-timeout-ms")
            .arg(timeout_arg(self.timeouts.write))
            .stdin(Stdio::from(OwnedFd::from(child_end)))
            .spawn()?;

        tracing::debug!("Worker {} started as pid {}", id, child.id());
        Ok(WorkerProcess { id, child, channel })
    }
}

fn timeout_arg(timeout: Option<std::time::Duration>) -> String {
    timeout.map_or(0, |t| t.as_millis() as u64).to_string()
}

/// A running worker process and the parent's end of its channel
#[derive(Debug)]
pub struct WorkerProcess {
    id: usize,
    child: Child,
    channel: UnixStream,
}

impl WorkerProcess {
    /// Hand a connection to the child
    fn deliver(&self, stream: &TcpStream) -> io::Result<()> {
        send_fd(&self.channel, stream.as_raw_fd())
    }

    /// Block until the child reports the connection finished
    fn wait_done(&mut self) -> io::Result<()> {
        let mut notice = [0u8; 1];
        self.channel.read_exact(&mut notice)?;
        if notice[0] != DONE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected notice byte 0x{:02x}", notice[0]),
            ));
        }
        Ok(())
    }

    /// Close the channel and wait for the child to exit
    fn stop(self) {
        let WorkerProcess { id, mut child, channel } = self;
        drop(channel);
        match child.wait() {
            Ok(status) => tracing::debug!("Worker {} exited: {}", id, status),
            Err(e) => tracing::warn!("Failed to wait for worker {}: {}", id, e),
        }
    }

    /// Kill (if still running) and reap a worker that stopped responding
    fn discard(mut self) {
        let _ = self.child.kill();
        self.stop();
    }
}

/// Supervisor loop: feed queued connections to one child, one at a time
pub fn supervise(
    id: usize,
    process: WorkerProcess,
    queue: Receiver<TcpStream>,
    spawner: &WorkerSpawner,
) {
    let mut current = Some(process);

    for stream in queue.iter() {
        let mut process = match current.take() {
            Some(process) => process,
            None => match spawner.spawn(id) {
                Ok(process) => process,
                Err(e) => {
                    tracing::error!("Could not restart worker {}: {}; dropping connection", id, e);
                    continue;
                }
            },
        };

        if let Err(e) = process.deliver(&stream) {
            // The child never saw this connection, so it is safe to retry once
            tracing::warn!("Worker {} unreachable ({}); restarting", id, e);
            process.discard();
            process = match spawner.spawn(id) {
                Ok(process) => process,
                Err(e) => {
                    tracing::error!("Could not restart worker {}: {}; dropping connection", id, e);
                    continue;
                }
            };
            if let Err(e) = process.deliver(&stream) {
                tracing::error!("Worker {} rejected connection: {}", id, e);
                process.discard();
                continue;
            }
        }

        // The child holds its own descriptor now
        drop(stream);

        match process.wait_done() {
            Ok(()) => current = Some(process),
            Err(e) => {
                tracing::warn!("Worker {} died while serving a connection: {}", id, e);
                process.discard();
            }
        }
    }

    if let Some(process) = current {
        process.stop();
    }
}

// =============================================================================
// Child side
// =============================================================================

/// Worker main loop over the channel inherited as stdin
pub fn run_worker_from_stdin(service: FileService, timeouts: Timeouts) -> io::Result<()> {
    let fd = io::stdin().as_fd().try_clone_to_owned()?;
    run_worker(UnixStream::from(fd), service, timeouts)
}

/// Serve connections received over `channel` until the parent closes it
pub fn run_worker(mut channel: UnixStream, service: FileService, timeouts: Timeouts) -> io::Result<()> {
    tracing::debug!("Worker process {} ready", std::process::id());

    while let Some(fd) = recv_fd(&channel)? {
        serve_connection(TcpStream::from(fd), &service, timeouts);
        channel.write_all(&[DONE])?;
    }

    tracing::debug!("Worker process {} exiting", std::process::id());
    Ok(())
}

// =============================================================================
// SCM_RIGHTS descriptor passing
// =============================================================================

/// Room for one descriptor's control message, 8-byte aligned
type ControlBuffer = [u64; 4];

/// Send one descriptor with a single marker byte
pub fn send_fd(channel: &UnixStream, fd: RawFd) -> io::Result<()> {
    let mut marker = [0u8; 1];
    let mut iov = libc::iovec {
        iov_base: marker.as_mut_ptr().cast(),
        iov_len: marker.len(),
    };
    let mut control: ControlBuffer = [0; 4];

    // SAFETY: msghdr is plain data; every pointer stored in it refers to a
    // local that outlives the sendmsg call, and the control buffer is large
    // and aligned enough for one cmsghdr carrying one descriptor.
    unsafe {
        let space = libc::CMSG_SPACE(mem::size_of::<RawFd>() as u32) as usize;
        debug_assert!(space <= mem::size_of::<ControlBuffer>());

        let mut msg: libc::msghdr = mem::zeroed();
        msg.msg_iov = &mut iov;
        msg.msg_iovlen = 1;
        msg.msg_control = control.as_mut_ptr().cast();
        msg.msg_controllen = space as _;

        let cmsg = libc::CMSG_FIRSTHDR(&msg);
        (*cmsg).cmsg_level = libc::SOL_SOCKET;
        (*cmsg).cmsg_type = libc::SCM_RIGHTS;
        (*cmsg).cmsg_len = libc::CMSG_LEN(mem::size_of::<RawFd>() as u32) as _;
        std::ptr::write_unaligned(libc::CMSG_DATA(cmsg).cast::<RawFd>(), fd);

        loop {
            if libc::sendmsg(channel.as_raw_fd(), &msg, 0) >= 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

/// Receive one descriptor; `None` when the peer closed the channel
pub fn recv_fd(channel: &UnixStream) -> io::Result<Option<OwnedFd>> {
    let mut marker = [0u8; 1];
    let mut iov = libc::iovec {
        iov_base: marker.as_mut_ptr().cast(),
        iov_len: marker.len(),
    };
    let mut control: ControlBuffer = [0; 4];

    // SAFETY: as in `send_fd`; the kernel fills at most `msg_controllen`
    // bytes of the control buffer, and a descriptor read out of a
    // SCM_RIGHTS message is freshly installed in this process and owned
    // by nobody else.
    unsafe {
        let mut msg: libc::msghdr = mem::zeroed();
        msg.msg_iov = &mut iov;
        msg.msg_iovlen = 1;
        msg.msg_control = control.as_mut_ptr().cast();
        msg.msg_controllen = mem::size_of::<ControlBuffer>() as _;

        let received = loop {
            let n = libc::recvmsg(channel.as_raw_fd(), &mut msg, 0);
            if n >= 0 {
                break n;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        };

        if received == 0 {
            return Ok(None);
        }

        let cmsg = libc::CMSG_FIRSTHDR(&msg);
        if cmsg.is_null()
            || (*cmsg).cmsg_level != libc::SOL_SOCKET
            || (*cmsg).cmsg_type != libc::SCM_RIGHTS
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "message carried no descriptor",
            ));
        }

        let fd = std::ptr::read_unaligned(libc::CMSG_DATA(cmsg).cast::<RawFd>());
        Ok(Some(OwnedFd::from_raw_fd(fd)))
    }
}
