// SPDX-License-Identifier: Apache-2.0

//! UDP ingestion: binds the sensor's datagram port and forwards raw payloads
//! into the pipeline over a bounded channel. Socket tuning (receive buffer
//! size, scheduling priority) follows the teacher's `common.rs` idiom.

use kanal::AsyncSender;
use tokio::net::UdpSocket;
use tracing::{error, instrument, warn};

/// Largest possible UDP payload; the actual compact packet is typically a
/// few kilobytes but datagrams can be fragmented up to this bound.
const MAX_DATAGRAM_SIZE: usize = 65_535;

#[cfg(target_os = "linux")]
pub fn set_process_priority() {
    let mut param = libc::sched_param { sched_priority: 10 };
    let tid = unsafe { libc::pthread_self() };
    let err = unsafe {
        libc::pthread_setschedparam(tid, libc::SCHED_FIFO, &mut param as *mut libc::sched_param)
    };
    if err != 0 {
        let err = std::io::Error::last_os_error();
        warn!("unable to set udp_read real-time fifo scheduler: {}", err);
    }
}

#[cfg(not(target_os = "linux"))]
pub fn set_process_priority() {}

#[cfg(target_os = "linux")]
fn set_socket_bufsize(socket: std::net::UdpSocket, size: usize) -> std::net::UdpSocket {
    use std::os::fd::{FromRawFd, IntoRawFd};

    let fd = socket.into_raw_fd();
    let size = size as libc::c_int;
    let err = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            &size as *const _ as *const libc::c_void,
            std::mem::size_of_val(&size) as libc::socklen_t,
        )
    };
    if err != 0 {
        warn!(
            "setsockopt SO_RCVBUF failed: {}",
            std::io::Error::last_os_error()
        );
    }
    unsafe { std::net::UdpSocket::from_raw_fd(fd) }
}

#[cfg(not(target_os = "linux"))]
fn set_socket_bufsize(socket: std::net::UdpSocket, _size: usize) -> std::net::UdpSocket {
    socket
}

/// Binds `port` and forwards every received datagram to `tx`. Runs until the
/// process exits; a send failure means the pipeline task has gone away, at
/// which point there is nothing left to do but stop.
#[instrument(skip(tx))]
pub async fn run_ingestion(port: u16, tx: AsyncSender<Vec<u8>>) {
    set_process_priority();

    let std_sock = std::net::UdpSocket::bind(("0.0.0.0", port))
        .unwrap_or_else(|e| panic!("failed to bind udp port {port}: {e}"));
    std_sock
        .set_nonblocking(true)
        .expect("set_nonblocking must succeed on a fresh socket");
    let std_sock = set_socket_bufsize(std_sock, 2 * 1024 * 1024);
    let sock = UdpSocket::from_std(std_sock).expect("tokio UdpSocket::from_std");

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        match sock.recv_from(&mut buf).await {
            Ok((n, _addr)) => {
                if let Err(e) = tx.send(buf[..n].to_vec()).await {
                    error!("ingestion channel closed, stopping: {:?}", e);
                    return;
                }
            }
            Err(e) => error!("udp recv error: {:?}", e),
        }
    }
}
