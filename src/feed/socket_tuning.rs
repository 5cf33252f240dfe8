//! Raw socket tuning for the feed connection (§4.2): `TCP_NODELAY` and a
//! ≥1 MB receive buffer are mandatory; busy-poll and quickack are optional
//! latency knobs applied best-effort.

use std::os::unix::io::RawFd;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct SocketTuningConfig {
    pub recv_buffer_size: usize,
    pub send_buffer_size: usize,
    pub busy_poll_us: Option<u32>,
    pub tcp_nodelay: bool,
    pub tcp_quickack: bool,
    pub keepalive_secs: Option<u32>,
}

impl SocketTuningConfig {
    /// Matches §4.2's minimum requirement: TCP_NODELAY on, ≥1 MB recv buffer.
    pub fn market_data() -> Self {
        Self {
            recv_buffer_size: 8 * 1024 * 1024,
            send_buffer_size: 256 * 1024,
            busy_poll_us: Some(50),
            tcp_nodelay: true,
            tcp_quickack: true,
            keepalive_secs: Some(60),
        }
    }

    pub fn conservative() -> Self {
        Self {
            recv_buffer_size: 1024 * 1024,
            send_buffer_size: 256 * 1024,
            busy_poll_us: None,
            tcp_nodelay: true,
            tcp_quickack: false,
            keepalive_secs: Some(60),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SocketTuningResult {
    pub tcp_nodelay_set: bool,
    pub recv_buffer_actual: usize,
    pub tcp_quickack_set: bool,
    pub busy_poll_set: bool,
    pub keepalive_set: bool,
    pub errors: Vec<String>,
}

impl SocketTuningResult {
    pub fn is_fully_applied(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn log_summary(&self) {
        if self.is_fully_applied() {
            tracing::debug!(recv_buffer = self.recv_buffer_actual, "socket tuning fully applied");
        } else {
            warn!(errors = ?self.errors, "socket tuning partially applied");
        }
    }
}

/// Applies the tuning knobs via raw setsockopt calls. Best-effort: failures
/// are accumulated into `errors` rather than aborting the connection.
pub fn apply_socket_tuning_fd(fd: RawFd, config: &SocketTuningConfig) -> SocketTuningResult {
    let mut result = SocketTuningResult::default();

    unsafe {
        if config.tcp_nodelay {
            let val: libc::c_int = 1;
            let rc = libc::setsockopt(
                fd,
                libc::IPPROTO_TCP,
                libc::TCP_NODELAY,
                &val as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            );
            result.tcp_nodelay_set = rc == 0;
            if rc != 0 {
                result.errors.push("TCP_NODELAY failed".to_string());
            }
        }

        let buf_val = config.recv_buffer_size as libc::c_int;
        let rc = libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            &buf_val as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
        if rc == 0 {
            result.recv_buffer_actual = config.recv_buffer_size;
        } else {
            result.errors.push("SO_RCVBUF failed".to_string());
        }

        if let Some(keepalive) = config.keepalive_secs {
            let val: libc::c_int = 1;
            let rc = libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_KEEPALIVE,
                &val as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            );
            result.keepalive_set = rc == 0;
            let _ = keepalive;
            if rc != 0 {
                result.errors.push("SO_KEEPALIVE failed".to_string());
            }
        }

        #[cfg(target_os = "linux")]
        if config.tcp_quickack {
            let val: libc::c_int = 1;
            let rc = libc::setsockopt(
                fd,
                libc::IPPROTO_TCP,
                libc::TCP_QUICKACK,
                &val as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            );
            result.tcp_quickack_set = rc == 0;
            if rc != 0 {
                result.errors.push("TCP_QUICKACK failed".to_string());
            }
        }

        #[cfg(target_os = "linux")]
        if let Some(busy_poll) = config.busy_poll_us {
            let val = busy_poll as libc::c_int;
            let rc = libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_BUSY_POLL,
                &val as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            );
            result.busy_poll_set = rc == 0;
            if rc != 0 {
                result.errors.push("SO_BUSY_POLL failed".to_string());
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_data_preset_meets_minimum() {
        let cfg = SocketTuningConfig::market_data();
        assert!(cfg.tcp_nodelay);
        assert!(cfg.recv_buffer_size >= 1024 * 1024);
    }

    #[test]
    fn test_apply_to_real_socket() {
        use std::net::UdpSocket;
        use std::os::unix::io::AsRawFd;
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let cfg = SocketTuningConfig::conservative();
        let result = apply_socket_tuning_fd(socket.as_raw_fd(), &cfg);
        assert!(result.recv_buffer_actual > 0 || !result.errors.is_empty());
    }
}
