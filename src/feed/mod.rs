pub mod session;
pub mod socket_tuning;
pub mod tls;

pub use session::{FeedSession, FeedSessionConfig, ReconnectPolicy, SessionState, StateChangeCallback};
pub use socket_tuning::{apply_socket_tuning_fd, SocketTuningConfig, SocketTuningResult};
pub use tls::{SecurityConfig, TlsSecurityLevel};
