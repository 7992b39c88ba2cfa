//! Handle-based embedding surface.
//!
//! The host process creates an execution host, optionally installs a
//! protect hook, then creates listeners against it. Objects live in
//! process-wide registries behind opaque `u64` handles; construction
//! failures (invalid ports, unloadable certificates, bind errors) return
//! `None` and leave no object behind. Releasing a listener stops its accept
//! loop; tunnels already running keep their own lifetime.

mod config;
mod registry;

pub use config::{
    TcpForwardLinkConfig, TlsClientLinkConfig, WsClientLinkConfig, WsLinkConfig,
    WssClientLinkConfig, WssLinkConfig,
};
pub use wirelink_io::{ProtectHook, ProtectTarget};

use std::sync::Arc;

use tracing::debug;

use wirelink_io::IoHost;
use wirelink_tunnel::{
    TcpForwardHost, TlsClientHost, WsClientHost, WsHost, WssClientHost, WssHost,
};

use registry::Registry;

/// Opaque object handle. Never reused, never zero.
pub type Handle = u64;

static IO_HOSTS: Registry<IoHost> = Registry::new();
static TCP_FORWARD_HOSTS: Registry<TcpForwardHost> = Registry::new();
static TLS_CLIENT_HOSTS: Registry<TlsClientHost> = Registry::new();
static WS_HOSTS: Registry<WsHost> = Registry::new();
static WS_CLIENT_HOSTS: Registry<WsClientHost> = Registry::new();
static WSS_HOSTS: Registry<WssHost> = Registry::new();
static WSS_CLIENT_HOSTS: Registry<WssClientHost> = Registry::new();

/// Creates and starts an execution host. `concurrent <= 0` means one relay
/// context per hardware thread.
pub fn new_io_host(concurrent: i32) -> Option<Handle> {
    let host = IoHost::new(concurrent);
    if let Err(e) = host.start() {
        debug!("io host failed to start: {}", e);
        return None;
    }
    Some(IO_HOSTS.insert(host))
}

/// Stops the host's contexts and drops the handle.
pub fn release_io_host(handle: Handle) -> bool {
    match IO_HOSTS.remove(handle) {
        Some(host) => {
            host.close();
            true
        }
        None => false,
    }
}

/// Installs (or clears, with `None`) the protect hook consulted before every
/// outbound connect made through this host.
pub fn set_protect_hook(handle: Handle, hook: Option<ProtectHook>) -> bool {
    match IO_HOSTS.get(handle) {
        Some(host) => {
            host.set_protect(hook);
            true
        }
        None => false,
    }
}

macro_rules! new_listener {
    ($io_handle:expr, $config:expr, $host_type:ty, $registry:expr) => {{
        let io = IO_HOSTS.get($io_handle)?;
        let link = $config.to_link()?;
        let host = match <$host_type>::new(io, link) {
            Ok(host) => host,
            Err(e) => {
                debug!("listener construction failed: {}", e);
                return None;
            }
        };
        if let Err(e) = host.run() {
            debug!("listener failed to start: {}", e);
            return None;
        }
        Some($registry.insert(Arc::new(host)))
    }};
}

macro_rules! release_listener {
    ($handle:expr, $registry:expr) => {
        match $registry.remove($handle) {
            Some(host) => {
                host.close();
                true
            }
            None => false,
        }
    };
}

pub fn new_tcp_forward_host(io: Handle, config: &TcpForwardLinkConfig) -> Option<Handle> {
    new_listener!(io, config, TcpForwardHost, TCP_FORWARD_HOSTS)
}

pub fn release_tcp_forward_host(handle: Handle) -> bool {
    release_listener!(handle, TCP_FORWARD_HOSTS)
}

pub fn new_tls_client_host(io: Handle, config: &TlsClientLinkConfig) -> Option<Handle> {
    new_listener!(io, config, TlsClientHost, TLS_CLIENT_HOSTS)
}

pub fn release_tls_client_host(handle: Handle) -> bool {
    release_listener!(handle, TLS_CLIENT_HOSTS)
}

pub fn new_ws_host(io: Handle, config: &WsLinkConfig) -> Option<Handle> {
    new_listener!(io, config, WsHost, WS_HOSTS)
}

pub fn release_ws_host(handle: Handle) -> bool {
    release_listener!(handle, WS_HOSTS)
}

pub fn new_ws_client_host(io: Handle, config: &WsClientLinkConfig) -> Option<Handle> {
    new_listener!(io, config, WsClientHost, WS_CLIENT_HOSTS)
}

pub fn release_ws_client_host(handle: Handle) -> bool {
    release_listener!(handle, WS_CLIENT_HOSTS)
}

pub fn new_wss_host(io: Handle, config: &WssLinkConfig) -> Option<Handle> {
    new_listener!(io, config, WssHost, WSS_HOSTS)
}

pub fn release_wss_host(handle: Handle) -> bool {
    release_listener!(handle, WSS_HOSTS)
}

pub fn new_wss_client_host(io: Handle, config: &WssClientLinkConfig) -> Option<Handle> {
    new_listener!(io, config, WssClientHost, WSS_CLIENT_HOSTS)
}

pub fn release_wss_client_host(handle: Handle) -> bool {
    release_listener!(handle, WSS_CLIENT_HOSTS)
}

/// Default TLS 1.3 cipher suite ordering for this CPU.
pub fn default_cipher_suites() -> &'static str {
    wirelink_tls::default_cipher_suites()
}

/// CPU platform identifier (1 x86, 2 x86_64, 3 arm, 4 aarch64/ppc64).
pub fn cpu_platform() -> i32 {
    wirelink_tls::cpu_platform()
}

/// Best-effort realtime priority for the calling thread.
pub fn raise_thread_priority() {
    wirelink_io::platform::raise_thread_priority();
}

/// Best-effort realtime priority and OOM shielding for the whole process.
pub fn raise_process_priority() {
    wirelink_io::platform::raise_process_priority();
}
