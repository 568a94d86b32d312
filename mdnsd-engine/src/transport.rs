use std::net::Ipv4Addr;
use std::time::Duration;

/// The narrow contract the engine needs from the network: send a multicast
/// datagram, receive one (blocking, with a timeout so the reactor can also
/// service its scheduler), and enumerate the local IPv4 addresses it is
/// bound on. Defined here rather than in `mdnsd-net` so that crate can stay
/// a leaf with no dependency back on the engine; `mdnsd-net`'s real socket
/// implements this trait, and tests substitute an in-process fake.
pub trait Transport: Send + Sync {
    /// Sends `bytes` to the mDNS multicast group on every joined interface.
    fn send(&self, bytes: &[u8]) -> std::io::Result<()>;

    /// Blocks until a datagram is available or `recv`'s read timeout (set via
    /// `set_read_timeout`) elapses, in which case it returns
    /// `ErrorKind::WouldBlock`/`TimedOut`.
    fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Adjusts how long `recv` blocks before timing out. Called once by the
    /// reactor at startup with a short interval so its scheduler tick runs
    /// even with no inbound traffic.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()>;

    /// The local IPv4 addresses this transport is bound on, used to fill in
    /// `A` records for locally registered services that don't specify one.
    fn local_addrs(&self) -> Vec<Ipv4Addr>;

    /// Unblocks a thread parked in `recv`, used by `close()` to let the
    /// reactor notice its stop flag without waiting out the read timeout.
    fn wake(&self) -> std::io::Result<()>;
}
