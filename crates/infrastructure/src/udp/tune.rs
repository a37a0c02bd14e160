use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use tracing::debug;

/// Creates a non-blocking UDP socket in the address family of `addr`.
///
/// socket2 sets close-on-exec on every socket it creates on Unix.
pub fn create_udp_socket(addr: SocketAddr) -> io::Result<Socket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_nonblocking(true)?;
    Ok(socket)
}

/// Widens the socket buffers and turns off path-MTU discovery so large
/// replies are fragmented instead of dropped (`IP_MTU_DISCOVER` on Linux,
/// `IP_DONTFRAG` on FreeBSD and Apple platforms).
///
/// Every option is best effort: failures are logged and otherwise ignored.
pub fn tune(socket: &Socket, buffer_size: usize, ipv6: bool) {
    if let Err(e) = set_recv_buffer(socket, buffer_size) {
        debug!(error = %e, buffer_size, "Unable to widen UDP receive buffer");
    }
    if let Err(e) = set_send_buffer(socket, buffer_size) {
        debug!(error = %e, buffer_size, "Unable to widen UDP send buffer");
    }
    if let Err(e) = disable_pmtu_discovery(socket, ipv6) {
        debug!(error = %e, "Unable to disable path MTU discovery");
    }
}

#[cfg(target_os = "linux")]
fn set_recv_buffer(socket: &Socket, size: usize) -> io::Result<()> {
    set_int_option(socket, libc::SOL_SOCKET, libc::SO_RCVBUFFORCE, clamp(size))
        .or_else(|_| socket.set_recv_buffer_size(size))
}

#[cfg(not(target_os = "linux"))]
fn set_recv_buffer(socket: &Socket, size: usize) -> io::Result<()> {
    socket.set_recv_buffer_size(size)
}

#[cfg(target_os = "linux")]
fn set_send_buffer(socket: &Socket, size: usize) -> io::Result<()> {
    set_int_option(socket, libc::SOL_SOCKET, libc::SO_SNDBUFFORCE, clamp(size))
        .or_else(|_| socket.set_send_buffer_size(size))
}

#[cfg(not(target_os = "linux"))]
fn set_send_buffer(socket: &Socket, size: usize) -> io::Result<()> {
    socket.set_send_buffer_size(size)
}

#[cfg(target_os = "linux")]
fn disable_pmtu_discovery(socket: &Socket, ipv6: bool) -> io::Result<()> {
    if ipv6 {
        set_int_option(
            socket,
            libc::IPPROTO_IPV6,
            libc::IPV6_MTU_DISCOVER,
            libc::IPV6_PMTUDISC_DONT,
        )?;
    }
    set_int_option(
        socket,
        libc::IPPROTO_IP,
        libc::IP_MTU_DISCOVER,
        libc::IP_PMTUDISC_DONT,
    )
}

#[cfg(any(target_os = "freebsd", target_os = "macos", target_os = "ios"))]
fn disable_pmtu_discovery(socket: &Socket, ipv6: bool) -> io::Result<()> {
    if ipv6 {
        set_int_option(socket, libc::IPPROTO_IPV6, libc::IPV6_DONTFRAG, 0)?;
    }
    set_int_option(socket, libc::IPPROTO_IP, libc::IP_DONTFRAG, 0)
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "freebsd",
    target_os = "macos",
    target_os = "ios"
)))]
fn disable_pmtu_discovery(_socket: &Socket, _ipv6: bool) -> io::Result<()> {
    Ok(())
}

#[cfg(target_os = "linux")]
fn clamp(size: usize) -> libc::c_int {
    libc::c_int::try_from(size).unwrap_or(libc::c_int::MAX)
}

#[cfg(any(
    target_os = "linux",
    target_os = "freebsd",
    target_os = "macos",
    target_os = "ios"
))]
fn set_int_option(
    socket: &Socket,
    level: libc::c_int,
    name: libc::c_int,
    value: libc::c_int,
) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            level,
            name,
            &value as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
