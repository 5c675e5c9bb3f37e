//! Linux network interface ioctls
//!
//! Native ioctl operations for link state and MTU, replacing `ip link` calls.

use crate::error::{Error, Result};
use std::ffi::CString;
use std::net::UdpSocket;
use std::os::unix::io::AsRawFd;

const SIOCGIFFLAGS: libc::Ioctl = 0x8913;
const SIOCSIFFLAGS: libc::Ioctl = 0x8914;
const SIOCGIFMTU: libc::Ioctl = 0x8921;
const SIOCSIFMTU: libc::Ioctl = 0x8922;

/// `struct ifreq` with the flags member of the union
#[repr(C)]
struct IfReqFlags {
    ifr_name: [libc::c_char; libc::IF_NAMESIZE],
    ifr_flags: libc::c_short,
    _padding: [u8; 22],
}

/// `struct ifreq` with the MTU member of the union
#[repr(C)]
struct IfReqMtu {
    ifr_name: [libc::c_char; libc::IF_NAMESIZE],
    ifr_mtu: libc::c_int,
    _padding: [u8; 20],
}

/// Safely copy interface name into fixed-size buffer
/// Returns error if name is too long (max 15 chars + null terminator)
fn copy_ifname(dest: &mut [libc::c_char; libc::IF_NAMESIZE], name: &str) -> Result<()> {
    let name_cstr = CString::new(name)
        .map_err(|e| Error::Network(format!("Invalid interface name: {}", e)))?;
    let name_bytes = name_cstr.as_bytes_with_nul();

    if name_bytes.len() > libc::IF_NAMESIZE {
        return Err(Error::Network(format!(
            "Interface name too long: {} (max {} chars)",
            name,
            libc::IF_NAMESIZE - 1
        )));
    }

    for (slot, byte) in dest.iter_mut().zip(name_bytes) {
        *slot = *byte as libc::c_char;
    }

    Ok(())
}

fn control_socket() -> Result<UdpSocket> {
    UdpSocket::bind("0.0.0.0:0")
        .map_err(|e| Error::Network(format!("Failed to create socket: {}", e)))
}

fn ioctl_error(what: &str, name: &str) -> Error {
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ENODEV) {
        Error::InterfaceNotFound(name.to_string())
    } else {
        Error::Network(format!("Failed to {} on {}: {}", what, name, err))
    }
}

/// Bring an interface up or down
pub fn set_interface_up(name: &str, up: bool) -> Result<()> {
    let sock = control_socket()?;

    let mut req: IfReqFlags = unsafe { std::mem::zeroed() };
    copy_ifname(&mut req.ifr_name, name)?;

    let result = unsafe { libc::ioctl(sock.as_raw_fd(), SIOCGIFFLAGS, &mut req) };
    if result < 0 {
        return Err(ioctl_error("get interface flags", name));
    }

    let iff_up = libc::IFF_UP as libc::c_short;
    if up {
        req.ifr_flags |= iff_up;
    } else {
        req.ifr_flags &= !iff_up;
    }

    let result = unsafe { libc::ioctl(sock.as_raw_fd(), SIOCSIFFLAGS, &req) };
    if result < 0 {
        return Err(ioctl_error("set interface flags", name));
    }

    Ok(())
}

/// Read an interface's MTU
pub fn interface_mtu(name: &str) -> Result<u32> {
    let sock = control_socket()?;

    let mut req: IfReqMtu = unsafe { std::mem::zeroed() };
    copy_ifname(&mut req.ifr_name, name)?;

    let result = unsafe { libc::ioctl(sock.as_raw_fd(), SIOCGIFMTU, &mut req) };
    if result < 0 {
        return Err(ioctl_error("get MTU", name));
    }

    u32::try_from(req.ifr_mtu)
        .map_err(|_| Error::Network(format!("Invalid MTU {} on {}", req.ifr_mtu, name)))
}

/// Set an interface's MTU
pub fn set_interface_mtu(name: &str, mtu: u32) -> Result<()> {
    let sock = control_socket()?;

    let mut req: IfReqMtu = unsafe { std::mem::zeroed() };
    copy_ifname(&mut req.ifr_name, name)?;
    req.ifr_mtu = libc::c_int::try_from(mtu)
        .map_err(|_| Error::Network(format!("MTU {} out of range", mtu)))?;

    let result = unsafe { libc::ioctl(sock.as_raw_fd(), SIOCSIFMTU, &req) };
    if result < 0 {
        return Err(ioctl_error("set MTU", name));
    }

    Ok(())
}
