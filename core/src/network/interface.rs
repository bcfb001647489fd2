//! AF_PACKET socket ownership and interface lookup (Linux).

use std::ffi::{CStr, CString};
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use crate::iec61850_9_2::mac::MacAddress;

fn last_os_error() -> io::Error {
    io::Error::last_os_error()
}

fn interface_name_cstring(name: &str) -> io::Result<CString> {
    CString::new(name)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "interface name contains NUL"))
}

fn interface_index(name: &str) -> io::Result<i32> {
    let c_name = interface_name_cstring(name)?;
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
    if index == 0 {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("interface {} not found", name),
        ));
    }
    Ok(index as i32)
}

fn ifreq_for(name: &str) -> io::Result<libc::ifreq> {
    let mut ifr: libc::ifreq = unsafe { std::mem::zeroed() };
    let bytes = name.as_bytes();
    if bytes.len() >= ifr.ifr_name.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("interface name {} too long", name),
        ));
    }
    for (dst, &src) in ifr.ifr_name.iter_mut().zip(bytes) {
        *dst = src as libc::c_char;
    }
    Ok(ifr)
}

/// Hardware (MAC) address of the named interface.
pub fn hardware_address(name: &str) -> io::Result<MacAddress> {
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
    if fd < 0 {
        return Err(last_os_error());
    }

    let mut ifr = match ifreq_for(name) {
        Ok(ifr) => ifr,
        Err(e) => {
            unsafe { libc::close(fd) };
            return Err(e);
        }
    };

    let rc = unsafe { libc::ioctl(fd, libc::SIOCGIFHWADDR, &mut ifr) };
    unsafe { libc::close(fd) };
    if rc < 0 {
        return Err(last_os_error());
    }

    let mut mac = [0u8; 6];
    let hw = unsafe { ifr.ifr_ifru.ifru_hwaddr };
    for (dst, &src) in mac.iter_mut().zip(hw.sa_data.iter()) {
        *dst = src as u8;
    }
    Ok(MacAddress::new(mac))
}

/// Names of all non-loopback link-layer interfaces currently up.
pub fn list_up_interfaces() -> io::Result<Vec<String>> {
    let mut addrs: *mut libc::ifaddrs = std::ptr::null_mut();
    if unsafe { libc::getifaddrs(&mut addrs) } != 0 {
        return Err(last_os_error());
    }

    let mut names = Vec::new();
    let mut cursor = addrs;
    while !cursor.is_null() {
        let entry = unsafe { &*cursor };
        cursor = entry.ifa_next;

        if entry.ifa_addr.is_null() {
            continue;
        }
        let family = unsafe { (*entry.ifa_addr).sa_family };
        if family != libc::AF_PACKET as libc::sa_family_t {
            continue;
        }

        let flags = entry.ifa_flags;
        if flags & libc::IFF_LOOPBACK as libc::c_uint != 0 {
            continue;
        }
        if flags & libc::IFF_UP as libc::c_uint == 0 {
            continue;
        }

        let name = unsafe { CStr::from_ptr(entry.ifa_name) }
            .to_string_lossy()
            .into_owned();
        if !names.contains(&name) {
            names.push(name);
        }
    }

    unsafe { libc::freeifaddrs(addrs) };
    Ok(names)
}

/// First usable interface for auto-detection, if any.
pub fn first_up_interface() -> Option<String> {
    list_up_interfaces().ok()?.into_iter().next()
}

/// A link-layer socket bound to one interface. The descriptor is closed
/// on drop, whatever the exit path.
#[derive(Debug)]
pub struct RawSocket {
    fd: RawFd,
    if_index: i32,
}

impl RawSocket {
    /// Opens an AF_PACKET socket receiving all EtherTypes and binds it to
    /// the named interface.
    pub fn open(interface: &str) -> io::Result<Self> {
        let protocol = (libc::ETH_P_ALL as u16).to_be() as libc::c_int;
        let fd = unsafe { libc::socket(libc::AF_PACKET, libc::SOCK_RAW, protocol) };
        if fd < 0 {
            return Err(last_os_error());
        }

        let socket = RawSocket { fd, if_index: 0 };
        let if_index = interface_index(interface)?;

        let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as libc::sa_family_t;
        addr.sll_protocol = (libc::ETH_P_ALL as u16).to_be();
        addr.sll_ifindex = if_index;

        let rc = unsafe {
            libc::bind(
                socket.fd,
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(last_os_error());
        }

        Ok(RawSocket {
            fd: socket.into_fd(),
            if_index,
        })
    }

    fn into_fd(self) -> RawFd {
        let fd = self.fd;
        std::mem::forget(self);
        fd
    }

    /// Joins promiscuous membership on the bound interface so frames for
    /// foreign destination MACs reach the capture loop.
    pub fn enable_promiscuous(&self) -> io::Result<()> {
        let mut mreq: libc::packet_mreq = unsafe { std::mem::zeroed() };
        mreq.mr_ifindex = self.if_index;
        mreq.mr_type = libc::PACKET_MR_PROMISC as libc::c_ushort;

        let rc = unsafe {
            libc::setsockopt(
                self.fd,
                libc::SOL_PACKET,
                libc::PACKET_ADD_MEMBERSHIP,
                &mreq as *const libc::packet_mreq as *const libc::c_void,
                std::mem::size_of::<libc::packet_mreq>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(last_os_error());
        }
        Ok(())
    }

    /// Bounds blocking receives so a capture loop can observe its stop
    /// flag between frames.
    pub fn set_read_timeout(&self, timeout: Duration) -> io::Result<()> {
        let tv = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };
        let rc = unsafe {
            libc::setsockopt(
                self.fd,
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                &tv as *const libc::timeval as *const libc::c_void,
                std::mem::size_of::<libc::timeval>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(last_os_error());
        }
        Ok(())
    }

    /// Sends one frame to the given destination MAC. Returns the number of
    /// bytes the kernel accepted.
    pub fn send_to(&self, frame: &[u8], destination: MacAddress) -> io::Result<usize> {
        let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as libc::sa_family_t;
        addr.sll_ifindex = self.if_index;
        addr.sll_halen = 6;
        for (dst, &src) in addr.sll_addr.iter_mut().zip(destination.as_bytes()) {
            *dst = src;
        }

        let sent = unsafe {
            libc::sendto(
                self.fd,
                frame.as_ptr() as *const libc::c_void,
                frame.len(),
                0,
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if sent < 0 {
            return Err(last_os_error());
        }
        Ok(sent as usize)
    }

    /// Blocks until one frame arrives (or the read timeout elapses) and
    /// returns its length.
    pub fn recv(&self, buffer: &mut [u8]) -> io::Result<usize> {
        let received = unsafe {
            libc::recv(
                self.fd,
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len(),
                0,
            )
        };
        if received < 0 {
            return Err(last_os_error());
        }
        Ok(received as usize)
    }
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

// The descriptor is only mutated by the kernel; concurrent send/recv from
// separate threads is safe at this layer.
unsafe impl Send for RawSocket {}
unsafe impl Sync for RawSocket {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_interface_is_rejected() {
        let err = RawSocket::open("does-not-exist-0").unwrap_err();
        // Either the socket call needs privileges or the lookup fails;
        // both are construction failures, never a partially built socket.
        assert!(
            err.kind() == io::ErrorKind::NotFound
                || err.kind() == io::ErrorKind::PermissionDenied
        );
    }

    #[test]
    fn test_list_up_interfaces_excludes_loopback() {
        if let Ok(names) = list_up_interfaces() {
            assert!(names.iter().all(|n| n != "lo"));
        }
    }

    #[test]
    fn test_overlong_interface_name_rejected() {
        let name = "x".repeat(64);
        assert!(hardware_address(&name).is_err());
    }
}
