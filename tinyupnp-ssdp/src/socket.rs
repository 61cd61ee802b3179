use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use crate::{Result, ADVERT_TTL, SSDP_GROUP};

/// How long a blocking receive waits before the loop services timers
const RECV_POLL: Duration = Duration::from_millis(250);

/// Open the shared discovery socket
///
/// Bound to the SSDP port with address reuse so the advertiser can
/// coexist with other UPnP stacks on the host, joined to the multicast
/// group on all interfaces.
pub(crate) fn open() -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    let bind: SocketAddr = (Ipv4Addr::UNSPECIFIED, SSDP_GROUP.port()).into();
    socket.bind(&bind.into())?;
    socket.join_multicast_v4(SSDP_GROUP.ip(), &Ipv4Addr::UNSPECIFIED)?;
    socket.set_multicast_ttl_v4(ADVERT_TTL)?;
    socket.set_multicast_loop_v4(true)?;

    let socket: UdpSocket = socket.into();
    socket.set_read_timeout(Some(RECV_POLL))?;
    Ok(socket)
}
