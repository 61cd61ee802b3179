//! Multicast discovery for tinyupnp devices
//!
//! Announces a device tree's presence over the well-known multicast
//! group and answers M-SEARCH queries with jittered unicast replies.
//! The advertised set is a flat list of [`SsdpEntry`] values derived
//! from the tree before the advertiser starts; the thread never touches
//! the model.

mod advertiser;
mod entry;
mod error;
mod message;
mod socket;

pub use advertiser::{Advertiser, AdvertiserConfig};
pub use entry::SsdpEntry;
pub use error::{Result, SsdpError};
pub use message::{alive, byebye, matches, parse_msearch, search_response, MSearch};

use std::net::{Ipv4Addr, SocketAddrV4};

/// The well-known discovery multicast group
pub const SSDP_GROUP: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(239, 255, 255, 250), 1900);

/// Advertised lifetime of announcements in seconds
pub const ADVERT_MAX_AGE: u64 = 1800;

/// Multicast TTL for announcements
pub const ADVERT_TTL: u32 = 2;
