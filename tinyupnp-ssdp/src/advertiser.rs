use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info, warn};

use crate::entry::SsdpEntry;
use crate::message::{self, response_delay_ms};
use crate::{Result, SsdpError, ADVERT_MAX_AGE, SSDP_GROUP};

/// Announcement bursts sent in quick succession right after start
const BOOT_BURSTS: u32 = 3;

/// Settings for a running [`Advertiser`]
#[derive(Debug, Clone)]
pub struct AdvertiserConfig {
    /// Advertised lifetime in seconds; re-announcements happen well
    /// inside this window
    pub max_age: u64,
    /// SERVER header value, e.g. `Linux/6.1 UPnP/1.0 tinyupnp/0.2`
    pub server: String,
    /// The notification targets to announce and answer searches for
    pub entries: Vec<SsdpEntry>,
}

impl AdvertiserConfig {
    pub fn new(server: impl Into<String>, entries: Vec<SsdpEntry>) -> Self {
        Self { max_age: ADVERT_MAX_AGE, server: server.into(), entries }
    }
}

/// Background thread announcing presence and answering searches
///
/// Sends `ssdp:alive` bursts on a jittered schedule and unicasts search
/// replies after a random delay inside the searcher's MX window. A
/// `ssdp:byebye` for every entry goes out when the advertiser stops.
pub struct Advertiser {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Advertiser {
    pub fn start(config: AdvertiserConfig) -> Result<Self> {
        let socket = crate::socket::open()?;
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("upnp-ssdp".into())
            .spawn(move || run(socket, config, flag))
            .map_err(SsdpError::Io)?;
        Ok(Self { stop, handle: Some(handle) })
    }

    /// Signal the thread and wait for its byebye burst to go out
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("discovery thread panicked");
            }
        }
    }
}

impl Drop for Advertiser {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A unicast search reply waiting for its jitter delay to elapse
struct PendingReply {
    due: Instant,
    text: String,
    target: SocketAddr,
}

fn run(socket: UdpSocket, config: AdvertiserConfig, stop: Arc<AtomicBool>) {
    let mut rng = rand::thread_rng();
    let mut bursts_left = BOOT_BURSTS;
    let mut next_announce = Instant::now();
    let mut pending: Vec<PendingReply> = Vec::new();
    let mut buf = [0u8; 1024];

    info!(entries = config.entries.len(), "discovery advertiser started");

    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();

        if now >= next_announce {
            announce(&socket, &config);
            next_announce = now
                + if bursts_left > 0 {
                    bursts_left -= 1;
                    Duration::from_millis(rng.gen_range(200..=500))
                } else {
                    // Stay comfortably inside max-age so caches never
                    // see an entry lapse.
                    let ceiling = config.max_age.saturating_mul(600).max(1000);
                    Duration::from_millis(rng.gen_range(1000..=ceiling))
                };
        }

        let mut i = 0;
        while i < pending.len() {
            if now >= pending[i].due {
                let reply = pending.swap_remove(i);
                if let Err(err) = socket.send_to(reply.text.as_bytes(), reply.target) {
                    warn!(%err, target = %reply.target, "search reply failed");
                }
            } else {
                i += 1;
            }
        }

        match socket.recv_from(&mut buf) {
            Ok((len, from)) => {
                let text = String::from_utf8_lossy(&buf[..len]);
                if let Some(search) = message::parse_msearch(&text) {
                    debug!(st = %search.st, %from, "search received");
                    for (entry, st) in message::matches(&config.entries, &search.st) {
                        let delay = response_delay_ms(search.mx, &mut rng);
                        pending.push(PendingReply {
                            due: Instant::now() + Duration::from_millis(delay),
                            text: message::search_response(
                                entry,
                                &st,
                                &config.server,
                                config.max_age,
                            ),
                            target: from,
                        });
                    }
                }
            }
            Err(err)
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut => {}
            Err(err) => {
                warn!(%err, "discovery socket receive failed");
                thread::sleep(Duration::from_millis(250));
            }
        }
    }

    for entry in &config.entries {
        if let Err(err) = socket.send_to(message::byebye(entry).as_bytes(), SSDP_GROUP) {
            warn!(%err, nt = %entry.nt, "byebye send failed");
        }
    }
    info!("discovery advertiser stopped");
}

fn announce(socket: &UdpSocket, config: &AdvertiserConfig) {
    for entry in &config.entries {
        let text = message::alive(entry, &config.server, config.max_age);
        if let Err(err) = socket.send_to(text.as_bytes(), SSDP_GROUP) {
            warn!(%err, nt = %entry.nt, "announcement send failed");
        }
    }
}
