use std::io;

use anyhow::Result;

pub const LOOPBACK: &str = "lo";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ByteCounters {
    pub sent: u64,
    pub received: u64,
}

impl ByteCounters {
    pub fn is_active(&self) -> bool {
        self.sent > 0 || self.received > 0
    }
}

/// Read-only view of the host's network statistics.
pub trait NetStatsProvider {
    /// Every interface name, in the order the host reports them.
    fn interface_names(&self) -> io::Result<Vec<String>>;

    /// Cumulative counters, or `None` if the interface has no counter entry.
    fn counters(&self, name: &str) -> io::Result<Option<ByteCounters>>;

    /// Link state, or `None` if the interface is missing from the status table.
    fn link_up(&self, name: &str) -> io::Result<Option<bool>>;
}

impl<H: NetStatsProvider + ?Sized> NetStatsProvider for Box<H> {
    fn interface_names(&self) -> io::Result<Vec<String>> {
        (**self).interface_names()
    }

    fn counters(&self, name: &str) -> io::Result<Option<ByteCounters>> {
        (**self).counters(name)
    }

    fn link_up(&self, name: &str) -> io::Result<Option<bool>> {
        (**self).link_up(name)
    }
}

pub fn list_interfaces<H: NetStatsProvider + ?Sized>(host: &H) -> io::Result<Vec<String>> {
    Ok(host
        .interface_names()?
        .into_iter()
        .filter(|name| name != LOOPBACK)
        .collect::<Vec<_>>())
}

pub fn select_active_interface<H: NetStatsProvider + ?Sized>(host: &H) -> io::Result<Option<String>> {
    let names = list_interfaces(host)?;
    Ok(first_active(names.into_iter().filter_map(|name| {
        let counters = host.counters(&name).ok().flatten()?;
        Some((name, counters))
    })))
}

// Pure decision function for easier testing
pub(crate) fn first_active<I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = (String, ByteCounters)>,
{
    candidates
        .into_iter()
        .find(|(_, counters)| counters.is_active())
        .map(|(name, _)| name)
}

#[cfg(target_os = "linux")]
pub fn system() -> Result<Box<dyn NetStatsProvider>> {
    Ok(Box::new(linux::ProcNet::new()))
}

#[cfg(not(target_os = "linux"))]
pub fn system() -> Result<Box<dyn NetStatsProvider>> {
    anyhow::bail!("Reading interface counters is only supported on Linux")
}

#[cfg(target_os = "linux")]
pub mod linux {
    use std::fs;
    use std::io;
    use std::path::PathBuf;

    use super::{ByteCounters, NetStatsProvider};

    const IFF_UP: u32 = 0x1;

    /// Counters through `procfs`, link flags from `/sys/class/net`.
    ///
    /// `procfs::net::dev_status` returns a map, so the host's enumeration
    /// order is read from the `/proc/net/dev` row order directly.
    pub struct ProcNet {
        dev_path: PathBuf,
        class_root: PathBuf,
    }

    impl ProcNet {
        pub fn new() -> Self {
            Self::with_roots("/proc/net/dev", "/sys/class/net")
        }

        pub fn with_roots(dev_path: impl Into<PathBuf>, class_root: impl Into<PathBuf>) -> Self {
            Self {
                dev_path: dev_path.into(),
                class_root: class_root.into(),
            }
        }
    }

    impl NetStatsProvider for ProcNet {
        fn interface_names(&self) -> io::Result<Vec<String>> {
            parse_interface_order(&fs::read_to_string(&self.dev_path)?)
        }

        fn counters(&self, name: &str) -> io::Result<Option<ByteCounters>> {
            let table = procfs::net::dev_status()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
            Ok(table.get(name).map(|dev| ByteCounters {
                sent: dev.sent_bytes,
                received: dev.recv_bytes,
            }))
        }

        fn link_up(&self, name: &str) -> io::Result<Option<bool>> {
            if name.is_empty() || name.contains('/') || name == "." || name == ".." {
                return Ok(None);
            }
            let raw = match fs::read_to_string(self.class_root.join(name).join("flags")) {
                Ok(raw) => raw,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e),
            };
            let flags = parse_flags(&raw)?;
            Ok(Some(flags & IFF_UP != 0))
        }
    }

    fn parse_flags(raw: &str) -> io::Result<u32> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        u32::from_str_radix(digits, 16).map_err(|e| invalid(format!("interface flags {trimmed:?}: {e}")))
    }

    /// Interface names in `/proc/net/dev` row order.
    pub(crate) fn parse_interface_order(text: &str) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        // Two header lines precede the data.
        for line in text.lines().skip(2) {
            if line.trim().is_empty() {
                continue;
            }
            let (name, _) = line
                .split_once(':')
                .ok_or_else(|| invalid(format!("missing ':' in {line:?}")))?;
            names.push(name.trim().to_string());
        }
        Ok(names)
    }

    fn invalid(msg: String) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, msg)
    }

}
