//! Active port and address of a failover bond interface.
//!
//! The bond must run in `active-backup` mode; the field shows which slave is
//! currently carrying traffic together with the bond's address.

use crate::config::NET_INTERVAL;
use crate::error::{Result, StatusError};
use crate::provider::{read_trimmed, Provider, Registration, WatchSpec};
use nix::ifaddrs::getifaddrs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

const FAILOVER_MODE: &str = "active-backup";

/// Resolves the address assigned to an interface.
pub trait AddressLookup {
    fn address_of(&self, interface: &str) -> Result<Option<IpAddr>>;
}

/// Looks addresses up with `getifaddrs(3)`, preferring IPv4.
pub struct SystemAddresses;

impl AddressLookup for SystemAddresses {
    fn address_of(&self, interface: &str) -> Result<Option<IpAddr>> {
        let addrs = getifaddrs()
            .map_err(|err| StatusError::io("could not query inet address", err.into()))?;

        let mut v6 = None;
        for ifaddr in addrs.filter(|a| a.interface_name == interface) {
            let Some(address) = ifaddr.address else {
                continue;
            };
            if let Some(sin) = address.as_sockaddr_in() {
                return Ok(Some(IpAddr::V4(sin.ip())));
            }
            if let Some(sin6) = address.as_sockaddr_in6() {
                v6.get_or_insert(IpAddr::V6(sin6.ip()));
            }
        }
        Ok(v6)
    }
}

pub struct NetworkProvider<A: AddressLookup = SystemAddresses> {
    bond: PathBuf,
    interface: String,
    addresses: A,
}

impl NetworkProvider {
    pub fn init(sysfs_root: &Path, interface: &str) -> Result<Registration> {
        let provider = Self::open(sysfs_root, interface, SystemAddresses)?;
        Ok(Registration::new(provider).watch(WatchSpec::Every(NET_INTERVAL)))
    }
}

impl<A: AddressLookup> NetworkProvider<A> {
    pub fn open(sysfs_root: &Path, interface: &str, addresses: A) -> Result<Self> {
        let bond = sysfs_root.join(interface);
        if !bond.join("bonding").is_dir() {
            return Err(StatusError::unavailable(
                interface,
                format!("{} is not a bonding interface", bond.display()),
            ));
        }
        Ok(Self {
            bond,
            interface: interface.to_string(),
            addresses,
        })
    }

    fn active_port(&self) -> Result<String> {
        let mode = read_trimmed(&self.bond.join("bonding/mode"))?;
        if !mode.starts_with(FAILOVER_MODE) {
            return Err(StatusError::format(format!(
                "bond mode is '{mode}', not '{FAILOVER_MODE}'"
            )));
        }

        let port = read_trimmed(&self.bond.join("bonding/active_slave"))?;
        if port.is_empty() {
            return Err(StatusError::format("no active bond port found"));
        }
        Ok(port)
    }
}

impl<A: AddressLookup> Provider for NetworkProvider<A> {
    fn query(&mut self) -> Result<Option<String>> {
        let port = self.active_port()?;
        let address = self
            .addresses
            .address_of(&self.interface)?
            .ok_or_else(|| StatusError::format(format!("{} has no inet address", self.interface)))?;
        Ok(Some(format!("{port} {address}")))
    }
}
