//! アドレス割り当て
//!
//! サブネットごとに前進のみのアドレス列を払い出す。
//! 先頭の使用可能アドレスはゲートウェイとして予約される。

use crate::error::{LabError, Result};
use ipnet::{Ipv4AddrRange, Ipv4Net};
use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;
use tracing::debug;

pub const DEFAULT_SUBNET: &str = "192.168.159.0/24";

/// CIDR文字列をネットワークアドレスに正規化してパース
pub fn parse_subnet(value: &str) -> Result<Ipv4Net> {
    value
        .trim()
        .parse::<Ipv4Net>()
        .map(|net| net.trunc())
        .map_err(|_| LabError::InvalidSubnet(value.to_string()))
}

/// 1サブネット分のアドレス割り当て
#[derive(Debug, Clone)]
pub struct AddressAllocator {
    subnet: Ipv4Net,
    gateway: Option<Ipv4Addr>,
    hosts: Ipv4AddrRange,
    assigned: BTreeSet<Ipv4Addr>,
}

impl AddressAllocator {
    pub fn new(subnet: Ipv4Net) -> Self {
        let mut hosts = subnet.hosts();
        let gateway = hosts.next();
        Self {
            subnet,
            gateway,
            hosts,
            assigned: BTreeSet::new(),
        }
    }

    pub fn subnet(&self) -> Ipv4Net {
        self.subnet
    }

    /// 予約済みゲートウェイアドレス
    pub fn gateway(&self) -> Option<Ipv4Addr> {
        self.gateway
    }

    /// 次のアドレスを払い出す
    pub fn allocate(&mut self) -> Result<Ipv4Addr> {
        self.next()
            .ok_or_else(|| LabError::AddressExhausted(self.subnet.to_string()))
    }

    /// 明示指定されたアドレスを確保する
    ///
    /// 以降の払い出しではこのアドレスは飛ばされる。
    pub fn reserve(&mut self, address: Ipv4Addr) -> Result<()> {
        let usable = self.subnet.contains(&address)
            && Some(address) != self.gateway
            && (self.subnet.prefix_len() >= 31 || address != self.subnet.network())
            && (self.subnet.prefix_len() >= 31 || address != self.subnet.broadcast());
        if !usable {
            return Err(LabError::AddressOutsideSubnet {
                address,
                subnet: self.subnet.to_string(),
            });
        }
        if !self.assigned.insert(address) {
            return Err(LabError::DuplicateAddress {
                address,
                subnet: self.subnet.to_string(),
            });
        }
        debug!(%address, subnet = %self.subnet, "Reserved explicit address");
        Ok(())
    }
}

impl Iterator for AddressAllocator {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Ipv4Addr> {
        let address = self
            .hosts
            .by_ref()
            .find(|candidate| !self.assigned.contains(candidate))?;
        self.assigned.insert(address);
        Some(address)
    }
}

/// サブネットごとの割り当てキャッシュ
///
/// 同じサブネットへの繰り返し要求は同じ割り当てを継続する。
/// 生成1回ごとに新しく作ること。
#[derive(Debug, Default)]
pub struct AllocatorCache {
    allocators: HashMap<Ipv4Net, AddressAllocator>,
}

impl AllocatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_subnet(&mut self, subnet: Ipv4Net) -> &mut AddressAllocator {
        self.allocators
            .entry(subnet)
            .or_insert_with(|| AddressAllocator::new(subnet))
    }
}
