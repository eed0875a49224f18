//! IPv6 address construction from a delegated prefix and a host suffix
//!
//! A LAN device keeps its interface identifier while the upstream router
//! hands out a new prefix every now and then. The device's public address
//! is the delegated network bits followed by the device's own host bits.

use std::net::Ipv6Addr;

use crate::traits::DelegatedPrefix;

/// Combine `network` and `suffix` at bit `prefix_len`
///
/// Bits `0..prefix_len` (most significant first) come from `network`, the
/// remaining bits from `suffix`. Per byte, the host bits of the suffix are
/// masked and *added* to the network byte. For a well-formed prefix the
/// network's host bits are zero and this is the same as a bitwise OR; the
/// wrapping addition is kept deliberately so stray host bits in a prefix
/// produce the same result the router-side tooling computes.
///
/// `prefix_len` values above 128 are treated as 128.
pub fn combine(network: Ipv6Addr, prefix_len: u8, suffix: Ipv6Addr) -> Ipv6Addr {
    let prefix_len = usize::from(prefix_len.min(128));
    let mut out = network.octets();
    let suffix = suffix.octets();

    for (k, byte) in out.iter_mut().enumerate() {
        let mask = host_mask(k, prefix_len);
        *byte = byte.wrapping_add(suffix[k] & mask);
    }

    Ipv6Addr::from(out)
}

/// Address of the device with host bits `suffix` inside `prefix`
pub fn address_in(prefix: &DelegatedPrefix, suffix: Ipv6Addr) -> Ipv6Addr {
    combine(prefix.network, prefix.length, suffix)
}

// Bit j (0 = MSB) of the mask for byte k is set when k*8 + j >= prefix_len.
fn host_mask(k: usize, prefix_len: usize) -> u8 {
    let mut mask = 0u8;
    for j in 0..8 {
        if k * 8 + j >= prefix_len {
            mask |= 0b1000_0000 >> j;
        }
    }
    mask
}
