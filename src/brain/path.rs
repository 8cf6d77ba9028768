//! Cyclic swap path
//!
//! Logically `[T0, F1, T1, ..., Fk, T0]`. Stored as the start token plus
//! `k` hops so a path can only ever be extended, never edited in place.

use alloy_primitives::{Address, Bytes};
use eyre::{eyre, Result};
use std::fmt;
use std::str::FromStr;

/// Largest fee representable in the packed `uint24` slot
const MAX_FEE: u32 = 0x00ff_ffff;

/// One swap: pay `fee` tier to move into `token`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hop {
    pub fee: u32,
    pub token: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArbPath {
    start: Address,
    hops: Vec<Hop>,
}

impl ArbPath {
    pub fn new(start: Address) -> Self {
        Self {
            start,
            hops: Vec::new(),
        }
    }

    /// New path with one more hop; `self` is left untouched
    pub fn extended(&self, fee: u32, token: Address) -> Self {
        let mut hops = Vec::with_capacity(self.hops.len() + 1);
        hops.extend_from_slice(&self.hops);
        hops.push(Hop { fee, token });
        Self {
            start: self.start,
            hops,
        }
    }

    pub fn start(&self) -> Address {
        self.start
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    pub fn last_token(&self) -> Address {
        self.hops.last().map(|h| h.token).unwrap_or(self.start)
    }

    /// Token sequence, `hop_count() + 1` entries
    pub fn tokens(&self) -> impl Iterator<Item = Address> + '_ {
        std::iter::once(self.start).chain(self.hops.iter().map(|h| h.token))
    }

    pub fn fees(&self) -> impl Iterator<Item = u32> + '_ {
        self.hops.iter().map(|h| h.fee)
    }

    pub fn is_closed(&self) -> bool {
        !self.hops.is_empty() && self.last_token() == self.start
    }

    /// Flat element count, `2k + 1`
    pub fn flat_len(&self) -> usize {
        2 * self.hops.len() + 1
    }

    /// `(predecessor, fee, token)` for every hop
    pub fn arrivals(&self) -> impl Iterator<Item = (Address, u32, Address)> + '_ {
        self.tokens()
            .zip(self.hops.iter())
            .map(|(prev, hop)| (prev, hop.fee, hop.token))
    }

    /// Flat `address, fee, address, ...` elements as written to the cache
    pub fn to_raw_elements(&self) -> Vec<String> {
        let mut elements = Vec::with_capacity(self.flat_len());
        elements.push(self.start.to_string());
        for hop in &self.hops {
            elements.push(hop.fee.to_string());
            elements.push(hop.token.to_string());
        }
        elements
    }

    /// Parse flat elements back into a closed path
    pub fn from_raw_elements<S: AsRef<str>>(elements: &[S]) -> Result<Self> {
        if elements.len() < 3 || elements.len() % 2 == 0 {
            return Err(eyre!(
                "path needs an odd number of elements (>= 3), got {}",
                elements.len()
            ));
        }

        let start = parse_token(elements[0].as_ref())?;
        let mut path = Self::new(start);

        for pair in elements[1..].chunks(2) {
            let fee = parse_fee(pair[0].as_ref())?;
            let token = parse_token(pair[1].as_ref())?;
            path = path.extended(fee, token);
        }

        if !path.is_closed() {
            return Err(eyre!("path does not return to its start token"));
        }
        Ok(path)
    }

    /// `abi.encodePacked(address, uint24, address, ...)` as the quoter
    /// and router expect
    pub fn encode_packed(&self) -> Bytes {
        let mut out = Vec::with_capacity(20 + self.hops.len() * 23);
        out.extend_from_slice(self.start.as_slice());
        for hop in &self.hops {
            out.extend_from_slice(&hop.fee.to_be_bytes()[1..]);
            out.extend_from_slice(hop.token.as_slice());
        }
        Bytes::from(out)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.encode_packed()))
    }
}

impl fmt::Display for ArbPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_raw_elements().join(","))
    }
}

fn parse_token(raw: &str) -> Result<Address> {
    Address::from_str(raw.trim()).map_err(|e| eyre!("bad token address '{}': {}", raw, e))
}

fn parse_fee(raw: &str) -> Result<u32> {
    let fee: u32 = raw
        .trim()
        .parse()
        .map_err(|e| eyre!("bad fee '{}': {}", raw, e))?;
    if fee > MAX_FEE {
        return Err(eyre!("fee {} does not fit in uint24", fee));
    }
    Ok(fee)
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn triangle() -> ArbPath {
        ArbPath::new(addr(1))
            .extended(500, addr(2))
            .extended(3000, addr(3))
            .extended(100, addr(1))
    }

    #[test]
    fn test_extension_does_not_mutate() {
        let base = ArbPath::new(addr(1)).extended(500, addr(2));
        let left = base.extended(500, addr(3));
        let right = base.extended(3000, addr(4));

        assert_eq!(base.hop_count(), 1);
        assert_eq!(left.last_token(), addr(3));
        assert_eq!(right.last_token(), addr(4));
    }

    #[test]
    fn test_shape() {
        let path = triangle();
        assert!(path.is_closed());
        assert_eq!(path.hop_count(), 3);
        assert_eq!(path.flat_len(), 7);
        assert_eq!(path.to_raw_elements().len(), 7);
        assert_eq!(path.tokens().count(), 4);
        assert!(!ArbPath::new(addr(1)).is_closed());
    }

    #[test]
    fn test_raw_elements_parse_back() {
        let path = triangle();
        let parsed = ArbPath::from_raw_elements(&path.to_raw_elements()).unwrap();
        assert_eq!(parsed, path);

        // lowercase addresses from the indexer parse too
        let lower = [
            "0x0101010101010101010101010101010101010101",
            "500",
            "0x0202020202020202020202020202020202020202",
            "500",
            "0x0101010101010101010101010101010101010101",
        ];
        assert_eq!(ArbPath::from_raw_elements(&lower).unwrap().hop_count(), 2);
    }

    #[test]
    fn test_malformed_elements_rejected() {
        let even = ["0x0101010101010101010101010101010101010101", "500"];
        assert!(ArbPath::from_raw_elements(&even).is_err());

        let open = [
            "0x0101010101010101010101010101010101010101",
            "500",
            "0x0202020202020202020202020202020202020202",
        ];
        assert!(ArbPath::from_raw_elements(&open).is_err());

        let bad_fee = [
            "0x0101010101010101010101010101010101010101",
            "fivehundred",
            "0x0101010101010101010101010101010101010101",
        ];
        assert!(ArbPath::from_raw_elements(&bad_fee).is_err());

        let huge_fee = [
            "0x0101010101010101010101010101010101010101",
            "16777216",
            "0x0101010101010101010101010101010101010101",
        ];
        assert!(ArbPath::from_raw_elements(&huge_fee).is_err());
    }

    #[test]
    fn test_encode_packed_layout() {
        let path = ArbPath::new(addr(1)).extended(3000, addr(2)).extended(500, addr(1));
        let packed = path.encode_packed();

        assert_eq!(packed.len(), 20 + 2 * 23);
        assert_eq!(&packed[..20], addr(1).as_slice());
        // 3000 = 0x000bb8
        assert_eq!(&packed[20..23], &[0x00, 0x0b, 0xb8]);
        assert_eq!(&packed[23..43], addr(2).as_slice());
        // 500 = 0x0001f4
        assert_eq!(&packed[43..46], &[0x00, 0x01, 0xf4]);
        assert!(path.to_hex().starts_with("0x0101"));
    }

    #[test]
    fn test_arrivals() {
        let arrivals: Vec<_> = triangle().arrivals().collect();
        assert_eq!(arrivals.len(), 3);
        assert_eq!(arrivals[0], (addr(1), 500, addr(2)));
        assert_eq!(arrivals[2], (addr(3), 100, addr(1)));
    }
}
