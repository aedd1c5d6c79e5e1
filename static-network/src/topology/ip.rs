use anyhow::{Context, anyhow, bail};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::fmt::{Display, Formatter};
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

/// An IPv4 address together with the prefix length of its subnet (e.g. `10.0.1.1/24`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct Ipv4Cidr {
    address: Ipv4Addr,
    network_prefix: u8,
}

impl Ipv4Cidr {
    pub fn new(address: Ipv4Addr, network_prefix: u8) -> anyhow::Result<Self> {
        validate_network_prefix(network_prefix)?;
        Ok(Self {
            address,
            network_prefix,
        })
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn network_prefix(&self) -> u8 {
        self.network_prefix
    }

    fn mask(&self) -> u32 {
        // A /0 prefix masks every bit away
        u32::MAX
            .checked_shl(32 - u32::from(self.network_prefix))
            .unwrap_or(0)
    }

    /// The first address of the subnet
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from_bits(self.address.to_bits() & self.mask())
    }

    /// The last address of the subnet
    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from_bits(self.address.to_bits() | !self.mask())
    }

    /// Whether the address has no host bits set, i.e. it names the subnet itself
    pub fn is_network_address(&self) -> bool {
        self.address == self.network()
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        (self.network()..=self.broadcast()).contains(&ip)
    }
}

impl Display for Ipv4Cidr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.address, self.network_prefix)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        let base_ip: IpAddr = parts
            .next()
            .ok_or(anyhow!("empty string"))?
            .parse()
            .context("invalid ip address in cidr")?;

        let IpAddr::V4(base_ip) = base_ip else {
            bail!("only IPv4 supported at the moment");
        };

        // A missing network prefix is interpreted as /32 (i.e. a single address)
        let network_prefix: u8 = parts
            .next()
            .unwrap_or("32")
            .parse()
            .context("the provided network prefix is not a valid unsigned integer")?;
        validate_network_prefix(network_prefix)?;

        if parts.next().is_some() {
            bail!("cidr contains trailing characters");
        }

        Ok(Self {
            address: base_ip,
            network_prefix,
        })
    }
}

fn validate_network_prefix(network_prefix: u8) -> anyhow::Result<()> {
    if network_prefix > 32 {
        bail!("network prefix cannot be higher than 32");
    }

    Ok(())
}

/// Parses a dotted-decimal IPv4 address, rejecting IPv6
pub(crate) fn parse_ipv4(s: &str) -> anyhow::Result<Ipv4Addr> {
    let ip: IpAddr = s
        .parse()
        .with_context(|| format!("`{s}` is not a valid ip address"))?;
    let IpAddr::V4(ip) = ip else {
        bail!("only IPv4 supported at the moment");
    };

    Ok(ip)
}

#[test]
fn test_cidr_subnet_bounds() {
    let cases = [
        ("10.0.0.0/24", "10.0.0.0", "10.0.0.255"),
        ("10.0.0.123/24", "10.0.0.0", "10.0.0.255"),
        ("10.0.0.0/8", "10.0.0.0", "10.255.255.255"),
        ("20.0.0.0/12", "20.0.0.0", "20.15.255.255"),
        ("10.0.4.2", "10.0.4.2", "10.0.4.2"),
    ];

    for (input, network, broadcast) in cases {
        let cidr = Ipv4Cidr::from_str(input).unwrap();
        assert_eq!(cidr.network().to_string(), network);
        assert_eq!(cidr.broadcast().to_string(), broadcast);
    }
}

#[test]
fn test_cidr_rejects_malformed_input() {
    for input in [
        "",
        "10.0.0.1/",
        "10.0.0.1/33",
        "10.0.0.1/24/8",
        "10.0.0/24",
        "::1/64",
    ] {
        assert!(Ipv4Cidr::from_str(input).is_err(), "{input}");
    }

    assert!(Ipv4Cidr::new(Ipv4Addr::new(10, 0, 0, 1), 33).is_err());
}

#[test]
fn test_cidr_display_preserves_host_bits() {
    let cidr = Ipv4Cidr::from_str("10.0.1.100/24").unwrap();
    assert_eq!(cidr.to_string(), "10.0.1.100/24");
    assert!(!cidr.is_network_address());
    assert!(cidr.contains(Ipv4Addr::new(10, 0, 1, 1)));
    assert!(!cidr.contains(Ipv4Addr::new(10, 0, 2, 1)));
}

#[test]
fn test_cidr_zero_prefix_covers_every_address() {
    let cidr = Ipv4Cidr::from_str("0.0.0.0/0").unwrap();
    assert!(cidr.is_network_address());
    assert_eq!(cidr.broadcast(), Ipv4Addr::BROADCAST);
    assert!(cidr.contains(Ipv4Addr::new(192, 168, 1, 1)));

    let cidr = Ipv4Cidr::new(Ipv4Addr::new(10, 0, 0, 1), 0).unwrap();
    assert!(!cidr.is_network_address());
    assert_eq!(cidr.network(), Ipv4Addr::UNSPECIFIED);
}
