// Wake-on-LAN
//
// TVs that fully power down their network stack can only be woken by a
// magic packet: six 0xFF bytes followed by the MAC repeated sixteen times.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;

use tokio::net::UdpSocket;

use crate::error::Error;

pub const WOL_PORT: u16 = 9;

/// A 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddr {
    type Err = Error;

    /// Accepts `aa:bb:cc:dd:ee:ff`, `aa-bb-cc-dd-ee-ff` and `aabbccddeeff`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s
            .trim()
            .chars()
            .filter(|c| *c != ':' && *c != '-')
            .collect();
        if hex.len() != 12 || !hex.is_ascii() {
            return Err(Error::InvalidMac(s.to_owned()));
        }

        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| Error::InvalidMac(s.to_owned()))?;
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Build the 102-byte magic packet for `mac`.
pub fn magic_packet(mac: MacAddr) -> Vec<u8> {
    let mut packet = vec![0xFF; 6];
    for _ in 0..16 {
        packet.extend_from_slice(&mac.0);
    }
    packet
}

/// Broadcast a magic packet for `mac` on the local segment.
pub async fn wake(mac: MacAddr) -> Result<(), Error> {
    let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))).await?;
    socket.set_broadcast(true)?;
    let target = SocketAddr::from((Ipv4Addr::BROADCAST, WOL_PORT));
    socket.send_to(&magic_packet(mac), target).await?;
    tracing::info!(%mac, "sent Wake-on-LAN packet");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_notations() {
        let colon: MacAddr = "AA:bb:0c:dd:ee:01".parse().expect("colon");
        let dash: MacAddr = "aa-bb-0c-dd-ee-01".parse().expect("dash");
        let bare: MacAddr = "aabb0cddee01".parse().expect("bare");
        assert_eq!(colon, dash);
        assert_eq!(dash, bare);
        assert_eq!(colon.to_string(), "aa:bb:0c:dd:ee:01");
    }

    #[test]
    fn rejects_malformed() {
        assert!("aa:bb:cc".parse::<MacAddr>().is_err());
        assert!("zz:bb:cc:dd:ee:ff".parse::<MacAddr>().is_err());
    }

    #[test]
    fn magic_packet_shape() {
        let mac: MacAddr = "01:02:03:04:05:06".parse().expect("mac");
        let packet = magic_packet(mac);
        assert_eq!(packet.len(), 102);
        assert!(packet[..6].iter().all(|b| *b == 0xFF));
        assert_eq!(&packet[96..], &[1, 2, 3, 4, 5, 6]);
    }
}
