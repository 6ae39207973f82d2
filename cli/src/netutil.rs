//! Local IP autodetection for the staging URL.

use std::net::UdpSocket;

use clairscan_core::error::Result;

/// Detect the local IP another host would reach this machine at.
///
/// Connects a UDP socket to a public address and reads the chosen source
/// address; no packet is actually sent.
pub fn local_ip() -> Result<String> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;
    Ok(socket.local_addr()?.ip().to_string())
}
