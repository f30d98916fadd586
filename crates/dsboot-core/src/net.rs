//! Raw UDP/TCP transport for a single DNS request/response: bind a fresh
//! per-call socket, send the wire bytes, fall back from UDP to TCP on
//! truncation, and validate that the response actually answers the request
//! before trusting it.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::serialize::binary::BinDecodable;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;

const UDP_RECV_BUFFER: usize = 4096;

/// Send `request` to `address`, trying UDP first and falling back to TCP if
/// the UDP response is truncated. Returns `None` on any I/O error, decode
/// error, or a response that doesn't match the request — the caller decides
/// how to classify that.
///
/// Bounded by `per_query_timeout`, covering both transports together (a
/// worst case of one UDP round trip plus one TCP round trip).
pub async fn send_request(
    address: SocketAddr,
    request: &Message,
    per_query_timeout: Duration,
) -> Option<Message> {
    match timeout(per_query_timeout, send_request_notimeout(address, request)).await {
        Ok(opt) => opt,
        Err(_) => None,
    }
}

async fn send_request_notimeout(address: SocketAddr, request: &Message) -> Option<Message> {
    let wire = request.to_vec().ok()?;

    if let Some(response) = send_udp(address, &wire).await {
        if response_matches_request(request, &response) {
            if !response.header().truncated() {
                return Some(response);
            }
        } else {
            return None;
        }
    }

    let response = send_tcp(address, &wire).await?;
    if response_matches_request(request, &response) {
        Some(response)
    } else {
        None
    }
}

async fn send_udp(address: SocketAddr, wire: &[u8]) -> Option<Message> {
    let local: SocketAddr = if address.is_ipv6() {
        "[::]:0".parse().unwrap()
    } else {
        "0.0.0.0:0".parse().unwrap()
    };
    let sock = UdpSocket::bind(local).await.ok()?;
    sock.connect(address).await.ok()?;
    sock.send(wire).await.ok()?;

    let mut buf = vec![0u8; UDP_RECV_BUFFER];
    let n = sock.recv(&mut buf).await.ok()?;
    Message::from_bytes(&buf[..n]).ok()
}

async fn send_tcp(address: SocketAddr, wire: &[u8]) -> Option<Message> {
    let mut stream = TcpStream::connect(address).await.ok()?;
    let len: u16 = wire.len().try_into().ok()?;
    stream.write_all(&len.to_be_bytes()).await.ok()?;
    stream.write_all(wire).await.ok()?;

    let bytes = read_tcp_response(&mut stream).await.ok()?;
    Message::from_bytes(&bytes).ok()
}

/// Read a length-prefixed DNS message from a TCP stream (RFC 1035 §4.2.2).
async fn read_tcp_response(stream: &mut TcpStream) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;
    let expected = u16::from_be_bytes(len_buf) as usize;

    let mut bytes = vec![0u8; expected];
    stream.read_exact(&mut bytes).await?;
    Ok(bytes)
}

/// Very basic validation that a response matches a request: ID and opcode
/// line up, it actually is a response, it isn't truncated in a way that
/// would make trusting it unsafe, and the response code is one we're
/// prepared to treat as a real answer (`NoError` or `NXDomain`).
fn response_matches_request(request: &Message, response: &Message) -> bool {
    if request.id() != response.id() {
        return false;
    }
    if !response.header().message_type().is_response() {
        return false;
    }
    if request.op_code() != response.op_code() {
        return false;
    }
    matches!(
        response.response_code(),
        ResponseCode::NoError | ResponseCode::NXDomain
    )
}
