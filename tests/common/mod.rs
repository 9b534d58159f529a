//! Shared helpers: in-memory connection pairs and a scripted CM peer.

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use bytes::{Buf, Bytes};
use cm_protocol::core::messages::{
    EncryptRequest, EncryptResponse, EncryptResult, Header, ProtoHeader,
};
use cm_protocol::core::packet::{EMsg, Packet};
use cm_protocol::core::types::EResult;
use cm_protocol::transport::tcp::Connection;
use futures::StreamExt;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use tokio::io::{duplex, split, AsyncReadExt, AsyncWriteExt};

/// Two connected in-memory framed connections (client side, peer side).
pub fn pipe_pair() -> (Connection, Connection) {
    let (a, b) = duplex(256 * 1024);
    let (a_read, a_write) = split(a);
    let (b_read, b_write) = split(b);
    (
        Connection::from_parts(Box::new(a_read), Box::new(a_write)),
        Connection::from_parts(Box::new(b_read), Box::new(b_write)),
    )
}

/// Fresh RSA-1024 keypair for a stub peer.
pub fn test_keypair() -> (RsaPrivateKey, RsaPublicKey) {
    let private = RsaPrivateKey::new(&mut rand_core::OsRng, 1024).expect("keygen");
    let public = RsaPublicKey::from(&private);
    (private, public)
}

/// Serialize a plain-header handshake frame.
pub fn plain_frame(kind: EMsg, write_body: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
    let mut frame = Vec::new();
    Header::new(kind, u64::MAX, u64::MAX).write_to(&mut frame);
    write_body(&mut frame);
    frame
}

/// Next packet from the peer's reader, or panic.
pub async fn recv(peer: &mut Connection) -> Packet {
    peer.reader
        .next()
        .await
        .expect("stream open")
        .expect("valid frame")
}

/// Act as the server side of the encryption handshake: send the request,
/// validate the client's response (key size, CRC tail, trailing zero
/// word), unwrap the session key, confirm, and promote this side of the
/// channel. Returns the session key.
pub async fn drive_encrypt_handshake(peer: &mut Connection, private: &RsaPrivateKey) -> [u8; 32] {
    let request = plain_frame(EMsg::CHANNEL_ENCRYPT_REQUEST, |frame| {
        EncryptRequest {
            protocol_version: 1,
            universe: 1,
        }
        .write_to(frame)
    });
    peer.writer.send(request).await.unwrap();

    let packet = recv(peer).await;
    assert_eq!(packet.kind, EMsg::CHANNEL_ENCRYPT_RESPONSE);

    let mut data = Bytes::clone(&packet.data);
    let _header = Header::read_from(&mut data).unwrap();
    let response = EncryptResponse::read_from(&mut data).unwrap();
    assert_eq!(response.protocol_version, 1);
    assert_eq!(response.key_size, 128);

    let wrapped = data.split_to(128);
    let crc = data.get_u32_le();
    assert_eq!(crc, crc32fast::hash(&wrapped), "CRC tail mismatch");
    assert_eq!(data.get_u32_le(), 0, "trailing word must be zero");
    assert!(!data.has_remaining(), "unexpected trailing bytes");

    let key: [u8; 32] = private
        .decrypt(Oaep::new::<Sha1>(), &wrapped)
        .expect("unwrap session key")
        .as_slice()
        .try_into()
        .expect("32-byte session key");

    let result = plain_frame(EMsg::CHANNEL_ENCRYPT_RESULT, |frame| {
        EncryptResult {
            result: EResult::OK,
        }
        .write_to(frame)
    });
    peer.writer.send(result).await.unwrap();

    peer.install_cipher(&key);
    key
}

/// Send a protobuf-headered message from the peer.
pub async fn send_proto<M: prost::Message>(peer: &mut Connection, header: ProtoHeader, body: &M) {
    let frame = cm_protocol::core::messages::client_message(&header, body);
    peer.writer.send(frame).await.unwrap();
}

/// Serve one canned `QueryTime` JSON answer per connection on a local
/// socket; returns the base URL.
pub async fn spawn_time_stub(server_time: i64) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;

                let body = format!(r#"{{"response":{{"server_time":"{server_time}"}}}}"#);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}/")
}
