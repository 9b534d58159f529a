//! Multi expansion observed through a full session.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use cm_protocol::config::ClientConfig;
use cm_protocol::core::messages::{client_message, ProtoHeader};
use cm_protocol::core::packet::EMsg;
use cm_protocol::core::proto;
use cm_protocol::core::types::EResult;
use cm_protocol::protocol::dispatcher::Event;
use cm_protocol::service::session::Session;
use common::*;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

fn inner_message<M: prost::Message>(kind: EMsg, body: &M) -> Vec<u8> {
    client_message(&ProtoHeader::new(kind), body)
}

fn pack_multi(frames: &[Vec<u8>], gzip: bool) -> proto::Multi {
    let mut stream = Vec::new();
    for frame in frames {
        stream.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        stream.extend_from_slice(frame);
    }

    if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&stream).unwrap();
        proto::Multi {
            size_unzipped: Some(stream.len() as u32),
            message_body: Some(encoder.finish().unwrap()),
        }
    } else {
        proto::Multi {
            size_unzipped: Some(0),
            message_body: Some(stream),
        }
    }
}

/// Drive a session up to the logon write, then deliver a `Multi` that
/// wraps a failed logon response and a logged-off notice. The inner
/// packets must dispatch in stream order, which the event tap shows.
async fn multi_scenario(gzip: bool) {
    let (private, public) = test_keypair();
    let (client, mut peer) = pipe_pair();

    let config = ClientConfig::default_with_overrides(|c| {
        c.details.username = "robot".into();
        c.details.password = "hunter2".into();
    });

    let (session, mut events) = Session::with_handshake(
        config,
        client,
        cm_protocol::protocol::handshake::ChannelHandshake::with_public_key(public),
    );
    let session_task = tokio::spawn(session.run());

    drive_encrypt_handshake(&mut peer, &private).await;
    assert_eq!(events.recv().await, Some(Event::ChannelReady));
    let _logon = recv(&mut peer).await;

    let frames = vec![
        inner_message(
            EMsg::CLIENT_LOG_ON_RESPONSE,
            &proto::ClientLogonResponse {
                eresult: Some(EResult::TWO_FACTOR_CODE_MISMATCH.0),
                ..Default::default()
            },
        ),
        inner_message(
            EMsg::CLIENT_LOGGED_OFF,
            &proto::ClientLoggedOff {
                eresult: Some(EResult::OK.0),
            },
        ),
    ];

    send_proto(
        &mut peer,
        ProtoHeader::new(EMsg::MULTI),
        &pack_multi(&frames, gzip),
    )
    .await;

    // Inner packet order is preserved: the rejection dispatches before
    // the log-off.
    assert_eq!(
        events.recv().await,
        Some(Event::AuthFailed {
            result: EResult::TWO_FACTOR_CODE_MISMATCH
        })
    );
    assert_eq!(
        events.recv().await,
        Some(Event::LoggedOff {
            result: EResult::OK
        })
    );

    // The logged-off inner packet ends the session cleanly.
    let outcome = session_task.await.unwrap();
    assert!(outcome.is_ok(), "expected clean end, got {outcome:?}");
}

#[tokio::test]
async fn test_plain_multi_dispatches_in_order() {
    multi_scenario(false).await;
}

#[tokio::test]
async fn test_gzipped_multi_dispatches_in_order() {
    multi_scenario(true).await;
}

#[tokio::test]
async fn test_malformed_multi_kills_session() {
    let (private, public) = test_keypair();
    let (client, mut peer) = pipe_pair();

    let config = ClientConfig::default_with_overrides(|c| {
        c.details.username = "robot".into();
        c.details.password = "hunter2".into();
    });

    let (session, mut events) = Session::with_handshake(
        config,
        client,
        cm_protocol::protocol::handshake::ChannelHandshake::with_public_key(public),
    );
    let session_task = tokio::spawn(session.run());

    drive_encrypt_handshake(&mut peer, &private).await;
    assert_eq!(events.recv().await, Some(Event::ChannelReady));
    let _logon = recv(&mut peer).await;

    // An inner frame that claims more bytes than the stream holds.
    let mut stream = Vec::new();
    stream.extend_from_slice(&64u32.to_le_bytes());
    stream.extend_from_slice(&[0u8; 8]);

    send_proto(
        &mut peer,
        ProtoHeader::new(EMsg::MULTI),
        &proto::Multi {
            size_unzipped: Some(0),
            message_body: Some(stream),
        },
    )
    .await;

    let outcome = session_task.await.unwrap();
    assert!(outcome.is_err(), "misframed multi must be fatal");
}
