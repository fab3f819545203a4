#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire-format tests against JSON captured from Kodi 19 and 20.
//!
//! Verifies that every outgoing request matches what Kodi's JSON-RPC server
//! accepts, and that real notification and reply traffic is classified the
//! way the correlator expects.

use kodi_ws_client::connection::Phase;
use kodi_ws_client::correlator::{interpret, Completed, Inbound, Outcome};
use kodi_ws_client::error_codes::ErrorCode;
use kodi_ws_client::protocol::{
    ActivePlayer, InboundMessage, Method, Notification, NotificationImage, PlayerKind, Request,
    RpcError,
};
use serde_json::json;

fn inbound(raw: &str) -> Inbound {
    Inbound::Message(serde_json::from_str(raw).expect("fixture parses"))
}

// ════════════════════════════════════════════════════════════════════
// Outgoing requests
// ════════════════════════════════════════════════════════════════════

#[test]
fn every_request_uses_the_shared_envelope() {
    let requests = [
        Request::open("smb://nas/movies/a.mkv"),
        Request::stop(1),
        Request::rotate(2),
        Request::get_active_players(),
        Request::show_notification(Notification::new("t", "m")),
    ];
    for request in requests {
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["jsonrpc"], "2.0", "{json}");
        assert_eq!(json["id"], 1, "{json}");
        assert_eq!(json["method"], request.method.as_str(), "{json}");
    }
}

#[test]
fn stop_and_rotate_params() {
    assert_eq!(
        serde_json::to_value(Request::stop(0)).unwrap()["params"],
        json!({"playerid": 0})
    );
    assert_eq!(
        serde_json::to_value(Request::rotate(1)).unwrap()["params"],
        json!({"playerid": 1})
    );
}

#[test]
fn notification_defaults_to_info_for_five_seconds() {
    let json =
        serde_json::to_value(Request::show_notification(Notification::new("Hyperion", "hi")))
            .unwrap();
    assert_eq!(
        json["params"],
        json!({"title": "Hyperion", "message": "hi", "image": "info", "displaytime": 5000})
    );
}

#[test]
fn notification_image_names() {
    for (name, image) in [
        ("info", NotificationImage::Info),
        ("warning", NotificationImage::Warning),
        ("error", NotificationImage::Error),
    ] {
        assert_eq!(NotificationImage::from(name), image);
        assert_eq!(image.as_str(), name);
    }
}

#[test]
fn method_serializes_to_wire_name() {
    assert_eq!(
        serde_json::to_string(&Method::GetActivePlayers).unwrap(),
        "\"Player.GetActivePlayers\""
    );
    assert_eq!(Method::ShowNotification.to_string(), "GUI.ShowNotification");
    let method: Method = serde_json::from_str("\"Player.Rotate\"").unwrap();
    assert_eq!(method, Method::PlayerRotate);
}

// ════════════════════════════════════════════════════════════════════
// Inbound traffic
// ════════════════════════════════════════════════════════════════════

/// Messages Kodi 20 pushes after `Player.Open` on an idle player, in order.
const OPEN_ON_IDLE: &[&str] = &[
    r#"{"id":1,"jsonrpc":"2.0","result":"OK"}"#,
    r#"{"jsonrpc":"2.0","method":"Player.OnAVStart","params":{"data":{"item":{"title":"","type":"movie"},"player":{"playerid":1,"speed":1}},"sender":"xbmc"}}"#,
    r#"{"jsonrpc":"2.0","method":"Playlist.OnAdd","params":{"data":{"item":{"title":"","type":"movie"},"playlistid":1,"position":0},"sender":"xbmc"}}"#,
    r#"{"jsonrpc":"2.0","method":"Player.OnPlay","params":{"data":{"item":{"title":"","type":"movie"},"player":{"playerid":1,"speed":1}},"sender":"xbmc"}}"#,
    r#"{"jsonrpc":"2.0","method":"Player.OnAVChange","params":{"data":{"item":{"title":"","type":"movie"},"player":{"playerid":1,"speed":1}},"sender":"xbmc"}}"#,
];

#[test]
fn open_on_idle_player_completes_only_on_on_play() {
    let outcomes: Vec<Outcome> = OPEN_ON_IDLE
        .iter()
        .map(|raw| interpret(Phase::Connected, Some(Method::PlayerOpen), None, &inbound(raw)))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            Outcome::Ignore,
            Outcome::Ignore,
            Outcome::Ignore,
            Outcome::CompleteOk(Completed::PlayerStarted(1)),
            Outcome::Ignore,
        ]
    );
}

#[test]
fn stop_completes_on_on_stop_with_end_flag() {
    let raw = r#"{"jsonrpc":"2.0","method":"Player.OnStop","params":{"data":{"end":true,"item":{"title":"","type":"movie"}},"sender":"xbmc"}}"#;
    assert_eq!(
        interpret(Phase::Connected, Some(Method::PlayerStop), Some(1), &inbound(raw)),
        Outcome::CompleteOk(Completed::PlayerStopped)
    );
}

#[test]
fn active_players_reply_from_kodi() {
    let raw = r#"{"id":1,"jsonrpc":"2.0","result":[{"playerid":0,"playertype":"internal","type":"audio"},{"playerid":2,"playertype":"internal","type":"picture"}]}"#;
    assert_eq!(
        interpret(Phase::Connected, Some(Method::GetActivePlayers), None, &inbound(raw)),
        Outcome::CompleteOk(Completed::ActivePlayers(vec![
            ActivePlayer {
                playerid: 0,
                kind: PlayerKind::Audio
            },
            ActivePlayer {
                playerid: 2,
                kind: PlayerKind::Picture
            },
        ]))
    );
}

#[test]
fn unknown_player_type_is_tolerated() {
    let player: ActivePlayer =
        serde_json::from_value(json!({"playerid": 4, "type": "game"})).unwrap();
    assert_eq!(player.kind, PlayerKind::Unknown);

    let player: ActivePlayer = serde_json::from_value(json!({"playerid": 4})).unwrap();
    assert_eq!(player.kind, PlayerKind::Unknown);
}

#[test]
fn error_reply_from_kodi() {
    let raw = r#"{"error":{"code":-32602,"data":{"method":"Player.Stop","stack":{"message":"Received value does not match any of the union type definitions","name":"playerid","type":"integer"}},"message":"Invalid params."},"id":1,"jsonrpc":"2.0"}"#;
    let msg: InboundMessage = serde_json::from_str(raw).unwrap();
    let error: RpcError = msg.error.clone().unwrap();
    assert_eq!(error.code, ErrorCode::InvalidParams);
    assert_eq!(error.message, "Invalid params.");
    assert_eq!(error.data.unwrap()["method"], "Player.Stop");

    assert_eq!(
        interpret(Phase::Connected, Some(Method::PlayerRotate), None, &Inbound::Message(msg)),
        Outcome::Ignore
    );
}

#[test]
fn server_defined_error_codes_are_preserved() {
    let error: RpcError =
        serde_json::from_value(json!({"code": -32100, "message": "Failed to execute method."}))
            .unwrap();
    assert_eq!(error.code, ErrorCode::Server(-32100));
    assert_eq!(serde_json::to_value(&error).unwrap()["code"], -32100);
}

#[test]
fn unrelated_objects_parse_and_are_ignored() {
    for raw in [
        "{}",
        r#"{"jsonrpc":"2.0","method":"System.OnQuit","params":{"data":{"exitcode":0},"sender":"xbmc"}}"#,
        r#"{"jsonrpc":"2.0","method":"GUI.OnScreensaverActivated","params":{"data":null,"sender":"xbmc"}}"#,
    ] {
        for last in [
            None,
            Some(Method::PlayerOpen),
            Some(Method::PlayerStop),
            Some(Method::ShowNotification),
        ] {
            assert_eq!(
                interpret(Phase::Connected, last, Some(1), &inbound(raw)),
                Outcome::Ignore,
                "{raw} after {last:?}"
            );
        }
    }
}

#[test]
fn non_object_json_is_rejected_by_the_parser() {
    for raw in ["42", "\"OK\"", "not json"] {
        assert!(serde_json::from_str::<InboundMessage>(raw).is_err(), "{raw}");
    }
}
