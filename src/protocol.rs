//! Wire-compatible JSON-RPC 2.0 types for the Kodi player API.
//!
//! Every outgoing request shares one envelope:
//!
//! ```json
//! {"jsonrpc":"2.0","id":1,"method":"Player.Stop","params":{"playerid":1}}
//! ```
//!
//! The request id is constant. Replies are correlated by the client's
//! single-outstanding-request rule rather than by id, see
//! [`correlator`](crate::correlator).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error;
use crate::error_codes::ErrorCode;

/// JSON-RPC protocol version tag carried by every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// Identifier shared by every request this client sends.
pub const REQUEST_ID: u64 = 1;

/// Push notification sent when a player starts playback.
pub const ON_PLAY: &str = "Player.OnPlay";

/// Push notification sent when a player stops playback.
pub const ON_STOP: &str = "Player.OnStop";

/// Default display time for `GUI.ShowNotification`, in milliseconds.
pub const DEFAULT_NOTIFICATION_DISPLAY_MS: u64 = 5000;

// ── Type aliases ────────────────────────────────────────────────────

/// Opaque server-side handle of a Kodi player.
pub type PlayerId = i64;

// ── Enums ───────────────────────────────────────────────────────────

/// Request methods understood by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Start playback of a media item.
    #[serde(rename = "Player.Open")]
    PlayerOpen,
    /// Stop a player.
    #[serde(rename = "Player.Stop")]
    PlayerStop,
    /// Rotate the picture shown by a player.
    #[serde(rename = "Player.Rotate")]
    PlayerRotate,
    /// List the players that are currently active.
    #[serde(rename = "Player.GetActivePlayers")]
    GetActivePlayers,
    /// Show a popup notification in the Kodi GUI.
    #[serde(rename = "GUI.ShowNotification")]
    ShowNotification,
}

impl Method {
    /// Returns the method name as sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlayerOpen => "Player.Open",
            Self::PlayerStop => "Player.Stop",
            Self::PlayerRotate => "Player.Rotate",
            Self::GetActivePlayers => "Player.GetActivePlayers",
            Self::ShowNotification => "GUI.ShowNotification",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Icon shown next to a GUI notification.
///
/// Kodi accepts the three built-in names or a path/URL to an image, all as a
/// bare string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NotificationImage {
    #[default]
    Info,
    Warning,
    Error,
    /// Path or URL of a custom image.
    Custom(String),
}

impl NotificationImage {
    /// Returns the wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Custom(path) => path,
        }
    }
}

impl From<&str> for NotificationImage {
    fn from(value: &str) -> Self {
        match value {
            "info" => Self::Info,
            "warning" => Self::Warning,
            "error" => Self::Error,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl Serialize for NotificationImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NotificationImage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw.as_str()))
    }
}

/// Kind of media a player handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    Audio,
    Video,
    Picture,
    #[default]
    #[serde(other)]
    Unknown,
}

// ── Structs ─────────────────────────────────────────────────────────

/// A media item to open, addressed by file path or URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub file: String,
}

/// One entry of a `Player.GetActivePlayers` result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePlayer {
    pub playerid: PlayerId,
    #[serde(rename = "type", default)]
    pub kind: PlayerKind,
}

/// Parameters for a `GUI.ShowNotification` request.
///
/// # Example
///
/// ```
/// use kodi_ws_client::protocol::{Notification, NotificationImage};
///
/// let note = Notification::new("Hyperion", "Capture started")
///     .with_image(NotificationImage::Warning)
///     .with_display_time_ms(2000);
/// assert_eq!(note.display_time_ms, 2000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub image: NotificationImage,
    pub display_time_ms: u64,
}

impl Notification {
    /// Create a notification with the `info` icon and the default display time.
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            image: NotificationImage::Info,
            display_time_ms: DEFAULT_NOTIFICATION_DISPLAY_MS,
        }
    }

    #[must_use]
    pub fn with_image(mut self, image: impl Into<NotificationImage>) -> Self {
        self.image = image.into();
        self
    }

    #[must_use]
    pub fn with_display_time_ms(mut self, display_time_ms: u64) -> Self {
        self.display_time_ms = display_time_ms;
        self
    }
}

/// Method parameters, serialized as a plain JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    /// `Player.Open`
    Open { item: MediaItem },
    /// `Player.Stop` and `Player.Rotate`
    Player { playerid: PlayerId },
    /// `GUI.ShowNotification`
    Notification {
        title: String,
        message: String,
        image: NotificationImage,
        displaytime: u64,
    },
}

/// An outgoing JSON-RPC request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: u64,
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
}

impl Request {
    fn new(method: Method, params: Option<Params>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: REQUEST_ID,
            method,
            params,
        }
    }

    /// `Player.Open` for the given file path or URL.
    pub fn open(url: impl Into<String>) -> Self {
        Self::new(
            Method::PlayerOpen,
            Some(Params::Open {
                item: MediaItem { file: url.into() },
            }),
        )
    }

    /// `Player.Stop` for one player.
    pub fn stop(playerid: PlayerId) -> Self {
        Self::new(Method::PlayerStop, Some(Params::Player { playerid }))
    }

    /// `Player.Rotate` for one player.
    pub fn rotate(playerid: PlayerId) -> Self {
        Self::new(Method::PlayerRotate, Some(Params::Player { playerid }))
    }

    /// `Player.GetActivePlayers`; carries no params.
    pub fn get_active_players() -> Self {
        Self::new(Method::GetActivePlayers, None)
    }

    /// `GUI.ShowNotification`.
    pub fn show_notification(notification: Notification) -> Self {
        Self::new(
            Method::ShowNotification,
            Some(Params::Notification {
                title: notification.title,
                message: notification.message,
                image: notification.image,
                displaytime: notification.display_time_ms,
            }),
        )
    }

    /// Encode as a text frame.
    pub fn to_json(&self) -> error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A JSON-RPC `error` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Any message received from the server: a reply or a push notification.
///
/// All members are optional so that every well-formed JSON object parses;
/// deciding what a message means is left to
/// [`interpret`](crate::correlator::interpret).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl InboundMessage {
    /// Decode a text frame. Anything but a JSON object is rejected.
    pub fn parse(text: &str) -> error::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Returns `true` if this is the push notification `name`.
    pub fn is_notification(&self, name: &str) -> bool {
        self.method.as_deref() == Some(name)
    }

    /// Player id carried by a `Player.OnPlay` push (`params.data.player.playerid`).
    pub fn started_player_id(&self) -> Option<PlayerId> {
        self.params
            .as_ref()?
            .pointer("/data/player/playerid")?
            .as_i64()
    }

    /// Returns `true` if this reply carries the shared request id.
    pub fn is_reply(&self) -> bool {
        self.id.as_ref().and_then(Value::as_u64) == Some(REQUEST_ID)
    }

    /// Returns `true` if the result is boolean `true` or the string `"OK"`.
    pub fn is_acknowledgement(&self) -> bool {
        match &self.result {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(text)) => text == "OK",
            _ => false,
        }
    }

    /// Parse the result of a `Player.GetActivePlayers` reply.
    ///
    /// A missing or `null` result is treated as an empty list.
    pub fn active_players(&self) -> Result<Vec<ActivePlayer>, serde_json::Error> {
        match &self.result {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(result) => Vec::<ActivePlayer>::deserialize(result),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::error::KodiError;
    use serde_json::json;

    #[test]
    fn request_encodes_to_text_frame() {
        let text = Request::stop(2).to_json().unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&text).unwrap(),
            json!({"jsonrpc": "2.0", "id": 1, "method": "Player.Stop", "params": {"playerid": 2}})
        );
    }

    #[test]
    fn malformed_frame_is_a_serialization_error() {
        for text in ["not json", "42", "{\"id\": "] {
            let err = InboundMessage::parse(text).unwrap_err();
            assert!(matches!(err, KodiError::Serialization(_)), "{text}: {err:?}");
            assert!(err.to_string().starts_with("serialization error"));
        }
        assert_eq!(InboundMessage::parse("{}").unwrap(), InboundMessage::default());
    }

    #[test]
    fn open_request_matches_wire_format() {
        let json = serde_json::to_value(Request::open("http://host/stream.m3u8")).unwrap();
        assert_eq!(
            json,
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "Player.Open",
                "params": {"item": {"file": "http://host/stream.m3u8"}}
            })
        );
    }

    #[test]
    fn get_active_players_omits_params() {
        let json = serde_json::to_value(Request::get_active_players()).unwrap();
        assert_eq!(
            json,
            json!({"jsonrpc": "2.0", "id": 1, "method": "Player.GetActivePlayers"})
        );
    }

    #[test]
    fn notification_params_use_kodi_names() {
        let note = Notification::new("t", "m")
            .with_image("warning")
            .with_display_time_ms(1500);
        let json = serde_json::to_value(Request::show_notification(note)).unwrap();
        assert_eq!(json["method"], "GUI.ShowNotification");
        assert_eq!(
            json["params"],
            json!({"title": "t", "message": "m", "image": "warning", "displaytime": 1500})
        );
    }

    #[test]
    fn custom_notification_image_is_a_bare_string() {
        let image = NotificationImage::from("special://home/icon.png");
        assert_eq!(image, NotificationImage::Custom("special://home/icon.png".into()));
        assert_eq!(
            serde_json::to_string(&image).unwrap(),
            "\"special://home/icon.png\""
        );
    }

    #[test]
    fn started_player_id_reads_nested_params() {
        let msg: InboundMessage = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "Player.OnPlay",
            "params": {"data": {"item": {"type": "unknown"}, "player": {"playerid": 1, "speed": 1}}}
        }))
        .unwrap();
        assert!(msg.is_notification(ON_PLAY));
        assert_eq!(msg.started_player_id(), Some(1));
    }

    #[test]
    fn started_player_id_missing_is_none() {
        let msg: InboundMessage =
            serde_json::from_value(json!({"method": "Player.OnPlay", "params": {}})).unwrap();
        assert_eq!(msg.started_player_id(), None);
    }

    #[test]
    fn acknowledgement_accepts_true_and_ok_only() {
        let ok: InboundMessage = serde_json::from_value(json!({"id": 1, "result": "OK"})).unwrap();
        let yes: InboundMessage = serde_json::from_value(json!({"id": 1, "result": true})).unwrap();
        let no: InboundMessage = serde_json::from_value(json!({"id": 1, "result": false})).unwrap();
        let other: InboundMessage =
            serde_json::from_value(json!({"id": 1, "result": "ok"})).unwrap();
        assert!(ok.is_acknowledgement());
        assert!(yes.is_acknowledgement());
        assert!(!no.is_acknowledgement());
        assert!(!other.is_acknowledgement());
    }

    #[test]
    fn reply_requires_shared_id() {
        let reply: InboundMessage = serde_json::from_value(json!({"id": 1})).unwrap();
        let foreign: InboundMessage = serde_json::from_value(json!({"id": 2})).unwrap();
        let push: InboundMessage = serde_json::from_value(json!({"method": "x"})).unwrap();
        assert!(reply.is_reply());
        assert!(!foreign.is_reply());
        assert!(!push.is_reply());
    }

    #[test]
    fn active_players_parse_with_type() {
        let msg: InboundMessage = serde_json::from_value(json!({
            "id": 1,
            "result": [{"playerid": 0, "type": "audio"}, {"playerid": 1, "type": "video", "playertype": "internal"}]
        }))
        .unwrap();
        let players = msg.active_players().unwrap();
        assert_eq!(
            players,
            vec![
                ActivePlayer { playerid: 0, kind: PlayerKind::Audio },
                ActivePlayer { playerid: 1, kind: PlayerKind::Video },
            ]
        );
    }

    #[test]
    fn active_players_null_result_is_empty() {
        let msg: InboundMessage = serde_json::from_value(json!({"id": 1, "result": null})).unwrap();
        assert!(msg.active_players().unwrap().is_empty());
    }

    #[test]
    fn error_reply_parses_code() {
        let msg: InboundMessage = serde_json::from_value(json!({
            "id": 1,
            "jsonrpc": "2.0",
            "error": {"code": -32602, "message": "Invalid params."}
        }))
        .unwrap();
        assert_eq!(msg.error.unwrap().code, ErrorCode::InvalidParams);
    }
}
