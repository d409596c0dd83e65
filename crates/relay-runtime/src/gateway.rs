//! HTTP gateway transport.
//!
//! The wire protocol runs in a gateway sidecar that exposes each session over
//! a small JSON API:
//! - `POST   sessions/{id}` with `{credentials}` opens a connection
//! - `GET    sessions/{id}/events?timeout=N` long-polls raw events
//! - `POST   sessions/{id}/messages` with `{to, content}` sends
//! - `POST   sessions/{id}/pairing-code` with `{phone}` returns `{code}`
//! - `POST   sessions/{id}/logout` revokes the device
//! - `DELETE sessions/{id}` closes the connection
//!
//! Raw events are translated into [`SessionEvent`]s as soon as they arrive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_models::{
    address_number, user_address, CredentialBlob, DisconnectCause, Identity, InboundMessage,
    MessageContent, OutboundContent, SessionEvent,
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use url::Url;

use crate::transport::{Connection, ProtocolClient, ProtocolSession, TransportError};

/// Seconds the gateway may hold an event poll open.
const POLL_TIMEOUT_SECS: u64 = 25;

/// Consecutive poll failures before the connection is reported lost.
const MAX_POLL_FAILURES: u32 = 5;

/// Pause between failed polls.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Buffered events per connection.
const EVENT_BUFFER: usize = 256;

/// Opens sessions on a protocol gateway.
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base: Url,
}

impl GatewayClient {
    /// Creates a client for the gateway at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| TransportError::Protocol(format!("invalid gateway url: {}", e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .build()?;

        Ok(Self { http, base })
    }

    /// The gateway base URL.
    pub fn base_url(&self) -> &Url {
        &self.base
    }
}

#[derive(Debug, Serialize)]
struct OpenRequest<'a> {
    credentials: Option<&'a Value>,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    content: &'a OutboundContent,
}

#[derive(Debug, Serialize)]
struct PairingCodeRequest<'a> {
    phone: &'a str,
}

#[derive(Debug, Deserialize)]
struct PairingCodeResponse {
    code: String,
}

#[derive(Debug, Deserialize)]
struct EventBatch {
    #[serde(default)]
    events: Vec<RawGatewayEvent>,
}

#[async_trait]
impl ProtocolClient for GatewayClient {
    async fn connect(
        &self,
        identity: &Identity,
        credentials: Option<CredentialBlob>,
    ) -> Result<Connection, TransportError> {
        let shared = Arc::new(Shared {
            http: self.http.clone(),
            base: self.base.clone(),
            identity: identity.clone(),
            closed: AtomicBool::new(false),
            own_address: RwLock::new(None),
        });

        let response = self
            .http
            .post(shared.endpoint("")?)
            .json(&OpenRequest {
                credentials: credentials.as_ref().map(CredentialBlob::as_value),
            })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::Connect(format!("gateway {}: {}", status, text)));
        }
        debug!(identity = %identity, "Gateway session opened");

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(pump(Arc::clone(&shared), tx));

        Ok(Connection {
            session: Arc::new(GatewaySession { shared }),
            events: rx,
        })
    }
}

struct Shared {
    http: reqwest::Client,
    base: Url,
    identity: Identity,
    closed: AtomicBool,
    own_address: RwLock<Option<String>>,
}

impl Shared {
    fn endpoint(&self, suffix: &str) -> Result<Url, TransportError> {
        let path = format!("sessions/{}{}", self.identity, suffix);
        self.base
            .join(&path)
            .map_err(|e| TransportError::Protocol(format!("bad endpoint {}: {}", path, e)))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn set_own_address(&self, address: String) {
        if let Ok(mut own) = self.own_address.write() {
            *own = Some(address);
        }
    }

    async fn poll(&self) -> Result<Option<Vec<RawGatewayEvent>>, TransportError> {
        let mut url = self.endpoint("/events")?;
        url.query_pairs_mut()
            .append_pair("timeout", &POLL_TIMEOUT_SECS.to_string());

        let response = self.http.get(url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(None),
            status if status.is_success() => {
                let batch: EventBatch = response.json().await?;
                Ok(Some(batch.events))
            }
            status => Err(TransportError::Http(format!("event poll returned {}", status))),
        }
    }
}

/// Polls the gateway and forwards translated events until the connection ends.
async fn pump(shared: Arc<Shared>, tx: mpsc::Sender<SessionEvent>) {
    let mut failures = 0;

    while !shared.is_closed() {
        match shared.poll().await {
            Ok(Some(batch)) => {
                failures = 0;
                for raw in batch {
                    if let Some(address) = raw.own_address() {
                        shared.set_own_address(address);
                    }
                    for event in raw.into_session_events() {
                        trace!(identity = %shared.identity, kind = event.kind(), "Gateway event");
                        let closing = matches!(event, SessionEvent::ConnectionClosed { .. });
                        if tx.send(event).await.is_err() || closing {
                            return;
                        }
                    }
                }
            }
            Ok(None) => {
                debug!(identity = %shared.identity, "Gateway no longer knows this session");
                if !shared.is_closed() {
                    let _ = tx
                        .send(SessionEvent::ConnectionClosed {
                            cause: DisconnectCause::ConnectionLost,
                        })
                        .await;
                }
                return;
            }
            Err(e) => {
                failures += 1;
                warn!(identity = %shared.identity, failures, error = %e, "Event poll failed");
                if failures >= MAX_POLL_FAILURES {
                    let _ = tx
                        .send(SessionEvent::ConnectionClosed {
                            cause: DisconnectCause::ConnectionLost,
                        })
                        .await;
                    return;
                }
                tokio::time::sleep(POLL_RETRY_DELAY).await;
            }
        }
    }
}

/// One session on the gateway.
pub struct GatewaySession {
    shared: Arc<Shared>,
}

impl GatewaySession {
    async fn post_empty(&self, suffix: &str) -> Result<reqwest::Response, TransportError> {
        Ok(self
            .shared
            .http
            .post(self.shared.endpoint(suffix)?)
            .send()
            .await?)
    }
}

#[async_trait]
impl ProtocolSession for GatewaySession {
    fn own_address(&self) -> Option<String> {
        self.shared
            .own_address
            .read()
            .ok()
            .and_then(|own| own.clone())
    }

    async fn send(&self, recipient: &str, content: OutboundContent) -> Result<(), TransportError> {
        if self.shared.is_closed() {
            return Err(TransportError::Closed);
        }
        let response = self
            .shared
            .http
            .post(self.shared.endpoint("/messages")?)
            .json(&SendRequest {
                to: recipient,
                content: &content,
            })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::Send(format!("gateway {}: {}", status, text)));
        }
        Ok(())
    }

    async fn request_pairing_code(&self, phone: &Identity) -> Result<String, TransportError> {
        let response = self
            .shared
            .http
            .post(self.shared.endpoint("/pairing-code")?)
            .json(&PairingCodeRequest {
                phone: phone.as_str(),
            })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::PairingRejected(format!("{}: {}", status, text)));
        }
        let body: PairingCodeResponse = response.json().await?;
        Ok(body.code)
    }

    async fn logout(&self) -> Result<(), TransportError> {
        let response = self.post_empty("/logout").await?;
        self.shared.closed.store(true, Ordering::SeqCst);
        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(TransportError::Http(format!("logout returned {}", status)));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let response = self
            .shared
            .http
            .delete(self.shared.endpoint("")?)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(TransportError::Http(format!("close returned {}", status)));
        }
        Ok(())
    }
}

/// Event shapes emitted by the gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum RawGatewayEvent {
    #[serde(rename = "connection.update")]
    ConnectionUpdate {
        #[serde(default)]
        connection: Option<String>,
        #[serde(default, rename = "statusCode")]
        status_code: Option<u16>,
        #[serde(default)]
        me: Option<String>,
    },
    #[serde(rename = "creds.update")]
    CredsUpdate { creds: Value },
    #[serde(rename = "messages.upsert")]
    MessagesUpsert {
        #[serde(default)]
        kind: Option<String>,
        #[serde(default)]
        messages: Vec<RawMessage>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    key: RawKey,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    message_timestamp: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawKey {
    remote_jid: String,
    #[serde(default)]
    from_me: bool,
    #[serde(default)]
    id: String,
    #[serde(default)]
    participant: Option<String>,
}

impl RawGatewayEvent {
    /// The account address reported when a connection opens.
    fn own_address(&self) -> Option<String> {
        match self {
            RawGatewayEvent::ConnectionUpdate {
                connection: Some(state),
                me: Some(me),
                ..
            } if state == "open" => Some(user_address(&address_number(me))),
            _ => None,
        }
    }

    fn into_session_events(self) -> Vec<SessionEvent> {
        match self {
            RawGatewayEvent::ConnectionUpdate {
                connection,
                status_code,
                ..
            } => match connection.as_deref() {
                Some("open") => vec![SessionEvent::ConnectionOpened],
                Some("close") => vec![SessionEvent::ConnectionClosed {
                    cause: DisconnectCause::from_status_code(status_code),
                }],
                _ => Vec::new(),
            },
            RawGatewayEvent::CredsUpdate { creds } => vec![SessionEvent::CredentialsUpdated {
                blob: CredentialBlob::new(creds),
            }],
            RawGatewayEvent::MessagesUpsert { kind, messages } => {
                // History syncs and appends are not live traffic
                if kind.as_deref().is_some_and(|k| k != "notify") {
                    return Vec::new();
                }
                messages
                    .into_iter()
                    .filter(|m| m.message.is_some())
                    .map(|m| SessionEvent::MessageReceived {
                        message: m.into_inbound(),
                    })
                    .collect()
            }
            RawGatewayEvent::Other => Vec::new(),
        }
    }
}

impl RawMessage {
    fn into_inbound(self) -> InboundMessage {
        let timestamp = self
            .message_timestamp
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);

        InboundMessage {
            id: self.key.id,
            origin: self.key.remote_jid,
            sender: self.key.participant,
            from_self: self.key.from_me,
            content: self.message.as_ref().map(parse_content),
            timestamp,
        }
    }
}

fn parse_content(message: &Value) -> MessageContent {
    if let Some(text) = message.get("conversation").and_then(Value::as_str) {
        return MessageContent::text(text);
    }
    if let Some(text) = message
        .pointer("/extendedTextMessage/text")
        .and_then(Value::as_str)
    {
        let quoted = message
            .pointer("/extendedTextMessage/contextInfo/quotedMessage/conversation")
            .and_then(Value::as_str)
            .map(str::to_string);
        return MessageContent::ExtendedText {
            text: text.to_string(),
            quoted,
        };
    }

    let kind = message
        .as_object()
        .and_then(|fields| fields.keys().next().cloned())
        .unwrap_or_else(|| "unknown".to_string());
    MessageContent::Unsupported { kind }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn translate(value: Value) -> Vec<SessionEvent> {
        serde_json::from_value::<RawGatewayEvent>(value)
            .unwrap()
            .into_session_events()
    }

    #[test]
    fn test_connection_updates() {
        assert_eq!(
            translate(json!({ "type": "connection.update", "connection": "open" })),
            vec![SessionEvent::ConnectionOpened]
        );
        assert_eq!(
            translate(json!({
                "type": "connection.update",
                "connection": "close",
                "statusCode": 401
            })),
            vec![SessionEvent::ConnectionClosed {
                cause: DisconnectCause::LoggedOut
            }]
        );
        assert_eq!(
            translate(json!({
                "type": "connection.update",
                "connection": "close",
                "statusCode": 428
            })),
            vec![SessionEvent::ConnectionClosed {
                cause: DisconnectCause::ConnectionLost
            }]
        );
        assert!(translate(json!({ "type": "connection.update", "connection": "connecting" }))
            .is_empty());
    }

    #[test]
    fn test_own_address_from_open() {
        let raw: RawGatewayEvent = serde_json::from_value(json!({
            "type": "connection.update",
            "connection": "open",
            "me": "15550109999:12@s.whatsapp.net"
        }))
        .unwrap();
        assert_eq!(
            raw.own_address().as_deref(),
            Some("15550109999@s.whatsapp.net")
        );
    }

    #[test]
    fn test_creds_update() {
        let events = translate(json!({
            "type": "creds.update",
            "creds": { "registered": true }
        }));
        match &events[..] {
            [SessionEvent::CredentialsUpdated { blob }] => assert!(blob.is_registered()),
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn test_messages_upsert() {
        let events = translate(json!({
            "type": "messages.upsert",
            "kind": "notify",
            "messages": [
                {
                    "key": { "remoteJid": "15550100000@s.whatsapp.net", "fromMe": false, "id": "A1" },
                    "message": { "conversation": ".ping" },
                    "messageTimestamp": 1700000000
                },
                {
                    "key": { "remoteJid": "120363000000@g.us", "participant": "15550100000@s.whatsapp.net", "id": "A2" },
                    "message": { "extendedTextMessage": { "text": ".menu" } }
                },
                {
                    "key": { "remoteJid": "15550100000@s.whatsapp.net", "id": "A3" },
                    "message": { "imageMessage": { "caption": "hi" } }
                },
                {
                    "key": { "remoteJid": "15550100000@s.whatsapp.net", "id": "A4" }
                }
            ]
        }));

        assert_eq!(events.len(), 3);
        let messages: Vec<InboundMessage> = events
            .into_iter()
            .map(|e| match e {
                SessionEvent::MessageReceived { message } => message,
                other => panic!("unexpected event: {:?}", other),
            })
            .collect();

        assert_eq!(messages[0].body(), Some(".ping"));
        assert_eq!(messages[0].timestamp.timestamp(), 1_700_000_000);
        assert_eq!(messages[1].body(), Some(".menu"));
        assert!(messages[1].is_group());
        assert_eq!(messages[1].author(), "15550100000@s.whatsapp.net");
        assert_eq!(
            messages[2].content,
            Some(MessageContent::Unsupported {
                kind: "imageMessage".to_string()
            })
        );
        assert_eq!(messages[2].body(), None);
    }

    #[test]
    fn test_non_notify_upserts_ignored() {
        let events = translate(json!({
            "type": "messages.upsert",
            "kind": "append",
            "messages": [{
                "key": { "remoteJid": "15550100000@s.whatsapp.net", "id": "A1" },
                "message": { "conversation": "old" }
            }]
        }));
        assert!(events.is_empty());
    }

    #[test]
    fn test_unknown_event_ignored() {
        assert!(translate(json!({ "type": "presence.update", "id": "x" })).is_empty());
    }

    #[test]
    fn test_client_normalizes_base_url() {
        let client = GatewayClient::new("http://127.0.0.1:3000/gateway").unwrap();
        assert_eq!(client.base_url().as_str(), "http://127.0.0.1:3000/gateway/");
        assert!(GatewayClient::new("not a url").is_err());
    }
}
