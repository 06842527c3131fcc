//! The `/polls` persistent-connection endpoint.
//!
//! A client upgrades, then sends its handshake packet as the first frame.
//! Nothing reaches the gateway or the poll service until the stream guard has
//! admitted the connection; a refused connection only ever sees a close frame
//! carrying the rejection reason.

use futures::{Sink, SinkExt, Stream, StreamExt};
use rocket::{get, State};
use rocket_ws::frame::{CloseCode, CloseFrame};
use rocket_ws::result::Error as WsError;
use rocket_ws::{Channel, Message, WebSocket};
use shared::models::SessionIdentity;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::stream::{Handshake, HandshakePacket, HandshakeRejection, HeaderToken, StreamGuard};
use crate::cors::AllowedOrigin;
use crate::gateway::{BroadcastGateway, ConnectionHandle};
use crate::routes::AppState;
use crate::service::PollService;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a client that already sent a `token` header gets to send a
/// handshake packet before the header is used on its own.
const HEADER_HANDSHAKE_GRACE: Duration = Duration::from_millis(500);

/// A connection that passed the guard and joined its poll's group. The
/// gateway owns the sending half; `outbound` closes when it lets go.
#[derive(Debug)]
pub struct Admission {
    pub identity: SessionIdentity,
    pub connection_id: Uuid,
    pub outbound: mpsc::UnboundedReceiver<String>,
}

/// Runs the guard and, only on success, registers the connection with the
/// gateway.
pub fn admit_connection(
    guard: &StreamGuard,
    gateway: &BroadcastGateway,
    handshake: &Handshake,
) -> Result<Admission, HandshakeRejection> {
    let identity = guard.admit(handshake)?;
    let (handle, outbound) = ConnectionHandle::for_subject(identity.subject_id.clone());
    let connection_id = handle.id;
    gateway.admit(handle, &identity.poll_id);
    Ok(Admission { identity, connection_id, outbound })
}

#[get("/polls")]
pub fn connect(_origin: AllowedOrigin, ws: WebSocket, header: HeaderToken, state: &State<AppState>) -> Channel<'static> {
    let guard = Arc::clone(&state.stream_guard);
    let gateway = Arc::clone(&state.gateway);
    let service = Arc::clone(&state.service);

    ws.channel(move |stream| Box::pin(async move {
        let (sink, source) = stream.split();
        serve(sink, source, header.0, guard, gateway, service).await;
        Ok(())
    }))
}

async fn read_handshake<R>(source: &mut R, wait: Duration) -> Option<HandshakePacket>
where
    R: Stream<Item = Result<Message, WsError>> + Unpin,
{
    match tokio::time::timeout(wait, source.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => serde_json::from_str(&text)
            .map_err(|e| debug!("Unreadable handshake packet: {}", e))
            .ok(),
        Ok(Some(Ok(other))) => {
            debug!("Expected a text handshake packet, got {:?}", other);
            None
        }
        Ok(Some(Err(e))) => {
            debug!("Connection failed during handshake: {}", e);
            None
        }
        Ok(None) => None,
        Err(_) => {
            debug!("No handshake packet within {:?}", wait);
            None
        }
    }
}

/// Drives one persistent connection from handshake to disconnect.
pub(crate) async fn serve<S, R>(
    mut sink: S,
    mut source: R,
    header_token: Option<String>,
    guard: Arc<StreamGuard>,
    gateway: Arc<BroadcastGateway>,
    service: Arc<PollService>,
) where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let wait = if header_token.is_some() && guard.allows_header_token() {
        HEADER_HANDSHAKE_GRACE
    } else {
        HANDSHAKE_TIMEOUT
    };
    let packet = read_handshake(&mut source, wait).await;
    let handshake = Handshake::new(packet, header_token);

    let Admission { identity, connection_id, mut outbound } = match admit_connection(&guard, &gateway, &handshake) {
        Ok(admission) => admission,
        Err(rejection) => {
            debug!("Refusing persistent connection: {}", rejection);
            let frame = CloseFrame {
                code: CloseCode::Policy,
                reason: rejection.reason.into(),
            };
            let _ = sink.send(Message::Close(Some(frame))).await;
            return;
        }
    };

    info!(
        "Connection {} admitted to poll {} for {} ({})",
        connection_id, identity.poll_id, identity.subject_id, identity.display_name
    );

    if let Err(e) = service.add_participant(&identity).await {
        warn!("Could not add {} to poll {}: {}", identity.subject_id, identity.poll_id, e);
    }

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                None => {
                    debug!("Connection {} dropped by the gateway", connection_id);
                    break;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    gateway.remove(connection_id);
    info!("Connection {} left poll {}", connection_id, identity.poll_id);

    if let Err(e) = service.remove_participant(&identity).await {
        warn!("Could not remove {} from poll {}: {}", identity.subject_id, identity.poll_id, e);
    }
}
