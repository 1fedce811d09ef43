// AuthServer - datagram dispatch and the three handshake handlers
//
// One receive loop; every datagram is handed to its own task. During
// the confidential phases the server answers probes with silence:
// handler errors are logged and dropped, and only a completed-but-
// wrong proof exchange produces an on-wire SessionError.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;

use styx_shared::auth::{SrpEngine, SrpError};

use crate::auth_codes::*;
use crate::protocol::*;
use crate::session::{SessionManager, SessionStage};
use crate::user_store::{StoreError, UserStore};

#[derive(Debug, Error)]
enum HandlerError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("unknown user '{0}'")]
    UserNotFound(String),
    #[error("no session {0:#010X}")]
    SessionMissing(u32),
    #[error("session {0:#010X} is not awaiting this packet")]
    WrongStage(u32),
    #[error(transparent)]
    Srp(#[from] SrpError),
    #[error("session table saturated")]
    TableSaturated,
    #[error("user store: {0}")]
    Backend(StoreError),
}

impl HandlerError {
    /// Backend and internal failures are operator problems; everything
    /// else is routine probe noise.
    fn is_internal(&self) -> bool {
        matches!(self, HandlerError::Backend(_) | HandlerError::TableSaturated)
    }
}

pub struct AuthServer {
    engine: Arc<SrpEngine>,
    store: Arc<dyn UserStore>,
    sessions: Arc<SessionManager>,
}

impl AuthServer {
    pub fn new(engine: Arc<SrpEngine>, store: Arc<dyn UserStore>, session_ttl: Duration) -> Arc<Self> {
        Arc::new(AuthServer {
            engine,
            store,
            sessions: SessionManager::new(session_ttl),
        })
    }

    /// Receive loop: read datagrams and spawn a task per packet
    pub async fn run(self: Arc<Self>, socket: UdpSocket) -> anyhow::Result<()> {
        let socket = Arc::new(socket);
        tracing::info!("Listening on {}", socket.local_addr()?);

        let mut buf = [0u8; MAX_DATAGRAM];
        loop {
            let (len, peer) = socket.recv_from(&mut buf).await?;
            let data = buf[..len].to_vec();

            let server = Arc::clone(&self);
            let socket = Arc::clone(&socket);
            tokio::spawn(async move {
                if let Some(reply) = server.handle_datagram(&data).await {
                    if let Err(e) = socket.send_to(&reply, peer).await {
                        tracing::debug!("Failed to send reply to {}: {}", peer, e);
                    }
                }
            });
        }
    }

    /// Process one datagram; Some(reply) goes back to the sender
    pub async fn handle_datagram(&self, data: &[u8]) -> Option<Vec<u8>> {
        match self.route(data).await {
            Ok(reply) => reply,
            Err(e) if e.is_internal() => {
                tracing::error!("{}", e);
                None
            }
            Err(e) => {
                tracing::debug!("{}", e);
                None
            }
        }
    }

    async fn route(&self, data: &[u8]) -> Result<Option<Vec<u8>>, HandlerError> {
        match read_tag(data)? {
            SERVER_NEGOTIATE => self.handle_negotiate(data).await,
            SERVER_EPHEMERAL => self.handle_ephemeral(data),
            SERVER_PROOF => self.handle_proof(data),
            other => Err(WireError::UnknownPacket(other).into()),
        }
    }

    /// Start a handshake: resolve the user, park a new session in the
    /// table and send back the salt under a fresh session ID.
    async fn handle_negotiate(&self, data: &[u8]) -> Result<Option<Vec<u8>>, HandlerError> {
        let packet = ServerNegotiate::unmarshal(data)?;

        let user = self.store.find_user(&packet.username).await.map_err(|e| match e {
            StoreError::NotFound => HandlerError::UserNotFound(packet.username.clone()),
            other => HandlerError::Backend(other),
        })?;

        let srp = self
            .engine
            .new_server_session(&user.username, &user.salt, &user.verifier);
        let session = self
            .sessions
            .create(srp)
            .ok_or(HandlerError::TableSaturated)?;

        tracing::debug!("Negotiated session {:#010X} for '{}'", session, user.username);

        let reply = AuthNegotiate {
            client_session: packet.client_session,
            session,
            version: PROTOCOL_VERSION,
            username: user.username,
            salt: user.salt,
        };
        Ok(Some(reply.marshal()))
    }

    /// Ephemeral exchange: take the client's A, answer with B
    fn handle_ephemeral(&self, data: &[u8]) -> Result<Option<Vec<u8>>, HandlerError> {
        let packet = ServerEphemeral::unmarshal(data)?;

        let entry = self
            .sessions
            .lookup(packet.session)
            .ok_or(HandlerError::SessionMissing(packet.session))?;
        let mut session = entry.lock();
        if session.stage != SessionStage::AwaitEphemeral {
            return Err(HandlerError::WrongStage(packet.session));
        }

        let b_pub = session.srp.set_client_public(&packet.ephemeral)?;
        session.stage = SessionStage::AwaitProof;

        let reply = AuthEphemeral {
            session: packet.session,
            ephemeral: b_pub,
        };
        Ok(Some(reply.marshal()))
    }

    /// Proof exchange: verify M1; answer M2 on success, a SessionError
    /// on mismatch. Either way the session leaves the table.
    fn handle_proof(&self, data: &[u8]) -> Result<Option<Vec<u8>>, HandlerError> {
        let packet = ServerProof::unmarshal(data)?;

        let entry = self
            .sessions
            .lookup(packet.session)
            .ok_or(HandlerError::SessionMissing(packet.session))?;

        let reply = {
            let mut session = entry.lock();
            if session.stage != SessionStage::AwaitProof {
                return Err(HandlerError::WrongStage(packet.session));
            }

            if session.srp.verify_client_authenticator(&packet.proof) {
                let m2 = session.srp.compute_server_authenticator(&packet.proof)?;
                session.stage = SessionStage::Done;
                tracing::debug!(
                    "Session {:#010X} authenticated '{}'",
                    packet.session,
                    session.srp.username()
                );
                AuthProof {
                    session: packet.session,
                    proof: m2,
                }
                .marshal()
            } else {
                session.stage = SessionStage::Failed;
                tracing::debug!(
                    "Session {:#010X} failed proof for '{}'",
                    packet.session,
                    session.srp.username()
                );
                SessionError {
                    session: packet.session,
                    err_type: SessionErrorCode::AuthFailed as u8,
                }
                .marshal()
            }
        };

        self.sessions.remove(packet.session);
        Ok(Some(reply))
    }
}
