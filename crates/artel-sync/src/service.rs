//! Sync service: answers catalog and payload requests.
//!
//! The service is stateless per request: build a snapshot scoped to the
//! request's filter, sign it with the local identity, respond. Signing per
//! request means a response always reflects the store at that moment.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

use artel_core::{ArtistId, CatalogFilter};
use artel_store::CatalogStore;

use crate::error::Result;
use crate::messages::{WireErrorCode, WireMessage, PROTOCOL_VERSION};
use crate::publish::sign_snapshot;
use crate::signer::Signer;
use crate::snapshot::build_snapshot;
use crate::transport::{tcp::TcpChannel, Channel};

/// How long an idle connection is held open for another request.
const CONNECTION_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Serves the local catalog to peers.
pub struct SyncService<S, O> {
    store: Arc<S>,
    signer: Arc<O>,
    /// The locally hosted artist; publications are issued in its name.
    artist_id: ArtistId,
}

impl<S, O> SyncService<S, O>
where
    S: CatalogStore + 'static,
    O: Signer + 'static,
{
    pub fn new(store: Arc<S>, signer: Arc<O>, artist_id: ArtistId) -> Self {
        Self {
            store,
            signer,
            artist_id,
        }
    }

    /// Answer one request. Failures become `Error` responses; the
    /// connection stays usable.
    pub async fn handle(&self, request: WireMessage) -> WireMessage {
        match request {
            WireMessage::GetCatalog {
                protocol_version,
                filter,
            } => {
                if protocol_version != PROTOCOL_VERSION {
                    return version_mismatch(protocol_version);
                }
                match self.catalog_response(&filter).await {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::warn!("catalog request failed: {}", e);
                        WireMessage::Error {
                            code: WireErrorCode::Internal,
                            message: e.to_string(),
                        }
                    }
                }
            }

            WireMessage::GetTrackPayload {
                protocol_version,
                artist_id,
                artist_track_id,
            } => {
                if protocol_version != PROTOCOL_VERSION {
                    return version_mismatch(protocol_version);
                }
                match self.store.get_track_payload(&artist_id, &artist_track_id).await {
                    Ok(Some(payload)) => WireMessage::TrackPayload { payload },
                    Ok(None) => WireMessage::Error {
                        code: WireErrorCode::NotFound,
                        message: format!("no payload for {}/{}", artist_id, artist_track_id),
                    },
                    Err(e) => {
                        tracing::warn!("payload request failed: {}", e);
                        WireMessage::Error {
                            code: WireErrorCode::Internal,
                            message: e.to_string(),
                        }
                    }
                }
            }

            other => WireMessage::Error {
                code: WireErrorCode::InvalidMessage,
                message: format!("not a request: {:?}", std::mem::discriminant(&other)),
            },
        }
    }

    async fn catalog_response(&self, filter: &CatalogFilter) -> Result<WireMessage> {
        let snapshot = build_snapshot(&*self.store, filter).await?;

        let artist = match self.store.get_artist(&self.artist_id).await? {
            Some(artist) => artist,
            None => {
                return Ok(WireMessage::Error {
                    code: WireErrorCode::Internal,
                    message: "local artist not registered".into(),
                })
            }
        };

        let publication = sign_snapshot(&*self.signer, &artist, &snapshot).await?;
        Ok(WireMessage::Catalog { publication })
    }

    /// Accept-and-serve loop over TCP.
    ///
    /// One task per connection. Stops accepting when the shutdown signal
    /// flips to `true`, then joins every connection handler, so in-flight
    /// requests run to completion before this returns.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()>
    where
        S: Send + Sync,
        O: Send + Sync,
    {
        tracing::info!(addr = ?listener.local_addr().ok(), "sync service listening");

        let mut handlers = JoinSet::new();
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender also stops the service.
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("sync service shutting down");
                        break;
                    }
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            tracing::debug!(%addr, "accepted connection");
                            let service = Arc::clone(&self);
                            let conn_shutdown = shutdown.clone();
                            handlers.spawn(async move {
                                service
                                    .handle_connection(
                                        TcpChannel::from_stream(stream),
                                        conn_shutdown,
                                    )
                                    .await;
                            });
                        }
                        Err(e) => tracing::warn!("accept failed: {}", e),
                    }
                }
            }
        }

        // Drain in-flight connections before returning.
        while handlers.join_next().await.is_some() {}

        Ok(())
    }

    /// Serve requests on one channel until it closes, goes idle, or the
    /// shutdown signal fires. A request already being handled still gets
    /// its response.
    pub async fn handle_connection<C: Channel>(
        &self,
        mut channel: C,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let request = tokio::select! {
                received = channel.recv(CONNECTION_IDLE_TIMEOUT) => match received {
                    Ok(request) => request,
                    Err(_) => break,
                },
                _ = shutdown.changed() => break,
            };
            let response = self.handle(request).await;
            if channel.send(response).await.is_err() {
                break;
            }
        }
    }
}

fn version_mismatch(peer_version: u8) -> WireMessage {
    WireMessage::Error {
        code: WireErrorCode::VersionMismatch,
        message: format!(
            "protocol version {} not supported, want {}",
            peer_version, PROTOCOL_VERSION
        ),
    }
}
