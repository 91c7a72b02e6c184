//! Stream registry implementation
//!
//! The central registry that tracks which streams exist, which connection
//! broadcasts each one, and which connections are watching. Every mutation
//! follows "mutate, then notify": the data-structure change completes first,
//! then the affected connections are told through the hub's fire-and-forget
//! channels.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::hub::{ConnectionHub, ConnectionId};
use crate::protocol::ServerMessage;

use super::config::RegistryConfig;
use super::error::RegistryError;
use super::stream::{PublishRequest, StreamEntry, StreamId, StreamRecord, StreamSnapshot};

/// Central registry for all active streams
///
/// Thread-safe via `RwLock`. Membership changes (`join`, `leave`, disconnect
/// sweeps) take the outer lock for reading plus the per-stream lock for
/// writing, so operations on different streams proceed in parallel while two
/// racing changes to the same room serialize and both land in the final
/// count. Only `publish` and `unpublish` take the outer lock for writing, and
/// hold it just long enough for a map insert or remove.
pub struct StreamRegistry {
    /// Map of stream id to stream entry (record + room + broadcaster)
    streams: RwLock<HashMap<StreamId, Arc<RwLock<StreamEntry>>>>,

    /// Delivery of outbound notifications
    hub: Arc<ConnectionHub>,

    /// Configuration
    config: RegistryConfig,
}

impl StreamRegistry {
    /// Create a new stream registry with default configuration
    pub fn new(hub: Arc<ConnectionHub>) -> Self {
        Self::with_config(hub, RegistryConfig::default())
    }

    /// Create a new stream registry with custom configuration
    pub fn with_config(hub: Arc<ConnectionHub>, config: RegistryConfig) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            hub,
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Publish a stream with `caller` as its broadcaster
    ///
    /// Creates the stream record, an empty room, and the broadcaster
    /// assignment as one atomic step, then announces the stream to every
    /// connection. A repeated publish of a stream the caller already
    /// broadcasts is an idempotent no-op that returns the current snapshot
    /// without re-announcing; a publish of an id owned by someone else fails
    /// with [`RegistryError::DuplicateStream`].
    pub async fn publish(
        &self,
        request: PublishRequest,
        caller: ConnectionId,
    ) -> Result<StreamSnapshot, RegistryError> {
        let mut streams = self.streams.write().await;

        if let Some(id) = &request.stream_id {
            if let Some(entry_arc) = streams.get(id) {
                let entry = entry_arc.read().await;

                if entry.broadcaster == caller {
                    tracing::debug!(
                        stream = %id,
                        connection_id = %caller,
                        "Re-publish of owned stream ignored"
                    );
                    return Ok(entry.snapshot());
                }

                return Err(RegistryError::DuplicateStream(id.clone()));
            }
        }

        let id = match request.stream_id {
            Some(id) => id,
            None => {
                let mut id = StreamId::generate();
                while streams.contains_key(&id) {
                    id = StreamId::generate();
                }
                id
            }
        };

        let record = StreamRecord {
            id: id.clone(),
            title: request
                .title
                .unwrap_or_else(|| self.config.default_title.clone()),
            broadcaster_name: request
                .broadcaster_name
                .unwrap_or_else(|| self.config.default_display_name.clone()),
            created_at: Utc::now(),
        };

        let entry = StreamEntry::new(record, caller);
        let snapshot = entry.snapshot();
        streams.insert(id.clone(), Arc::new(RwLock::new(entry)));
        drop(streams);

        tracing::info!(
            stream = %id,
            connection_id = %caller,
            title = %snapshot.title,
            "Stream published"
        );

        self.hub
            .send_to(
                caller,
                ServerMessage::StreamStarted {
                    stream_id: id.clone(),
                },
            )
            .await;
        self.hub
            .broadcast(&ServerMessage::NewStream {
                stream: snapshot.clone(),
            })
            .await;

        Ok(snapshot)
    }

    /// Unpublish a stream
    ///
    /// Only honored for the stream's broadcaster. Removes the record, room
    /// and broadcaster assignment together, tells the room the stream ended,
    /// and withdraws the stream from discovery everywhere.
    pub async fn unpublish(
        &self,
        stream_id: &StreamId,
        caller: ConnectionId,
    ) -> Result<(), RegistryError> {
        let mut streams = self.streams.write().await;

        let entry_arc = streams
            .get(stream_id)
            .ok_or_else(|| RegistryError::UnknownStream(stream_id.clone()))?;

        let members = {
            let entry = entry_arc.read().await;

            if entry.broadcaster != caller {
                tracing::warn!(
                    stream = %stream_id,
                    expected = %entry.broadcaster,
                    actual = %caller,
                    "Unpublish rejected: caller is not the broadcaster"
                );
                return Err(RegistryError::NotBroadcaster {
                    stream_id: stream_id.clone(),
                    caller,
                });
            }

            entry.member_list()
        };

        streams.remove(stream_id);
        drop(streams);

        tracing::info!(
            stream = %stream_id,
            connection_id = %caller,
            members = members.len(),
            "Stream unpublished"
        );

        self.hub
            .send_to_many(
                &members,
                &ServerMessage::StreamEnded {
                    stream_id: stream_id.clone(),
                },
            )
            .await;
        self.hub
            .broadcast(&ServerMessage::StreamRemoved {
                stream_id: stream_id.clone(),
            })
            .await;

        Ok(())
    }

    /// Join a stream's room
    ///
    /// Set semantics: re-joining is a no-op. The recomputed viewer count is
    /// broadcast to the whole room and returned.
    pub async fn join(
        &self,
        stream_id: &StreamId,
        caller: ConnectionId,
    ) -> Result<usize, RegistryError> {
        let streams = self.streams.read().await;

        let entry_arc = streams
            .get(stream_id)
            .ok_or_else(|| RegistryError::UnknownStream(stream_id.clone()))?;

        let mut entry = entry_arc.write().await;

        if entry.members.insert(caller) {
            tracing::debug!(
                stream = %stream_id,
                connection_id = %caller,
                viewers = entry.viewer_count(),
                "Viewer joined"
            );
        }

        let count = entry.viewer_count();
        // Notify while the room is still locked so per-stream counts go out
        // in the order they were computed. The sends never block.
        self.hub
            .send_to_many(
                &entry.member_list(),
                &ServerMessage::ViewerCount {
                    stream_id: stream_id.clone(),
                    count,
                },
            )
            .await;

        Ok(count)
    }

    /// Leave a stream's room
    ///
    /// No-op if the caller was not a member. The recomputed viewer count is
    /// broadcast to the remaining room and returned.
    pub async fn leave(
        &self,
        stream_id: &StreamId,
        caller: ConnectionId,
    ) -> Result<usize, RegistryError> {
        let streams = self.streams.read().await;

        let entry_arc = streams
            .get(stream_id)
            .ok_or_else(|| RegistryError::UnknownStream(stream_id.clone()))?;

        let mut entry = entry_arc.write().await;

        if entry.members.remove(&caller) {
            tracing::debug!(
                stream = %stream_id,
                connection_id = %caller,
                viewers = entry.viewer_count(),
                "Viewer left"
            );
        }

        let count = entry.viewer_count();
        self.hub
            .send_to_many(
                &entry.member_list(),
                &ServerMessage::ViewerCount {
                    stream_id: stream_id.clone(),
                    count,
                },
            )
            .await;

        Ok(count)
    }

    /// Point-in-time snapshots of every active stream, order irrelevant
    pub async fn list_active(&self) -> Vec<StreamSnapshot> {
        let streams = self.streams.read().await;

        let mut snapshots = Vec::with_capacity(streams.len());
        for entry_arc in streams.values() {
            snapshots.push(entry_arc.read().await.snapshot());
        }

        snapshots
    }

    /// Snapshot of one stream, if it exists
    pub async fn get(&self, stream_id: &StreamId) -> Option<StreamSnapshot> {
        let streams = self.streams.read().await;

        match streams.get(stream_id) {
            Some(entry_arc) => Some(entry_arc.read().await.snapshot()),
            None => None,
        }
    }

    /// The broadcaster connection of a stream, if the stream exists
    ///
    /// Every registered stream has one; `None` means the stream is gone.
    pub async fn broadcaster_of(&self, stream_id: &StreamId) -> Option<ConnectionId> {
        let streams = self.streams.read().await;

        match streams.get(stream_id) {
            Some(entry_arc) => Some(entry_arc.read().await.broadcaster),
            None => None,
        }
    }

    /// Current room membership of a stream, if the stream exists
    pub async fn room_members(&self, stream_id: &StreamId) -> Option<Vec<ConnectionId>> {
        let streams = self.streams.read().await;

        match streams.get(stream_id) {
            Some(entry_arc) => Some(entry_arc.read().await.member_list()),
            None => None,
        }
    }

    /// Total number of active streams
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }

    /// Sweep a disconnected connection out of the registry
    ///
    /// Visits every room the connection belongs to and leaves it, and tears
    /// down every stream the connection broadcasts. Safe to call for a
    /// connection that never joined or published anything, and safe to call
    /// redundantly: the second invocation finds nothing to do. Never fails.
    pub async fn drop_connection(&self, conn: ConnectionId) {
        // First pass: leave every room. Streams the connection broadcasts are
        // only collected here; their rooms are torn down whole below, so no
        // viewer-count update is sent for them.
        let mut owned = Vec::new();
        {
            let streams = self.streams.read().await;

            for (id, entry_arc) in streams.iter() {
                let mut entry = entry_arc.write().await;

                if entry.broadcaster == conn {
                    owned.push(id.clone());
                    continue;
                }

                if entry.members.remove(&conn) {
                    let count = entry.viewer_count();
                    tracing::debug!(
                        stream = %id,
                        connection_id = %conn,
                        viewers = count,
                        "Removed disconnected viewer"
                    );
                    self.hub
                        .send_to_many(
                            &entry.member_list(),
                            &ServerMessage::ViewerCount {
                                stream_id: id.clone(),
                                count,
                            },
                        )
                        .await;
                }
            }
        }

        for id in owned {
            // Lost races here are fine: the stream may have been unpublished
            // explicitly while we were sweeping.
            if let Err(e) = self.unpublish(&id, conn).await {
                tracing::debug!(stream = %id, error = %e, "Disconnect teardown raced");
            }
        }
    }
}
