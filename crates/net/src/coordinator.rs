//! Spawn-time request/response coordinator.
//!
//! One coordinator runs per endpoint. Observers request an object's state
//! once when it spawns; the authority answers each request with a reply
//! addressed to the requesting endpoint alone.

use crate::capability::{PayloadCapability, PayloadError};
use crate::codec::{decode_frame, encode_frame, FrameError};
use crate::protocol::SyncMessage;
use crate::records::PayloadKind;
use crate::transport::{Inbound, Transport, TransportError};
use crate::wire::CodecError;
use serde::{Deserialize, Serialize};
use spawnsync_core::{EndpointId, NetworkObjectId, SimTime};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, error, info, instrument, trace, warn};

/// Whether this endpoint holds authority over an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorityRole {
    /// Source of truth; serves requests.
    Authority,
    /// Late observer; requests state on spawn.
    Observer,
}

/// Facts the spawn system supplies when an object enters the replicated world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnInfo {
    /// Spawned object.
    pub object: NetworkObjectId,
    /// Object kind.
    pub kind: PayloadKind,
    /// Local role, fixed for the object's lifetime.
    pub role: AuthorityRole,
    /// Endpoint holding authority for this object.
    pub authority: EndpointId,
}

/// Per-instance catch-up state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncState {
    /// Observer spawned, no reply applied yet.
    AwaitingSync,
    /// Authority, or reply applied.
    Synced,
}

/// Lookup of the capability attached to a spawned object.
pub trait CapabilitySource {
    /// Context the capabilities read from and write to.
    type Context;

    /// Shared access to `object`'s capability.
    fn capability(&self, object: NetworkObjectId) -> Option<&dyn PayloadCapability<Self::Context>>;

    /// Exclusive access to `object`'s capability.
    fn capability_mut(&mut self, object: NetworkObjectId) -> Option<&mut dyn PayloadCapability<Self::Context>>;
}

/// Bounded re-request policy for observers whose reply never arrived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Seconds to wait after a request before sending another.
    pub interval_seconds: f32,
    /// Total requests per instance, including the first.
    pub max_attempts: u32,
}

/// Errors that must not be swallowed.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A record overran its own size formula.
    #[error("payload encoding failed: {0}")]
    Encode(#[from] CodecError),
    /// A message could not be framed.
    #[error("framing failed: {0}")]
    Frame(#[from] FrameError),
    /// The transport refused a send.
    #[error("send failed: {0}")]
    Transport(#[from] TransportError),
}

/// Why an inbound message was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DropReason {
    /// Frame failed to decode or verify.
    Malformed,
    /// Object is not tracked here (never spawned or already despawned).
    UnknownObject,
    /// A request reached an endpoint without authority.
    NotAuthority,
    /// A reply reached the authority.
    NotObserver,
    /// A reply came from an endpoint other than the object's authority.
    UnexpectedSender,
    /// The object has no payload capability.
    MissingCapability,
    /// Message kind differs from the tracked kind.
    KindMismatch,
    /// Reply payload did not decode.
    Undecodable,
    /// Reply decoded but the object rejected it.
    Rejected,
    /// The requester left before its reply could be sent.
    RequesterGone,
}

/// Result of handling one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// A reply was sent to `requester`.
    Served {
        /// Endpoint the reply was addressed to.
        requester: EndpointId,
    },
    /// A reply was applied; `first` is false for duplicates.
    Applied {
        /// Whether this moved the instance from `AwaitingSync` to `Synced`.
        first: bool,
    },
    /// The message was dropped.
    Dropped(DropReason),
}

/// Counters for one endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Requests sent, retries included.
    pub requests_sent: u64,
    /// Requests re-sent under a retry policy.
    pub retries: u64,
    /// Replies sent as authority.
    pub replies_served: u64,
    /// Replies applied as observer.
    pub records_applied: u64,
    /// Messages dropped for any reason.
    pub records_dropped: u64,
}

#[derive(Debug, Clone)]
struct Tracked {
    kind: PayloadKind,
    role: AuthorityRole,
    authority: EndpointId,
    state: SyncState,
    requests: u32,
    last_request: SimTime,
}

/// Catch-up coordinator for one endpoint.
#[derive(Debug)]
pub struct SyncCoordinator {
    local: EndpointId,
    tracked: BTreeMap<NetworkObjectId, Tracked>,
    retry: Option<RetryPolicy>,
    stats: SyncStats,
}

impl SyncCoordinator {
    /// Create a coordinator for `local` without retries.
    pub fn new(local: EndpointId) -> Self {
        Self {
            local,
            tracked: BTreeMap::new(),
            retry: None,
            stats: SyncStats::default(),
        }
    }

    /// Enable (or disable) bounded re-requests.
    pub fn with_retry(mut self, retry: Option<RetryPolicy>) -> Self {
        self.retry = retry;
        self
    }

    /// Endpoint this coordinator runs on.
    pub fn local(&self) -> EndpointId {
        self.local
    }

    /// Counters so far.
    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Catch-up state of `object`, if tracked.
    pub fn state(&self, object: NetworkObjectId) -> Option<SyncState> {
        self.tracked.get(&object).map(|t| t.state)
    }

    /// Number of tracked instances.
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Objects still waiting for a reply, in id order.
    pub fn awaiting(&self) -> impl Iterator<Item = NetworkObjectId> + '_ {
        self.tracked
            .iter()
            .filter(|(_, t)| t.state == SyncState::AwaitingSync)
            .map(|(id, _)| *id)
    }

    /// Track a freshly spawned instance and, on observers, request its state.
    ///
    /// A missing capability is a configuration error: it is logged, no
    /// request is sent and the instance stays uninitialized.
    pub fn on_spawn<S, T>(
        &mut self,
        spawn: SpawnInfo,
        objects: &S,
        now: SimTime,
        transport: &mut T,
    ) -> Result<SyncState, SyncError>
    where
        S: CapabilitySource + ?Sized,
        T: Transport + ?Sized,
    {
        let state = match spawn.role {
            AuthorityRole::Authority => SyncState::Synced,
            AuthorityRole::Observer => SyncState::AwaitingSync,
        };
        self.tracked.insert(
            spawn.object,
            Tracked {
                kind: spawn.kind,
                role: spawn.role,
                authority: spawn.authority,
                state,
                requests: 0,
                last_request: now,
            },
        );

        if objects.capability(spawn.object).is_none() {
            error!(
                local = %self.local,
                object = %spawn.object,
                kind = %spawn.kind,
                "spawned object has no payload capability"
            );
            return Ok(state);
        }

        if spawn.role == AuthorityRole::Observer {
            self.send_request(spawn.object, now, transport)?;
        }
        Ok(state)
    }

    /// Forget a despawned instance. Late replies for it are dropped.
    pub fn despawn(&mut self, object: NetworkObjectId) -> bool {
        self.tracked.remove(&object).is_some()
    }

    fn send_request<T>(&mut self, object: NetworkObjectId, now: SimTime, transport: &mut T) -> Result<(), SyncError>
    where
        T: Transport + ?Sized,
    {
        let Some(tracked) = self.tracked.get_mut(&object) else {
            return Ok(());
        };
        tracked.last_request = now;
        let authority = tracked.authority;
        let frame = encode_frame(&SyncMessage::Ping {
            object,
            kind: tracked.kind,
        })?;
        debug!(local = %self.local, %object, %authority, "requesting state");
        transport.send(authority, frame)?;
        tracked.requests += 1;
        self.stats.requests_sent += 1;
        Ok(())
    }

    /// Handle one inbound frame.
    ///
    /// Per-message problems become [`HandleOutcome::Dropped`]; only encoder
    /// bugs and send failures are returned as errors.
    #[instrument(skip_all, fields(local = %self.local, sender = %inbound.sender))]
    pub fn handle<S, T>(
        &mut self,
        inbound: Inbound,
        objects: &mut S,
        ctx: &mut S::Context,
        transport: &mut T,
    ) -> Result<HandleOutcome, SyncError>
    where
        S: CapabilitySource + ?Sized,
        T: Transport + ?Sized,
    {
        let message = match decode_frame(&inbound.frame) {
            Ok(message) => message,
            Err(err) => {
                warn!("dropping malformed frame: {err}");
                return Ok(self.dropped(DropReason::Malformed));
            }
        };

        match message {
            SyncMessage::Ping { object, kind } => {
                self.serve_request(inbound.sender, object, kind, &*objects, &*ctx, transport)
            }
            SyncMessage::Pong {
                object,
                kind,
                payload,
            } => Ok(self.apply_reply(inbound.sender, object, kind, &payload, objects, ctx)),
        }
    }

    fn serve_request<S, T>(
        &mut self,
        requester: EndpointId,
        object: NetworkObjectId,
        kind: PayloadKind,
        objects: &S,
        ctx: &S::Context,
        transport: &mut T,
    ) -> Result<HandleOutcome, SyncError>
    where
        S: CapabilitySource + ?Sized,
        T: Transport + ?Sized,
    {
        let Some(tracked) = self.tracked.get(&object) else {
            debug!(%object, "request for unknown object");
            return Ok(self.dropped(DropReason::UnknownObject));
        };
        if tracked.role != AuthorityRole::Authority {
            warn!(%object, "request reached a non-authoritative instance");
            return Ok(self.dropped(DropReason::NotAuthority));
        }
        if tracked.kind != kind {
            warn!(%object, expected = %tracked.kind, found = %kind, "request kind mismatch");
            return Ok(self.dropped(DropReason::KindMismatch));
        }
        let Some(capability) = objects.capability(object) else {
            error!(%object, %kind, "cannot serve request: object has no payload capability");
            return Ok(self.dropped(DropReason::MissingCapability));
        };

        let payload = capability.encode_payload(ctx).map_err(|err| {
            error!(%object, %kind, "record overran its size formula: {err}");
            SyncError::Encode(err)
        })?;
        match self.send_reply(requester, object, kind, payload, transport) {
            Ok(()) => Ok(HandleOutcome::Served { requester }),
            Err(SyncError::Transport(err)) => {
                warn!(%object, %requester, "requester unreachable, reply dropped: {err}");
                Ok(self.dropped(DropReason::RequesterGone))
            }
            Err(err) => Err(err),
        }
    }

    /// Send an encoded record to `requester` and nobody else.
    pub fn send_reply<T>(
        &mut self,
        requester: EndpointId,
        object: NetworkObjectId,
        kind: PayloadKind,
        payload: Vec<u8>,
        transport: &mut T,
    ) -> Result<(), SyncError>
    where
        T: Transport + ?Sized,
    {
        let len = payload.len();
        let frame = encode_frame(&SyncMessage::Pong {
            object,
            kind,
            payload,
        })?;
        transport.send(requester, frame)?;
        self.stats.replies_served += 1;
        trace!(%object, %requester, len, "served state");
        Ok(())
    }

    fn apply_reply<S>(
        &mut self,
        sender: EndpointId,
        object: NetworkObjectId,
        kind: PayloadKind,
        payload: &[u8],
        objects: &mut S,
        ctx: &mut S::Context,
    ) -> HandleOutcome
    where
        S: CapabilitySource + ?Sized,
    {
        let Some(tracked) = self.tracked.get(&object) else {
            debug!(%object, "reply for despawned or unknown object");
            return self.dropped(DropReason::UnknownObject);
        };
        if tracked.role != AuthorityRole::Observer {
            warn!(%object, "authority received a reply");
            return self.dropped(DropReason::NotObserver);
        }
        if tracked.authority != sender {
            warn!(%object, authority = %tracked.authority, "reply from non-authoritative endpoint");
            return self.dropped(DropReason::UnexpectedSender);
        }
        if tracked.kind != kind {
            warn!(%object, expected = %tracked.kind, found = %kind, "reply kind mismatch");
            return self.dropped(DropReason::KindMismatch);
        }
        let Some(capability) = objects.capability_mut(object) else {
            error!(%object, %kind, "cannot apply reply: object has no payload capability");
            return self.dropped(DropReason::MissingCapability);
        };

        match capability.apply_payload(payload, ctx) {
            Ok(()) => {
                let first = self
                    .tracked
                    .get_mut(&object)
                    .map(|t| std::mem::replace(&mut t.state, SyncState::Synced) == SyncState::AwaitingSync)
                    .unwrap_or(false);
                self.stats.records_applied += 1;
                if first {
                    info!(%object, %kind, "object synced");
                } else {
                    debug!(%object, %kind, "re-applied duplicate reply");
                }
                HandleOutcome::Applied { first }
            }
            Err(PayloadError::Decode(err)) => {
                warn!(%object, %kind, "undecodable reply: {err}");
                self.dropped(DropReason::Undecodable)
            }
            Err(PayloadError::Apply(err)) => {
                debug!(%object, %kind, "reply rejected: {err}");
                self.dropped(DropReason::Rejected)
            }
        }
    }

    /// Re-send requests for instances still waiting, per the retry policy.
    ///
    /// Returns how many requests were re-sent. Send failures are logged and
    /// skipped so one unreachable authority does not stall other objects.
    pub fn poll_retries<T>(&mut self, now: SimTime, transport: &mut T) -> usize
    where
        T: Transport + ?Sized,
    {
        let Some(policy) = self.retry else {
            return 0;
        };
        let due: Vec<NetworkObjectId> = self
            .tracked
            .iter()
            .filter(|(_, t)| {
                t.role == AuthorityRole::Observer
                    && t.state == SyncState::AwaitingSync
                    && t.requests > 0
                    && t.requests < policy.max_attempts
                    && t.last_request.until(now) >= policy.interval_seconds
            })
            .map(|(id, _)| *id)
            .collect();

        let mut resent = 0;
        for object in due {
            match self.send_request(object, now, transport) {
                Ok(()) => {
                    self.stats.retries += 1;
                    resent += 1;
                }
                Err(err) => warn!(%object, "retry failed: {err}"),
            }
        }
        resent
    }

    fn dropped(&mut self, reason: DropReason) -> HandleOutcome {
        self.stats.records_dropped += 1;
        HandleOutcome::Dropped(reason)
    }
}
