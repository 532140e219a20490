//! Multi-endpoint session: one authority and any number of observers wired
//! together over a loopback network.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use spawnsync_core::{EndpointId, ItemTypeRegistry, NetworkObjectId, SimTime};
use spawnsync_net::{
    AuthorityRole, HandleOutcome, Inbound, LoopbackNetwork, PayloadKind, RetryPolicy, SpawnInfo, SyncCoordinator,
    SyncState,
};
use spawnsync_world::{Character, SimWorld, SyncObject};
use std::collections::BTreeMap;
use tracing::{debug, error, info};

use crate::report::{EndpointReport, SyncReport};

/// Rounds of delivery after which [`Session::pump`] gives up.
const MAX_PUMP_ROUNDS: usize = 64;

/// One endpoint: its coordinator and its simulation.
#[derive(Debug)]
pub struct Peer {
    /// Catch-up coordinator.
    pub coordinator: SyncCoordinator,
    /// Objects and context.
    pub world: SimWorld,
}

/// Something a coordinator did with an inbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncEvent {
    /// Simulation time on the receiving endpoint.
    pub time: f32,
    /// Receiving endpoint.
    pub endpoint: EndpointId,
    /// Endpoint the message came from.
    pub sender: EndpointId,
    /// Outcome label.
    pub outcome: String,
}

/// Authority plus observers over one loopback network.
#[derive(Debug)]
pub struct Session {
    network: LoopbackNetwork,
    peers: BTreeMap<EndpointId, Peer>,
    items: ItemTypeRegistry,
    retry: Option<RetryPolicy>,
    events: Vec<SyncEvent>,
}

impl Session {
    /// Session with only the authority connected.
    pub fn new(items: ItemTypeRegistry) -> Self {
        let mut session = Self {
            network: LoopbackNetwork::new(),
            peers: BTreeMap::new(),
            items,
            retry: None,
            events: Vec::new(),
        };
        session.connect(EndpointId::SERVER);
        session
    }

    /// Use `retry` for observers added from now on.
    pub fn with_retry(mut self, retry: Option<RetryPolicy>) -> Self {
        self.retry = retry;
        self
    }

    fn connect(&mut self, id: EndpointId) {
        self.network.connect(id);
        let coordinator = SyncCoordinator::new(id).with_retry(self.retry);
        self.peers.insert(
            id,
            Peer {
                coordinator,
                world: SimWorld::new(self.items.clone()),
            },
        );
    }

    /// Connect an observer whose clock matches the authority's.
    pub fn add_observer(&mut self, id: EndpointId) -> Result<()> {
        if self.peers.contains_key(&id) {
            bail!("endpoint {id} is already connected");
        }
        let now = self.authority().world.context.now;
        let characters = self.authority().world.context.characters.clone();
        self.connect(id);
        let peer = self.peer_mut(id)?;
        peer.world.context.now = now;
        peer.world.context.characters = characters;
        info!(endpoint = %id, "observer connected");
        Ok(())
    }

    /// Disconnect an observer, dropping its queue and state.
    ///
    /// The authority stays registered; cut it off through
    /// [`network_mut`](Self::network_mut) instead.
    pub fn remove(&mut self, id: EndpointId) -> Option<Peer> {
        if id == EndpointId::SERVER {
            return None;
        }
        self.network.disconnect(id);
        self.peers.remove(&id)
    }

    /// The authority peer.
    pub fn authority(&self) -> &Peer {
        &self.peers[&EndpointId::SERVER]
    }

    /// Look up a peer.
    pub fn peer(&self, id: EndpointId) -> Result<&Peer> {
        self.peers.get(&id).with_context(|| format!("no peer {id}"))
    }

    /// Mutable peer lookup.
    pub fn peer_mut(&mut self, id: EndpointId) -> Result<&mut Peer> {
        self.peers.get_mut(&id).with_context(|| format!("no peer {id}"))
    }

    /// Connected endpoints, authority first.
    pub fn endpoints(&self) -> Vec<EndpointId> {
        self.peers.keys().copied().collect()
    }

    /// The loopback network.
    pub fn network(&self) -> &LoopbackNetwork {
        &self.network
    }

    /// Mutable access, for dropping or duplicating frames in tests.
    pub fn network_mut(&mut self) -> &mut LoopbackNetwork {
        &mut self.network
    }

    /// Events recorded so far.
    pub fn events(&self) -> &[SyncEvent] {
        &self.events
    }

    /// Add a character to every connected endpoint.
    pub fn add_character(&mut self, id: NetworkObjectId, character: Character) {
        for peer in self.peers.values_mut() {
            peer.world.context.characters.insert(id, character.clone());
        }
    }

    /// Spawn an object on the authority.
    pub fn spawn_authoritative(&mut self, id: NetworkObjectId, object: SyncObject) -> Result<()> {
        let kind = object.kind();
        let Session { network, peers, .. } = self;
        let peer = peers
            .get_mut(&EndpointId::SERVER)
            .context("authority is not connected")?;
        peer.world.spawn(id, object);
        let mut transport = network.transport(EndpointId::SERVER);
        peer.coordinator.on_spawn(
            SpawnInfo {
                object: id,
                kind,
                role: AuthorityRole::Authority,
                authority: EndpointId::SERVER,
            },
            &peer.world.objects,
            peer.world.context.now,
            &mut transport,
        )?;
        Ok(())
    }

    /// Spawn an uninitialized copy of `id` on `observer`, which requests its state.
    pub fn replicate(&mut self, observer: EndpointId, id: NetworkObjectId, kind: PayloadKind) -> Result<SyncState> {
        let Session { network, peers, .. } = self;
        let peer = peers.get_mut(&observer).with_context(|| format!("no peer {observer}"))?;
        peer.world.spawn(id, SyncObject::blank(kind, id));
        let mut transport = network.transport(observer);
        let state = peer.coordinator.on_spawn(
            SpawnInfo {
                object: id,
                kind,
                role: AuthorityRole::Observer,
                authority: EndpointId::SERVER,
            },
            &peer.world.objects,
            peer.world.context.now,
            &mut transport,
        )?;
        Ok(state)
    }

    /// Connect `observer` and replicate every object the authority holds.
    pub fn join(&mut self, observer: EndpointId) -> Result<()> {
        self.add_observer(observer)?;
        let objects: Vec<(NetworkObjectId, PayloadKind)> = self
            .authority()
            .world
            .objects
            .iter()
            .map(|(id, object)| (id, object.kind()))
            .collect();
        for (id, kind) in objects {
            self.replicate(observer, id, kind)?;
        }
        Ok(())
    }

    /// Despawn `id` on `endpoint`.
    pub fn despawn(&mut self, endpoint: EndpointId, id: NetworkObjectId) -> Result<()> {
        let peer = self.peer_mut(endpoint)?;
        peer.coordinator.despawn(id);
        peer.world.despawn(id);
        Ok(())
    }

    /// Hand one inbound message to `endpoint`'s coordinator.
    pub fn deliver(&mut self, endpoint: EndpointId, inbound: Inbound) -> Result<HandleOutcome> {
        let Session {
            network,
            peers,
            events,
            ..
        } = self;
        let peer = peers.get_mut(&endpoint).with_context(|| format!("no peer {endpoint}"))?;
        let sender = inbound.sender;
        let mut transport = network.transport(endpoint);
        let outcome = peer.coordinator.handle(
            inbound,
            &mut peer.world.objects,
            &mut peer.world.context,
            &mut transport,
        )?;
        events.push(SyncEvent {
            time: peer.world.context.now.0,
            endpoint,
            sender,
            outcome: outcome_label(outcome),
        });
        Ok(outcome)
    }

    /// Handle everything queued for `endpoint`.
    ///
    /// Every drained message is delivered even if an earlier one fails; the
    /// first failure is returned once the batch is done.
    pub fn pump_endpoint(&mut self, endpoint: EndpointId) -> Result<Vec<HandleOutcome>> {
        let inbound = self.network.drain(endpoint);
        let mut outcomes = Vec::with_capacity(inbound.len());
        let mut failure = None;
        for message in inbound {
            match self.deliver(endpoint, message) {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    error!(%endpoint, "delivery failed: {err:#}");
                    failure.get_or_insert(err);
                }
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(outcomes),
        }
    }

    /// Deliver messages until every queue is empty. Returns messages handled.
    pub fn pump(&mut self) -> Result<usize> {
        let mut handled = 0;
        for _ in 0..MAX_PUMP_ROUNDS {
            if self.network.total_pending() == 0 {
                debug!(handled, "session quiescent");
                return Ok(handled);
            }
            for endpoint in self.endpoints() {
                handled += self.pump_endpoint(endpoint)?.len();
            }
        }
        bail!("session did not settle after {MAX_PUMP_ROUNDS} rounds")
    }

    /// Advance every endpoint's clock, fire due actions and poll retries.
    pub fn advance(&mut self, dt: f32) -> Vec<(EndpointId, NetworkObjectId)> {
        let Session { network, peers, .. } = self;
        let mut deactivated = Vec::new();
        for (id, peer) in peers.iter_mut() {
            for object in peer.world.advance(dt) {
                deactivated.push((*id, object));
            }
            let mut transport = network.transport(*id);
            peer.coordinator.poll_retries(peer.world.context.now, &mut transport);
        }
        deactivated
    }

    /// Current simulation time on the authority.
    pub fn now(&self) -> SimTime {
        self.authority().world.context.now
    }

    /// Per-endpoint counters.
    pub fn report(&self) -> SyncReport {
        SyncReport {
            time: self.now().0,
            endpoints: self
                .peers
                .iter()
                .map(|(id, peer)| EndpointReport {
                    endpoint: *id,
                    stats: peer.coordinator.stats(),
                    tracked: peer.coordinator.tracked_count(),
                    awaiting: peer.coordinator.awaiting().count(),
                })
                .collect(),
        }
    }
}

fn outcome_label(outcome: HandleOutcome) -> String {
    match outcome {
        HandleOutcome::Served { requester } => format!("served {requester}"),
        HandleOutcome::Applied { first: true } => "applied".to_string(),
        HandleOutcome::Applied { first: false } => "reapplied".to_string(),
        HandleOutcome::Dropped(reason) => format!("dropped {reason:?}"),
    }
}
