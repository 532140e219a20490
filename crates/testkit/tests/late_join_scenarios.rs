//! Scenario tests: late-joining observers catching up over the loopback
//! network.
//!
//! Validates:
//! - Replies reach only the requester, even with concurrent requests
//! - A requester that leaves does not starve requests queued behind it
//! - Duplicate replies are re-applied idempotently
//! - One object's failed apply leaves every other object alone
//! - Replies for despawned objects are dropped
//! - Bounded retry recovers a lost request
//! - Scheduled deactivation survives the catch-up

use spawnsync_core::{
    EndpointId, ItemDefinition, ItemTypeId, ItemTypeRegistry, LayerMask, NetworkObjectId, RegistryKey, Vec3,
};
use spawnsync_net::{
    decode_frame, DropReason, HandleOutcome, PayloadCapability, PayloadKind, RetryPolicy, SyncMessage, SyncState,
};
use spawnsync_testkit::{JsonlSink, Session};
use spawnsync_world::{
    Character, CharacterItem, Grenade, ImpactDamageData, ItemAction, MagicAction, MagicParticle, SyncObject,
};

const ALICE: EndpointId = EndpointId(1);
const BOB: EndpointId = EndpointId(2);
const CASTER: NetworkObjectId = NetworkObjectId(500);
const GRENADE: NetworkObjectId = NetworkObjectId(1);

fn registry() -> ItemTypeRegistry {
    ItemTypeRegistry::new(vec![ItemDefinition {
        id: ItemTypeId(1),
        key: RegistryKey::parse("bandage").expect("key"),
        max_stack: 8,
    }])
    .expect("registry")
}

fn caster() -> Character {
    let mut character = Character::with_inventory();
    if let Some(inventory) = character.inventory.as_mut() {
        inventory.equip(CharacterItem::new(
            0,
            vec![ItemAction::Magic(MagicAction {
                id: 7,
                slot_id: 0,
                effect: "lightning".into(),
            })],
        ));
    }
    character
}

fn grenade(session: &mut Session, deactivate_after: Option<f32>) -> SyncObject {
    let mut damage = ImpactDamageData::default();
    damage.assign(60.0, 15.0, 4, "Deafened", 2.5);
    let mut grenade = Grenade::new(GRENADE);
    grenade.launch(
        21,
        Some(CASTER),
        Vec3::new(1.0, 5.0, 2.0),
        Vec3::new(0.0, 0.5, 0.0),
        &damage,
        LayerMask::EVERYTHING,
    );
    if let Some(delay) = deactivate_after {
        let context = &mut session
            .peer_mut(EndpointId::SERVER)
            .expect("authority")
            .world
            .context;
        grenade.schedule_deactivation(delay, context);
    }
    SyncObject::Grenade(grenade)
}

fn particle(id: NetworkObjectId, cast_id: u32) -> (NetworkObjectId, SyncObject) {
    let mut particle = MagicParticle::new();
    particle.instantiate(
        Some(CASTER),
        MagicAction {
            id: 7,
            slot_id: 0,
            effect: "lightning".into(),
        },
        0,
        cast_id,
    );
    (id, SyncObject::MagicParticle(particle))
}

fn session() -> Session {
    let mut session = Session::new(registry());
    session.add_character(CASTER, caster());
    session
}

fn produce(session: &Session, endpoint: EndpointId, id: NetworkObjectId) -> spawnsync_net::SyncRecord {
    let peer = session.peer(endpoint).expect("peer");
    peer.world
        .objects
        .get(id)
        .expect("object")
        .capability()
        .produce(&peer.world.context)
}

#[test]
fn replies_target_only_the_requester() {
    let mut session = session();
    let object = grenade(&mut session, None);
    session.spawn_authoritative(GRENADE, object).expect("spawn");

    session.join(ALICE).expect("alice joins");
    session.join(BOB).expect("bob joins");
    assert_eq!(session.network().pending(EndpointId::SERVER), 2);

    let served = session.pump_endpoint(EndpointId::SERVER).expect("serve");
    assert_eq!(
        served,
        vec![
            HandleOutcome::Served { requester: ALICE },
            HandleOutcome::Served { requester: BOB },
        ]
    );

    let to_alice = session.network_mut().drain(ALICE);
    let to_bob = session.network_mut().drain(BOB);
    assert_eq!(to_alice.len(), 1);
    assert_eq!(to_bob.len(), 1);
    assert!(to_alice.iter().chain(&to_bob).all(|m| m.sender == EndpointId::SERVER));

    let payload = |frame: &[u8]| match decode_frame(frame).expect("frame") {
        SyncMessage::Pong { payload, .. } => payload,
        other => panic!("expected a reply, got {other:?}"),
    };
    assert_eq!(payload(&to_alice[0].frame), payload(&to_bob[0].frame));

    let replies_from_server: Vec<_> = session
        .network()
        .deliveries()
        .iter()
        .filter(|d| d.from == EndpointId::SERVER)
        .map(|d| d.to)
        .collect();
    assert_eq!(replies_from_server, vec![ALICE, BOB]);
}

#[test]
fn departed_requester_does_not_starve_queued_requests() {
    let mut session = session();
    let object = grenade(&mut session, Some(6.0));
    session.spawn_authoritative(GRENADE, object).expect("spawn");
    session.join(ALICE).expect("alice joins");
    session.join(BOB).expect("bob joins");
    assert!(session.remove(ALICE).is_some());

    session.pump().expect("pump");

    let bob = session.peer(BOB).expect("bob");
    assert_eq!(bob.coordinator.state(GRENADE), Some(SyncState::Synced));
    assert_eq!(produce(&session, BOB, GRENADE), produce(&session, EndpointId::SERVER, GRENADE));
    assert_eq!(session.network().total_pending(), 0);

    let server = &session.authority().coordinator;
    assert_eq!(server.stats().replies_served, 1);
    assert!(session.events().iter().any(|e| e.endpoint == EndpointId::SERVER
        && e.sender == ALICE
        && e.outcome == format!("dropped {:?}", DropReason::RequesterGone)));
}

#[test]
fn concurrent_observers_converge_on_authority_state() {
    let mut session = session();
    let object = grenade(&mut session, Some(10.0));
    session.spawn_authoritative(GRENADE, object).expect("spawn");
    session.join(ALICE).expect("alice joins");
    session.join(BOB).expect("bob joins");
    session.pump().expect("pump");

    let expected = produce(&session, EndpointId::SERVER, GRENADE);
    for observer in [ALICE, BOB] {
        let peer = session.peer(observer).expect("peer");
        assert_eq!(peer.coordinator.state(GRENADE), Some(SyncState::Synced));
        assert_eq!(produce(&session, observer, GRENADE), expected);
    }
    assert_eq!(session.report().total_awaiting(), 0);
}

#[test]
fn duplicate_reply_is_idempotent() {
    let mut session = session();
    let object = grenade(&mut session, Some(4.0));
    session.spawn_authoritative(GRENADE, object).expect("spawn");
    session.join(ALICE).expect("alice joins");
    session.pump_endpoint(EndpointId::SERVER).expect("serve");

    let reply = session.network_mut().drain(ALICE).remove(0);
    let first = session.deliver(ALICE, reply.clone()).expect("first");
    let after_first = produce(&session, ALICE, GRENADE);
    let second = session.deliver(ALICE, reply).expect("second");

    assert_eq!(first, HandleOutcome::Applied { first: true });
    assert_eq!(second, HandleOutcome::Applied { first: false });
    assert_eq!(produce(&session, ALICE, GRENADE), after_first);
    let pending = session
        .peer(ALICE)
        .expect("alice")
        .world
        .context
        .scheduler
        .pending_count();
    assert_eq!(pending, 1, "re-apply must not stack deactivations");
}

#[test]
fn failed_apply_is_isolated_to_its_object() {
    let mut session = session();
    let (a, first) = particle(NetworkObjectId(10), 1);
    let (b, second) = particle(NetworkObjectId(11), 2);
    session.spawn_authoritative(a, first).expect("spawn a");
    session.spawn_authoritative(b, second).expect("spawn b");

    session.add_observer(ALICE).expect("alice");
    session.replicate(ALICE, a, PayloadKind::MagicParticle).expect("replicate a");
    session.pump().expect("pump a");

    session
        .peer_mut(ALICE)
        .expect("alice")
        .world
        .context
        .characters
        .remove(CASTER);
    session.replicate(ALICE, b, PayloadKind::MagicParticle).expect("replicate b");
    session.pump().expect("pump b");

    let alice = session.peer(ALICE).expect("alice");
    assert_eq!(alice.coordinator.state(a), Some(SyncState::Synced));
    assert_eq!(alice.coordinator.state(b), Some(SyncState::AwaitingSync));
    assert_eq!(produce(&session, ALICE, a), produce(&session, EndpointId::SERVER, a));
    let Some(SyncObject::MagicParticle(stale)) = alice.world.objects.get(b) else {
        panic!("particle missing");
    };
    assert!(stale.binding().is_none());
    assert!(session
        .events()
        .iter()
        .any(|e| e.endpoint == ALICE && e.outcome == format!("dropped {:?}", DropReason::Rejected)));
}

#[test]
fn particle_with_empty_slot_fails_to_apply() {
    let mut session = session();
    let (id, object) = particle(NetworkObjectId(10), 9);
    session.spawn_authoritative(id, object).expect("spawn");
    session.add_observer(ALICE).expect("alice");
    if let Some(inventory) = session
        .peer_mut(ALICE)
        .expect("alice")
        .world
        .context
        .characters
        .get_mut(CASTER)
        .and_then(|c| c.inventory.as_mut())
    {
        inventory.unequip(0);
    }
    session.replicate(ALICE, id, PayloadKind::MagicParticle).expect("replicate");
    session.pump().expect("pump");

    let alice = session.peer(ALICE).expect("alice");
    assert_eq!(alice.coordinator.state(id), Some(SyncState::AwaitingSync));
    assert_eq!(alice.coordinator.stats().records_dropped, 1);
}

#[test]
fn reply_for_despawned_object_is_dropped() {
    let mut session = session();
    let object = grenade(&mut session, None);
    session.spawn_authoritative(GRENADE, object).expect("spawn");
    session.join(ALICE).expect("alice joins");
    session.pump_endpoint(EndpointId::SERVER).expect("serve");
    session.despawn(ALICE, GRENADE).expect("despawn");

    let outcomes = session.pump_endpoint(ALICE).expect("deliver");
    assert_eq!(outcomes, vec![HandleOutcome::Dropped(DropReason::UnknownObject)]);
    assert!(session.peer(ALICE).expect("alice").world.objects.is_empty());
}

#[test]
fn retry_recovers_lost_request() {
    let mut session = Session::new(registry()).with_retry(Some(RetryPolicy {
        interval_seconds: 0.5,
        max_attempts: 3,
    }));
    session.add_character(CASTER, caster());
    let object = grenade(&mut session, None);
    session.spawn_authoritative(GRENADE, object).expect("spawn");
    session.join(ALICE).expect("alice joins");

    let lost = session.network_mut().drain(EndpointId::SERVER);
    assert_eq!(lost.len(), 1);
    session.advance(0.25);
    assert_eq!(session.network().pending(EndpointId::SERVER), 0);
    session.advance(0.25);
    assert_eq!(session.network().pending(EndpointId::SERVER), 1);

    session.pump().expect("pump");
    let alice = session.peer(ALICE).expect("alice");
    assert_eq!(alice.coordinator.state(GRENADE), Some(SyncState::Synced));
    assert_eq!(alice.coordinator.stats().retries, 1);
}

#[test]
fn without_retry_a_departed_authority_leaves_observer_waiting() {
    let mut session = session();
    let object = grenade(&mut session, None);
    session.spawn_authoritative(GRENADE, object).expect("spawn");
    session.join(ALICE).expect("alice joins");
    session.network_mut().disconnect(EndpointId::SERVER);

    session.pump().expect("pump");
    for _ in 0..20 {
        session.advance(0.5);
    }
    let alice = session.peer(ALICE).expect("alice");
    assert_eq!(alice.coordinator.state(GRENADE), Some(SyncState::AwaitingSync));
    assert_eq!(alice.coordinator.stats().requests_sent, 1);
}

#[test]
fn late_joiner_inherits_remaining_countdown() {
    let mut session = session();
    let object = grenade(&mut session, Some(3.5));
    session.spawn_authoritative(GRENADE, object).expect("spawn");
    session.advance(0.5);
    session.advance(0.5);

    session.join(ALICE).expect("alice joins");
    session.pump().expect("pump");
    let spawnsync_net::SyncRecord::Grenade(record) = produce(&session, ALICE, GRENADE) else {
        panic!("wrong kind");
    };
    assert_eq!(record.scheduled_deactivation, 2.5);

    assert!(session.advance(2.25).is_empty());
    let fired = session.advance(0.25);
    assert!(fired.contains(&(EndpointId::SERVER, GRENADE)));
    assert!(fired.contains(&(ALICE, GRENADE)));
}

#[test]
fn report_is_written_as_jsonl() {
    let mut session = session();
    let object = grenade(&mut session, None);
    session.spawn_authoritative(GRENADE, object).expect("spawn");
    session.join(ALICE).expect("alice joins");
    session.join(BOB).expect("bob joins");
    session.pump().expect("pump");

    let path = std::env::temp_dir().join(format!("spawnsync-report-{}.jsonl", std::process::id()));
    let mut sink = JsonlSink::create(&path).expect("sink");
    session.report().write_jsonl(&mut sink).expect("write report");
    drop(sink);

    let contents = std::fs::read_to_string(&path).expect("read report");
    let rows: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["stats"]["replies_served"], 2);
    assert_eq!(rows[1]["stats"]["records_applied"], 1);
    let _ = std::fs::remove_file(&path);
}
