//! Seeded late-join demo: an authority spawns one object of each kind, then
//! observers join at staggered ticks and catch up.

use anyhow::{Context, Result};
use rand::Rng;
use spawnsync_core::{scoped_rng, EndpointId, ItemTypeId, LayerMask, NetworkObjectId, Quat, Vec3};
use spawnsync_net::PickupEntry;
use spawnsync_testkit::{EventRecord, JsonlSink, Session, SyncReport};
use spawnsync_world::{
    Character, CharacterItem, Grenade, ImpactDamageData, ItemAction, ItemPickup, MagicAction, MagicParticle,
    Projectile, SyncObject,
};
use tracing::info;

use crate::config::SyncConfig;

const CASTER: NetworkObjectId = NetworkObjectId(1000);

fn staff() -> MagicAction {
    MagicAction {
        id: 3,
        slot_id: 0,
        effect: "arc_bolt".into(),
    }
}

fn caster() -> Character {
    let mut character = Character::with_inventory();
    if let Some(inventory) = character.inventory.as_mut() {
        inventory.equip(CharacterItem::new(0, vec![ItemAction::Melee { id: 1 }, ItemAction::Magic(staff())]));
    }
    character
}

fn random_vec3(rng: &mut impl Rng, scale: f32) -> Vec3 {
    Vec3::new(
        rng.gen_range(-scale..scale),
        rng.gen_range(0.0..scale),
        rng.gen_range(-scale..scale),
    )
}

fn random_damage(rng: &mut impl Rng) -> ImpactDamageData {
    let mut damage = ImpactDamageData::default();
    let state = ["Stunned", "Burning", "Knockback"][rng.gen_range(0..3)];
    damage.assign(
        rng.gen_range(5.0..80.0),
        rng.gen_range(1.0..20.0),
        rng.gen_range(1..6),
        state,
        rng.gen_range(0.5..4.0),
    );
    damage
}

fn spawn_objects(session: &mut Session, cfg: &SyncConfig) -> Result<()> {
    let item_ids: Vec<ItemTypeId> = cfg.item_registry()?.iter().map(|d| d.id).collect();

    let id = NetworkObjectId(1);
    let mut rng = scoped_rng(cfg.seed, id);
    let mut grenade = Grenade::new(id);
    grenade.launch(
        rng.gen(),
        Some(CASTER),
        random_vec3(&mut rng, 10.0),
        random_vec3(&mut rng, 2.0),
        &random_damage(&mut rng),
        LayerMask::EVERYTHING,
    );
    let fuse = rng.gen_range(1.0..3.0);
    grenade.schedule_deactivation(fuse, &mut session.peer_mut(EndpointId::SERVER)?.world.context);
    session.spawn_authoritative(id, SyncObject::Grenade(grenade))?;

    let id = NetworkObjectId(2);
    let mut rng = scoped_rng(cfg.seed, id);
    let mut pickup = ItemPickup::with_trajectory();
    let entries: Vec<PickupEntry> = (0..rng.gen_range(0..6))
        .filter_map(|_| {
            let item_id = *item_ids.get(rng.gen_range(0..item_ids.len().max(1)))?;
            Some(PickupEntry {
                item_id,
                amount: rng.gen_range(1..16),
            })
        })
        .collect();
    let rotation = Quat::from_rotation_y(rng.gen_range(0.0..std::f32::consts::TAU));
    pickup.drop_items(rotation, &entries, &mut session.peer_mut(EndpointId::SERVER)?.world.context)?;
    pickup.throw(random_vec3(&mut rng, 4.0), Vec3::ZERO, Some(CASTER));
    session.spawn_authoritative(id, SyncObject::ItemPickup(pickup))?;

    let id = NetworkObjectId(3);
    let mut rng = scoped_rng(cfg.seed, id);
    let mut particle = MagicParticle::new();
    particle.instantiate(Some(CASTER), staff(), rng.gen_range(0..4), rng.gen());
    session.spawn_authoritative(id, SyncObject::MagicParticle(particle))?;

    let id = NetworkObjectId(4);
    let mut rng = scoped_rng(cfg.seed, id);
    let mut projectile = Projectile::new();
    projectile.launch(
        rng.gen(),
        Some(CASTER),
        random_vec3(&mut rng, 60.0),
        Vec3::ZERO,
        &random_damage(&mut rng),
        LayerMask(rng.gen_range(1..256)),
    );
    session.spawn_authoritative(id, SyncObject::Projectile(projectile))?;
    Ok(())
}

/// Tick at which observer `index` (0-based) joins.
fn join_tick(index: u32, observers: u32, ticks: u32) -> u32 {
    (index + 1) * ticks / (observers + 1)
}

pub fn run(cfg: &SyncConfig) -> Result<SyncReport> {
    let mut session = Session::new(cfg.item_registry()?).with_retry(cfg.retry);
    session.add_character(CASTER, caster());
    spawn_objects(&mut session, cfg).context("spawning authority objects")?;
    info!(seed = cfg.seed, observers = cfg.observers, "authority spawned objects");

    let mut sink = match &cfg.event_log {
        Some(path) => Some(JsonlSink::create(path).with_context(|| format!("creating {}", path.display()))?),
        None => None,
    };

    let mut next_observer = 0;
    for tick in 0..=cfg.ticks {
        while next_observer < cfg.observers && join_tick(next_observer, cfg.observers, cfg.ticks) <= tick {
            let endpoint = EndpointId(u64::from(next_observer) + 1);
            session.join(endpoint)?;
            info!(%endpoint, tick, "observer joined");
            next_observer += 1;
        }
        session.pump()?;
        for (endpoint, object) in session.advance(cfg.tick_seconds) {
            if let Some(sink) = sink.as_mut() {
                sink.write(&EventRecord {
                    endpoint,
                    kind: "Deactivated",
                    payload: &object.to_string(),
                })?;
            }
        }
    }
    session.pump()?;

    let report = session.report();
    if let Some(sink) = sink.as_mut() {
        for event in session.events() {
            sink.write_json(event)?;
        }
        report.write_jsonl(sink)?;
    }
    Ok(report)
}
