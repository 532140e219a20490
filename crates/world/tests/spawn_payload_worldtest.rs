//! Worldtest: spawn payloads and catch-up records between two worlds
//!
//! Validates:
//! - Spawn payloads carry index, position and the record for every kind
//! - Observers end up with the authority's state after one apply
//! - Scheduled grenade deactivation fires at the transmitted countdown

use spawnsync_core::{ItemDefinition, ItemTypeId, ItemTypeRegistry, LayerMask, NetworkObjectId, Quat, RegistryKey, Vec3};
use spawnsync_net::{PayloadCapability, PayloadKind, PickupEntry, SpawnHeader, SyncRecord};
use spawnsync_world::{
    Character, CharacterItem, ImpactDamageData, ItemAction, MagicAction, SimWorld, SyncObject,
};

fn registry() -> ItemTypeRegistry {
    ItemTypeRegistry::new(vec![
        ItemDefinition {
            id: ItemTypeId(1),
            key: RegistryKey::parse("arrow").expect("key"),
            max_stack: 64,
        },
        ItemDefinition {
            id: ItemTypeId(2),
            key: RegistryKey::parse("mana_potion").expect("key"),
            max_stack: 16,
        },
    ])
    .expect("registry")
}

fn caster() -> Character {
    let mut character = Character::with_inventory();
    if let Some(inventory) = character.inventory.as_mut() {
        inventory.equip(CharacterItem::new(
            0,
            vec![ItemAction::Magic(MagicAction {
                id: 1,
                slot_id: 0,
                effect: "frost".into(),
            })],
        ));
    }
    character
}

fn world() -> SimWorld {
    let mut world = SimWorld::new(registry());
    world.context.characters.insert(NetworkObjectId(100), caster());
    world
}

/// Populate the authority with one object of every kind.
fn authority() -> SimWorld {
    let mut world = world();
    let owner = Some(NetworkObjectId(100));
    let mut damage = ImpactDamageData::default();
    damage.assign(25.0, 8.0, 2, "Stagger", 1.0);

    let mut grenade = spawnsync_world::Grenade::new(NetworkObjectId(1));
    grenade.launch(5, owner, Vec3::new(0.0, 3.0, 7.0), Vec3::X, &damage, LayerMask::EVERYTHING);
    grenade.schedule_deactivation(3.5, &mut world.context);
    world.spawn(NetworkObjectId(1), SyncObject::Grenade(grenade));

    let mut pickup = spawnsync_world::ItemPickup::with_trajectory();
    pickup
        .drop_items(
            Quat::from_rotation_z(0.5),
            &[
                PickupEntry {
                    item_id: ItemTypeId(1),
                    amount: 12,
                },
                PickupEntry {
                    item_id: ItemTypeId(2),
                    amount: 3,
                },
            ],
            &mut world.context,
        )
        .expect("drop items");
    pickup.throw(Vec3::Y, Vec3::ZERO, owner);
    world.spawn(NetworkObjectId(2), SyncObject::ItemPickup(pickup));

    let mut particle = spawnsync_world::MagicParticle::new();
    particle.instantiate(
        owner,
        MagicAction {
            id: 1,
            slot_id: 0,
            effect: "frost".into(),
        },
        0,
        44,
    );
    world.spawn(NetworkObjectId(3), SyncObject::MagicParticle(particle));

    let mut projectile = spawnsync_world::Projectile::new();
    projectile.launch(9, owner, Vec3::new(0.0, 0.0, 80.0), Vec3::ZERO, &damage, LayerMask(1));
    world.spawn(NetworkObjectId(4), SyncObject::Projectile(projectile));

    world
}

fn kind_of(id: u64) -> PayloadKind {
    match id {
        1 => PayloadKind::Grenade,
        2 => PayloadKind::ItemPickup,
        3 => PayloadKind::MagicParticle,
        _ => PayloadKind::Projectile,
    }
}

fn record(world: &SimWorld, id: NetworkObjectId) -> SyncRecord {
    world
        .objects
        .get(id)
        .expect("object")
        .capability()
        .produce(&world.context)
}

#[test]
fn spawn_payloads_initialize_every_kind() {
    let source = authority();
    let mut observer = world();

    for raw in 1..=4u64 {
        let id = NetworkObjectId(raw);
        let capability = source.objects.get(id).expect("object").capability();
        let header = SpawnHeader {
            index: raw as i32,
            position: Vec3::new(raw as f32, 0.0, 0.0),
        };
        let bytes = capability
            .write_spawn_payload(header, &source.context)
            .expect("spawn payload");
        assert!(bytes.len() <= capability.spawn_payload_size());

        let kind = kind_of(raw);
        let mut blank = SyncObject::blank(kind, id);
        let decoded = blank
            .capability_mut()
            .read_spawn_payload(&bytes, &mut observer.context)
            .expect("apply spawn payload");
        assert_eq!(decoded, header);
        observer.spawn(id, blank);

        assert_eq!(record(&observer, id), record(&source, id), "{kind} diverged");
    }
}

#[test]
fn grenade_deactivates_after_transmitted_countdown() {
    let source = authority();
    let bytes = source
        .objects
        .get(NetworkObjectId(1))
        .expect("grenade")
        .capability()
        .encode_payload(&source.context)
        .expect("encode");

    let mut observer = world();
    let mut grenade = SyncObject::blank(PayloadKind::Grenade, NetworkObjectId(1));
    grenade
        .capability_mut()
        .apply_payload(&bytes, &mut observer.context)
        .expect("apply");
    observer.spawn(NetworkObjectId(1), grenade);

    assert!(observer.advance(3.0).is_empty());
    assert!(observer.advance(0.25).is_empty());
    assert_eq!(observer.advance(0.25), vec![NetworkObjectId(1)]);
}

#[test]
fn unscheduled_grenade_never_deactivates() {
    let mut source = authority();
    if let Some(SyncObject::Grenade(grenade)) = source.objects.get_mut(NetworkObjectId(1)) {
        grenade.cancel_deactivation(&mut source.context);
    }
    let bytes = source
        .objects
        .get(NetworkObjectId(1))
        .expect("grenade")
        .capability()
        .encode_payload(&source.context)
        .expect("encode");

    let mut observer = world();
    let mut grenade = SyncObject::blank(PayloadKind::Grenade, NetworkObjectId(1));
    grenade
        .capability_mut()
        .apply_payload(&bytes, &mut observer.context)
        .expect("apply");
    observer.spawn(NetworkObjectId(1), grenade);

    assert!(observer.advance(1000.0).is_empty());
    assert_eq!(observer.context.scheduler.pending_count(), 0);
}

#[test]
fn particle_with_empty_slot_stays_uninitialized() {
    let source = authority();
    let bytes = source
        .objects
        .get(NetworkObjectId(3))
        .expect("particle")
        .capability()
        .encode_payload(&source.context)
        .expect("encode");

    let mut observer = world();
    if let Some(inventory) = observer
        .context
        .characters
        .get_mut(NetworkObjectId(100))
        .and_then(|c| c.inventory.as_mut())
    {
        inventory.unequip(0);
    }
    let mut particle = spawnsync_world::MagicParticle::new();
    assert!(particle.apply_payload(&bytes, &mut observer.context).is_err());
    assert!(particle.binding().is_none());
}
