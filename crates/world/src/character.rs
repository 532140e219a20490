//! Characters, their inventories and the actions their items expose.
//!
//! Only as much of the character model as owner resolution and magic
//! action lookup need.

use spawnsync_core::NetworkObjectId;
use std::collections::BTreeMap;

/// A spell-like action. Particles bind to one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicAction {
    /// Action id, unique within its item.
    pub id: i32,
    /// Inventory slot of the item exposing this action.
    pub slot_id: i32,
    /// Effect the action produces.
    pub effect: String,
}

/// Any action an item can expose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemAction {
    /// Casts particles.
    Magic(MagicAction),
    /// Close-range attack.
    Melee {
        /// Action id.
        id: i32,
    },
    /// Fires projectiles.
    Shootable {
        /// Action id.
        id: i32,
    },
}

impl ItemAction {
    /// Action id.
    pub fn id(&self) -> i32 {
        match self {
            ItemAction::Magic(action) => action.id,
            ItemAction::Melee { id } | ItemAction::Shootable { id } => *id,
        }
    }

    /// The magic action, if this is one.
    pub fn as_magic(&self) -> Option<&MagicAction> {
        match self {
            ItemAction::Magic(action) => Some(action),
            _ => None,
        }
    }
}

/// An equipped item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterItem {
    /// Slot the item is equipped in.
    pub slot_id: i32,
    /// Actions the item exposes.
    pub actions: Vec<ItemAction>,
}

impl CharacterItem {
    /// Item in `slot_id` with `actions`.
    pub fn new(slot_id: i32, actions: Vec<ItemAction>) -> Self {
        Self { slot_id, actions }
    }

    /// Look up an action by id.
    pub fn action(&self, id: i32) -> Option<&ItemAction> {
        self.actions.iter().find(|action| action.id() == id)
    }
}

/// Active items by slot.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    active: BTreeMap<i32, CharacterItem>,
}

impl Inventory {
    /// Equip `item` in its slot, returning what was there.
    pub fn equip(&mut self, item: CharacterItem) -> Option<CharacterItem> {
        self.active.insert(item.slot_id, item)
    }

    /// Empty `slot`.
    pub fn unequip(&mut self, slot: i32) -> Option<CharacterItem> {
        self.active.remove(&slot)
    }

    /// Item active in `slot`.
    pub fn active_item(&self, slot: i32) -> Option<&CharacterItem> {
        self.active.get(&slot)
    }
}

/// A replicated character. Some characters carry no inventory.
#[derive(Debug, Clone, Default)]
pub struct Character {
    /// Inventory, if the character has one.
    pub inventory: Option<Inventory>,
}

impl Character {
    /// Character with an empty inventory.
    pub fn with_inventory() -> Self {
        Self {
            inventory: Some(Inventory::default()),
        }
    }
}

/// Characters currently present in the replicated world.
#[derive(Debug, Clone, Default)]
pub struct CharacterDirectory {
    characters: BTreeMap<NetworkObjectId, Character>,
}

impl CharacterDirectory {
    /// Add or replace a character.
    pub fn insert(&mut self, id: NetworkObjectId, character: Character) {
        self.characters.insert(id, character);
    }

    /// Remove a character (it despawned).
    pub fn remove(&mut self, id: NetworkObjectId) -> Option<Character> {
        self.characters.remove(&id)
    }

    /// Look up a character.
    pub fn get(&self, id: NetworkObjectId) -> Option<&Character> {
        self.characters.get(&id)
    }

    /// Mutable lookup.
    pub fn get_mut(&mut self, id: NetworkObjectId) -> Option<&mut Character> {
        self.characters.get_mut(&id)
    }

    /// Whether `id` resolves.
    pub fn contains(&self, id: NetworkObjectId) -> bool {
        self.characters.contains_key(&id)
    }
}
