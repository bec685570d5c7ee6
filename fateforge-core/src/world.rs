//! Core entity types for characters and NPCs.
//!
//! Everything here is a plain data object: resolved once by the builders
//! and the resolver, then mutated in place by gameplay systems. All types
//! serialize structurally so a whole character can be snapshotted with
//! serde without extra machinery.

use crate::items::EquipmentInstance;
use crate::spells::Spell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterId(pub Uuid);

impl CharacterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CharacterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for equipment instances.
///
/// Two copies of the "same" item by rules index are distinct instances;
/// equip, trade and drag-drop operations address items by this id, never by
/// index, so stacks of identical items stay individually equippable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Ability Scores
// ============================================================================

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    /// Dataset index ("str", "dex", ...).
    pub fn index(&self) -> &'static str {
        match self {
            Ability::Strength => "str",
            Ability::Dexterity => "dex",
            Ability::Constitution => "con",
            Ability::Intelligence => "int",
            Ability::Wisdom => "wis",
            Ability::Charisma => "cha",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Ability::Strength => "Strength",
            Ability::Dexterity => "Dexterity",
            Ability::Constitution => "Constitution",
            Ability::Intelligence => "Intelligence",
            Ability::Wisdom => "Wisdom",
            Ability::Charisma => "Charisma",
        }
    }

    /// Parse a dataset index.
    pub fn from_index(index: &str) -> Option<Ability> {
        match index {
            "str" => Some(Ability::Strength),
            "dex" => Some(Ability::Dexterity),
            "con" => Some(Ability::Constitution),
            "int" => Some(Ability::Intelligence),
            "wis" => Some(Ability::Wisdom),
            "cha" => Some(Ability::Charisma),
            _ => None,
        }
    }

    pub fn all() -> [Ability; 6] {
        [
            Ability::Strength,
            Ability::Dexterity,
            Ability::Constitution,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ]
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Ability scores container.
///
/// Modifiers are always derived from the scores on read — there is no
/// stored modifier to go stale after a racial bonus or level-up increase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: u8,
    pub dexterity: u8,
    pub constitution: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

impl AbilityScores {
    pub fn new(str: u8, dex: u8, con: u8, int: u8, wis: u8, cha: u8) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    /// Point-buy starting allocation: all scores at 8.
    pub fn point_buy_base() -> Self {
        Self::new(8, 8, 8, 8, 8, 8)
    }

    pub fn get(&self, ability: Ability) -> u8 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn set(&mut self, ability: Ability, value: u8) {
        match ability {
            Ability::Strength => self.strength = value,
            Ability::Dexterity => self.dexterity = value,
            Ability::Constitution => self.constitution = value,
            Ability::Intelligence => self.intelligence = value,
            Ability::Wisdom => self.wisdom = value,
            Ability::Charisma => self.charisma = value,
        }
    }

    /// Apply a bonus (racial, subracial, or level-up improvement).
    ///
    /// No bounds are enforced here; the builders enforce the 8–15 creation
    /// range and the 20 cap for improvements, since resolved characters may
    /// legitimately exceed 20 through magical effects.
    pub fn apply_bonus(&mut self, ability: Ability, delta: i8) {
        let value = (self.get(ability) as i16 + delta as i16).clamp(0, u8::MAX as i16);
        self.set(ability, value as u8);
    }

    pub fn modifier(&self, ability: Ability) -> i8 {
        let score = self.get(ability) as i8;
        // Floor division: 8-9 => -1, 10-11 => 0, 12-13 => +1, ...
        (score - 10).div_euclid(2)
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

// ============================================================================
// Proficiencies
// ============================================================================

/// Broad proficiency groupings as named by the dataset's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProficiencyKind {
    Skill,
    Armor,
    Weapon,
    Tools,
    Music,
    Gaming,
    Vehicle,
    SavingThrow,
    Other,
}

impl ProficiencyKind {
    /// Map a dataset `type` string; unknown types fall back to `Other`.
    pub fn from_type_name(name: &str) -> ProficiencyKind {
        match name {
            "Skills" => ProficiencyKind::Skill,
            "Armor" => ProficiencyKind::Armor,
            "Weapons" => ProficiencyKind::Weapon,
            "Artisan's Tools" => ProficiencyKind::Tools,
            "Musical Instruments" => ProficiencyKind::Music,
            "Gaming Sets" => ProficiencyKind::Gaming,
            "Vehicles" => ProficiencyKind::Vehicle,
            "Saving Throws" => ProficiencyKind::SavingThrow,
            _ => ProficiencyKind::Other,
        }
    }
}

/// What a proficiency points back at, when its record carries a reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProficiencyRef {
    /// Saving-throw proficiencies reference an ability score.
    Ability(Ability),
    /// Skills, weapons and tools reference another record by index.
    Record(String),
}

/// A granted competency (skill, tool, weapon category, saving throw).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proficiency {
    pub index: String,
    pub name: String,
    pub kind: ProficiencyKind,
    pub reference: Option<ProficiencyRef>,
}

// ============================================================================
// Spellcasting
// ============================================================================

/// Spell slot tracking, one entry per slot level 1-9.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellSlots {
    pub slots: [SlotInfo; 9],
}

impl SpellSlots {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| SlotInfo { total: 0, used: 0 }),
        }
    }

    /// Overwrite slot totals from a level table, clamping used counts so a
    /// mid-day level-up never shows more used slots than exist.
    pub fn set_totals(&mut self, totals: [u8; 9]) {
        for (slot, total) in self.slots.iter_mut().zip(totals) {
            slot.total = total;
            slot.used = slot.used.min(total);
        }
    }

    pub fn use_slot(&mut self, level: u8) -> bool {
        if (1..=9).contains(&level) {
            let slot = &mut self.slots[level as usize - 1];
            if slot.available() > 0 {
                slot.used += 1;
                return true;
            }
        }
        false
    }

    pub fn recover_all(&mut self) {
        for slot in &mut self.slots {
            slot.used = 0;
        }
    }
}

impl Default for SpellSlots {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    pub total: u8,
    pub used: u8,
}

impl SlotInfo {
    pub fn available(&self) -> u8 {
        self.total.saturating_sub(self.used)
    }
}

/// Spellcasting state for caster classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spellcasting {
    /// The class's spellcasting ability.
    pub ability: Ability,
    /// Spell save DC: 8 + proficiency bonus + spellcasting ability modifier.
    pub save_dc: u8,
    pub learned_spells: Vec<Spell>,
    /// Subset of `learned_spells`; preparing an unknown spell learns it.
    pub prepared_spells: Vec<Spell>,
    pub slots: SpellSlots,
}

impl Spellcasting {
    pub fn new(ability: Ability) -> Self {
        Self {
            ability,
            save_dc: 8,
            learned_spells: Vec::new(),
            prepared_spells: Vec::new(),
            slots: SpellSlots::new(),
        }
    }

    pub fn knows_spell(&self, index: &str) -> bool {
        self.learned_spells.iter().any(|s| s.index == index)
    }

    pub fn is_prepared(&self, index: &str) -> bool {
        self.prepared_spells.iter().any(|s| s.index == index)
    }

    /// Recompute the save DC after ability or level changes.
    pub fn recompute_save_dc(&mut self, abilities: &AbilityScores, proficiency_bonus: i8) {
        let ability_mod = abilities.modifier(self.ability);
        self.save_dc = (8 + proficiency_bonus + ability_mod).max(0) as u8;
    }
}

// ============================================================================
// Race / Class references
// ============================================================================

/// A resolved reference to a rules record (race, subrace, background, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTag {
    pub index: String,
    pub name: String,
}

impl RecordTag {
    pub fn new(index: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            name: name.into(),
        }
    }
}

/// The character's class, with the bits of the class record the engine
/// needs after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub index: String,
    pub name: String,
    pub hit_die: u8,
    pub spellcasting_ability: Option<Ability>,
}

// ============================================================================
// Character
// ============================================================================

/// Which hand an item is equipped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hand {
    Left,
    Right,
}

/// A fully resolved character.
///
/// Created once from a finished [`crate::character_builder::CharacterBuild`],
/// then mutated in place by [`crate::level_up::LevelUpBuild::apply`] — never
/// rebuilt from scratch on level-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub gender: Option<String>,
    pub age: Option<u32>,
    pub weight: Option<u32>,
    pub alignment: Option<String>,

    pub race: RecordTag,
    pub subrace: Option<RecordTag>,
    pub class: ClassInfo,
    pub subclass: Option<RecordTag>,
    pub background: Option<RecordTag>,

    pub level: u8,
    pub xp: i64,
    pub abilities: AbilityScores,

    pub hit_points: i32,
    pub max_hit_points: i32,
    pub speed: u32,

    /// Unordered, unlimited-capacity inventory. Slots are a display concept
    /// of the UI, not a capacity constraint.
    pub inventory: Vec<EquipmentInstance>,
    /// Wealth in copper pieces.
    pub coins: i64,

    pub proficiencies: Vec<Proficiency>,
    /// Feature indices; a parent feature is replaced by its chosen
    /// subfeature once resolved, never both present.
    pub features: Vec<String>,
    pub spellcasting: Option<Spellcasting>,

    // Racial trait-derived sets.
    pub damage_vulnerabilities: Vec<String>,
    pub damage_resistances: Vec<String>,
    pub damage_immunities: Vec<String>,
    pub condition_advantages: Vec<String>,
    pub condition_immunities: Vec<String>,
    pub senses: BTreeMap<String, Value>,

    /// Open-ended per-class extras from the level tables (action surges,
    /// rage count, ...). The schema belongs to the dataset, not the code.
    pub class_specific: BTreeMap<String, Value>,
}

impl Character {
    pub fn new(name: impl Into<String>, race: RecordTag, class: ClassInfo) -> Self {
        Self {
            id: CharacterId::new(),
            name: name.into(),
            gender: None,
            age: None,
            weight: None,
            alignment: None,
            race,
            subrace: None,
            class,
            subclass: None,
            background: None,
            level: 1,
            xp: 0,
            abilities: AbilityScores::default(),
            hit_points: 0,
            max_hit_points: 0,
            speed: 30,
            inventory: Vec::new(),
            coins: 0,
            proficiencies: Vec::new(),
            features: Vec::new(),
            spellcasting: None,
            damage_vulnerabilities: Vec::new(),
            damage_resistances: Vec::new(),
            damage_immunities: Vec::new(),
            condition_advantages: Vec::new(),
            condition_immunities: Vec::new(),
            senses: BTreeMap::new(),
            class_specific: BTreeMap::new(),
        }
    }

    pub fn proficiency_bonus(&self) -> i8 {
        match self.level {
            0..=4 => 2,
            5..=8 => 3,
            9..=12 => 4,
            13..=16 => 5,
            _ => 6,
        }
    }

    pub fn is_spellcaster(&self) -> bool {
        self.spellcasting.is_some()
    }

    pub fn has_feature(&self, index: &str) -> bool {
        self.features.iter().any(|f| f == index)
    }

    /// Add an item; the inventory has no capacity limit.
    pub fn add_item(&mut self, item: EquipmentInstance) {
        self.inventory.push(item);
    }

    /// Remove an item by instance identity, e.g. when trading it away.
    pub fn take_item(&mut self, id: ItemId) -> Option<EquipmentInstance> {
        let pos = self.inventory.iter().position(|i| i.id == id)?;
        Some(self.inventory.remove(pos))
    }

    pub fn item(&self, id: ItemId) -> Option<&EquipmentInstance> {
        self.inventory.iter().find(|i| i.id == id)
    }

    /// Equip an item in a hand, displacing whatever held that hand.
    /// Returns false if the id is not in the inventory.
    pub fn equip_in_hand(&mut self, id: ItemId, hand: Hand) -> bool {
        let Some(pos) = self.inventory.iter().position(|i| i.id == id) else {
            return false;
        };
        for item in &mut self.inventory {
            let holds_hand = match hand {
                Hand::Left => item.equipped_left_hand,
                Hand::Right => item.equipped_right_hand,
            };
            if holds_hand {
                item.unequip();
            }
        }
        let item = &mut self.inventory[pos];
        item.equipped = true;
        match hand {
            Hand::Left => item.equipped_left_hand = true,
            Hand::Right => item.equipped_right_hand = true,
        }
        true
    }

    /// Equip an item in a body slot, displacing the slot's occupant.
    pub fn equip_in_slot(&mut self, id: ItemId, slot: &str) -> bool {
        let Some(pos) = self.inventory.iter().position(|i| i.id == id) else {
            return false;
        };
        for item in &mut self.inventory {
            if item.equipped_slot.as_deref() == Some(slot) {
                item.unequip();
            }
        }
        let item = &mut self.inventory[pos];
        item.equipped = true;
        item.equipped_slot = Some(slot.to_string());
        true
    }

    pub fn unequip(&mut self, id: ItemId) -> bool {
        match self.inventory.iter_mut().find(|i| i.id == id) {
            Some(item) => {
                item.unequip();
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for Character {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let race = self.subrace.as_ref().unwrap_or(&self.race);
        write!(
            f,
            "{} (Level {} {} {}, HP {}/{})",
            self.name, self.level, race.name, self.class.name, self.hit_points, self.max_hit_points
        )
    }
}

// ============================================================================
// NPCs
// ============================================================================

/// Occupations NPCs can hold in the world.
pub const NPC_ROLES: &[&str] = &[
    "merchant",
    "guard",
    "alchemist",
    "priest",
    "doctor",
    "farmer",
    "fisher",
    "hunter",
    "miner",
    "blacksmith",
    "tailor",
    "woodworker",
    "innkeeper",
    "waiter",
    "cook",
    "baker",
    "butcher",
    "jeweler",
    "banker",
    "weapon_merchant",
    "armor_merchant",
    "general_merchant",
    "supply_merchant",
    "food_merchant",
    "magic_items_merchant",
];

/// A non-player character: a resolved character plus world bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Npc {
    pub character: Character,
    pub role: String,
    pub description: String,
    pub location: Option<String>,
    pub quests: Vec<String>,
}

impl Npc {
    pub fn new(character: Character, role: impl Into<String>) -> Self {
        Self {
            character,
            role: role.into(),
            description: String::new(),
            location: None,
            quests: Vec::new(),
        }
    }
}

/// Pick a random role from [`NPC_ROLES`].
pub fn random_role(rng: &mut impl rand::Rng) -> &'static str {
    use rand::seq::SliceRandom;
    NPC_ROLES.choose(rng).copied().unwrap_or("merchant")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::EquipmentInstance;

    #[test]
    fn test_modifier_math() {
        let scores = AbilityScores::new(3, 8, 10, 11, 15, 20);
        assert_eq!(scores.modifier(Ability::Strength), -4);
        assert_eq!(scores.modifier(Ability::Dexterity), -1);
        assert_eq!(scores.modifier(Ability::Constitution), 0);
        assert_eq!(scores.modifier(Ability::Intelligence), 0);
        assert_eq!(scores.modifier(Ability::Wisdom), 2);
        assert_eq!(scores.modifier(Ability::Charisma), 5);
    }

    #[test]
    fn test_modifiers_track_mutations() {
        let mut scores = AbilityScores::default();
        assert_eq!(scores.modifier(Ability::Dexterity), 0);

        scores.apply_bonus(Ability::Dexterity, 2);
        assert_eq!(scores.modifier(Ability::Dexterity), 1);

        scores.set(Ability::Dexterity, 8);
        assert_eq!(scores.modifier(Ability::Dexterity), -1);
    }

    #[test]
    fn test_ability_index_round_trip() {
        for ability in Ability::all() {
            assert_eq!(Ability::from_index(ability.index()), Some(ability));
        }
        assert_eq!(Ability::from_index("luck"), None);
    }

    #[test]
    fn test_spell_slots_set_totals_clamps_used() {
        let mut slots = SpellSlots::new();
        slots.set_totals([3, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(slots.use_slot(1));
        assert!(slots.use_slot(1));
        slots.set_totals([1, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(slots.slots[0].used, 1);
        assert_eq!(slots.slots[0].available(), 0);
    }

    #[test]
    fn test_proficiency_bonus_by_level() {
        let race = RecordTag::new("human", "Human");
        let class = ClassInfo {
            index: "fighter".to_string(),
            name: "Fighter".to_string(),
            hit_die: 10,
            spellcasting_ability: None,
        };
        let mut character = Character::new("Bron", race, class);
        assert_eq!(character.proficiency_bonus(), 2);
        character.level = 5;
        assert_eq!(character.proficiency_bonus(), 3);
        character.level = 17;
        assert_eq!(character.proficiency_bonus(), 6);
    }

    fn test_character() -> Character {
        Character::new(
            "Test",
            RecordTag::new("human", "Human"),
            ClassInfo {
                index: "fighter".to_string(),
                name: "Fighter".to_string(),
                hit_die: 10,
                spellcasting_ability: None,
            },
        )
    }

    #[test]
    fn test_equip_addresses_instances_not_indices() {
        let mut character = test_character();
        let first = EquipmentInstance::stub("dagger", "Dagger");
        let second = EquipmentInstance::stub("dagger", "Dagger");
        let first_id = first.id;
        let second_id = second.id;
        character.add_item(first);
        character.add_item(second);

        assert!(character.equip_in_hand(first_id, Hand::Right));
        assert!(character.item(first_id).unwrap().equipped);
        assert!(!character.item(second_id).unwrap().equipped);

        // Equipping the second copy displaces the first from that hand.
        assert!(character.equip_in_hand(second_id, Hand::Right));
        assert!(!character.item(first_id).unwrap().equipped);
        assert!(character.item(second_id).unwrap().equipped_right_hand);
    }

    #[test]
    fn test_equip_in_slot_displaces_occupant() {
        let mut character = test_character();
        let helmet = EquipmentInstance::stub("helmet", "Helmet");
        let hood = EquipmentInstance::stub("hood", "Hood");
        let helmet_id = helmet.id;
        let hood_id = hood.id;
        character.add_item(helmet);
        character.add_item(hood);

        assert!(character.equip_in_slot(helmet_id, "head"));
        assert!(character.equip_in_slot(hood_id, "head"));
        assert!(!character.item(helmet_id).unwrap().equipped);
        assert_eq!(
            character.item(hood_id).unwrap().equipped_slot.as_deref(),
            Some("head")
        );
    }

    #[test]
    fn test_take_item_by_identity() {
        let mut character = test_character();
        let a = EquipmentInstance::stub("ration", "Ration");
        let b = EquipmentInstance::stub("ration", "Ration");
        let a_id = a.id;
        character.add_item(a);
        character.add_item(b);

        let taken = character.take_item(a_id).expect("item present");
        assert_eq!(taken.id, a_id);
        assert_eq!(character.inventory.len(), 1);
        assert!(character.take_item(a_id).is_none());
    }
}
