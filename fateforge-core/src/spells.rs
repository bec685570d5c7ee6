//! Spell value objects parsed from rules records.

use crate::rules::{RecordRef, RulesRepository};
use crate::world::Ability;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::debug;

/// Schools of magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpellSchool {
    Abjuration,
    Conjuration,
    Divination,
    Enchantment,
    Evocation,
    Illusion,
    Necromancy,
    Transmutation,
}

impl SpellSchool {
    pub fn from_index(index: &str) -> Option<SpellSchool> {
        match index {
            "abjuration" => Some(SpellSchool::Abjuration),
            "conjuration" => Some(SpellSchool::Conjuration),
            "divination" => Some(SpellSchool::Divination),
            "enchantment" => Some(SpellSchool::Enchantment),
            "evocation" => Some(SpellSchool::Evocation),
            "illusion" => Some(SpellSchool::Illusion),
            "necromancy" => Some(SpellSchool::Necromancy),
            "transmutation" => Some(SpellSchool::Transmutation),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SpellSchool::Abjuration => "Abjuration",
            SpellSchool::Conjuration => "Conjuration",
            SpellSchool::Divination => "Divination",
            SpellSchool::Enchantment => "Enchantment",
            SpellSchool::Evocation => "Evocation",
            SpellSchool::Illusion => "Illusion",
            SpellSchool::Necromancy => "Necromancy",
            SpellSchool::Transmutation => "Transmutation",
        }
    }
}

/// Shape of a spell's area of effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AoeShape {
    Sphere,
    Cone,
    Cube,
    Line,
    Cylinder,
}

impl AoeShape {
    pub fn from_index(index: &str) -> Option<AoeShape> {
        match index {
            "sphere" => Some(AoeShape::Sphere),
            "cone" => Some(AoeShape::Cone),
            "cube" => Some(AoeShape::Cube),
            "line" => Some(AoeShape::Line),
            "cylinder" => Some(AoeShape::Cylinder),
            _ => None,
        }
    }
}

/// Area a spell covers, in feet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaOfEffect {
    pub shape: AoeShape,
    pub size: u32,
}

/// A damage type reference resolved from the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageTypeRef {
    pub index: String,
    pub name: String,
    pub desc: String,
}

/// A spell, parsed once from its rules record into a plain value object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spell {
    pub index: String,
    pub name: String,
    pub desc: String,
    /// 0 for cantrips, 1-9 otherwise.
    pub level: u8,
    /// Class indices allowed to learn this spell.
    pub classes: Vec<String>,
    pub school: SpellSchool,
    pub range_feet: u32,
    pub area_of_effect: AreaOfEffect,
    pub damage_type: Option<DamageTypeRef>,
    /// Slot level -> damage dice, for spells that scale with the slot.
    pub damage_at_slot_level: Option<BTreeMap<String, String>>,
    /// Character level -> damage dice, for scaling cantrips.
    pub damage_at_character_level: Option<BTreeMap<String, String>>,
    /// Slot level -> healing dice.
    pub heal_at_slot_level: Option<BTreeMap<String, String>>,
    /// Saving-throw ability, for spells that allow a save.
    pub dc_ability: Option<Ability>,
    /// What a successful save does ("none", "half", ...).
    pub dc_success: Option<String>,
}

impl Spell {
    pub fn is_cantrip(&self) -> bool {
        self.level == 0
    }

    /// Build a spell from its rules record.
    ///
    /// Parsing is lenient: missing fields fall back to defaults, and the
    /// damage-type cross-reference degrades to an undescribed stub when its
    /// record is missing, so one broken entry never takes the spell down.
    pub fn from_record(record: &Value, repo: &RulesRepository) -> Spell {
        let desc = match record.get("desc") {
            Some(Value::Array(lines)) => lines
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" "),
            Some(Value::String(text)) => text.clone(),
            _ => String::new(),
        };

        let classes = record
            .get("classes")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|c| c.get("index").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let school = record
            .get("school")
            .and_then(|s| s.get("index"))
            .and_then(Value::as_str)
            .and_then(SpellSchool::from_index)
            .unwrap_or(SpellSchool::Evocation);

        let range_feet = parse_range_feet(
            record.get("range").and_then(Value::as_str).unwrap_or("Self"),
        );

        let area_of_effect = match record.get("area_of_effect") {
            Some(aoe) => AreaOfEffect {
                shape: aoe
                    .get("type")
                    .and_then(Value::as_str)
                    .and_then(AoeShape::from_index)
                    .unwrap_or(AoeShape::Sphere),
                size: aoe.get("size").and_then(Value::as_u64).unwrap_or(range_feet as u64) as u32,
            },
            None => AreaOfEffect {
                shape: AoeShape::Sphere,
                size: range_feet,
            },
        };

        let mut damage_type = None;
        let mut damage_at_slot_level = None;
        let mut damage_at_character_level = None;
        if let Some(damage) = record.get("damage") {
            damage_type = damage
                .get("damage_type")
                .and_then(|field| resolve_damage_type(repo, field));
            damage_at_slot_level = dice_table(damage.get("damage_at_slot_level"));
            damage_at_character_level = dice_table(damage.get("damage_at_character_level"));
        }

        let heal_at_slot_level = dice_table(record.get("heal_at_slot_level"));

        let (dc_ability, dc_success) = match record.get("dc") {
            Some(dc) => (
                dc.get("dc_type")
                    .and_then(|t| t.get("index"))
                    .and_then(Value::as_str)
                    .and_then(Ability::from_index),
                dc.get("dc_success")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            ),
            None => (None, None),
        };

        Spell {
            index: record
                .get("index")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            name: record
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            desc,
            level: record.get("level").and_then(Value::as_u64).unwrap_or(0) as u8,
            classes,
            school,
            range_feet,
            area_of_effect,
            damage_type,
            damage_at_slot_level,
            damage_at_character_level,
            heal_at_slot_level,
            dc_ability,
            dc_success,
        }
    }
}

/// Parse the dataset's textual range ("120 feet", "Self", "Touch").
fn parse_range_feet(range: &str) -> u32 {
    if range.to_lowercase().contains("feet") {
        range
            .split_whitespace()
            .next()
            .and_then(|n| n.parse().ok())
            .unwrap_or(5)
    } else {
        5
    }
}

/// A `{ "2": "2d8", ... }` scaling table, kept as-is.
fn dice_table(field: Option<&Value>) -> Option<BTreeMap<String, String>> {
    let map = field?.as_object()?;
    Some(
        map.iter()
            .filter_map(|(k, v)| v.as_str().map(|dice| (k.clone(), dice.to_string())))
            .collect(),
    )
}

/// Resolve a spell's damage-type field. The dataset writes it either as a
/// pointer stub or an embedded document; a missing target degrades to the
/// stub's own index and name.
fn resolve_damage_type(repo: &RulesRepository, field: &Value) -> Option<DamageTypeRef> {
    let record = match RecordRef::classify(Some(field)).resolve(repo) {
        Ok(Some(record)) => record,
        Ok(None) => return None,
        Err(err) => {
            let index = field.get("index").and_then(Value::as_str).unwrap_or("");
            debug!(index, %err, "damage type record missing, using stub");
            Rc::new(field.clone())
        }
    };
    let index = record
        .get("index")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if index.is_empty() {
        return None;
    }
    let name = record
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(&index)
        .to_string();
    let desc = match record.get("desc") {
        Some(Value::Array(lines)) => lines
            .first()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Some(Value::String(text)) => text.clone(),
        _ => String::new(),
    };
    Some(DamageTypeRef { index, name, desc })
}
