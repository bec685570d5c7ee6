//! Equipment instances and coinage.
//!
//! An [`EquipmentInstance`] is a value-object copy of a rules equipment
//! record plus per-instance equip state. Two copies of the same dagger are
//! distinct instances: equality is identity ([`ItemId`]), never the rules
//! index, so stacks of identical items stay individually equippable and
//! tradeable.

use crate::world::ItemId;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

lazy_static! {
    /// Copper value of each coin denomination.
    static ref COIN_VALUES: HashMap<&'static str, i64> = {
        let mut map = HashMap::new();
        map.insert("cp", 1);
        map.insert("sp", 10);
        map.insert("ep", 50);
        map.insert("gp", 100);
        map.insert("pp", 1000);
        map
    };
}

/// Convert an amount in some denomination to copper pieces.
/// Returns `None` for unknown units.
pub fn copper_value(amount: i64, unit: &str) -> Option<i64> {
    COIN_VALUES.get(unit).map(|rate| amount * rate)
}

/// Parse a textual amount like `"10 gp"` into copper pieces.
pub fn parse_coins(text: &str) -> Option<i64> {
    let mut parts = text.split_whitespace();
    let amount: i64 = parts.next()?.parse().ok()?;
    let unit = parts.next()?;
    copper_value(amount, unit)
}

/// An item's listed price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Cost {
    pub quantity: i64,
    pub unit: String,
}

impl Cost {
    /// The price in copper pieces; `None` when the unit is unknown.
    pub fn to_copper(&self) -> Option<i64> {
        copper_value(self.quantity, &self.unit)
    }
}

/// The dataset category an item belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EquipmentCategory {
    pub index: String,
    pub name: String,
}

/// One concrete item in a character's or NPC's possession.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentInstance {
    pub id: ItemId,
    pub index: String,
    pub name: String,
    pub cost: Cost,
    pub weight: f32,
    pub desc: Vec<String>,
    pub category: EquipmentCategory,

    // Equip state. `equipped` is true whenever the item occupies a hand or
    // body slot; the slot key is display-oriented (head, body, cloak, ...).
    pub equipped: bool,
    pub equipped_left_hand: bool,
    pub equipped_right_hand: bool,
    pub equipped_slot: Option<String>,

    /// Base AC when the category is armor.
    pub armor_class_base: Option<i64>,
    /// Damage dice when the category is weapon, e.g. "1d6".
    pub damage_dice: Option<String>,
}

impl PartialEq for EquipmentInstance {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EquipmentInstance {}

impl std::hash::Hash for EquipmentInstance {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl EquipmentInstance {
    /// Instantiate a fresh item from an equipment record.
    ///
    /// Every call mints a new [`ItemId`], so instantiating the same record
    /// twice produces two independent items.
    pub fn from_record(record: &Value) -> EquipmentInstance {
        let category = record
            .get("equipment_category")
            .map(|c| EquipmentCategory {
                index: c
                    .get("index")
                    .and_then(Value::as_str)
                    .unwrap_or("adventuring-gear")
                    .to_string(),
                name: c
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("Adventuring Gear")
                    .to_string(),
            })
            .unwrap_or_else(|| EquipmentCategory {
                index: "adventuring-gear".to_string(),
                name: "Adventuring Gear".to_string(),
            });

        let cost = record
            .get("cost")
            .map(|c| Cost {
                quantity: c.get("quantity").and_then(Value::as_i64).unwrap_or(0),
                unit: c
                    .get("unit")
                    .and_then(Value::as_str)
                    .unwrap_or("gp")
                    .to_string(),
            })
            .unwrap_or_default();

        let desc = match record.get("desc") {
            Some(Value::Array(lines)) => lines
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(text)) => vec![text.clone()],
            _ => Vec::new(),
        };

        // Armor class and damage dice only make sense for their categories;
        // the dataset sometimes writes armor_class as a bare integer.
        let armor_class_base = match record.get("armor_class") {
            Some(Value::Object(ac)) => ac.get("base").and_then(Value::as_i64),
            Some(Value::Number(n)) => n.as_i64(),
            _ => None,
        };
        let damage_dice = record
            .get("damage")
            .and_then(|d| d.get("damage_dice"))
            .and_then(Value::as_str)
            .map(str::to_string);

        EquipmentInstance {
            id: ItemId::new(),
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
            cost,
            weight: record.get("weight").and_then(Value::as_f64).unwrap_or(0.0) as f32,
            desc,
            category,
            equipped: false,
            equipped_left_hand: false,
            equipped_right_hand: false,
            equipped_slot: None,
            armor_class_base,
            damage_dice,
        }
    }

    /// Clear all equip state.
    pub fn unequip(&mut self) {
        self.equipped = false;
        self.equipped_left_hand = false;
        self.equipped_right_hand = false;
        self.equipped_slot = None;
    }

    /// Minimal instance for tests.
    #[cfg(test)]
    pub(crate) fn stub(index: &str, name: &str) -> EquipmentInstance {
        EquipmentInstance::from_record(&serde_json::json!({
            "index": index,
            "name": name,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixtureDataset;

    #[test]
    fn test_coin_conversion_table() {
        assert_eq!(copper_value(1, "cp"), Some(1));
        assert_eq!(copper_value(3, "sp"), Some(30));
        assert_eq!(copper_value(2, "ep"), Some(100));
        assert_eq!(copper_value(10, "gp"), Some(1000));
        assert_eq!(copper_value(1, "pp"), Some(1000));
        assert_eq!(copper_value(1, "credits"), None);
    }

    #[test]
    fn test_parse_coins() {
        assert_eq!(parse_coins("10 gp"), Some(1000));
        assert_eq!(parse_coins("5 sp"), Some(50));
        assert_eq!(parse_coins("10"), None);
        assert_eq!(parse_coins("ten gp"), None);
    }

    #[test]
    fn test_from_record_weapon() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();

        let record = repo.get("equipment/dagger").expect("record");
        let dagger = EquipmentInstance::from_record(&record);
        assert_eq!(dagger.index, "dagger");
        assert_eq!(dagger.category.index, "weapon");
        assert_eq!(dagger.damage_dice.as_deref(), Some("1d4"));
        assert_eq!(dagger.cost.to_copper(), Some(200));
        assert!(!dagger.equipped);
    }

    #[test]
    fn test_from_record_armor() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();

        let record = repo.get("equipment/chain-mail").expect("record");
        let armor = EquipmentInstance::from_record(&record);
        assert_eq!(armor.category.index, "armor");
        assert_eq!(armor.armor_class_base, Some(16));
        assert!(armor.damage_dice.is_none());
    }

    #[test]
    fn test_instances_are_identity_equal() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();

        let record = repo.get("equipment/dagger").expect("record");
        let first = EquipmentInstance::from_record(&record);
        let second = EquipmentInstance::from_record(&record);
        assert_eq!(first.index, second.index);
        assert_ne!(first, second);
        assert_eq!(first, first.clone());
    }
}
