//! Test fixtures: a miniature ruleset on disk.
//!
//! [`FixtureDataset`] materializes a small but internally consistent slice
//! of the 5e dataset into a temp directory so tests exercise the real
//! repository I/O path, cache included. The data is shaped exactly like
//! the dnd5eapi 2014 dump; the numbers are chosen for test convenience,
//! not rules accuracy.

use crate::rules::RulesRepository;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;

/// A throwaway ruleset directory, deleted on drop.
pub struct FixtureDataset {
    dir: TempDir,
}

impl FixtureDataset {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create fixture dir");
        write_fixtures(dir.path());
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Open a repository over this dataset.
    pub fn repository(&self) -> RulesRepository {
        RulesRepository::new(self.dir.path())
    }
}

impl Default for FixtureDataset {
    fn default() -> Self {
        Self::new()
    }
}

fn write(root: &Path, path: &str, record: Value) {
    let file = root.join(format!("{path}.json"));
    if let Some(parent) = file.parent() {
        std::fs::create_dir_all(parent).expect("create fixture subdir");
    }
    std::fs::write(&file, record.to_string()).expect("write fixture record");
}

fn write_fixtures(root: &Path) {
    write_races(root);
    write_classes(root);
    write_features(root);
    write_spells(root);
    write_proficiencies(root);
    write_backgrounds(root);
    write_equipment(root);
    write_misc(root);
}

fn write_races(root: &Path) {
    write(
        root,
        "races/elf",
        json!({
            "index": "elf",
            "name": "Elf",
            "speed": 30,
            "ability_bonuses": [
                {"ability_score": {"index": "dex", "name": "DEX", "url": "/api/2014/ability-scores/dex"}, "bonus": 2}
            ],
            "condition_advantages": [{"index": "charmed", "name": "Charmed"}],
            "senses": {"darkvision": 60},
            "subraces": [
                {"index": "high-elf", "name": "High Elf", "url": "/api/2014/subraces/high-elf"}
            ]
        }),
    );
    write(
        root,
        "subraces/high-elf",
        json!({
            "index": "high-elf",
            "name": "High Elf",
            "race": {"index": "elf", "name": "Elf", "url": "/api/2014/races/elf"},
            "ability_bonuses": [
                {"ability_score": {"index": "wis", "name": "WIS", "url": "/api/2014/ability-scores/wis"}, "bonus": 1}
            ],
            "condition_advantages": ["charmed", {"index": "magical-sleep", "name": "Magical Sleep"}],
            "senses": {"darkvision": 120}
        }),
    );
    write(
        root,
        "races/human",
        json!({
            "index": "human",
            "name": "Human",
            "speed": 30,
            "ability_bonuses": [
                {"ability_score": {"index": "str"}, "bonus": 1},
                {"ability_score": {"index": "dex"}, "bonus": 1},
                {"ability_score": {"index": "con"}, "bonus": 1},
                {"ability_score": {"index": "int"}, "bonus": 1},
                {"ability_score": {"index": "wis"}, "bonus": 1},
                {"ability_score": {"index": "cha"}, "bonus": 1}
            ]
        }),
    );
    write(
        root,
        "races/dwarf",
        json!({
            "index": "dwarf",
            "name": "Dwarf",
            "speed": 25,
            "ability_bonuses": [
                {"ability_score": {"index": "con"}, "bonus": 2}
            ],
            "damage_resistances": ["poison"],
            "senses": {"darkvision": 60}
        }),
    );
}

fn write_classes(root: &Path) {
    write(
        root,
        "classes/wizard",
        json!({
            "index": "wizard",
            "name": "Wizard",
            "hit_die": 6,
            "spellcasting": {
                "level": 1,
                "spellcasting_ability": {"index": "int", "name": "INT", "url": "/api/2014/ability-scores/int"}
            },
            "proficiency_choices": [
                {
                    "choose": 2,
                    "type": "proficiencies",
                    "from": {
                        "option_set_type": "options_array",
                        "options": [
                            {"option_type": "reference", "item": {"index": "skill-arcana", "name": "Skill: Arcana"}},
                            {"option_type": "reference", "item": {"index": "skill-history", "name": "Skill: History"}},
                            {"option_type": "reference", "item": {"index": "skill-investigation", "name": "Skill: Investigation"}}
                        ]
                    }
                }
            ],
            "starting_equipment": [
                {"equipment": {"index": "spellbook", "name": "Spellbook"}, "quantity": 1},
                {"equipment": {"index": "explorers-pack", "name": "Explorer's Pack"}, "quantity": 1}
            ],
            "starting_equipment_options": [
                {
                    "choose": 1,
                    "from": {
                        "option_set_type": "options_array",
                        "options": [
                            {"option_type": "counted_reference", "count": 1, "of": {"index": "quarterstaff", "name": "Quarterstaff"}},
                            {"option_type": "counted_reference", "count": 1, "of": {"index": "dagger", "name": "Dagger"}},
                            {
                                "option_type": "choice",
                                "choice": {
                                    "type": "equipment",
                                    "choose": 1,
                                    "from": {
                                        "option_set_type": "equipment_category",
                                        "equipment_category": {"index": "simple-weapons", "name": "Simple Weapons"}
                                    }
                                }
                            }
                        ]
                    }
                }
            ]
        }),
    );
    write(
        root,
        "classes/wizard/levels/1",
        json!({
            "index": "wizard-1",
            "level": 1,
            "ability_score_bonuses": 0,
            "prof_bonus": 2,
            "features": [
                {"index": "spellcasting-wizard", "name": "Spellcasting"},
                {"index": "arcane-recovery", "name": "Arcane Recovery"}
            ],
            "spellcasting": {
                "cantrips_known": 3,
                "spells_known": 6,
                "spell_slots_level_1": 2,
                "spell_slots_level_2": 0
            },
            "class_specific": {"arcane_recovery_levels": 1},
            "class": {"index": "wizard", "name": "Wizard", "url": "/api/2014/classes/wizard"}
        }),
    );
    write(
        root,
        "classes/wizard/levels/2",
        json!({
            "index": "wizard-2",
            "level": 2,
            "ability_score_bonuses": 0,
            "prof_bonus": 2,
            "features": [{"index": "arcane-tradition", "name": "Arcane Tradition"}],
            "spellcasting": {
                "cantrips_known": 3,
                "spells_known": 8,
                "spell_slots_level_1": 3,
                "spell_slots_level_2": 0
            },
            "class_specific": {"arcane_recovery_levels": 1},
            "class": {"index": "wizard", "name": "Wizard", "url": "/api/2014/classes/wizard"}
        }),
    );
    write(
        root,
        "classes/fighter",
        json!({
            "index": "fighter",
            "name": "Fighter",
            "hit_die": 10,
            "proficiency_choices": [
                {
                    "choose": 2,
                    "type": "proficiencies",
                    "from": {
                        "option_set_type": "options_array",
                        "options": [
                            {"option_type": "reference", "item": {"index": "skill-athletics", "name": "Skill: Athletics"}},
                            {"option_type": "reference", "item": {"index": "skill-perception", "name": "Skill: Perception"}},
                            {"option_type": "reference", "item": {"index": "skill-survival", "name": "Skill: Survival"}}
                        ]
                    }
                }
            ],
            "starting_equipment": [
                {"equipment": {"index": "longsword", "name": "Longsword"}, "quantity": 1}
            ],
            "starting_equipment_options": [
                {
                    "choose": 1,
                    "from": {
                        "option_set_type": "options_array",
                        "options": [
                            {"option_type": "counted_reference", "count": 1, "of": {"index": "chain-mail", "name": "Chain Mail"}},
                            {"option_type": "counted_reference", "count": 1, "of": {"index": "leather-armor", "name": "Leather Armor"}}
                        ]
                    }
                }
            ]
        }),
    );
    write(
        root,
        "classes/fighter/levels/1",
        json!({
            "index": "fighter-1",
            "level": 1,
            "ability_score_bonuses": 0,
            "prof_bonus": 2,
            "features": [
                {"index": "fighting-style", "name": "Fighting Style"},
                {"index": "second-wind", "name": "Second Wind"}
            ],
            "class": {"index": "fighter", "name": "Fighter", "url": "/api/2014/classes/fighter"}
        }),
    );
    write(
        root,
        "classes/fighter/levels/2",
        json!({
            "index": "fighter-2",
            "level": 2,
            "ability_score_bonuses": 0,
            "prof_bonus": 2,
            "features": [{"index": "action-surge", "name": "Action Surge"}],
            "class_specific": {"action_surges": 1},
            "class": {"index": "fighter", "name": "Fighter", "url": "/api/2014/classes/fighter"}
        }),
    );
    write(
        root,
        "classes/fighter/levels/3",
        json!({
            "index": "fighter-3",
            "level": 3,
            "ability_score_bonuses": 2,
            "prof_bonus": 2,
            "features": [],
            "proficiency_choices": [
                {
                    "choose": 1,
                    "type": "proficiencies",
                    "from": {
                        "option_set_type": "options_array",
                        "options": [
                            {"option_type": "reference", "item": {"index": "skill-intimidation", "name": "Skill: Intimidation"}}
                        ]
                    }
                }
            ],
            "class_specific": {"action_surges": 1, "indomitable_uses": 0},
            "class": {"index": "fighter", "name": "Fighter", "url": "/api/2014/classes/fighter"}
        }),
    );
    write(
        root,
        "classes/cleric",
        json!({
            "index": "cleric",
            "name": "Cleric",
            "hit_die": 8,
            "spellcasting": {
                "level": 1,
                "spellcasting_ability": {"index": "wis", "name": "WIS", "url": "/api/2014/ability-scores/wis"}
            }
        }),
    );
    write(
        root,
        "classes/cleric/levels/1",
        json!({
            "index": "cleric-1",
            "level": 1,
            "ability_score_bonuses": 0,
            "prof_bonus": 2,
            "features": [
                {"index": "spellcasting-cleric", "name": "Spellcasting"},
                {"index": "divine-domain", "name": "Divine Domain"}
            ],
            "spellcasting": {
                "cantrips_known": 3,
                "spell_slots_level_1": 2
            },
            "class": {"index": "cleric", "name": "Cleric", "url": "/api/2014/classes/cleric"}
        }),
    );
}

fn write_features(root: &Path) {
    let simple = [
        ("spellcasting-wizard", "Spellcasting"),
        ("arcane-recovery", "Arcane Recovery"),
        ("arcane-tradition", "Arcane Tradition"),
        ("second-wind", "Second Wind"),
        ("action-surge", "Action Surge"),
        ("fighter-fighting-style-archery", "Fighting Style: Archery"),
        ("fighter-fighting-style-defense", "Fighting Style: Defense"),
        ("spellcasting-cleric", "Spellcasting"),
        ("divine-domain", "Divine Domain"),
    ];
    for (index, name) in simple {
        write(
            root,
            &format!("features/{index}"),
            json!({"index": index, "name": name, "desc": [name]}),
        );
    }
    write(
        root,
        "features/fighting-style",
        json!({
            "index": "fighting-style",
            "name": "Fighting Style",
            "desc": ["You adopt a particular style of fighting as your specialty."],
            "feature_specific": {
                "subfeature_options": {
                    "choose": 1,
                    "type": "feature",
                    "from": {
                        "option_set_type": "options_array",
                        "options": [
                            {"option_type": "reference", "item": {"index": "fighter-fighting-style-archery", "name": "Archery"}},
                            {"option_type": "reference", "item": {"index": "fighter-fighting-style-defense", "name": "Defense"}}
                        ]
                    }
                }
            }
        }),
    );
}

fn write_spells(root: &Path) {
    write(
        root,
        "spells/fire-bolt",
        json!({
            "index": "fire-bolt",
            "name": "Fire Bolt",
            "desc": ["You hurl a mote of fire at a creature or object within range."],
            "level": 0,
            "range": "120 feet",
            "school": {"index": "evocation", "name": "Evocation"},
            "classes": [{"index": "wizard", "name": "Wizard"}],
            "damage": {
                "damage_type": {"index": "fire", "name": "Fire", "url": "/api/2014/damage-types/fire"},
                "damage_at_character_level": {"1": "1d10", "5": "2d10"}
            }
        }),
    );
    write(
        root,
        "spells/light",
        json!({
            "index": "light",
            "name": "Light",
            "desc": ["You touch one object that is no larger than 10 feet in any dimension."],
            "level": 0,
            "range": "Touch",
            "school": {"index": "evocation", "name": "Evocation"},
            "classes": [{"index": "wizard"}, {"index": "cleric"}]
        }),
    );
    write(
        root,
        "spells/mage-hand",
        json!({
            "index": "mage-hand",
            "name": "Mage Hand",
            "desc": ["A spectral, floating hand appears at a point you choose."],
            "level": 0,
            "range": "30 feet",
            "school": {"index": "conjuration", "name": "Conjuration"},
            "classes": [{"index": "wizard"}]
        }),
    );
    write(
        root,
        "spells/sacred-flame",
        json!({
            "index": "sacred-flame",
            "name": "Sacred Flame",
            "desc": ["Flame-like radiance descends on a creature that you can see."],
            "level": 0,
            "range": "60 feet",
            "school": {"index": "evocation", "name": "Evocation"},
            "classes": [{"index": "cleric"}],
            "damage": {
                "damage_type": {"index": "radiant", "name": "Radiant", "url": "/api/2014/damage-types/radiant"},
                "damage_at_character_level": {"1": "1d8"}
            },
            "dc": {"dc_type": {"index": "dex", "name": "DEX"}, "dc_success": "none"}
        }),
    );
    write(
        root,
        "spells/magic-missile",
        json!({
            "index": "magic-missile",
            "name": "Magic Missile",
            "desc": ["You create three glowing darts of magical force."],
            "level": 1,
            "range": "120 feet",
            "school": {"index": "evocation", "name": "Evocation"},
            "classes": [{"index": "wizard"}],
            "damage": {
                "damage_type": {"index": "force", "name": "Force", "url": "/api/2014/damage-types/force"},
                "damage_at_slot_level": {"1": "1d4 + 1", "2": "1d4 + 1"}
            }
        }),
    );
    write(
        root,
        "spells/shield",
        json!({
            "index": "shield",
            "name": "Shield",
            "desc": ["An invisible barrier of magical force appears and protects you."],
            "level": 1,
            "range": "Self",
            "school": {"index": "abjuration", "name": "Abjuration"},
            "classes": [{"index": "wizard"}]
        }),
    );
    write(
        root,
        "spells/sleep",
        json!({
            "index": "sleep",
            "name": "Sleep",
            "desc": ["This spell sends creatures into a magical slumber."],
            "level": 1,
            "range": "90 feet",
            "school": {"index": "enchantment", "name": "Enchantment"},
            "classes": [{"index": "wizard"}],
            "area_of_effect": {"type": "sphere", "size": 20}
        }),
    );
    write(
        root,
        "spells/burning-hands",
        json!({
            "index": "burning-hands",
            "name": "Burning Hands",
            "desc": ["A thin sheet of flames shoots forth from your outstretched fingertips."],
            "level": 1,
            "range": "Self",
            "school": {"index": "evocation", "name": "Evocation"},
            "classes": [{"index": "wizard"}],
            "area_of_effect": {"type": "cone", "size": 15},
            "damage": {
                "damage_type": {"index": "fire", "name": "Fire", "url": "/api/2014/damage-types/fire"},
                "damage_at_slot_level": {"1": "3d6"}
            },
            "dc": {"dc_type": {"index": "dex", "name": "DEX"}, "dc_success": "half"}
        }),
    );
    write(
        root,
        "spells/mage-armor",
        json!({
            "index": "mage-armor",
            "name": "Mage Armor",
            "desc": ["You touch a willing creature who isn't wearing armor."],
            "level": 1,
            "range": "Touch",
            "school": {"index": "abjuration", "name": "Abjuration"},
            "classes": [{"index": "wizard"}]
        }),
    );
    write(
        root,
        "spells/detect-magic",
        json!({
            "index": "detect-magic",
            "name": "Detect Magic",
            "desc": ["For the duration, you sense the presence of magic within 30 feet of you."],
            "level": 1,
            "range": "Self",
            "school": {"index": "divination", "name": "Divination"},
            "classes": [{"index": "wizard"}, {"index": "cleric"}],
            "area_of_effect": {"type": "sphere", "size": 30}
        }),
    );
    write(
        root,
        "spells/cure-wounds",
        json!({
            "index": "cure-wounds",
            "name": "Cure Wounds",
            "desc": ["A creature you touch regains a number of hit points."],
            "level": 1,
            "range": "Touch",
            "school": {"index": "evocation", "name": "Evocation"},
            "classes": [{"index": "cleric"}],
            "heal_at_slot_level": {"1": "1d8 + MOD", "2": "2d8 + MOD"}
        }),
    );
    write(
        root,
        "spells/bless",
        json!({
            "index": "bless",
            "name": "Bless",
            "desc": ["You bless up to three creatures of your choice within range."],
            "level": 1,
            "range": "30 feet",
            "school": {"index": "enchantment", "name": "Enchantment"},
            "classes": [{"index": "cleric"}]
        }),
    );
}

fn write_proficiencies(root: &Path) {
    let skills = [
        ("skill-arcana", "Skill: Arcana", "arcana"),
        ("skill-history", "Skill: History", "history"),
        ("skill-investigation", "Skill: Investigation", "investigation"),
        ("skill-athletics", "Skill: Athletics", "athletics"),
        ("skill-perception", "Skill: Perception", "perception"),
        ("skill-survival", "Skill: Survival", "survival"),
        ("skill-intimidation", "Skill: Intimidation", "intimidation"),
    ];
    for (index, name, skill) in skills {
        write(
            root,
            &format!("proficiencies/{index}"),
            json!({
                "index": index,
                "name": name,
                "type": "Skills",
                "reference": {"index": skill, "name": name, "url": format!("/api/2014/skills/{skill}")}
            }),
        );
    }
    write(
        root,
        "proficiencies/saving-throw-wis",
        json!({
            "index": "saving-throw-wis",
            "name": "Saving Throw: WIS",
            "type": "Saving Throws",
            "reference": {"index": "wis", "name": "WIS", "url": "/api/2014/ability-scores/wis"}
        }),
    );
}

fn write_backgrounds(root: &Path) {
    write(
        root,
        "backgrounds/sage",
        json!({
            "index": "sage",
            "name": "Sage",
            "starting_proficiencies": [
                {"index": "skill-arcana", "name": "Skill: Arcana"},
                {"index": "skill-history", "name": "Skill: History"}
            ]
        }),
    );
    write(
        root,
        "backgrounds/soldier",
        json!({
            "index": "soldier",
            "name": "Soldier",
            "starting_proficiencies": [
                {"index": "skill-athletics", "name": "Skill: Athletics"},
                {"index": "skill-intimidation", "name": "Skill: Intimidation"}
            ]
        }),
    );
}

fn write_equipment(root: &Path) {
    write(
        root,
        "equipment/spellbook",
        json!({
            "index": "spellbook",
            "name": "Spellbook",
            "equipment_category": {"index": "adventuring-gear", "name": "Adventuring Gear"},
            "cost": {"quantity": 50, "unit": "gp"},
            "weight": 3
        }),
    );
    write(
        root,
        "equipment/quarterstaff",
        json!({
            "index": "quarterstaff",
            "name": "Quarterstaff",
            "equipment_category": {"index": "weapon", "name": "Weapon"},
            "weapon_category": "Simple",
            "cost": {"quantity": 2, "unit": "sp"},
            "weight": 4,
            "damage": {
                "damage_dice": "1d6",
                "damage_type": {"index": "bludgeoning", "name": "Bludgeoning"}
            }
        }),
    );
    write(
        root,
        "equipment/dagger",
        json!({
            "index": "dagger",
            "name": "Dagger",
            "equipment_category": {"index": "weapon", "name": "Weapon"},
            "weapon_category": "Simple",
            "cost": {"quantity": 2, "unit": "gp"},
            "weight": 1,
            "damage": {
                "damage_dice": "1d4",
                "damage_type": {"index": "piercing", "name": "Piercing"}
            }
        }),
    );
    write(
        root,
        "equipment/longsword",
        json!({
            "index": "longsword",
            "name": "Longsword",
            "equipment_category": {"index": "weapon", "name": "Weapon"},
            "weapon_category": "Martial",
            "cost": {"quantity": 15, "unit": "gp"},
            "weight": 3,
            "damage": {
                "damage_dice": "1d8",
                "damage_type": {"index": "slashing", "name": "Slashing"}
            }
        }),
    );
    write(
        root,
        "equipment/chain-mail",
        json!({
            "index": "chain-mail",
            "name": "Chain Mail",
            "equipment_category": {"index": "armor", "name": "Armor"},
            "armor_category": "Heavy",
            "cost": {"quantity": 75, "unit": "gp"},
            "weight": 55,
            "armor_class": {"base": 16, "dex_bonus": false}
        }),
    );
    write(
        root,
        "equipment/leather-armor",
        json!({
            "index": "leather-armor",
            "name": "Leather Armor",
            "equipment_category": {"index": "armor", "name": "Armor"},
            "armor_category": "Light",
            "cost": {"quantity": 10, "unit": "gp"},
            "weight": 10,
            "armor_class": {"base": 11, "dex_bonus": true}
        }),
    );
    write(
        root,
        "equipment/explorers-pack",
        json!({
            "index": "explorers-pack",
            "name": "Explorer's Pack",
            "equipment_category": {"index": "equipment-packs", "name": "Equipment Packs"},
            "cost": {"quantity": 10, "unit": "gp"},
            "contents": [
                {"item": {"index": "bedroll", "name": "Bedroll", "url": "/api/2014/equipment/bedroll"}, "quantity": 1},
                {"item": {"index": "rations", "name": "Rations", "url": "/api/2014/equipment/rations"}, "quantity": 2}
            ]
        }),
    );
    write(
        root,
        "equipment/bedroll",
        json!({
            "index": "bedroll",
            "name": "Bedroll",
            "equipment_category": {"index": "adventuring-gear", "name": "Adventuring Gear"},
            "cost": {"quantity": 1, "unit": "gp"},
            "weight": 7
        }),
    );
    write(
        root,
        "equipment/rations",
        json!({
            "index": "rations",
            "name": "Rations (1 day)",
            "equipment_category": {"index": "adventuring-gear", "name": "Adventuring Gear"},
            "cost": {"quantity": 5, "unit": "sp"},
            "weight": 2
        }),
    );
    write(
        root,
        "equipment/torch",
        json!({
            "index": "torch",
            "name": "Torch",
            "equipment_category": {"index": "adventuring-gear", "name": "Adventuring Gear"},
            "cost": {"quantity": 1, "unit": "cp"},
            "weight": 1
        }),
    );
    write(
        root,
        "equipment-categories/simple-weapons",
        json!({
            "index": "simple-weapons",
            "name": "Simple Weapons",
            "equipment": [
                {"index": "dagger", "name": "Dagger", "url": "/api/2014/equipment/dagger"},
                {"index": "quarterstaff", "name": "Quarterstaff", "url": "/api/2014/equipment/quarterstaff"}
            ]
        }),
    );
    write(
        root,
        "equipment-categories/adventuring-gear",
        json!({
            "index": "adventuring-gear",
            "name": "Adventuring Gear",
            "equipment": [
                {"index": "torch", "name": "Torch", "url": "/api/2014/equipment/torch"},
                {"index": "bedroll", "name": "Bedroll", "url": "/api/2014/equipment/bedroll"},
                {"index": "rations", "name": "Rations (1 day)", "url": "/api/2014/equipment/rations"}
            ]
        }),
    );
}

fn write_misc(root: &Path) {
    let damage_types = [
        ("fire", "Fire"),
        ("force", "Force"),
        ("radiant", "Radiant"),
        ("piercing", "Piercing"),
        ("bludgeoning", "Bludgeoning"),
        ("slashing", "Slashing"),
    ];
    for (index, name) in damage_types {
        write(
            root,
            &format!("damage-types/{index}"),
            json!({"index": index, "name": name, "desc": [format!("{name} damage.")]}),
        );
    }

    write(
        root,
        "alignments/neutral-good",
        json!({"index": "neutral-good", "name": "Neutral Good", "abbreviation": "NG"}),
    );
    write(
        root,
        "alignments/lawful-neutral",
        json!({"index": "lawful-neutral", "name": "Lawful Neutral", "abbreviation": "LN"}),
    );

    write(
        root,
        "rules/level_up",
        json!([
            {"level": 2, "xp_required_total": 300},
            {"level": 3, "xp_required_total": 900},
            {"level": 4, "xp_required_total": 2700}
        ]),
    );
}
