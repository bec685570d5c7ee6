//! Resolution of builders into characters.
//!
//! Turns a finished [`CharacterBuild`] into a [`Character`], instantiating
//! spells, proficiencies and equipment from their rules records. Top-level
//! lookups (race, class) propagate errors; secondary lookups during
//! resolution are best-effort — a broken cross-reference is logged and
//! skipped so the rest of the character still resolves. The dataset is
//! large and occasionally incomplete, and one bad entry must not make a
//! character unplayable.

use crate::character_builder::{CharacterBuild, SubfeatureChoice};
use crate::items::EquipmentInstance;
use crate::rules::{RulesError, RulesRepository};
use crate::spells::Spell;
use crate::world::{
    random_role, Ability, AbilityScores, Character, ClassInfo, Npc, Proficiency, ProficiencyKind,
    ProficiencyRef, RecordTag, Spellcasting,
};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::warn;

/// Resolve a creation build into a character.
///
/// The order of operations is load-bearing: point-buy scores are
/// authoritative, racial then subracial bonuses stack on top, and HP is
/// computed only after all bonuses so the CON modifier is final.
pub fn resolve_character(
    build: &CharacterBuild,
    repo: &RulesRepository,
    rng: &mut impl Rng,
) -> Result<Character, RulesError> {
    // Missing race/class resolve to a uniform random pick; an incomplete
    // build still yields a playable character.
    let race_record = match &build.race_data {
        Some(record) => Rc::clone(record),
        None => random_record(repo, rng, "races")?,
    };
    let class_record = match &build.class_data {
        Some(record) => Rc::clone(record),
        None => random_record(repo, rng, "classes")?,
    };

    let race = record_tag(&race_record);
    let class = class_info(&class_record);
    let class_index = class.index.clone();

    let mut character = Character::new(build.name.clone(), race, class);
    character.gender = build.gender.clone();
    character.age = build.age;
    character.weight = build.weight;
    character.alignment = build.alignment.clone();
    character.subrace = build.subrace_data.as_deref().map(record_tag);
    character.subclass = build.subclass_data.as_deref().map(record_tag);
    character.background = build.background_data.as_deref().map(record_tag);

    // Point-buy values are authoritative, then race and subrace bonuses
    // stack additively. Modifiers are derived on read, so they can never
    // be observed stale relative to the scores.
    character.abilities = build.abilities.clone();
    apply_ability_bonuses(&mut character.abilities, &race_record);
    if let Some(subrace) = &build.subrace_data {
        apply_ability_bonuses(&mut character.abilities, subrace);
    }

    // Level 1 HP is deterministic: hit die maximum plus the final CON
    // modifier, no roll and no floor.
    let con_mod = character.abilities.modifier(Ability::Constitution) as i32;
    character.max_hit_points = character.class.hit_die as i32 + con_mod;
    character.hit_points = character.max_hit_points;

    character.speed = race_record
        .get("speed")
        .and_then(Value::as_u64)
        .unwrap_or(30) as u32;

    merge_racial_traits(&mut character, &race_record);
    if let Some(subrace) = &build.subrace_data {
        merge_racial_traits(&mut character, subrace);
    }

    character.features = build.features.clone();
    apply_feature_choices(&mut character.features, &build.feature_choices);

    if class_record.get("spellcasting").is_some() {
        let spellcasting = resolve_spellcasting(build, repo, &character, &class_index);
        character.spellcasting = Some(spellcasting);
    }

    resolve_proficiencies(&mut character, build, repo);

    if build.class_data.is_some() {
        resolve_starting_equipment(&mut character, repo, &class_record, rng);
    }

    if let Ok(level_record) = repo.get(&format!("classes/{class_index}/levels/1")) {
        merge_class_specific(&mut character.class_specific, &level_record);
    }

    Ok(character)
}

// ============================================================================
// Ability bonuses and racial traits
// ============================================================================

/// Apply a race or subrace record's `ability_bonuses`.
pub(crate) fn apply_ability_bonuses(scores: &mut AbilityScores, record: &Value) {
    let Some(bonuses) = record.get("ability_bonuses").and_then(Value::as_array) else {
        return;
    };
    for bonus in bonuses {
        let ability = bonus
            .get("ability_score")
            .and_then(|a| a.get("index"))
            .and_then(Value::as_str)
            .and_then(Ability::from_index);
        let Some(ability) = ability else { continue };
        let delta = bonus.get("bonus").and_then(Value::as_i64).unwrap_or(0) as i8;
        scores.apply_bonus(ability, delta);
    }
}

/// Union the record's trait lists into the character; senses are a
/// key-wise overlay where later (subrace) values win.
fn merge_racial_traits(character: &mut Character, record: &Value) {
    extend_unique(
        &mut character.damage_vulnerabilities,
        extract_strings(record.get("damage_vulnerabilities")),
    );
    extend_unique(
        &mut character.damage_resistances,
        extract_strings(record.get("damage_resistances")),
    );
    extend_unique(
        &mut character.damage_immunities,
        extract_strings(record.get("damage_immunities")),
    );
    extend_unique(
        &mut character.condition_advantages,
        extract_strings(record.get("condition_advantages")),
    );
    extend_unique(
        &mut character.condition_immunities,
        extract_strings(record.get("condition_immunities")),
    );
    if let Some(senses) = record.get("senses").and_then(Value::as_object) {
        for (key, value) in senses {
            character.senses.insert(key.clone(), value.clone());
        }
    }
}

/// Lists in race records hold either bare strings or `{index, name}` stubs.
fn extract_strings(field: Option<&Value>) -> Vec<String> {
    let Some(entries) = field.and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map
                .get("index")
                .or_else(|| map.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
        .collect()
}

fn extend_unique(target: &mut Vec<String>, additions: Vec<String>) {
    for value in additions {
        if !target.contains(&value) {
            target.push(value);
        }
    }
}

// ============================================================================
// Features
// ============================================================================

/// Replace parent features with their chosen subfeatures.
///
/// A single choice replaces the parent in place; multiple choices remove
/// the parent and append every pick. A parent and its subfeature are never
/// both present afterwards.
pub(crate) fn apply_feature_choices(
    features: &mut Vec<String>,
    choices: &BTreeMap<String, SubfeatureChoice>,
) {
    for (parent, choice) in choices {
        match choice {
            SubfeatureChoice::One(child) => {
                if let Some(pos) = features.iter().position(|f| f == parent) {
                    features[pos] = child.clone();
                } else if !features.contains(child) {
                    features.push(child.clone());
                }
            }
            SubfeatureChoice::Many(children) => {
                if let Some(pos) = features.iter().position(|f| f == parent) {
                    features.remove(pos);
                }
                for child in children {
                    if !features.contains(child) {
                        features.push(child.clone());
                    }
                }
            }
        }
    }
}

// ============================================================================
// Spellcasting
// ============================================================================

fn resolve_spellcasting(
    build: &CharacterBuild,
    repo: &RulesRepository,
    character: &Character,
    class_index: &str,
) -> Spellcasting {
    // The dataset default for a missing ability entry is Charisma.
    let ability = character
        .class
        .spellcasting_ability
        .unwrap_or(Ability::Charisma);
    let mut spellcasting = Spellcasting::new(ability);

    match repo.get(&format!("classes/{class_index}/levels/1")) {
        Ok(level_record) => spellcasting.slots.set_totals(slot_totals(&level_record)),
        Err(err) => warn!(class = class_index, %err, "no level 1 slot table"),
    }
    // Proficiency bonus at level 1 is always +2.
    spellcasting.recompute_save_dc(&character.abilities, 2);

    for index in build.cantrips.iter().chain(build.spells.iter()) {
        match instantiate_spell(repo, index) {
            Ok(spell) => {
                if !spellcasting.knows_spell(&spell.index) {
                    spellcasting.learned_spells.push(spell);
                }
            }
            Err(err) => warn!(spell = index.as_str(), %err, "skipping unresolved spell"),
        }
    }

    // Preparing a spell that was never learned implicitly learns it.
    for index in &build.prepared_spells {
        if spellcasting.is_prepared(index) {
            continue;
        }
        let known = spellcasting
            .learned_spells
            .iter()
            .find(|s| &s.index == index)
            .cloned();
        let spell = match known {
            Some(spell) => spell,
            None => match instantiate_spell(repo, index) {
                Ok(spell) => {
                    spellcasting.learned_spells.push(spell.clone());
                    spell
                }
                Err(err) => {
                    warn!(spell = index.as_str(), %err, "skipping unresolved prepared spell");
                    continue;
                }
            },
        };
        spellcasting.prepared_spells.push(spell);
    }

    spellcasting
}

/// Spell slot totals for levels 1-9 from a class level record.
pub(crate) fn slot_totals(level_record: &Value) -> [u8; 9] {
    let mut totals = [0u8; 9];
    let Some(spellcasting) = level_record.get("spellcasting") else {
        return totals;
    };
    for (i, total) in totals.iter_mut().enumerate() {
        let key = format!("spell_slots_level_{}", i + 1);
        *total = spellcasting.get(&key).and_then(Value::as_u64).unwrap_or(0) as u8;
    }
    totals
}

/// Load and parse one spell record.
pub(crate) fn instantiate_spell(
    repo: &RulesRepository,
    index: &str,
) -> Result<Spell, RulesError> {
    let record = repo.get(&format!("spells/{index}"))?;
    Ok(Spell::from_record(&record, repo))
}

// ============================================================================
// Proficiencies
// ============================================================================

fn resolve_proficiencies(character: &mut Character, build: &CharacterBuild, repo: &RulesRepository) {
    for index in &build.proficiency_choices_selected {
        add_proficiency(character, repo, index);
    }

    let background_profs = build
        .background_data
        .as_ref()
        .and_then(|bg| bg.get("starting_proficiencies"))
        .and_then(Value::as_array);
    if let Some(entries) = background_profs {
        for entry in entries {
            if let Some(index) = entry.get("index").and_then(Value::as_str) {
                add_proficiency(character, repo, index);
            }
        }
    }
}

fn add_proficiency(character: &mut Character, repo: &RulesRepository, index: &str) {
    if character.proficiencies.iter().any(|p| p.index == index) {
        return;
    }
    match instantiate_proficiency(repo, index) {
        Ok(proficiency) => character.proficiencies.push(proficiency),
        Err(err) => warn!(proficiency = index, %err, "skipping unresolved proficiency"),
    }
}

/// Load and parse one proficiency record.
pub(crate) fn instantiate_proficiency(
    repo: &RulesRepository,
    index: &str,
) -> Result<Proficiency, RulesError> {
    let record = repo.get(&format!("proficiencies/{index}"))?;
    let kind = ProficiencyKind::from_type_name(
        record.get("type").and_then(Value::as_str).unwrap_or("Skills"),
    );

    // The reference URL's last two segments are category and index, e.g.
    // /api/2014/ability-scores/wis or /api/2014/skills/arcana.
    let reference = record
        .get("reference")
        .and_then(|r| r.get("url"))
        .and_then(Value::as_str)
        .and_then(|url| {
            let mut parts = url.trim_matches('/').rsplit('/');
            let ref_index = parts.next()?;
            let category = parts.next()?;
            if category == "ability-scores" {
                Ability::from_index(ref_index).map(ProficiencyRef::Ability)
            } else {
                Some(ProficiencyRef::Record(ref_index.to_string()))
            }
        });

    Ok(Proficiency {
        index: record
            .get("index")
            .and_then(Value::as_str)
            .unwrap_or(index)
            .to_string(),
        name: record
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(index)
            .to_string(),
        kind,
        reference,
    })
}

// ============================================================================
// Equipment
// ============================================================================

/// Add guaranteed starting equipment, then resolve each "choose N of"
/// option group with a uniform random pick.
fn resolve_starting_equipment(
    character: &mut Character,
    repo: &RulesRepository,
    class_record: &Value,
    rng: &mut impl Rng,
) {
    if let Some(guaranteed) = class_record.get("starting_equipment").and_then(Value::as_array) {
        for entry in guaranteed {
            let index = entry
                .get("equipment")
                .and_then(|e| e.get("index"))
                .and_then(Value::as_str);
            let Some(index) = index else { continue };
            let quantity = entry.get("quantity").and_then(Value::as_u64).unwrap_or(1);
            add_item_to_inventory(character, repo, index, quantity);
        }
    }

    let Some(option_groups) = class_record
        .get("starting_equipment_options")
        .and_then(Value::as_array)
    else {
        return;
    };
    for group in option_groups {
        let choose = group.get("choose").and_then(Value::as_u64).unwrap_or(1) as usize;
        let options = group
            .get("from")
            .and_then(|f| {
                if f.get("option_set_type").and_then(Value::as_str) == Some("options_array") {
                    f.get("options").and_then(Value::as_array)
                } else {
                    None
                }
            })
            .map(|o| o.as_slice())
            .unwrap_or(&[]);
        if options.is_empty() || choose == 0 {
            continue;
        }

        for option in options.choose_multiple(rng, choose.min(options.len())) {
            for (index, quantity) in resolve_equipment_option(option, repo, rng) {
                add_item_to_inventory(character, repo, &index, quantity);
            }
        }
    }
}

/// Flatten one equipment option into `(index, quantity)` pairs.
///
/// Handles direct counted references, bundles of several items, and nested
/// category choices ("any simple weapon"), which pick uniformly from the
/// category listing.
fn resolve_equipment_option(
    option: &Value,
    repo: &RulesRepository,
    rng: &mut impl Rng,
) -> Vec<(String, u64)> {
    let mut resolved = Vec::new();
    match option.get("option_type").and_then(Value::as_str) {
        Some("counted_reference") => {
            let index = option
                .get("of")
                .and_then(|of| of.get("index"))
                .and_then(Value::as_str);
            if let Some(index) = index {
                let count = option.get("count").and_then(Value::as_u64).unwrap_or(1);
                resolved.push((index.to_string(), count));
            }
        }
        Some("multiple") => {
            if let Some(items) = option.get("items").and_then(Value::as_array) {
                for item in items {
                    resolved.extend(resolve_equipment_option(item, repo, rng));
                }
            }
        }
        Some("choice") => {
            let Some(choice) = option.get("choice") else {
                return resolved;
            };
            if choice.get("type").and_then(Value::as_str) != Some("equipment") {
                return resolved;
            }
            let choose = choice.get("choose").and_then(Value::as_u64).unwrap_or(1) as usize;
            let category = choice
                .get("from")
                .and_then(|f| {
                    if f.get("option_set_type").and_then(Value::as_str)
                        == Some("equipment_category")
                    {
                        f.get("equipment_category")
                    } else {
                        None
                    }
                })
                .and_then(|c| c.get("index"))
                .and_then(Value::as_str);
            let Some(category) = category else {
                return resolved;
            };
            match category_equipment(repo, category) {
                Ok(pool) => {
                    for index in pool.choose_multiple(rng, choose.min(pool.len())) {
                        resolved.push((index.clone(), 1));
                    }
                }
                Err(err) => {
                    warn!(category, %err, "skipping unresolved equipment category");
                }
            }
        }
        _ => {}
    }
    resolved
}

/// Instantiate `quantity` copies of an equipment record into the
/// inventory. Packs are unpacked into their contents; the pack item itself
/// is never added.
pub(crate) fn add_item_to_inventory(
    character: &mut Character,
    repo: &RulesRepository,
    index: &str,
    quantity: u64,
) {
    let record = match repo.get(&format!("equipment/{index}")) {
        Ok(record) => record,
        Err(err) => {
            warn!(equipment = index, %err, "skipping unresolved equipment");
            return;
        }
    };

    let contents = record.get("contents").and_then(Value::as_array);
    if let Some(contents) = contents.filter(|c| !c.is_empty()) {
        for entry in contents {
            let content_index = entry
                .get("item")
                .and_then(|i| i.get("index"))
                .and_then(Value::as_str);
            let Some(content_index) = content_index else { continue };
            let per_pack = entry.get("quantity").and_then(Value::as_u64).unwrap_or(1);
            add_item_to_inventory(character, repo, content_index, quantity * per_pack);
        }
        return;
    }

    for _ in 0..quantity {
        character.add_item(EquipmentInstance::from_record(&record));
    }
}

/// Equipment indices listed by a category record.
fn category_equipment(repo: &RulesRepository, category: &str) -> Result<Vec<String>, RulesError> {
    let record = repo.get(&format!("equipment-categories/{category}"))?;
    Ok(record
        .get("equipment")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e.get("index").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default())
}

// ============================================================================
// Randomized sampling and NPC generation
// ============================================================================

/// Sample `count` equipment indices from a category: without replacement
/// up to the category size, then with replacement for any remainder. Large
/// requested counts never loop forever on small categories.
pub fn sample_category(
    repo: &RulesRepository,
    rng: &mut impl Rng,
    category: &str,
    count: usize,
) -> Result<Vec<String>, RulesError> {
    let pool = category_equipment(repo, category)?;
    if pool.is_empty() {
        return Ok(Vec::new());
    }

    let mut picks: Vec<String> = pool
        .choose_multiple(rng, count.min(pool.len()))
        .cloned()
        .collect();
    while picks.len() < count {
        if let Some(extra) = pool.choose(rng) {
            picks.push(extra.clone());
        }
    }
    Ok(picks)
}

/// Generate `count` items of stock for an NPC from one equipment category.
pub fn generate_npc_stock(
    repo: &RulesRepository,
    rng: &mut impl Rng,
    category: &str,
    count: usize,
) -> Result<Vec<EquipmentInstance>, RulesError> {
    let mut stock = Vec::with_capacity(count);
    for index in sample_category(repo, rng, category, count)? {
        match repo.get(&format!("equipment/{index}")) {
            Ok(record) => stock.push(EquipmentInstance::from_record(&record)),
            Err(err) => warn!(equipment = index.as_str(), %err, "skipping stock item"),
        }
    }
    Ok(stock)
}

/// Seed data for world-population NPC generation.
#[derive(Debug, Clone, Default)]
pub struct NpcSeed {
    pub name: Option<String>,
    pub race: Option<String>,
    pub class_type: Option<String>,
    /// Display level; 0 is treated as 1.
    pub level: u8,
    /// Random role from the role table when unset.
    pub role: Option<String>,
    /// Starting wealth in copper pieces.
    pub coins: i64,
}

/// Generate an NPC from seed data. Unspecified race and class are drawn
/// randomly, like any other unresolved build.
pub fn generate_npc(
    repo: &RulesRepository,
    rng: &mut impl Rng,
    seed: NpcSeed,
) -> Result<Npc, RulesError> {
    let mut build = CharacterBuild::new();
    if let Some(name) = &seed.name {
        build.set_name(name.clone());
    }
    if let Some(race) = &seed.race {
        build.select_race(repo, race)?;
    }
    if let Some(class) = &seed.class_type {
        build.select_class(repo, class)?;
    }

    let mut character = resolve_character(&build, repo, rng)?;
    character.coins = seed.coins;

    // NPCs spawn pre-leveled; HP grows deterministically per level, same
    // formula as a level-up with no ability improvements.
    let level = seed.level.max(1);
    let con_mod = character.abilities.modifier(Ability::Constitution) as i32;
    for _ in 1..level {
        character.max_hit_points += character.class.hit_die as i32 + con_mod;
    }
    character.hit_points = character.max_hit_points;
    character.level = level;

    let role = seed
        .role
        .unwrap_or_else(|| random_role(rng).to_string());
    Ok(Npc::new(character, role))
}

// ============================================================================
// Record helpers
// ============================================================================

fn record_tag(record: &Value) -> RecordTag {
    RecordTag::new(
        record
            .get("index")
            .and_then(Value::as_str)
            .unwrap_or_default(),
        record
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default(),
    )
}

fn class_info(record: &Value) -> ClassInfo {
    ClassInfo {
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
        hit_die: record.get("hit_die").and_then(Value::as_u64).unwrap_or(8) as u8,
        spellcasting_ability: record
            .get("spellcasting")
            .and_then(|sc| sc.get("spellcasting_ability"))
            .and_then(|a| a.get("index"))
            .and_then(Value::as_str)
            .and_then(Ability::from_index),
    }
}

fn random_record(
    repo: &RulesRepository,
    rng: &mut impl Rng,
    category: &str,
) -> Result<Rc<Value>, RulesError> {
    let records: Vec<Rc<Value>> = repo.list_category(category)?.into_values().collect();
    records
        .choose(rng)
        .cloned()
        .ok_or_else(|| RulesError::NotFound(format!("{category}/*")))
}

/// Merge a level record's `class_specific` table into the character's map:
/// new keys added, existing keys overwritten, nothing removed.
pub(crate) fn merge_class_specific(target: &mut BTreeMap<String, Value>, level_record: &Value) {
    if let Some(class_specific) = level_record.get("class_specific").and_then(Value::as_object) {
        for (key, value) in class_specific {
            target.insert(key.clone(), value.clone());
        }
    }
}
