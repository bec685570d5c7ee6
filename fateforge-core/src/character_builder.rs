//! Step-by-step character creation.
//!
//! [`CharacterBuild`] accumulates the player's choices across an ordered
//! sequence of steps. The step list is dynamic — later steps exist only
//! because of earlier answers (a subrace step only if the race has
//! subraces, spell steps only for casters) — so it is recomputed on every
//! query instead of cached. Bounded selections use click-to-toggle
//! semantics: toggling past the declared limit is a silent no-op, never an
//! error.

use crate::resolver;
use crate::rules::{RulesError, RulesRepository};
use crate::world::{Ability, AbilityScores, Character};
use rand::Rng;
use serde_json::Value;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::warn;

/// Total points available for point buy.
pub const POINT_BUY_TOTAL: u8 = 27;

/// Point-buy cost of a score; `None` outside the 8-15 creation range.
pub fn point_buy_cost(score: u8) -> Option<u8> {
    match score {
        8 => Some(0),
        9 => Some(1),
        10 => Some(2),
        11 => Some(3),
        12 => Some(4),
        13 => Some(5),
        14 => Some(7),
        15 => Some(9),
        _ => None,
    }
}

/// The creation wizard's steps, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationStep {
    Race,
    Subrace,
    Class,
    Features,
    Cantrips,
    Spells,
    Prepared,
    Background,
    Abilities,
    ProficiencyChoices,
    Biography,
    Confirmation,
}

impl CreationStep {
    pub fn name(&self) -> &'static str {
        match self {
            CreationStep::Race => "race",
            CreationStep::Subrace => "subrace",
            CreationStep::Class => "class",
            CreationStep::Features => "features",
            CreationStep::Cantrips => "cantrips",
            CreationStep::Spells => "spells",
            CreationStep::Prepared => "prepared",
            CreationStep::Background => "background",
            CreationStep::Abilities => "abilities",
            CreationStep::ProficiencyChoices => "proficiency_choices",
            CreationStep::Biography => "biography",
            CreationStep::Confirmation => "confirmation",
        }
    }
}

/// A recorded subfeature decision for one parent feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubfeatureChoice {
    /// `choose == 1`: the subfeature replaces the parent in place.
    One(String),
    /// `choose > 1`: the parent is removed and all picks appended.
    Many(Vec<String>),
}

/// The subfeature options nested under a class feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubfeatureOptions {
    pub choose: usize,
    pub options: Vec<String>,
}

/// Read a feature record's nested subfeature options, if it has any.
pub fn subfeature_options(
    repo: &RulesRepository,
    feature_index: &str,
) -> Result<Option<SubfeatureOptions>, RulesError> {
    let record = repo.get(&format!("features/{feature_index}"))?;
    let Some(sub) = record
        .get("feature_specific")
        .and_then(|f| f.get("subfeature_options"))
    else {
        return Ok(None);
    };
    let choose = sub.get("choose").and_then(Value::as_u64).unwrap_or(1) as usize;
    let options = sub
        .get("from")
        .and_then(|f| f.get("options"))
        .and_then(Value::as_array)
        .map(|options| {
            options
                .iter()
                .filter_map(|o| o.get("item").and_then(|i| i.get("index")))
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Ok(Some(SubfeatureOptions { choose, options }))
}

/// Accumulates all character-creation choices.
#[derive(Debug, Clone)]
pub struct CharacterBuild {
    // Biography.
    pub(crate) name: String,
    pub(crate) alignment: Option<String>,
    pub(crate) gender: Option<String>,
    pub(crate) age: Option<u32>,
    pub(crate) weight: Option<u32>,

    // Race / subrace.
    pub(crate) race: Option<String>,
    pub(crate) race_data: Option<Rc<Value>>,
    pub(crate) subrace: Option<String>,
    pub(crate) subrace_data: Option<Rc<Value>>,

    // Class / subclass.
    pub(crate) class_type: Option<String>,
    pub(crate) class_data: Option<Rc<Value>>,
    pub(crate) subclass: Option<String>,
    pub(crate) subclass_data: Option<Rc<Value>>,

    // Spell selections, bounded by the level-1 table counts.
    pub(crate) cantrips: Vec<String>,
    pub(crate) cantrips_known: usize,
    pub(crate) spells: Vec<String>,
    pub(crate) spells_known: usize,
    pub(crate) prepared_spells: Vec<String>,
    pub(crate) spellcasting_ability: Option<Ability>,

    // Background.
    pub(crate) background: Option<String>,
    pub(crate) background_data: Option<Rc<Value>>,

    // Point buy.
    pub(crate) abilities: AbilityScores,
    pub(crate) points_remaining: u8,

    // Proficiency choices from the class record.
    pub(crate) proficiency_choices_selected: Vec<String>,
    pub(crate) proficiency_choose: usize,

    // Level-1 features and subfeature decisions.
    pub(crate) features: Vec<String>,
    pub(crate) feature_choices: BTreeMap<String, SubfeatureChoice>,
}

impl Default for CharacterBuild {
    fn default() -> Self {
        Self::new()
    }
}

impl CharacterBuild {
    pub fn new() -> Self {
        Self {
            name: String::new(),
            alignment: None,
            gender: None,
            age: None,
            weight: None,
            race: None,
            race_data: None,
            subrace: None,
            subrace_data: None,
            class_type: None,
            class_data: None,
            subclass: None,
            subclass_data: None,
            cantrips: Vec::new(),
            cantrips_known: 0,
            spells: Vec::new(),
            spells_known: 0,
            prepared_spells: Vec::new(),
            spellcasting_ability: None,
            background: None,
            background_data: None,
            abilities: AbilityScores::point_buy_base(),
            points_remaining: POINT_BUY_TOTAL,
            proficiency_choices_selected: Vec::new(),
            proficiency_choose: 0,
            features: Vec::new(),
            feature_choices: BTreeMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // Biography
    // ------------------------------------------------------------------

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_alignment(&mut self, alignment: impl Into<String>) {
        self.alignment = Some(alignment.into());
    }

    pub fn set_gender(&mut self, gender: impl Into<String>) {
        self.gender = Some(gender.into());
    }

    pub fn set_age(&mut self, age: u32) {
        self.age = Some(age);
    }

    pub fn set_weight(&mut self, weight: u32) {
        self.weight = Some(weight);
    }

    // ------------------------------------------------------------------
    // Race / class / background selection
    // ------------------------------------------------------------------

    /// Select a race; resets any previous subrace choice.
    pub fn select_race(&mut self, repo: &RulesRepository, index: &str) -> Result<(), RulesError> {
        let record = repo.get(&format!("races/{index}"))?;
        self.race = Some(index.to_string());
        self.race_data = Some(record);
        self.subrace = None;
        self.subrace_data = None;
        Ok(())
    }

    pub fn race(&self) -> Option<&str> {
        self.race.as_deref()
    }

    pub fn select_subrace(&mut self, repo: &RulesRepository, index: &str) -> Result<(), RulesError> {
        let record = repo.get(&format!("subraces/{index}"))?;
        self.subrace = Some(index.to_string());
        self.subrace_data = Some(record);
        Ok(())
    }

    pub fn subrace(&self) -> Option<&str> {
        self.subrace.as_deref()
    }

    /// Select a class.
    ///
    /// Resets subclass, proficiency-choice state, the level-1 feature list
    /// and all spell selections, then reloads them from the new class's
    /// records. A missing level-1 table degrades to no features and no
    /// spell steps rather than failing the selection.
    pub fn select_class(&mut self, repo: &RulesRepository, index: &str) -> Result<(), RulesError> {
        let record = repo.get(&format!("classes/{index}"))?;

        self.class_type = Some(index.to_string());
        self.subclass = None;
        self.subclass_data = None;
        self.proficiency_choices_selected.clear();
        self.proficiency_choose = class_proficiency_choose(&record);
        self.cantrips.clear();
        self.spells.clear();
        self.prepared_spells.clear();
        self.cantrips_known = 0;
        self.spells_known = 0;
        self.features.clear();
        self.feature_choices.clear();
        self.spellcasting_ability = record
            .get("spellcasting")
            .and_then(|sc| sc.get("spellcasting_ability"))
            .and_then(|a| a.get("index"))
            .and_then(Value::as_str)
            .and_then(Ability::from_index);

        match repo.get(&format!("classes/{index}/levels/1")) {
            Ok(level) => {
                self.features = feature_indices(&level);
                if record.get("spellcasting").is_some() {
                    let (cantrips, spells) = spell_counts(&level);
                    self.cantrips_known = cantrips;
                    self.spells_known = spells;
                }
            }
            Err(err) => {
                warn!(class = index, %err, "level 1 table missing; no features loaded");
            }
        }

        self.class_data = Some(record);
        Ok(())
    }

    pub fn class_type(&self) -> Option<&str> {
        self.class_type.as_deref()
    }

    pub fn select_subclass(&mut self, repo: &RulesRepository, index: &str) -> Result<(), RulesError> {
        let record = repo.get(&format!("subclasses/{index}"))?;
        self.subclass = Some(index.to_string());
        self.subclass_data = Some(record);
        Ok(())
    }

    pub fn select_background(
        &mut self,
        repo: &RulesRepository,
        index: &str,
    ) -> Result<(), RulesError> {
        let record = repo.get(&format!("backgrounds/{index}"))?;
        self.background = Some(index.to_string());
        self.background_data = Some(record);
        Ok(())
    }

    pub fn background(&self) -> Option<&str> {
        self.background.as_deref()
    }

    // ------------------------------------------------------------------
    // Bounded toggles
    // ------------------------------------------------------------------

    /// Toggle a cantrip selection. Returns false when the click was
    /// ignored because the selection is already at its limit.
    pub fn toggle_cantrip(&mut self, index: &str) -> bool {
        let limit = self.cantrips_known;
        toggle(&mut self.cantrips, index, limit)
    }

    pub fn cantrips(&self) -> &[String] {
        &self.cantrips
    }

    pub fn cantrips_known(&self) -> usize {
        self.cantrips_known
    }

    pub fn toggle_spell(&mut self, index: &str) -> bool {
        let limit = self.spells_known;
        toggle(&mut self.spells, index, limit)
    }

    pub fn spells(&self) -> &[String] {
        &self.spells
    }

    pub fn spells_known(&self) -> usize {
        self.spells_known
    }

    pub fn toggle_prepared_spell(&mut self, index: &str) -> bool {
        let limit = self.prepared_capacity();
        toggle(&mut self.prepared_spells, index, limit)
    }

    pub fn prepared_spells(&self) -> &[String] {
        &self.prepared_spells
    }

    /// How many spells a prepared caster can have ready.
    ///
    /// The dataset's level tables carry no prepared column, so this uses
    /// the 5e rule: class level (1 at creation) plus the spellcasting
    /// ability modifier, minimum 1. Known-list casters prepare nothing.
    pub fn prepared_capacity(&self) -> usize {
        let Some(ability) = self.spellcasting_ability else {
            return 0;
        };
        if self.spells_known > 0 {
            return 0;
        }
        (1 + self.abilities.modifier(ability)).max(1) as usize
    }

    pub fn toggle_proficiency_choice(&mut self, index: &str) -> bool {
        let limit = self.proficiency_choose;
        toggle(&mut self.proficiency_choices_selected, index, limit)
    }

    pub fn proficiency_choices_selected(&self) -> &[String] {
        &self.proficiency_choices_selected
    }

    pub fn proficiency_choose(&self) -> usize {
        self.proficiency_choose
    }

    // ------------------------------------------------------------------
    // Features
    // ------------------------------------------------------------------

    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Record a subfeature decision for a parent feature. The replacement
    /// itself happens at resolution.
    pub fn choose_feature_subfeature(&mut self, parent: &str, choice: SubfeatureChoice) {
        self.feature_choices.insert(parent.to_string(), choice);
    }

    pub fn feature_choice(&self, parent: &str) -> Option<&SubfeatureChoice> {
        self.feature_choices.get(parent)
    }

    // ------------------------------------------------------------------
    // Point buy
    // ------------------------------------------------------------------

    pub fn abilities(&self) -> &AbilityScores {
        &self.abilities
    }

    pub fn points_remaining(&self) -> u8 {
        self.points_remaining
    }

    pub fn points_spent(&self) -> u8 {
        Ability::all()
            .iter()
            .map(|&a| point_buy_cost(self.abilities.get(a)).unwrap_or(0))
            .sum()
    }

    pub fn can_increase_ability(&self, ability: Ability) -> bool {
        let current = self.abilities.get(ability);
        if current >= 15 {
            return false;
        }
        let step_cost = match (point_buy_cost(current + 1), point_buy_cost(current)) {
            (Some(next), Some(now)) => next - now,
            _ => return false,
        };
        self.points_remaining >= step_cost
    }

    pub fn can_decrease_ability(&self, ability: Ability) -> bool {
        self.abilities.get(ability) > 8
    }

    /// Raise a score by one point-buy step. Fails silently (returns false,
    /// no mutation) past 15 or when the budget runs out.
    pub fn increase_ability(&mut self, ability: Ability) -> bool {
        if !self.can_increase_ability(ability) {
            return false;
        }
        let current = self.abilities.get(ability);
        let step_cost = match (point_buy_cost(current + 1), point_buy_cost(current)) {
            (Some(next), Some(now)) => next - now,
            _ => return false,
        };
        self.abilities.set(ability, current + 1);
        self.points_remaining -= step_cost;
        true
    }

    /// Lower a score by one step, refunding its cost. Fails silently at
    /// the 8 floor.
    pub fn decrease_ability(&mut self, ability: Ability) -> bool {
        if !self.can_decrease_ability(ability) {
            return false;
        }
        let current = self.abilities.get(ability);
        let refund = match (point_buy_cost(current), point_buy_cost(current - 1)) {
            (Some(now), Some(prev)) => now - prev,
            _ => return false,
        };
        self.abilities.set(ability, current - 1);
        self.points_remaining += refund;
        true
    }

    // ------------------------------------------------------------------
    // Step sequencing
    // ------------------------------------------------------------------

    /// The currently visible steps, derived from the choices so far.
    /// Recomputed on every call; the UI must not cache it.
    pub fn visible_steps(&self) -> Vec<CreationStep> {
        let mut steps = vec![CreationStep::Race];

        let has_subraces = self
            .race_data
            .as_ref()
            .and_then(|r| r.get("subraces"))
            .and_then(Value::as_array)
            .is_some_and(|s| !s.is_empty());
        if has_subraces {
            steps.push(CreationStep::Subrace);
        }

        steps.push(CreationStep::Class);

        if self.class_type.is_some() {
            steps.push(CreationStep::Features);
        }
        if self.cantrips_known > 0 {
            steps.push(CreationStep::Cantrips);
        }
        if self.spells_known > 0 {
            steps.push(CreationStep::Spells);
        }
        if self.prepared_capacity() > 0 {
            steps.push(CreationStep::Prepared);
        }

        steps.push(CreationStep::Background);
        steps.push(CreationStep::Abilities);

        if self.proficiency_choose > 0 {
            steps.push(CreationStep::ProficiencyChoices);
        }

        steps.push(CreationStep::Biography);
        steps.push(CreationStep::Confirmation);
        steps
    }

    /// Whether a step has everything it needs. The UI uses this to gate
    /// navigation; `resolve` itself does not re-validate.
    pub fn step_complete(&self, step: CreationStep) -> bool {
        match step {
            CreationStep::Race => self.race.is_some(),
            CreationStep::Subrace => self.subrace.is_some(),
            CreationStep::Class => self.class_type.is_some(),
            CreationStep::Features => true,
            CreationStep::Cantrips => self.cantrips.len() == self.cantrips_known,
            CreationStep::Spells => self.spells.len() == self.spells_known,
            CreationStep::Prepared => !self.prepared_spells.is_empty(),
            CreationStep::Background => self.background.is_some(),
            CreationStep::Abilities => true,
            CreationStep::ProficiencyChoices => {
                self.proficiency_choices_selected.len() == self.proficiency_choose
            }
            CreationStep::Biography => !self.name.is_empty(),
            CreationStep::Confirmation => true,
        }
    }

    /// Resolve into a [`Character`]. Assumes the UI gated all visible
    /// steps to completion; an incomplete build still resolves, with
    /// missing race/class drawn randomly.
    pub fn resolve(
        &self,
        repo: &RulesRepository,
        rng: &mut impl Rng,
    ) -> Result<Character, RulesError> {
        resolver::resolve_character(self, repo, rng)
    }
}

/// Shared toggle behavior for all bounded selections.
fn toggle(list: &mut Vec<String>, index: &str, limit: usize) -> bool {
    if let Some(pos) = list.iter().position(|i| i == index) {
        list.remove(pos);
        return true;
    }
    if list.len() < limit {
        list.push(index.to_string());
        return true;
    }
    false
}

/// The class record's proficiency-choice count (first group with options).
pub(crate) fn class_proficiency_choose(class_record: &Value) -> usize {
    let Some(choices) = class_record
        .get("proficiency_choices")
        .and_then(Value::as_array)
    else {
        return 0;
    };
    for group in choices {
        let choose = group.get("choose").and_then(Value::as_u64).unwrap_or(0) as usize;
        let has_options = group
            .get("from")
            .and_then(|f| f.get("options"))
            .and_then(Value::as_array)
            .is_some_and(|o| !o.is_empty());
        if choose > 0 && has_options {
            return choose;
        }
    }
    0
}

/// Option item indices from a class proficiency-choice group.
pub(crate) fn proficiency_choice_options(class_record: &Value) -> Vec<String> {
    let Some(choices) = class_record
        .get("proficiency_choices")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };
    for group in choices {
        let options: Vec<String> = group
            .get("from")
            .and_then(|f| f.get("options"))
            .and_then(Value::as_array)
            .map(|options| {
                options
                    .iter()
                    .filter_map(|o| o.get("item").and_then(|i| i.get("index")))
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if !options.is_empty() {
            return options;
        }
    }
    Vec::new()
}

/// Feature indices declared by a class level record.
pub(crate) fn feature_indices(level_record: &Value) -> Vec<String> {
    level_record
        .get("features")
        .and_then(Value::as_array)
        .map(|features| {
            features
                .iter()
                .filter_map(|f| f.get("index").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// `(cantrips_known, spells_known)` from a level record's spellcasting
/// table; absent entries count as zero.
pub(crate) fn spell_counts(level_record: &Value) -> (usize, usize) {
    let Some(sc) = level_record.get("spellcasting") else {
        return (0, 0);
    };
    let cantrips = sc
        .get("cantrips_known")
        .and_then(Value::as_u64)
        .unwrap_or(0) as usize;
    let spells = sc.get("spells_known").and_then(Value::as_u64).unwrap_or(0) as usize;
    (cantrips, spells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixtureDataset;

    #[test]
    fn test_point_buy_starts_at_floor() {
        let build = CharacterBuild::new();
        assert_eq!(build.points_remaining(), 27);
        assert_eq!(build.points_spent(), 0);
        for ability in Ability::all() {
            assert_eq!(build.abilities().get(ability), 8);
        }
    }

    #[test]
    fn test_point_buy_str_to_13_leaves_22_points() {
        let mut build = CharacterBuild::new();
        for _ in 0..5 {
            assert!(build.increase_ability(Ability::Strength));
        }
        assert_eq!(build.abilities().get(Ability::Strength), 13);
        assert_eq!(build.points_remaining(), 22);
        assert_eq!(build.points_spent(), 5);
    }

    #[test]
    fn test_point_buy_never_exceeds_15() {
        let mut build = CharacterBuild::new();
        for _ in 0..10 {
            build.increase_ability(Ability::Dexterity);
        }
        assert_eq!(build.abilities().get(Ability::Dexterity), 15);
        assert!(!build.can_increase_ability(Ability::Dexterity));
    }

    #[test]
    fn test_point_buy_budget_is_a_hard_ceiling() {
        let mut build = CharacterBuild::new();
        // Three abilities at 15 cost exactly 27 points.
        for ability in [Ability::Strength, Ability::Dexterity, Ability::Constitution] {
            for _ in 0..7 {
                build.increase_ability(ability);
            }
        }
        assert_eq!(build.points_remaining(), 0);
        assert!(!build.increase_ability(Ability::Wisdom));
        assert_eq!(build.abilities().get(Ability::Wisdom), 8);
        assert!(build.points_spent() <= POINT_BUY_TOTAL);
    }

    #[test]
    fn test_point_buy_floor_and_refund() {
        let mut build = CharacterBuild::new();
        assert!(!build.decrease_ability(Ability::Charisma));

        build.increase_ability(Ability::Charisma);
        assert!(build.decrease_ability(Ability::Charisma));
        assert_eq!(build.points_remaining(), 27);
    }

    #[test]
    fn test_toggle_is_idempotent() {
        let mut build = CharacterBuild::new();
        build.cantrips_known = 2;

        assert!(build.toggle_cantrip("fire-bolt"));
        assert_eq!(build.cantrips(), ["fire-bolt".to_string()]);
        assert!(build.toggle_cantrip("fire-bolt"));
        assert!(build.cantrips().is_empty());
    }

    #[test]
    fn test_toggle_past_limit_is_a_no_op() {
        let mut build = CharacterBuild::new();
        build.cantrips_known = 1;

        assert!(build.toggle_cantrip("fire-bolt"));
        assert!(!build.toggle_cantrip("light"));
        assert_eq!(build.cantrips(), ["fire-bolt".to_string()]);
        // The already-selected entry still toggles off.
        assert!(build.toggle_cantrip("fire-bolt"));
    }

    #[test]
    fn test_select_race_resets_subrace() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();
        let mut build = CharacterBuild::new();

        build.select_race(&repo, "elf").unwrap();
        build.select_subrace(&repo, "high-elf").unwrap();
        assert_eq!(build.subrace(), Some("high-elf"));

        build.select_race(&repo, "human").unwrap();
        assert_eq!(build.subrace(), None);
    }

    #[test]
    fn test_select_unknown_race_is_not_found() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();
        let mut build = CharacterBuild::new();

        let err = build.select_race(&repo, "merfolk").unwrap_err();
        assert!(matches!(err, RulesError::NotFound(_)));
        assert_eq!(build.race(), None);
    }

    #[test]
    fn test_select_class_loads_features_and_spell_counts() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();
        let mut build = CharacterBuild::new();

        build.select_class(&repo, "wizard").unwrap();
        assert!(build.features().contains(&"spellcasting-wizard".to_string()));
        assert_eq!(build.cantrips_known(), 3);
        assert_eq!(build.spells_known(), 6);
        assert_eq!(build.proficiency_choose(), 2);
    }

    #[test]
    fn test_select_class_resets_prior_state() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();
        let mut build = CharacterBuild::new();

        build.select_class(&repo, "wizard").unwrap();
        build.toggle_cantrip("fire-bolt");
        build.toggle_spell("magic-missile");
        build.toggle_proficiency_choice("skill-arcana");

        build.select_class(&repo, "fighter").unwrap();
        assert!(build.cantrips().is_empty());
        assert!(build.spells().is_empty());
        assert!(build.proficiency_choices_selected().is_empty());
        assert_eq!(build.cantrips_known(), 0);
        assert_eq!(build.spells_known(), 0);
        assert!(build.features().contains(&"fighting-style".to_string()));
    }

    #[test]
    fn test_visible_steps_for_fighter() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();
        let mut build = CharacterBuild::new();

        build.select_race(&repo, "human").unwrap();
        build.select_class(&repo, "fighter").unwrap();

        let steps = build.visible_steps();
        assert_eq!(
            steps,
            vec![
                CreationStep::Race,
                CreationStep::Class,
                CreationStep::Features,
                CreationStep::Background,
                CreationStep::Abilities,
                CreationStep::ProficiencyChoices,
                CreationStep::Biography,
                CreationStep::Confirmation,
            ]
        );
    }

    #[test]
    fn test_visible_steps_grow_with_choices() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();
        let mut build = CharacterBuild::new();

        let steps = build.visible_steps();
        assert!(!steps.contains(&CreationStep::Subrace));
        assert!(!steps.contains(&CreationStep::Cantrips));

        build.select_race(&repo, "elf").unwrap();
        assert!(build.visible_steps().contains(&CreationStep::Subrace));

        build.select_class(&repo, "wizard").unwrap();
        let steps = build.visible_steps();
        assert!(steps.contains(&CreationStep::Cantrips));
        assert!(steps.contains(&CreationStep::Spells));
        assert!(!steps.contains(&CreationStep::Prepared));
    }

    #[test]
    fn test_prepared_step_for_prepared_casters() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();
        let mut build = CharacterBuild::new();

        build.select_class(&repo, "cleric").unwrap();
        // WIS 8 at this point: capacity floors at 1.
        assert_eq!(build.prepared_capacity(), 1);
        assert!(build.visible_steps().contains(&CreationStep::Prepared));

        // Raising WIS raises the capacity (1 + modifier).
        for _ in 0..6 {
            build.increase_ability(Ability::Wisdom);
        }
        assert_eq!(build.abilities().get(Ability::Wisdom), 14);
        assert_eq!(build.prepared_capacity(), 3);
    }

    #[test]
    fn test_step_completeness_gating() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();
        let mut build = CharacterBuild::new();

        assert!(!build.step_complete(CreationStep::Race));
        build.select_race(&repo, "human").unwrap();
        assert!(build.step_complete(CreationStep::Race));

        build.select_class(&repo, "wizard").unwrap();
        assert!(!build.step_complete(CreationStep::Cantrips));
        build.toggle_cantrip("fire-bolt");
        build.toggle_cantrip("light");
        build.toggle_cantrip("mage-hand");
        assert!(build.step_complete(CreationStep::Cantrips));

        assert!(!build.step_complete(CreationStep::Biography));
        build.set_name("Elara");
        assert!(build.step_complete(CreationStep::Biography));
    }

    #[test]
    fn test_subfeature_options_parsing() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();

        let options = subfeature_options(&repo, "fighting-style")
            .unwrap()
            .expect("fighting style has options");
        assert_eq!(options.choose, 1);
        assert!(options
            .options
            .contains(&"fighter-fighting-style-defense".to_string()));

        assert!(subfeature_options(&repo, "second-wind").unwrap().is_none());
    }
}
