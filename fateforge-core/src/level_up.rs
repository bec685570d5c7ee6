//! Level-up accumulation and application.
//!
//! [`LevelUpBuild`] is scoped to a single level transition. It is loaded
//! from the class's rules record for `level + 1`, collects the player's
//! choices for that transition, and applies them to the existing character
//! in place — previously resolved state (inventory, equip state, prepared
//! spells) stays untouched except where the level-up explicitly adds to it.

use crate::character_builder::{
    class_proficiency_choose, feature_indices, proficiency_choice_options, spell_counts,
    SubfeatureChoice,
};
use crate::resolver::{
    apply_feature_choices, instantiate_proficiency, instantiate_spell, merge_class_specific,
    slot_totals,
};
use crate::rules::{RulesError, RulesRepository};
use crate::world::{Ability, AbilityScores, Character};
use serde_json::Value;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::warn;

/// Characters cap out at level 20.
pub const MAX_LEVEL: u8 = 20;

/// Total XP needed to reach `level`, from the dataset's level-up table.
pub fn xp_required_for(repo: &RulesRepository, level: u8) -> Option<i64> {
    let table = repo.get("rules/level_up").ok()?;
    let entries = table.as_array()?;
    entries
        .iter()
        .find(|entry| entry.get("level").and_then(Value::as_u64) == Some(level as u64))
        .and_then(|entry| entry.get("xp_required_total"))
        .and_then(Value::as_i64)
}

/// Whether the character has the XP for the next level.
pub fn can_level_up(character: &Character, repo: &RulesRepository) -> bool {
    if character.level >= MAX_LEVEL {
        return false;
    }
    match xp_required_for(repo, character.level + 1) {
        Some(required) => character.xp >= required,
        None => false,
    }
}

/// The level-up wizard's steps, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelUpStep {
    Features,
    Abilities,
    Cantrips,
    Spells,
    ProficiencyChoices,
    Confirmation,
}

impl LevelUpStep {
    pub fn name(&self) -> &'static str {
        match self {
            LevelUpStep::Features => "features",
            LevelUpStep::Abilities => "abilities",
            LevelUpStep::Cantrips => "cantrips",
            LevelUpStep::Spells => "spells",
            LevelUpStep::ProficiencyChoices => "proficiency_choices",
            LevelUpStep::Confirmation => "confirmation",
        }
    }
}

/// Accumulates all choices for one level transition.
#[derive(Debug, Clone)]
pub struct LevelUpBuild {
    new_level: u8,
    level_data: Rc<Value>,

    // Ability score improvement, bounded by the level record's budget and
    // the 20 cap on the resulting score.
    base_abilities: AbilityScores,
    ability_score_bonuses: u8,
    ability_increases: BTreeMap<Ability, u8>,

    // Features unlocked by the new level.
    features: Vec<String>,
    feature_choices: BTreeMap<String, SubfeatureChoice>,

    // Newly learnable spells: the increase in the class-table counts
    // between the old and new level.
    new_cantrips: Vec<String>,
    new_cantrips_available: usize,
    new_spells: Vec<String>,
    new_spells_available: usize,

    // Proficiency choices declared by the level record itself. Class-level
    // proficiency choices apply only at character creation, never here.
    proficiency_choices_selected: Vec<String>,
    proficiency_options: Vec<String>,
    proficiency_choose: usize,
}

impl LevelUpBuild {
    /// Start a level-up for `character`'s next level.
    ///
    /// Fails with NotFound when the class has no record for that level
    /// (including past [`MAX_LEVEL`]).
    pub fn for_character(
        character: &Character,
        repo: &RulesRepository,
    ) -> Result<LevelUpBuild, RulesError> {
        let class_index = &character.class.index;
        let new_level = character.level + 1;
        let level_data = repo.get(&format!("classes/{class_index}/levels/{new_level}"))?;

        let ability_score_bonuses = level_data
            .get("ability_score_bonuses")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u8;

        let features = feature_indices(&level_data);

        // New spell counts are the table delta; a failed lookup of the
        // prior level means zero available, not an error.
        let (mut cantrips_available, mut spells_available) = (0, 0);
        if character.spellcasting.is_some() {
            let (new_cantrips, new_spells) = spell_counts(&level_data);
            match repo.get(&format!("classes/{class_index}/levels/{}", character.level)) {
                Ok(prev_level) => {
                    let (old_cantrips, old_spells) = spell_counts(&prev_level);
                    cantrips_available = new_cantrips.saturating_sub(old_cantrips);
                    spells_available = new_spells.saturating_sub(old_spells);
                }
                Err(err) => {
                    warn!(class = class_index.as_str(), %err, "prior level table missing");
                }
            }
        }

        Ok(LevelUpBuild {
            new_level,
            base_abilities: character.abilities.clone(),
            ability_score_bonuses,
            ability_increases: BTreeMap::new(),
            features,
            feature_choices: BTreeMap::new(),
            new_cantrips: Vec::new(),
            new_cantrips_available: cantrips_available,
            new_spells: Vec::new(),
            new_spells_available: spells_available,
            proficiency_choices_selected: Vec::new(),
            proficiency_options: proficiency_choice_options(&level_data),
            proficiency_choose: class_proficiency_choose(&level_data),
            level_data,
        })
    }

    pub fn new_level(&self) -> u8 {
        self.new_level
    }

    pub fn ability_score_bonuses(&self) -> u8 {
        self.ability_score_bonuses
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn new_cantrips_available(&self) -> usize {
        self.new_cantrips_available
    }

    pub fn new_spells_available(&self) -> usize {
        self.new_spells_available
    }

    pub fn proficiency_options(&self) -> &[String] {
        &self.proficiency_options
    }

    // ------------------------------------------------------------------
    // Ability improvement
    // ------------------------------------------------------------------

    fn points_allocated(&self) -> u8 {
        self.ability_increases.values().sum()
    }

    /// The score an ability would have after the pending increases.
    pub fn improved_score(&self, ability: Ability) -> u8 {
        self.base_abilities.get(ability) + self.ability_increases.get(&ability).copied().unwrap_or(0)
    }

    /// Allocate one improvement point. Fails silently when the budget is
    /// spent or the score would pass 20.
    pub fn increase_ability(&mut self, ability: Ability) -> bool {
        if self.points_allocated() >= self.ability_score_bonuses {
            return false;
        }
        if self.improved_score(ability) >= 20 {
            return false;
        }
        *self.ability_increases.entry(ability).or_insert(0) += 1;
        true
    }

    /// Return one allocated point.
    pub fn decrease_ability(&mut self, ability: Ability) -> bool {
        match self.ability_increases.get_mut(&ability) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    self.ability_increases.remove(&ability);
                }
                true
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Bounded toggles
    // ------------------------------------------------------------------

    pub fn toggle_new_cantrip(&mut self, index: &str) -> bool {
        toggle(&mut self.new_cantrips, index, self.new_cantrips_available)
    }

    pub fn new_cantrips(&self) -> &[String] {
        &self.new_cantrips
    }

    pub fn toggle_new_spell(&mut self, index: &str) -> bool {
        toggle(&mut self.new_spells, index, self.new_spells_available)
    }

    pub fn new_spells(&self) -> &[String] {
        &self.new_spells
    }

    pub fn toggle_proficiency_choice(&mut self, index: &str) -> bool {
        toggle(
            &mut self.proficiency_choices_selected,
            index,
            self.proficiency_choose,
        )
    }

    pub fn proficiency_choices_selected(&self) -> &[String] {
        &self.proficiency_choices_selected
    }

    /// Record a subfeature decision for a newly unlocked feature.
    pub fn choose_feature_subfeature(&mut self, parent: &str, choice: SubfeatureChoice) {
        self.feature_choices.insert(parent.to_string(), choice);
    }

    // ------------------------------------------------------------------
    // Step sequencing
    // ------------------------------------------------------------------

    /// The visible steps for this transition. A level with nothing to
    /// decide shows only the confirmation.
    pub fn visible_steps(&self) -> Vec<LevelUpStep> {
        let mut steps = Vec::new();
        if !self.features.is_empty() {
            steps.push(LevelUpStep::Features);
        }
        if self.ability_score_bonuses > 0 {
            steps.push(LevelUpStep::Abilities);
        }
        if self.new_cantrips_available > 0 {
            steps.push(LevelUpStep::Cantrips);
        }
        if self.new_spells_available > 0 {
            steps.push(LevelUpStep::Spells);
        }
        if !self.proficiency_options.is_empty() {
            steps.push(LevelUpStep::ProficiencyChoices);
        }
        steps.push(LevelUpStep::Confirmation);
        steps
    }

    // ------------------------------------------------------------------
    // Application
    // ------------------------------------------------------------------

    /// Apply this level-up to the character, in place.
    ///
    /// Ability deltas land before anything derived from them; the HP gain
    /// comes last of the stat changes so a CON increase taken this level
    /// already counts toward it.
    pub fn apply(&self, character: &mut Character, repo: &RulesRepository) {
        character.level = self.new_level;

        for (&ability, &delta) in &self.ability_increases {
            character.abilities.apply_bonus(ability, delta as i8);
        }

        for feature in &self.features {
            if !character.features.contains(feature) {
                character.features.push(feature.clone());
            }
        }
        apply_feature_choices(&mut character.features, &self.feature_choices);

        let proficiency_bonus = character.proficiency_bonus();
        let abilities = character.abilities.clone();
        if let Some(spellcasting) = character.spellcasting.as_mut() {
            for index in self.new_cantrips.iter().chain(self.new_spells.iter()) {
                if spellcasting.knows_spell(index) {
                    continue;
                }
                match instantiate_spell(repo, index) {
                    Ok(spell) => spellcasting.learned_spells.push(spell),
                    Err(err) => {
                        warn!(spell = index.as_str(), %err, "skipping unresolved spell")
                    }
                }
            }
            spellcasting.slots.set_totals(slot_totals(&self.level_data));
            spellcasting.recompute_save_dc(&abilities, proficiency_bonus);
        }

        for index in &self.proficiency_choices_selected {
            if character.proficiencies.iter().any(|p| &p.index == index) {
                continue;
            }
            match instantiate_proficiency(repo, index) {
                Ok(proficiency) => character.proficiencies.push(proficiency),
                Err(err) => {
                    warn!(proficiency = index.as_str(), %err, "skipping unresolved proficiency")
                }
            }
        }

        // HP gain uses the CON modifier as improved this level; no floor.
        let con_mod = character.abilities.modifier(Ability::Constitution) as i32;
        let gain = character.class.hit_die as i32 + con_mod;
        character.max_hit_points += gain;
        character.hit_points += gain;

        merge_class_specific(&mut character.class_specific, &self.level_data);
    }
}

/// Same click-to-toggle behavior as character creation.
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character_builder::CharacterBuild;
    use crate::testing::FixtureDataset;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fighter(repo: &RulesRepository) -> Character {
        let mut build = CharacterBuild::new();
        build.set_name("Bron");
        build.select_race(repo, "human").unwrap();
        build.select_class(repo, "fighter").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        build.resolve(repo, &mut rng).unwrap()
    }

    fn wizard(repo: &RulesRepository) -> Character {
        let mut build = CharacterBuild::new();
        build.set_name("Elara");
        build.select_race(repo, "elf").unwrap();
        build.select_class(repo, "wizard").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        build.resolve(repo, &mut rng).unwrap()
    }

    #[test]
    fn test_no_abilities_step_without_bonus_budget() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();
        let character = fighter(&repo);

        // Fighter level 2 grants no ability score bonuses.
        let build = LevelUpBuild::for_character(&character, &repo).unwrap();
        assert_eq!(build.ability_score_bonuses(), 0);
        assert!(!build.visible_steps().contains(&LevelUpStep::Abilities));
        assert!(build.visible_steps().contains(&LevelUpStep::Features));
    }

    #[test]
    fn test_ability_budget_and_cap() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();
        let mut character = fighter(&repo);
        character.level = 2;

        // Fighter level 3 in the fixture carries a 2-point improvement.
        let mut build = LevelUpBuild::for_character(&character, &repo).unwrap();
        assert_eq!(build.ability_score_bonuses(), 2);
        assert!(build.visible_steps().contains(&LevelUpStep::Abilities));

        assert!(build.increase_ability(Ability::Strength));
        assert!(build.increase_ability(Ability::Strength));
        assert!(!build.increase_ability(Ability::Strength));
        assert!(build.decrease_ability(Ability::Strength));
        assert!(build.increase_ability(Ability::Wisdom));
    }

    #[test]
    fn test_ability_cap_at_twenty() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();
        let mut character = fighter(&repo);
        character.level = 2;
        character.abilities.set(Ability::Strength, 20);

        let mut build = LevelUpBuild::for_character(&character, &repo).unwrap();
        assert!(!build.increase_ability(Ability::Strength));
        assert!(build.increase_ability(Ability::Dexterity));
    }

    #[test]
    fn test_proficiency_choices_come_from_level_record_only() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();

        // Fighter level 2 declares none, even though the class record has
        // creation-time proficiency choices.
        let character = fighter(&repo);
        let build = LevelUpBuild::for_character(&character, &repo).unwrap();
        assert!(build.proficiency_options().is_empty());
        assert!(!build
            .visible_steps()
            .contains(&LevelUpStep::ProficiencyChoices));

        // Fighter level 3 declares its own.
        let mut leveled = fighter(&repo);
        leveled.level = 2;
        let build = LevelUpBuild::for_character(&leveled, &repo).unwrap();
        assert_eq!(build.proficiency_options(), ["skill-intimidation".to_string()]);
    }

    #[test]
    fn test_spell_counts_are_table_deltas() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();
        let character = wizard(&repo);

        let build = LevelUpBuild::for_character(&character, &repo).unwrap();
        // Fixture wizard: cantrips 3 -> 3, spells 6 -> 8.
        assert_eq!(build.new_cantrips_available(), 0);
        assert_eq!(build.new_spells_available(), 2);
        let steps = build.visible_steps();
        assert!(!steps.contains(&LevelUpStep::Cantrips));
        assert!(steps.contains(&LevelUpStep::Spells));
    }

    #[test]
    fn test_spell_toggle_bounded_by_delta() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();
        let character = wizard(&repo);

        let mut build = LevelUpBuild::for_character(&character, &repo).unwrap();
        assert!(build.toggle_new_spell("sleep"));
        assert!(build.toggle_new_spell("burning-hands"));
        assert!(!build.toggle_new_spell("shield"));
        assert_eq!(build.new_spells().len(), 2);
    }

    #[test]
    fn test_level_past_table_is_not_found() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();
        let mut character = fighter(&repo);
        character.level = 19;

        let err = LevelUpBuild::for_character(&character, &repo).unwrap_err();
        assert!(matches!(err, RulesError::NotFound(_)));
    }

    #[test]
    fn test_xp_table() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();

        assert_eq!(xp_required_for(&repo, 2), Some(300));
        assert_eq!(xp_required_for(&repo, 3), Some(900));
        assert_eq!(xp_required_for(&repo, 99), None);

        let mut character = fighter(&repo);
        assert!(!can_level_up(&character, &repo));
        character.xp = 300;
        assert!(can_level_up(&character, &repo));
        character.level = MAX_LEVEL;
        assert!(!can_level_up(&character, &repo));
    }
}
