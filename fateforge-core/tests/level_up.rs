//! End-to-end level-up flows over the fixture ruleset.

use fateforge_core::character_builder::SubfeatureChoice;
use fateforge_core::testing::FixtureDataset;
use fateforge_core::world::Ability;
use fateforge_core::{Character, CharacterBuild, LevelUpBuild, LevelUpStep, RulesRepository};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn build_wizard(repo: &RulesRepository) -> Character {
    let mut rng = StdRng::seed_from_u64(21);
    let mut build = CharacterBuild::new();
    build.set_name("Elara");
    build.select_race(repo, "elf").unwrap();
    build.select_class(repo, "wizard").unwrap();
    build.toggle_cantrip("fire-bolt");
    build.toggle_spell("magic-missile");
    build.toggle_spell("shield");
    build.resolve(repo, &mut rng).unwrap()
}

fn build_fighter(repo: &RulesRepository) -> Character {
    let mut rng = StdRng::seed_from_u64(22);
    let mut build = CharacterBuild::new();
    build.set_name("Bron");
    build.select_race(repo, "human").unwrap();
    build.select_class(repo, "fighter").unwrap();
    build.resolve(repo, &mut rng).unwrap()
}

#[test]
fn test_wizard_level_2_full_flow() {
    let fixture = FixtureDataset::new();
    let repo = fixture.repository();
    let mut character = build_wizard(&repo);

    let hp_before = character.max_hit_points;
    let inventory_before: Vec<_> = character.inventory.iter().map(|i| i.id).collect();
    let learned_before = character
        .spellcasting
        .as_ref()
        .unwrap()
        .learned_spells
        .len();

    let mut level_up = LevelUpBuild::for_character(&character, &repo).unwrap();
    assert_eq!(level_up.new_level(), 2);
    // shield is already known; sleep and burning-hands are new.
    assert!(level_up.toggle_new_spell("shield"));
    assert!(level_up.toggle_new_spell("sleep"));
    assert!(!level_up.toggle_new_spell("burning-hands"));

    level_up.apply(&mut character, &repo);

    assert_eq!(character.level, 2);

    let spellcasting = character.spellcasting.as_ref().unwrap();
    // shield was skipped as already known, sleep was added.
    assert_eq!(spellcasting.learned_spells.len(), learned_before + 1);
    assert!(spellcasting.knows_spell("sleep"));

    // Slot table recomputed from the level 2 record.
    assert_eq!(spellcasting.slots.slots[0].total, 3);

    // HP grew by hit die + CON modifier (elf wizard, CON 8, modifier -1).
    assert_eq!(character.max_hit_points, hp_before + 5);
    assert_eq!(character.hit_points, character.max_hit_points);

    // New feature appended; inventory untouched.
    assert!(character.has_feature("arcane-tradition"));
    let inventory_after: Vec<_> = character.inventory.iter().map(|i| i.id).collect();
    assert_eq!(inventory_after, inventory_before);
}

#[test]
fn test_level_up_without_bonus_budget_never_touches_abilities() {
    let fixture = FixtureDataset::new();
    let repo = fixture.repository();
    let mut character = build_fighter(&repo);

    let scores_before = character.abilities.clone();
    let mut level_up = LevelUpBuild::for_character(&character, &repo).unwrap();
    assert!(!level_up.visible_steps().contains(&LevelUpStep::Abilities));
    // Allocation attempts bounce off the zero budget.
    assert!(!level_up.increase_ability(Ability::Strength));

    level_up.apply(&mut character, &repo);
    assert_eq!(character.abilities, scores_before);
    assert_eq!(character.level, 2);
}

#[test]
fn test_con_improvement_counts_toward_this_levels_hp() {
    let fixture = FixtureDataset::new();
    let repo = fixture.repository();
    let mut character = build_fighter(&repo);
    character.level = 2;

    // Human fighter: CON 8 + 1 = 9, modifier -1. Improving CON twice at
    // level 3 brings it to 11, modifier 0, so the gain is a full hit die.
    let hp_before = character.max_hit_points;
    let mut level_up = LevelUpBuild::for_character(&character, &repo).unwrap();
    assert!(level_up.increase_ability(Ability::Constitution));
    assert!(level_up.increase_ability(Ability::Constitution));

    level_up.apply(&mut character, &repo);

    assert_eq!(character.abilities.constitution, 11);
    assert_eq!(character.max_hit_points, hp_before + 10);
}

#[test]
fn test_hp_gain_has_no_floor() {
    let fixture = FixtureDataset::new();
    let repo = fixture.repository();
    let mut character = build_wizard(&repo);
    character.abilities.set(Ability::Constitution, 3);

    let hp_before = character.max_hit_points;
    let level_up = LevelUpBuild::for_character(&character, &repo).unwrap();
    level_up.apply(&mut character, &repo);

    // Hit die 6 with a -4 modifier: the gain is 2, not floored to the die.
    assert_eq!(character.max_hit_points, hp_before + 2);
}

#[test]
fn test_subfeature_choice_replaces_parent_on_level_up() {
    let fixture = FixtureDataset::new();
    let repo = fixture.repository();
    let mut character = build_fighter(&repo);

    // Creation left the fighting style undecided.
    assert!(character.has_feature("fighting-style"));

    let mut level_up = LevelUpBuild::for_character(&character, &repo).unwrap();
    level_up.choose_feature_subfeature(
        "fighting-style",
        SubfeatureChoice::One("fighter-fighting-style-defense".to_string()),
    );
    level_up.apply(&mut character, &repo);

    assert!(!character.has_feature("fighting-style"));
    assert!(character.has_feature("fighter-fighting-style-defense"));
    assert!(character.has_feature("action-surge"));
}

#[test]
fn test_class_specific_merges_accumulate_and_overwrite() {
    let fixture = FixtureDataset::new();
    let repo = fixture.repository();
    let mut character = build_fighter(&repo);
    assert!(character.class_specific.is_empty());

    let level_up = LevelUpBuild::for_character(&character, &repo).unwrap();
    level_up.apply(&mut character, &repo);
    assert_eq!(
        character.class_specific.get("action_surges").and_then(|v| v.as_u64()),
        Some(1)
    );

    let level_up = LevelUpBuild::for_character(&character, &repo).unwrap();
    level_up.apply(&mut character, &repo);
    // Level 3 keeps action_surges and adds indomitable_uses.
    assert_eq!(
        character.class_specific.get("action_surges").and_then(|v| v.as_u64()),
        Some(1)
    );
    assert_eq!(
        character.class_specific.get("indomitable_uses").and_then(|v| v.as_u64()),
        Some(0)
    );
}

#[test]
fn test_level_record_proficiency_choice_applies() {
    let fixture = FixtureDataset::new();
    let repo = fixture.repository();
    let mut character = build_fighter(&repo);
    character.level = 2;

    let mut level_up = LevelUpBuild::for_character(&character, &repo).unwrap();
    assert!(level_up
        .visible_steps()
        .contains(&LevelUpStep::ProficiencyChoices));
    assert!(level_up.toggle_proficiency_choice("skill-intimidation"));
    level_up.apply(&mut character, &repo);

    assert!(character
        .proficiencies
        .iter()
        .any(|p| p.index == "skill-intimidation"));
}

#[test]
fn test_prepared_spells_survive_level_up() {
    let fixture = FixtureDataset::new();
    let repo = fixture.repository();
    let mut rng = StdRng::seed_from_u64(31);

    let mut build = CharacterBuild::new();
    build.set_name("Adra");
    build.select_race(&repo, "human").unwrap();
    build.select_class(&repo, "cleric").unwrap();
    build.toggle_prepared_spell("cure-wounds");
    let mut character = build.resolve(&repo, &mut rng).unwrap();

    // No cleric level 2 table in the fixture: the level-up cannot start,
    // and the character is left exactly as it was.
    let before = character.clone();
    assert!(LevelUpBuild::for_character(&character, &repo).is_err());
    assert_eq!(
        character.spellcasting.as_ref().unwrap().prepared_spells,
        before.spellcasting.as_ref().unwrap().prepared_spells
    );

    // A wizard's level-up leaves prepared state untouched too.
    let mut wizard = build_wizard(&repo);
    let prepared_before = wizard
        .spellcasting
        .as_ref()
        .unwrap()
        .prepared_spells
        .clone();
    let level_up = LevelUpBuild::for_character(&wizard, &repo).unwrap();
    level_up.apply(&mut wizard, &repo);
    assert_eq!(
        wizard.spellcasting.as_ref().unwrap().prepared_spells,
        prepared_before
    );
}

#[test]
fn test_hp_monotonicity_across_levels() {
    let fixture = FixtureDataset::new();
    let repo = fixture.repository();
    let mut character = build_fighter(&repo);

    // Two successive level-ups; each gain is at least hit die + modifier,
    // and with a non-negative modifier at least the hit die.
    for _ in 0..2 {
        let hp_before = character.max_hit_points;
        let con_mod = character.abilities.modifier(Ability::Constitution) as i32;
        let level_up = LevelUpBuild::for_character(&character, &repo).unwrap();
        level_up.apply(&mut character, &repo);
        assert_eq!(
            character.max_hit_points,
            hp_before + character.class.hit_die as i32 + con_mod
        );
    }
    assert_eq!(character.level, 3);
}
