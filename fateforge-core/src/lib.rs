//! D&D 5e character construction and progression engine.
//!
//! This crate turns a sequence of player choices — race, class, abilities,
//! spells, proficiencies, equipment — into a fully resolved character, and
//! advances existing characters one level at a time under the same rules.
//! It is a library: the UI layers drive the builders and render the
//! results, the rules live here.
//!
//! - [`rules::RulesRepository`] — read-only lookup over the static 5e JSON
//!   dataset.
//! - [`character_builder::CharacterBuild`] — step-based creation
//!   accumulator with a dynamically computed step list.
//! - [`level_up::LevelUpBuild`] — the same accumulation pattern, scoped to
//!   one level transition, applied to a character in place.
//! - [`resolver`] — turns a finished build into a [`world::Character`],
//!   including randomized starting-equipment and NPC stock resolution.
//!
//! # Quick Start
//!
//! ```ignore
//! use fateforge_core::{CharacterBuild, RulesRepository};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let repo = RulesRepository::new("data/api/2014");
//! let mut rng = StdRng::seed_from_u64(42);
//!
//! let mut build = CharacterBuild::new();
//! build.set_name("Elara");
//! build.select_race(&repo, "elf")?;
//! build.select_class(&repo, "wizard")?;
//! build.toggle_cantrip("fire-bolt");
//!
//! let character = build.resolve(&repo, &mut rng)?;
//! println!("{character}");
//! # Ok::<(), fateforge_core::RulesError>(())
//! ```

pub mod character_builder;
pub mod items;
pub mod level_up;
pub mod resolver;
pub mod rules;
pub mod spells;
pub mod testing;
pub mod world;

// Primary public API
pub use character_builder::{CharacterBuild, CreationStep, SubfeatureChoice};
pub use items::EquipmentInstance;
pub use level_up::{can_level_up, LevelUpBuild, LevelUpStep, MAX_LEVEL};
pub use resolver::{generate_npc, generate_npc_stock, NpcSeed};
pub use rules::{RulesError, RulesRepository};
pub use spells::Spell;
pub use world::{Ability, AbilityScores, Character, Npc};
