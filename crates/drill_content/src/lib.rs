//! Catalog loading and session start shared between drill_cli and drill_daemon.

use anyhow::{Context, Result};
use drill_core::{
    BadgeDef, BadgeId, BadgeRule, BadgeRuleDef, Content, ExampleId, FlagId, ProgressTracker,
    RewardRules, Session, SimulationId, Track, TrackDef,
};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Deserialize)]
struct ConstantsFile {
    content_version: String,
    rewards: RewardRules,
}

#[derive(Deserialize)]
struct BadgesFile {
    badges: Vec<BadgeDef>,
    policy: Vec<BadgeRuleDef>,
}

const TRACK_FILES: [&str; 2] = ["email_track.json", "sms_track.json"];

/// Validates loaded content, panicking on any authoring error.
///
/// Catches mistakes like: a body segment naming a flag the example does not
/// have, a flag no click target can report, or a badge rule naming an
/// unknown badge or simulation.
pub fn validate_content(content: &Content) {
    let rewards = &content.rewards;
    assert!(
        rewards.per_flag_reward > 0 && rewards.completion_bonus >= 0,
        "rewards must be positive (per_flag_reward={}, completion_bonus={})",
        rewards.per_flag_reward,
        rewards.completion_bonus,
    );
    assert!(
        rewards.points_per_level > 0,
        "points_per_level must be positive, got {}",
        rewards.points_per_level,
    );

    let mut tracks: HashSet<Track> = HashSet::new();
    let mut simulations: HashSet<&SimulationId> = HashSet::new();
    for track_def in &content.tracks {
        assert!(
            tracks.insert(track_def.track),
            "track '{}' is defined more than once",
            track_def.track,
        );
        assert!(
            simulations.insert(&track_def.simulation_id),
            "simulation id '{}' is used by more than one track",
            track_def.simulation_id,
        );
        validate_track(track_def);
    }

    let mut badge_ids: HashSet<&BadgeId> = HashSet::new();
    for badge in &content.badges {
        assert!(!badge.id.0.is_empty(), "badge has empty id");
        assert!(
            badge_ids.insert(&badge.id),
            "badge '{}' is defined more than once",
            badge.id,
        );
    }

    for def in &content.badge_policy {
        assert!(
            badge_ids.contains(&def.badge),
            "badge rule references unknown badge '{}'",
            def.badge,
        );
        if let BadgeRule::AllSimulationsCompleted { simulations: required } = &def.rule {
            assert!(
                !required.is_empty(),
                "badge '{}' requires an empty simulation set",
                def.badge,
            );
            for sim in required {
                assert!(
                    simulations.contains(sim),
                    "badge '{}' requires unknown simulation '{}'",
                    def.badge,
                    sim,
                );
            }
        }
    }
}

fn validate_track(track_def: &TrackDef) {
    assert!(
        !track_def.examples.is_empty(),
        "track '{}' has no examples",
        track_def.track,
    );
    let mut example_ids: HashSet<&ExampleId> = HashSet::new();
    for example in &track_def.examples {
        assert!(
            !example.id.0.is_empty(),
            "track '{}' has an example with empty id",
            track_def.track,
        );
        assert!(
            example_ids.insert(&example.id),
            "example '{}' appears more than once in track '{}'",
            example.id,
            track_def.track,
        );
        assert!(
            !example.red_flags.is_empty(),
            "example '{}' has no red flags",
            example.id,
        );

        let mut flag_ids: HashSet<&FlagId> = HashSet::new();
        for flag in &example.red_flags {
            assert!(
                !flag.id.0.is_empty(),
                "example '{}' has a flag with empty id",
                example.id,
            );
            assert!(
                flag_ids.insert(&flag.id),
                "example '{}' defines flag '{}' more than once",
                example.id,
                flag.id,
            );
        }

        let targets: HashSet<&FlagId> = example
            .sender_flag
            .iter()
            .chain(example.body.iter().filter_map(|segment| segment.flag.as_ref()))
            .collect();
        for target in &targets {
            assert!(
                flag_ids.contains(target),
                "example '{}' click target names unknown flag '{}'",
                example.id,
                target,
            );
        }
        for flag in &flag_ids {
            assert!(
                targets.contains(flag),
                "example '{}' flag '{}' has no click target",
                example.id,
                flag,
            );
        }
    }
}

fn read_json<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T> {
    let text =
        std::fs::read_to_string(dir.join(name)).with_context(|| format!("reading {name}"))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {name}"))
}

pub fn load_content(content_dir: &str) -> Result<Content> {
    let dir = Path::new(content_dir);
    let constants: ConstantsFile = read_json(dir, "constants.json")?;
    let badges_file: BadgesFile = read_json(dir, "badges.json")?;
    let tracks = TRACK_FILES
        .iter()
        .map(|name| read_json::<TrackDef>(dir, name))
        .collect::<Result<Vec<_>>>()?;
    let content = Content {
        content_version: constants.content_version,
        rewards: constants.rewards,
        tracks,
        badges: badges_file.badges,
        badge_policy: badges_file.policy,
    };
    validate_content(&content);
    Ok(content)
}

/// Starts a session on `track` with an id drawn from `rng`.
pub fn start_session<T: ProgressTracker>(
    content: &Content,
    track: Track,
    tracker: T,
    rng: &mut impl Rng,
) -> Result<Session<T>> {
    let track_def = content
        .track(track)
        .with_context(|| format!("content has no '{track}' track"))?;
    let session = Session::new(
        drill_core::generate_session_id(rng),
        track_def,
        content.rewards,
        content.badge_policy.clone(),
        tracker,
    )
    .with_context(|| format!("starting '{track}' session"))?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use drill_core::test_fixtures::{base_content, make_rng};
    use drill_core::{BodySegment, InMemoryProgress, SegmentStyle};

    #[test]
    fn test_valid_content_passes_validation() {
        validate_content(&base_content()); // should not panic
    }

    #[test]
    #[should_panic(expected = "has no click target")]
    fn test_unreachable_flag_panics() {
        let mut content = base_content();
        content.tracks[0].examples[0].body.pop();
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "names unknown flag")]
    fn test_segment_with_unknown_flag_panics() {
        let mut content = base_content();
        content.tracks[0].examples[0].body.push(BodySegment {
            text: "ghost".to_string(),
            style: SegmentStyle::Link,
            flag: Some(FlagId::from("ghost")),
        });
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "names unknown flag")]
    fn test_sender_flag_unknown_panics() {
        let mut content = base_content();
        content.tracks[1].examples[0].sender_flag = Some(FlagId::from("missing"));
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "more than once")]
    fn test_duplicate_flag_panics() {
        let mut content = base_content();
        let duplicate = content.tracks[0].examples[0].red_flags[0].clone();
        content.tracks[0].examples[0].red_flags.push(duplicate);
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "has no red flags")]
    fn test_example_without_flags_panics() {
        let mut content = base_content();
        content.tracks[0].examples[1].red_flags.clear();
        content.tracks[0].examples[1].body.clear();
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "example with empty id")]
    fn test_empty_example_id_panics() {
        let mut content = base_content();
        content.tracks[0].examples[2].id = ExampleId::from("");
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "flag with empty id")]
    fn test_empty_flag_id_panics() {
        let mut content = base_content();
        content.tracks[1].examples[0].red_flags[0].id = FlagId::from("");
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "has no examples")]
    fn test_empty_track_panics() {
        let mut content = base_content();
        content.tracks[1].examples.clear();
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "defined more than once")]
    fn test_duplicate_track_panics() {
        let mut content = base_content();
        let mut copy = content.tracks[0].clone();
        copy.simulation_id = SimulationId::from("phishing-email-2");
        content.tracks.push(copy);
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "unknown badge")]
    fn test_rule_for_unknown_badge_panics() {
        let mut content = base_content();
        content.badge_policy.push(BadgeRuleDef {
            badge: BadgeId::from("nonexistent"),
            rule: BadgeRule::TrackCompleted { tracks: vec![] },
        });
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "unknown simulation")]
    fn test_rule_for_unknown_simulation_panics() {
        let mut content = base_content();
        content.badge_policy.push(BadgeRuleDef {
            badge: BadgeId::from("scam-buster"),
            rule: BadgeRule::AllSimulationsCompleted {
                simulations: vec![SimulationId::from("phishing-email-9")],
            },
        });
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "rewards must be positive")]
    fn test_zero_flag_reward_panics() {
        let mut content = base_content();
        content.rewards.per_flag_reward = 0;
        validate_content(&content);
    }

    #[test]
    fn test_start_session_is_deterministic_per_seed() {
        let content = base_content();
        let a = start_session(&content, Track::Sms, InMemoryProgress::new(), &mut make_rng())
            .unwrap();
        let b = start_session(&content, Track::Sms, InMemoryProgress::new(), &mut make_rng())
            .unwrap();
        assert_eq!(a.id(), b.id());
        assert_eq!(a.track(), Track::Sms);
    }

    #[test]
    fn test_start_session_without_track_fails() {
        let mut content = base_content();
        content.tracks.retain(|t| t.track == Track::Email);
        let result = start_session(&content, Track::Sms, InMemoryProgress::new(), &mut make_rng());
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_reports_name() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_content(dir.path().to_str().unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("constants.json"));
    }
}
