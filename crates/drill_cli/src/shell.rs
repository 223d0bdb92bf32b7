//! Terminal rendering and command parsing for interactive play.

use drill_core::{
    Action, BodySegment, Content, Event, EventEnvelope, Example, FlagId, RedFlag, SegmentStyle,
    SessionView, UserProgress,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play(Action),
    ToggleHints,
    Show,
    Help,
    Quit,
}

pub const HELP: &str = "commands: flag <n|id>, undo, next, prev, hints, show, help, quit";

/// Parses one input line. `flag 2` names the second flag of the current
/// example; anything else after `flag` is taken as a flag id.
pub fn parse_command(line: &str, example: &Example) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".to_string());
    };
    let command = match verb {
        "flag" | "f" => {
            let target = words
                .next()
                .ok_or_else(|| "usage: flag <n|id>".to_string())?;
            Command::Play(Action::MarkFound {
                flag: resolve_flag(target, example),
            })
        }
        "undo" | "u" => Command::Play(Action::Undo),
        "next" | "n" => Command::Play(Action::Next),
        "prev" | "p" => Command::Play(Action::Previous),
        "hints" | "h" => Command::ToggleHints,
        "show" | "s" => Command::Show,
        "help" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => return Err(format!("unknown command '{other}'")),
    };
    Ok(command)
}

fn resolve_flag(target: &str, example: &Example) -> FlagId {
    target
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| example.red_flags.get(index))
        .map_or_else(|| FlagId::from(target), |flag| flag.id.clone())
}

/// Click-target marker for a flag: its 1-based number, or `x` once found.
fn marker(example: &Example, flag: &FlagId) -> String {
    match example.red_flags.iter().position(|f| f.id == *flag) {
        Some(index) if example.red_flags[index].found => "[x]".to_string(),
        Some(index) => format!("[{}]", index + 1),
        None => "[?]".to_string(),
    }
}

/// Hint overlay row: the hint until the flag is found, then its description.
fn hint_line(index: usize, flag: &RedFlag) -> String {
    let state = if flag.found { "found" } else { "hint" };
    format!("  {}. {state}: {}", index + 1, flag.hint_text())
}

fn render_segment(example: &Example, segment: &BodySegment) -> String {
    let text = match segment.style {
        SegmentStyle::Alert => segment.text.to_uppercase(),
        SegmentStyle::Link => format!("<{}>", segment.text),
        SegmentStyle::Footer => format!("-- {}", segment.text),
        SegmentStyle::Plain | SegmentStyle::Details => segment.text.clone(),
    };
    match &segment.flag {
        Some(flag) => format!("{} {text}", marker(example, flag)),
        None => format!("    {text}"),
    }
}

pub fn print_view(view: &SessionView, show_hints: bool) {
    let example = &view.example;
    println!("{}", "-".repeat(80));
    println!(
        "{}  example {}/{}  \"{}\"",
        view.display_name,
        view.example_index + 1,
        view.example_count,
        example.title,
    );
    let sender_marker = example
        .sender_flag
        .as_ref()
        .map(|flag| format!(" {}", marker(example, flag)))
        .unwrap_or_default();
    println!("From: {}{sender_marker}", example.sender);
    if let Some(subject) = &example.subject {
        println!("Subject: {subject}");
    }
    println!();
    for segment in &example.body {
        println!("{}", render_segment(example, segment));
    }
    println!();
    println!(
        "Found {}/{} red flags ({:.0}%)  points this session: {}",
        view.flags_found,
        view.total_flags,
        view.progress_ratio() * 100.0,
        view.points_earned,
    );
    if show_hints {
        for (index, flag) in example.red_flags.iter().enumerate() {
            println!("{}", hint_line(index, flag));
        }
    }
}

/// Line for one notable event. `examples` is the whole track, so a discovery
/// resolves against the example it happened in.
pub fn event_line(event: &Event, content: &Content, examples: &[Example]) -> Option<String> {
    match event {
        Event::FlagFound { example, flag } => examples
            .iter()
            .find(|e| e.id == *example)
            .and_then(|e| e.flag(flag))
            .map(|found| format!("Found: {} - {}", found.title, found.description)),
        Event::FlagUndone { flag, .. } => Some(format!("Undid {flag}")),
        Event::ExampleCompleted { .. } => {
            Some("All red flags found in this example. Type 'next' to continue.".to_string())
        }
        Event::PointsAwarded { delta, .. } => Some(format!("{delta:+} points")),
        Event::BadgeUnlocked { badge } => {
            let name = content.badge(badge).map_or(badge.0.as_str(), |b| b.name.as_str());
            Some(format!("*** BADGE UNLOCKED: {name} ***"))
        }
        Event::SimulationCompleted { simulation, summary } => Some(format!(
            "*** {simulation} COMPLETE: score={} flags={}/{} time_taken={}s ***",
            summary.score,
            summary.red_flags_found,
            summary.total_red_flags,
            summary.time_taken_secs,
        )),
        Event::ExampleReopened { .. } | Event::ExampleChanged { .. } => None,
    }
}

pub fn print_events(events: &[EventEnvelope], content: &Content, examples: &[Example]) {
    for envelope in events {
        if let Some(line) = event_line(&envelope.event, content, examples) {
            println!("{line}");
        }
    }
}

pub fn print_progress(progress: &UserProgress, content: &Content) {
    let badges: Vec<&str> = progress
        .badges
        .iter()
        .map(|id| content.badge(id).map_or(id.0.as_str(), |b| b.name.as_str()))
        .collect();
    println!(
        "points={}  level={}  completed={}  badges=[{}]",
        progress.points,
        progress.level(content.rewards.points_per_level),
        progress.completed_simulations.len(),
        badges.join(", "),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use drill_core::test_fixtures::{base_content, example, red_flag};
    use drill_core::ExampleId;

    #[test]
    fn numbered_flag_resolves_to_current_example() {
        let ex = example("bank", &["a1", "a2", "a3"]);
        assert_eq!(
            parse_command("flag 2", &ex),
            Ok(Command::Play(Action::MarkFound {
                flag: FlagId::from("a2")
            }))
        );
    }

    #[test]
    fn out_of_range_number_is_taken_as_id() {
        let ex = example("bank", &["a1"]);
        assert_eq!(
            parse_command("f 7", &ex),
            Ok(Command::Play(Action::MarkFound {
                flag: FlagId::from("7")
            }))
        );
    }

    #[test]
    fn flag_without_target_is_an_error() {
        let ex = example("bank", &["a1"]);
        assert!(parse_command("flag", &ex).is_err());
        assert!(parse_command("   ", &ex).is_err());
        assert!(parse_command("jump", &ex).is_err());
    }

    #[test]
    fn navigation_words_map_to_actions() {
        let ex = example("bank", &["a1"]);
        assert_eq!(parse_command("prev", &ex), Ok(Command::Play(Action::Previous)));
        assert_eq!(parse_command("undo", &ex), Ok(Command::Play(Action::Undo)));
        assert_eq!(parse_command("hints", &ex), Ok(Command::ToggleHints));
        assert_eq!(parse_command("q", &ex), Ok(Command::Quit));
    }

    #[test]
    fn found_flags_are_marked_in_body() {
        let mut ex = example("bank", &["a1", "a2"]);
        ex.red_flags[1].found = true;
        let lines: Vec<String> = ex.body.iter().map(|s| render_segment(&ex, s)).collect();
        assert!(lines[0].starts_with("[1]"));
        assert!(lines[1].starts_with("[x]"));
    }

    #[test]
    fn hint_overlay_reveals_description_once_found() {
        let mut flag = red_flag("a1");
        flag.hint = "Look at the sender".to_string();
        flag.description = "The domain is misspelled".to_string();
        assert_eq!(hint_line(0, &flag), "  1. hint: Look at the sender");
        flag.found = true;
        assert_eq!(hint_line(2, &flag), "  3. found: The domain is misspelled");
    }

    #[test]
    fn discovery_lines_resolve_against_their_own_example() {
        let content = base_content();
        let mut examples = vec![example("bank", &["a1"]), example("prize", &["b1"])];
        examples[0].red_flags[0].title = "Fake sender".to_string();
        let event = Event::FlagFound {
            example: ExampleId::from("bank"),
            flag: FlagId::from("a1"),
        };
        let line = event_line(&event, &content, &examples).unwrap();
        assert!(line.starts_with("Found: Fake sender"), "{line}");

        let wrong_example = Event::FlagFound {
            example: ExampleId::from("prize"),
            flag: FlagId::from("a1"),
        };
        assert_eq!(event_line(&wrong_example, &content, &examples), None);
    }
}
