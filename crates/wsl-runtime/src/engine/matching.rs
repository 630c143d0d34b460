use std::time::Duration;

use regex::{Regex, RegexBuilder};
use wsl_core::ScriptError;

use super::signals::{deadline_after, Interrupt, WaitOutcome, Waiter};
use super::stream::{GameStream, StreamEvent, Subscription};

#[derive(Debug, Clone)]
pub enum Matcher {
    /// Literal substring.
    Text(String),
    Regex(Regex),
}

impl Matcher {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn regex(pattern: &str, case_insensitive: bool) -> Result<Self, ScriptError> {
        RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map(Self::Regex)
            .map_err(|error| {
                ScriptError::new(
                    "ENGINE_MATCH_PATTERN",
                    format!("Invalid regular expression \"{}\": {}", pattern, error),
                )
            })
    }

    /// Capture groups on a hit; index 0 is the whole match. Literal
    /// matchers hit with no groups.
    pub fn find(&self, line: &str) -> Option<Vec<String>> {
        match self {
            Self::Text(text) => line.contains(text.as_str()).then(Vec::new),
            Self::Regex(regex) => regex.captures(line).map(|captures| {
                captures
                    .iter()
                    .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect()
            }),
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, Self::Regex(_))
    }
}

#[derive(Debug, Clone)]
pub struct PendingMatch {
    pub matcher: Matcher,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchHit {
    pub label: String,
    /// Present for regex matchers only.
    pub groups: Option<Vec<String>>,
}

/// First pending match (in registration order) that hits the line.
pub fn first_hit(pending: &[PendingMatch], line: &str) -> Option<MatchHit> {
    pending.iter().find_map(|entry| {
        entry.matcher.find(line).map(|groups| MatchHit {
            label: entry.label.clone(),
            groups: entry.matcher.is_regex().then_some(groups),
        })
    })
}

/// Matches registered by `match`/`matchre`, awaiting the next `matchwait`.
///
/// The stream is subscribed on the first registration so lines that
/// arrive before `matchwait` starts blocking are still seen.
#[derive(Debug, Default)]
pub struct MatchCoordinator {
    pending: Vec<PendingMatch>,
    subscription: Option<Subscription>,
}

impl MatchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, matcher: Matcher, label: impl Into<String>, stream: &GameStream) {
        if self.subscription.is_none() {
            self.subscription = Some(stream.subscribe());
        }
        self.pending.push(PendingMatch {
            matcher,
            label: label.into(),
        });
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.subscription = None;
    }

    /// Blocks until a pending match hits, the timeout passes, or the
    /// wait is interrupted. Pending matches are gone afterwards in every
    /// case. `None` timeout waits indefinitely.
    pub(crate) fn await_match(
        &mut self,
        waiter: &mut Waiter,
        timeout: Option<Duration>,
    ) -> Result<Option<MatchHit>, Interrupt> {
        let pending = std::mem::take(&mut self.pending);
        let Some(subscription) = self.subscription.take() else {
            return Ok(None);
        };
        let deadline = timeout.and_then(deadline_after);

        loop {
            match waiter.wait_event(Some(subscription.receiver()), deadline)? {
                WaitOutcome::Event(StreamEvent::Line(line)) => {
                    if let Some(hit) = first_hit(&pending, &line) {
                        return Ok(Some(hit));
                    }
                }
                WaitOutcome::Event(_) => {}
                WaitOutcome::TimedOut => return Ok(None),
            }
        }
    }
}

/// Blocks on an already-open subscription until a line hits `matcher`.
pub(crate) fn wait_for_line(
    waiter: &mut Waiter,
    subscription: &Subscription,
    matcher: &Matcher,
) -> Result<Vec<String>, Interrupt> {
    loop {
        if let WaitOutcome::Event(StreamEvent::Line(line)) =
            waiter.wait_event(Some(subscription.receiver()), None)?
        {
            if let Some(groups) = matcher.find(&line) {
                return Ok(groups);
            }
        }
    }
}

/// Blocks until the given non-line event arrives.
pub(crate) fn wait_for_event(
    waiter: &mut Waiter,
    subscription: &Subscription,
    expected: &StreamEvent,
) -> Result<(), Interrupt> {
    loop {
        if let WaitOutcome::Event(event) = waiter.wait_event(Some(subscription.receiver()), None)? {
            if &event == expected {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::unbounded;

    use super::*;

    fn pending(entries: Vec<(Matcher, &str)>) -> Vec<PendingMatch> {
        entries
            .into_iter()
            .map(|(matcher, label)| PendingMatch {
                matcher,
                label: label.to_string(),
            })
            .collect()
    }

    #[test]
    fn registration_order_breaks_ties() {
        let entries = pending(vec![
            (Matcher::text("ice"), "first"),
            (Matcher::text("cracks"), "second"),
        ]);
        let hit = first_hit(&entries, "the ice cracks").expect("line should hit");
        assert_eq!(hit.label, "first");
        assert!(hit.groups.is_none());
    }

    #[test]
    fn regex_matchers_report_groups_and_honor_case_flag() {
        let matcher = Matcher::regex("you see (\\w+)", true).expect("pattern should compile");
        let entries = pending(vec![(matcher, "seen")]);
        let hit = first_hit(&entries, "YOU SEE goblin").expect("line should hit");
        assert_eq!(
            hit.groups,
            Some(vec!["YOU SEE goblin".to_string(), "goblin".to_string()])
        );

        let strict = Matcher::regex("you see", false).expect("pattern should compile");
        assert!(strict.find("YOU SEE").is_none());
    }

    #[test]
    fn invalid_regex_is_fatal() {
        let error = Matcher::regex("(", false).expect_err("pattern should fail");
        assert_eq!(error.code, "ENGINE_MATCH_PATTERN");
        assert!(error.is_fatal());
    }

    #[test]
    fn await_match_sees_lines_published_after_registration() {
        let stream = GameStream::new();
        let (_control_tx, control_rx) = unbounded();
        let mut waiter = Waiter::new(control_rx);
        let mut coordinator = MatchCoordinator::new();
        coordinator.register(Matcher::text("fire"), "a", &stream);
        coordinator.register(Matcher::text("ice"), "b", &stream);

        stream.push_line("nothing here");
        stream.push_prompt();
        stream.push_line("the ice cracks");

        let hit = coordinator
            .await_match(&mut waiter, Some(Duration::from_secs(5)))
            .expect("wait should not be interrupted")
            .expect("ice should match");
        assert_eq!(hit.label, "b");
        assert_eq!(coordinator.pending_count(), 0);
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[test]
    fn await_match_times_out_and_clears() {
        let stream = GameStream::new();
        let (_control_tx, control_rx) = unbounded();
        let mut waiter = Waiter::new(control_rx);
        let mut coordinator = MatchCoordinator::new();
        coordinator.register(Matcher::text("never"), "a", &stream);
        let hit = coordinator
            .await_match(&mut waiter, Some(Duration::from_millis(20)))
            .expect("wait should not be interrupted");
        assert!(hit.is_none());
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[test]
    fn await_match_without_registrations_returns_at_once() {
        let (_control_tx, control_rx) = unbounded();
        let mut waiter = Waiter::new(control_rx);
        let mut coordinator = MatchCoordinator::new();
        let hit = coordinator
            .await_match(&mut waiter, None)
            .expect("wait should not be interrupted");
        assert!(hit.is_none());
    }
}
