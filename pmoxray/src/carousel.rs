//! Fact carousel
//!
//! Rotates through the facts of the current song on a fixed cadence. The
//! rotation restarts only when the fact list itself changes, so snapshots
//! that repeat the same facts (pause, resume, periodic refresh) never send
//! the carousel back to its first fact.
//!
//! The controller is driven by its owner: [`CarouselController::update`] is
//! called for every snapshot and [`CarouselController::next_tick`] is polled
//! alongside the stream, typically in a `tokio::select!` loop.
//!
//! ```text
//!            update(non-empty)           update(different)
//!   Idle ──────────────────────▶ Rotating ◀──────────────┐
//!    ▲                             │  │                   │
//!    └──── update(empty) ──────────┘  └───────────────────┘
//!
//!   dispose() from any state ──▶ Disposed
//! ```

use crate::config::CarouselConfig;
use crate::display::FactDisplay;
use crate::models::FactList;
use std::time::Duration;
use tokio::time::Instant;

/// Default delay between two facts
pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_millis(8000);

/// Lifecycle state of a [`CarouselController`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarouselState {
    /// No facts, no timer
    Idle,
    /// Facts present, timer armed
    Rotating,
    /// Torn down; no timer will ever be armed again
    Disposed,
}

/// The single repeating timer of a carousel
#[derive(Debug, Clone, Copy)]
struct RotationTimer {
    deadline: Instant,
    period: Duration,
}

/// Rotating display of the current song's facts
#[derive(Debug)]
pub struct CarouselController<F: FactDisplay> {
    target: F,
    facts: FactList,
    active_index: usize,
    timer: Option<RotationTimer>,
    interval: Duration,
    placeholder: Option<String>,
    restarts: u64,
    disposed: bool,
}

impl<F: FactDisplay> CarouselController<F> {
    /// Create an idle carousel rendering into `target`
    pub fn new(target: F) -> Self {
        Self {
            target,
            facts: FactList::empty(),
            active_index: 0,
            timer: None,
            interval: DEFAULT_ROTATION_INTERVAL,
            placeholder: None,
            restarts: 0,
            disposed: false,
        }
    }

    /// Create a carousel from its configuration block
    pub fn from_config(target: F, config: &CarouselConfig) -> Self {
        let carousel = Self::new(target).with_interval(config.interval());
        match &config.placeholder {
            Some(placeholder) => carousel.with_placeholder(placeholder.clone()),
            None => carousel,
        }
    }

    /// Set the delay between two facts (at least 1 ms)
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Text rendered when a song has no facts, instead of clearing the slot
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// Apply the fact list of a new snapshot
    ///
    /// A list equal to the stored one (element-wise, order-sensitive) has
    /// no effect. Any other list cancels the current rotation; a non-empty
    /// list renders its first fact at once and arms a new timer, an empty
    /// one clears the slot.
    pub fn update(&mut self, facts: FactList) {
        if self.disposed {
            tracing::debug!("Ignoring fact update on a disposed carousel");
            return;
        }

        if facts == self.facts {
            return;
        }

        self.timer = None;
        self.facts = facts;
        self.active_index = 0;

        if self.facts.is_empty() {
            tracing::debug!("Fact list cleared, carousel idle");
            self.target.show_fact(self.placeholder.as_deref());
            return;
        }

        self.restarts += 1;
        tracing::debug!(
            facts = self.facts.len(),
            restarts = self.restarts,
            "Restarting fact carousel"
        );
        self.render();
        self.timer = Some(RotationTimer {
            deadline: Instant::now() + self.interval,
            period: self.interval,
        });
    }

    /// Wait for the next tick, then show the next fact
    ///
    /// Never completes while no timer is armed. Cancel-safe: dropping the
    /// future before the deadline leaves the timer untouched.
    pub async fn next_tick(&mut self) {
        let Some(timer) = self.timer else {
            return std::future::pending().await;
        };

        tokio::time::sleep_until(timer.deadline).await;
        self.advance();
    }

    /// Cancel the rotation for good
    pub fn dispose(&mut self) {
        if !self.disposed {
            tracing::debug!("Disposing fact carousel");
        }
        self.timer = None;
        self.disposed = true;
    }

    pub fn state(&self) -> CarouselState {
        if self.disposed {
            CarouselState::Disposed
        } else if self.timer.is_some() {
            CarouselState::Rotating
        } else {
            CarouselState::Idle
        }
    }

    /// Index of the fact on display, `None` when not rotating
    pub fn active_index(&self) -> Option<usize> {
        self.timer.map(|_| self.active_index)
    }

    /// Fact on display, `None` when not rotating
    pub fn current_fact(&self) -> Option<&str> {
        self.active_index().and_then(|index| self.facts.get(index))
    }

    /// The list the next update is compared against
    pub fn facts(&self) -> &FactList {
        &self.facts
    }

    /// Delay between two facts
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of times a rotation was (re)started
    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    pub fn target(&self) -> &F {
        &self.target
    }

    pub fn into_target(self) -> F {
        self.target
    }

    fn advance(&mut self) {
        let Some(timer) = self.timer.as_mut() else {
            return;
        };

        let now = Instant::now();
        timer.deadline += timer.period;
        // Host was suspended past a whole period: skip the missed ticks.
        if timer.deadline <= now {
            timer.deadline = now + timer.period;
        }

        self.active_index = (self.active_index + 1) % self.facts.len();
        self.render();
    }

    fn render(&mut self) {
        self.target.show_fact(self.facts.get(self.active_index));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::MemoryDisplay;
    use tokio_test::{assert_pending, task};

    fn facts(items: &[&str]) -> FactList {
        items.iter().copied().collect()
    }

    fn carousel() -> CarouselController<MemoryDisplay> {
        CarouselController::new(MemoryDisplay::new())
    }

    #[test]
    fn test_first_fact_rendered_immediately() {
        let mut carousel = carousel();
        carousel.update(facts(&["a", "b", "c"]));

        assert_eq!(carousel.state(), CarouselState::Rotating);
        assert_eq!(carousel.current_fact(), Some("a"));
        assert_eq!(carousel.target().fact.as_deref(), Some("a"));
    }

    #[test]
    fn test_same_list_twice_starts_once() {
        let mut carousel = carousel();
        carousel.update(facts(&["a", "b"]));
        carousel.update(facts(&["a", "b"]));

        assert_eq!(carousel.restarts(), 1);
        assert_eq!(carousel.target().fact_history, vec![Some("a".to_string())]);
    }

    #[test]
    fn test_reordered_list_restarts() {
        let mut carousel = carousel();
        carousel.update(facts(&["a", "b"]));
        carousel.update(facts(&["b", "a"]));

        assert_eq!(carousel.restarts(), 2);
        assert_eq!(carousel.active_index(), Some(0));
        assert_eq!(carousel.target().fact.as_deref(), Some("b"));
    }

    #[test]
    fn test_empty_updates_never_arm_a_timer() {
        let mut carousel = carousel();
        carousel.update(FactList::empty());
        carousel.update(FactList::from(None));

        assert_eq!(carousel.state(), CarouselState::Idle);
        assert_eq!(carousel.restarts(), 0);
        assert!(carousel.target().fact_history.is_empty());
    }

    #[test]
    fn test_empty_list_clears_the_slot() {
        let mut carousel = carousel();
        carousel.update(facts(&["a"]));
        carousel.update(FactList::empty());

        assert_eq!(carousel.state(), CarouselState::Idle);
        assert_eq!(carousel.active_index(), None);
        assert_eq!(carousel.target().fact, None);
        assert_eq!(
            carousel.target().fact_history,
            vec![Some("a".to_string()), None]
        );
    }

    #[test]
    fn test_placeholder_for_empty_list() {
        let config = CarouselConfig {
            interval_ms: 8000,
            placeholder: Some("No interesting facts available for this song.".to_string()),
        };
        let mut carousel = CarouselController::from_config(MemoryDisplay::new(), &config);
        carousel.update(facts(&["a"]));
        carousel.update(FactList::empty());

        assert_eq!(
            carousel.target().fact.as_deref(),
            Some("No interesting facts available for this song.")
        );
    }

    #[test]
    fn test_stored_list_replaced_on_every_change() {
        let mut carousel = carousel();
        carousel.update(facts(&["a"]));
        carousel.update(FactList::empty());
        carousel.update(facts(&["a"]));

        assert_eq!(carousel.facts(), &facts(&["a"]));
        assert_eq!(carousel.restarts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_cycle_through_facts() {
        let list = ["a", "b", "c"];
        let mut carousel = carousel();
        carousel.update(facts(&list));

        for k in 1..=7 {
            carousel.next_tick().await;
            assert_eq!(carousel.target().fact.as_deref(), Some(list[k % list.len()]));
            assert_eq!(carousel.active_index(), Some(k % list.len()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_cadence() {
        let start = Instant::now();
        let mut carousel = carousel();
        carousel.update(facts(&["a", "b"]));

        carousel.next_tick().await;
        let first = start.elapsed().as_millis();
        assert!((8000..=8001).contains(&first), "first tick at {first} ms");

        carousel.next_tick().await;
        let second = start.elapsed().as_millis();
        assert!((16000..=16002).contains(&second), "second tick at {second} ms");
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_update_keeps_cadence_and_index() {
        let start = Instant::now();
        let mut carousel = carousel();
        carousel.update(facts(&["a", "b", "c"]));

        carousel.next_tick().await;
        tokio::time::advance(Duration::from_secs(3)).await;
        carousel.update(facts(&["a", "b", "c"]));
        assert_eq!(carousel.current_fact(), Some("b"));

        carousel.next_tick().await;
        let elapsed = start.elapsed().as_millis();
        assert!((16000..=16002).contains(&elapsed), "tick at {elapsed} ms");
        assert_eq!(carousel.current_fact(), Some("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_changed_update_resets_cadence() {
        let mut carousel = carousel();
        carousel.update(facts(&["a", "b"]));
        tokio::time::advance(Duration::from_secs(5)).await;

        let restart = Instant::now();
        carousel.update(facts(&["x", "y"]));
        assert_eq!(carousel.target().fact.as_deref(), Some("x"));

        carousel.next_tick().await;
        let elapsed = restart.elapsed().as_millis();
        assert!((8000..=8001).contains(&elapsed), "tick at {elapsed} ms");
        assert_eq!(carousel.target().fact.as_deref(), Some("y"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_stops_ticks() {
        let mut carousel = carousel();
        carousel.update(facts(&["a", "b"]));
        carousel.dispose();
        carousel.dispose();

        assert_eq!(carousel.state(), CarouselState::Disposed);
        let tick = tokio::time::timeout(Duration::from_secs(60), carousel.next_tick()).await;
        assert!(tick.is_err());
        assert_eq!(carousel.target().fact_history, vec![Some("a".to_string())]);

        carousel.update(facts(&["c"]));
        assert_eq!(carousel.state(), CarouselState::Disposed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_carousel_never_ticks() {
        let mut carousel = carousel();
        let mut tick = task::spawn(carousel.next_tick());

        assert_pending!(tick.poll());
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_pending!(tick.poll());
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let carousel = carousel().with_interval(Duration::ZERO);
        assert_eq!(carousel.interval(), Duration::from_millis(1));
    }
}
