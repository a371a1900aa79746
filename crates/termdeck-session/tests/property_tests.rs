//! Property-based tests for layout math, channel ordering and slot recycling.
//!
//! Uses proptest to generate random inputs and verify coordinator invariants.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use termdeck_core::{ChannelSettings, Result, SessionId};
use termdeck_session::{
    calculate_layout, CreateSessionRequest, EventSink, MessageChannel, MessageSink, Priority,
    SessionRegistry,
};
use termdeck_view::HeadlessSurface;

/// Records every delivered payload in order.
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<(Priority, usize)>>,
}

#[async_trait]
impl MessageSink<(Priority, usize)> for Recorder {
    async fn deliver(&self, payload: &(Priority, usize)) -> Result<()> {
        self.seen.lock().unwrap().push(*payload);
        Ok(())
    }
}

fn priority() -> impl Strategy<Value = Priority> {
    prop_oneof![Just(Priority::High), Just(Priority::Normal)]
}

/// A registry step: create a session, or remove the n-th live one.
#[derive(Debug, Clone)]
enum Step {
    Create,
    Remove(usize),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![Just(Step::Create), (0usize..8).prop_map(Step::Remove)]
}

proptest! {
    /// Accepted splits never produce panes under the minimum height.
    #[test]
    fn split_respects_min_height(
        height in 0u32..5000,
        count in 0usize..12,
        max in 1usize..12,
        min in 1u32..400,
    ) {
        let result = calculate_layout(height, count, max, min);
        if result.can_split {
            prop_assert!(result.pane_height >= min);
            prop_assert!(count < max);
            prop_assert!(result.reason.is_none());
        } else {
            prop_assert!(result.reason.is_some());
        }
    }

    /// Pane height is the integer share of the available height.
    #[test]
    fn split_height_is_floor_division(height in 0u32..5000, count in 0usize..8) {
        let result = calculate_layout(height, count, 8, 1);
        if count + 1 <= 8 {
            prop_assert_eq!(result.pane_height, height / (count as u32 + 1));
        }
    }

    /// A pass delivers every high-priority message before any normal one,
    /// each class in FIFO order.
    #[test]
    fn high_priority_delivered_first(priorities in prop::collection::vec(priority(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let recorder = Arc::new(Recorder::default());
        let channel = MessageChannel::new(
            ChannelSettings::default(),
            Arc::clone(&recorder) as Arc<dyn MessageSink<(Priority, usize)>>,
        );

        for (index, priority) in priorities.iter().enumerate() {
            channel.enqueue_with((*priority, index), *priority);
        }
        runtime.block_on(channel.flush());

        let seen = recorder.seen.lock().unwrap().clone();
        prop_assert_eq!(seen.len(), priorities.len());

        let first_normal = seen
            .iter()
            .position(|(p, _)| *p == Priority::Normal)
            .unwrap_or(seen.len());
        prop_assert!(seen[first_normal..].iter().all(|(p, _)| *p == Priority::Normal));

        for class in [Priority::High, Priority::Normal] {
            let order: Vec<usize> = seen
                .iter()
                .filter(|(p, _)| *p == class)
                .map(|(_, index)| *index)
                .collect();
            let mut sorted = order.clone();
            sorted.sort_unstable();
            prop_assert_eq!(order, sorted);
        }
    }

    /// Slots stay unique and in range, a new session always takes the
    /// smallest free slot, and a non-empty registry has exactly one active
    /// session.
    #[test]
    fn slots_recycle_smallest_first(
        max in 1usize..6,
        steps in prop::collection::vec(step(), 1..40),
    ) {
        let mut registry = SessionRegistry::new(
            max,
            Box::new(HeadlessSurface::new(100)),
            EventSink::detached(),
        );
        let mut next = 0;

        for step in steps {
            match step {
                Step::Create => {
                    let used: HashSet<u32> = registry.list().iter().map(|s| s.slot).collect();
                    let expected = (1..=max as u32).find(|slot| !used.contains(slot));

                    next += 1;
                    let request = CreateSessionRequest {
                        id: Some(SessionId::from(format!("s{next}"))),
                        ..CreateSessionRequest::named(format!("Terminal {next}"))
                    };
                    match (registry.create_session(request), expected) {
                        (Ok(info), Some(slot)) => {
                            prop_assert_eq!(info.slot, slot);
                        }
                        (Err(_), None) => {}
                        (outcome, expected) => {
                            prop_assert!(false, "create {:?} with free slot {:?}", outcome, expected);
                        }
                    }
                }
                Step::Remove(n) => {
                    let ids = registry.ids();
                    if !ids.is_empty() {
                        let target = ids[n % ids.len()].clone();
                        prop_assert!(registry.remove_session(&target).is_some());
                    }
                }
            }

            let sessions = registry.list();
            prop_assert!(sessions.len() <= max);
            let slots: HashSet<u32> = sessions.iter().map(|s| s.slot).collect();
            prop_assert_eq!(slots.len(), sessions.len());
            prop_assert!(slots.iter().all(|slot| (1..=max as u32).contains(slot)));

            let active = sessions.iter().filter(|s| s.is_active()).count();
            prop_assert_eq!(active, usize::from(!sessions.is_empty()));
        }
    }
}
