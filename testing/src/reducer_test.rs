//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use ryfty_core::{effect::Effect, reducer::Reducer};

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions
type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// Several actions may be given with [`ReducerTest::when_actions`]; they are
/// reduced in order and effect assertions see the effects of the last one.
///
/// # Example
///
/// ```ignore
/// use ryfty_testing::ReducerTest;
///
/// ReducerTest::new(ReservationReducer::new())
///     .with_env(test_environment())
///     .given_state(ReservationState::default())
///     .when_action(ReservationAction::SetPartySize { count: 4 })
///     .then_state(|state| {
///         assert_eq!(state.draft().map(|d| d.party_size), Some(2));
///     })
///     .then_effects(|effects| {
///         assert!(effects.is_empty());
///     })
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    actions: Vec<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Set the action to test (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Queue several actions (When), reduced in order
    #[must_use]
    pub fn when_actions<I>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
    {
        self.actions.extend(actions);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the resulting effects (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, action, or environment is not set,
    /// or if any assertions fail.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        assert!(
            !self.actions.is_empty(),
            "Action must be set with when_action()"
        );

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        let mut effects = smallvec::SmallVec::new();
        for action in self.actions {
            effects = self.reducer.reduce(&mut state, action, &env);
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }

        for assertion in self.effect_assertions {
            assertion(&effects);
        }
    }
}

/// Helper assertions for effects
///
/// Searches descend into `Parallel`, `Sequential` and `Cancellable` wrappers.
pub mod assertions {
    use ryfty_core::effect::{Effect, EffectId};
    use std::time::Duration;

    fn any_effect<A>(effects: &[Effect<A>], predicate: &dyn Fn(&Effect<A>) -> bool) -> bool {
        effects.iter().any(|effect| {
            predicate(effect)
                || match effect {
                    Effect::Parallel(inner) | Effect::Sequential(inner) => {
                        any_effect(inner, predicate)
                    },
                    Effect::Cancellable { effect, .. } => {
                        any_effect(std::slice::from_ref(effect.as_ref()), predicate)
                    },
                    _ => false,
                }
        })
    }

    /// Assert that there are no effects
    ///
    /// # Panics
    ///
    /// Panics if effects is not empty.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().all(Effect::is_none),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that effects contain at least one Future effect
    ///
    /// # Panics
    ///
    /// Panics if no Future effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            any_effect(effects, &|e| matches!(e, Effect::Future(_))),
            "Expected at least one Future effect, but none found"
        );
    }

    /// Assert that effects contain at least one Stream effect
    ///
    /// # Panics
    ///
    /// Panics if no Stream effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_stream_effect<A>(effects: &[Effect<A>]) {
        assert!(
            any_effect(effects, &|e| matches!(e, Effect::Stream(_))),
            "Expected at least one Stream effect, but none found"
        );
    }

    /// Assert that no effect performs I/O (no Future or Stream anywhere)
    ///
    /// # Panics
    ///
    /// Panics if a Future or Stream effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_io<A>(effects: &[Effect<A>]) {
        assert!(
            !any_effect(effects, &|e| matches!(e, Effect::Future(_) | Effect::Stream(_))),
            "Expected no Future or Stream effects"
        );
    }

    /// Assert that an effect is started under `id`
    ///
    /// # Panics
    ///
    /// Panics if no `Cancellable` effect with that id is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_starts<A>(effects: &[Effect<A>], id: EffectId) {
        assert!(
            any_effect(effects, &|e| matches!(e, Effect::Cancellable { id: found, .. } if *found == id)),
            "Expected an effect started under {id}"
        );
    }

    /// Assert that `id` is cancelled
    ///
    /// # Panics
    ///
    /// Panics if no `Cancel(id)` effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_cancels<A>(effects: &[Effect<A>], id: EffectId) {
        assert!(
            any_effect(effects, &|e| matches!(e, Effect::Cancel(found) if *found == id)),
            "Expected {id} to be cancelled"
        );
    }

    /// Assert that `id` is neither started nor cancelled
    ///
    /// # Panics
    ///
    /// Panics if the id appears in any `Cancellable` or `Cancel` effect.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_untouched<A>(effects: &[Effect<A>], id: EffectId) {
        assert!(
            !any_effect(effects, &|e| match e {
                Effect::Cancellable { id: found, .. } | Effect::Cancel(found) => *found == id,
                _ => false,
            }),
            "Expected {id} to be left alone"
        );
    }

    /// Find the first delayed action and its duration
    #[must_use]
    pub fn find_delay<A>(effects: &[Effect<A>]) -> Option<(Duration, &A)> {
        for effect in effects {
            let found = match effect {
                Effect::Delay { duration, action } => Some((*duration, action.as_ref())),
                Effect::Parallel(inner) | Effect::Sequential(inner) => find_delay(inner),
                Effect::Cancellable { effect, .. } => find_delay(std::slice::from_ref(effect.as_ref())),
                _ => None,
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// Assert that a delayed action with exactly `duration` is scheduled
    ///
    /// # Panics
    ///
    /// Panics if no matching delay is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_delay<A: std::fmt::Debug>(effects: &[Effect<A>], duration: Duration) {
        assert!(
            any_effect(effects, &|e| matches!(e, Effect::Delay { duration: d, .. } if *d == duration)),
            "Expected a {duration:?} delay in {effects:?}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ryfty_core::effect::{Effect, EffectId};
    use ryfty_core::reducer::Reducer;
    use ryfty_core::{smallvec, SmallVec};
    use std::time::Duration;

    const TIMER: EffectId = EffectId::new("timer");

    #[derive(Clone, Debug)]
    struct TestState {
        count: i32,
    }

    #[derive(Clone, Debug)]
    enum TestAction {
        Increment,
        Decrement,
        Arm,
    }

    struct TestReducer;

    struct TestEnv;

    impl Reducer for TestReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = TestEnv;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                TestAction::Increment => {
                    state.count += 1;
                    smallvec![Effect::None]
                },
                TestAction::Decrement => {
                    state.count -= 1;
                    SmallVec::new()
                },
                TestAction::Arm => smallvec![Effect::Parallel(vec![
                    Effect::Cancel(TIMER),
                    Effect::Delay {
                        duration: Duration::from_secs(3),
                        action: Box::new(TestAction::Decrement),
                    }
                    .cancellable(TIMER),
                ])],
            }
        }
    }

    #[test]
    fn test_reducer_test_increment() {
        ReducerTest::new(TestReducer)
            .with_env(TestEnv)
            .given_state(TestState { count: 0 })
            .when_action(TestAction::Increment)
            .then_state(|state| {
                assert_eq!(state.count, 1);
            })
            .then_effects(|effects| {
                assertions::assert_no_effects(effects);
            })
            .run();
    }

    #[test]
    fn test_when_actions_reduces_in_order() {
        ReducerTest::new(TestReducer)
            .with_env(TestEnv)
            .given_state(TestState { count: 5 })
            .when_actions([TestAction::Decrement, TestAction::Decrement, TestAction::Arm])
            .then_state(|state| {
                assert_eq!(state.count, 3);
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
            })
            .run();
    }

    #[test]
    fn test_assertions_see_through_wrappers() {
        let effects: Vec<Effect<TestAction>> = vec![Effect::Parallel(vec![
            Effect::Cancel(TIMER),
            Effect::Delay {
                duration: Duration::from_secs(3),
                action: Box::new(TestAction::Decrement),
            }
            .cancellable(TIMER),
        ])];

        assertions::assert_starts(&effects, TIMER);
        assertions::assert_cancels(&effects, TIMER);
        assertions::assert_delay(&effects, Duration::from_secs(3));
        assertions::assert_no_io(&effects);
        assertions::assert_untouched(&effects, EffectId::new("other"));
        assert!(matches!(
            assertions::find_delay(&effects),
            Some((d, TestAction::Decrement)) if d == Duration::from_secs(3)
        ));
    }

    #[test]
    fn test_assertions_no_effects() {
        assertions::assert_no_effects::<TestAction>(&[Effect::None]);
        assertions::assert_no_effects::<TestAction>(&[]);
    }
}
