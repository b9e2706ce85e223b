//! # Controller: public handle of one state machine.
//!
//! ```text
//!            dispatch(a)                     state() / current_state()
//!   caller ─────────────► Controller ◄──────────────────────────────── observers
//!                             │                       ▲
//!                             ▼                       │ State (multicast)
//!                      driver (one task) ── reduce ───┘
//!                        │        ▲
//!              spawn per │        │ ctx.emit(m)
//!                action  ▼        │
//!                   mutate(ctx, a)┘ ──► ctx.emit_effect(e) ──► effects()
//! ```
//!
//! ## Rules
//! - Handles are cheap clones of one shared core. Dropping the last handle cancels
//!   the controller.
//! - Start discipline decides when the driver is spawned (see [`ControllerStart`]).
//!   Actions dispatched before a `Manual` start are buffered and run once started.
//! - After cancellation: dispatches are dropped, streams complete, the state is frozen.
//!
//! [`ControllerStart`]: crate::ControllerStart

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::DropGuard;

use super::builder::ControllerBuilder;
use super::inner::Inner;
use super::status::Status;
use crate::channel::Subscription;
use crate::error::ControllerError;
use crate::machine::Machine;

/// Handle to a running (or not yet started) state machine.
pub struct Controller<T: Machine> {
    inner: Arc<Inner<T>>,
    _guard: Arc<DropGuard>,
}

impl<T: Machine> Clone for Controller<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _guard: Arc::clone(&self._guard),
        }
    }
}

impl<T: Machine> Controller<T> {
    /// Creates a builder for `machine` with initial state `initial`.
    pub fn builder(machine: T, initial: T::State) -> ControllerBuilder<T> {
        ControllerBuilder::new(machine, initial)
    }

    pub(crate) fn from_inner(inner: Arc<Inner<T>>) -> Self {
        let guard = inner.token.clone().drop_guard();
        Self {
            inner,
            _guard: Arc::new(guard),
        }
    }

    /// Sends an action (fire-and-forget). Starts a `Lazy` controller.
    ///
    /// Dropped silently once the controller is cancelled.
    pub fn dispatch(&self, action: T::Action) {
        self.inner.dispatch(action);
    }

    /// Latest reduced state. Starts a `Lazy` controller.
    pub fn current_state(&self) -> T::State {
        self.inner.start_lazily();
        self.inner.snapshot()
    }

    /// Stream of states: the state current at subscription time, then every new one.
    ///
    /// Starts a `Lazy` controller. Completes when the controller is cancelled.
    pub fn state(&self) -> Subscription<T::State> {
        self.inner.start_lazily();
        self.inner.state_stream()
    }

    /// Subscribes to effects.
    ///
    /// Never replays: only effects delivered after subscribing are seen. With
    /// [`Delivery::Exclusive`](crate::Delivery::Exclusive) a second concurrent
    /// subscription is refused with [`RecvError::Occupied`](crate::RecvError::Occupied).
    pub fn effects(&self) -> Subscription<T::Effect> {
        self.inner.effects_out.subscribe()
    }

    /// Starts the pipeline.
    ///
    /// Returns `true` only for the call that actually started it; `false` if already
    /// started, starting or cancelled.
    pub fn start(&self) -> bool {
        self.inner.start()
    }

    /// Cancels the controller. Idempotent.
    ///
    /// In-flight `mutate` calls are aborted, buffered actions are discarded and
    /// every stream completes.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Current lifecycle status.
    pub fn status(&self) -> Status {
        self.inner.reap();
        self.inner.status.get()
    }

    /// True once the controller has been cancelled (explicitly, by its scope,
    /// by escalation or by dropping every handle).
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Diagnostic tag.
    pub fn tag(&self) -> &str {
        self.inner.reporter.tag()
    }

    /// Waits until the controller is cancelled and torn down.
    ///
    /// Returns the escalated error that terminated it, or `None` for a plain cancel.
    pub async fn closed(&self) -> Option<ControllerError> {
        self.inner.token.cancelled().await;
        self.inner.reap();
        self.inner.done.cancelled().await;
        self.inner.reporter.fatal()
    }
}

impl<T: Machine> fmt::Debug for Controller<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("tag", &self.tag())
            .field("status", &self.inner.status.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Delivery;
    use crate::config::{Config, ControllerStart};
    use crate::core::MutationContext;
    use crate::effects::EffectEmitter;
    use crate::error::RecvError;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    // ---- counter with a loading flag ----

    struct Counter;

    #[derive(Debug)]
    enum CounterAction {
        Increase,
        Decrease,
    }

    #[derive(Debug)]
    enum CounterMutation {
        Add(i64),
        SetLoading(bool),
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct CounterState {
        value: i64,
        loading: bool,
    }

    fn counter_state(value: i64, loading: bool) -> CounterState {
        CounterState { value, loading }
    }

    #[async_trait]
    impl Machine for Counter {
        type Action = CounterAction;
        type Mutation = CounterMutation;
        type State = CounterState;
        type Effect = ();

        async fn mutate(&self, ctx: &MutationContext<Self>, action: CounterAction) -> anyhow::Result<()> {
            let delta = match action {
                CounterAction::Increase => 1,
                CounterAction::Decrease => -1,
            };
            ctx.emit(CounterMutation::SetLoading(true));
            tokio::time::sleep(Duration::from_millis(500)).await;
            ctx.emit(CounterMutation::Add(delta));
            ctx.emit(CounterMutation::SetLoading(false));
            Ok(())
        }

        fn reduce(
            &self,
            state: &CounterState,
            mutation: &CounterMutation,
            _effects: &EffectEmitter<()>,
        ) -> anyhow::Result<CounterState> {
            let mut next = state.clone();
            match mutation {
                CounterMutation::Add(n) => next.value += n,
                CounterMutation::SetLoading(l) => next.loading = *l,
            }
            Ok(next)
        }
    }

    // ---- bench machine exercising every failure path ----

    struct Bench;

    #[derive(Debug)]
    enum Cmd {
        Add(i64),
        BadReduce,
        PanicReduce,
        FailMutate,
        PanicMutate,
        Toast(u32),
        Countdown(u32),
        Notify(u32),
        Hang,
    }

    #[derive(Debug)]
    enum Step {
        Add(i64),
        Reject,
        Explode,
        Notify(u32),
    }

    #[async_trait]
    impl Machine for Bench {
        type Action = Cmd;
        type Mutation = Step;
        type State = i64;
        type Effect = u32;

        async fn mutate(&self, ctx: &MutationContext<Self>, action: Cmd) -> anyhow::Result<()> {
            match action {
                Cmd::Add(n) => ctx.emit(Step::Add(n)),
                Cmd::BadReduce => ctx.emit(Step::Reject),
                Cmd::PanicReduce => ctx.emit(Step::Explode),
                Cmd::FailMutate => anyhow::bail!("backend unavailable"),
                Cmd::PanicMutate => panic!("mutate blew up"),
                Cmd::Toast(n) => ctx.emit_effect(n)?,
                Cmd::Countdown(n) => {
                    ctx.emit(Step::Add(1));
                    if n > 1 {
                        ctx.dispatch(Cmd::Countdown(n - 1));
                    }
                }
                Cmd::Notify(n) => ctx.emit(Step::Notify(n)),
                Cmd::Hang => {
                    ctx.cancelled().await;
                    ctx.emit(Step::Add(100));
                }
            }
            Ok(())
        }

        fn reduce(&self, state: &i64, mutation: &Step, effects: &EffectEmitter<u32>) -> anyhow::Result<i64> {
            match mutation {
                Step::Add(n) => Ok(state + n),
                Step::Reject => anyhow::bail!("rejected"),
                Step::Explode => panic!("reducer exploded"),
                Step::Notify(n) => {
                    effects.emit(*n)?;
                    Ok(state + 1)
                }
            }
        }
    }

    type Errors = Arc<Mutex<Vec<ControllerError>>>;

    fn collecting() -> (Config, Errors) {
        let errors: Errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let cfg = Config::default().with_error_logger(move |e| sink.lock().push(e.clone()));
        (cfg, errors)
    }

    fn bench(cfg: Config) -> Controller<Bench> {
        Controller::builder(Bench, 0).with_config(cfg).build()
    }

    /// Lets every runnable task finish; the paused clock only advances when idle.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn increase_walks_through_loading_states() {
        let ctl = Controller::builder(Counter, counter_state(0, false))
            .with_config(Config::default())
            .build();

        let mut states = ctl.state();
        ctl.dispatch(CounterAction::Increase);

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(states.recv().await.unwrap());
        }
        assert_eq!(
            seen,
            vec![
                counter_state(0, false),
                counter_state(0, true),
                counter_state(1, true),
                counter_state(1, false),
            ]
        );
        assert_eq!(ctl.current_state(), counter_state(1, false));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_actions_are_all_reduced() {
        let ctl = Controller::builder(Counter, counter_state(0, false))
            .with_config(Config::default())
            .build();

        for _ in 0..2 {
            ctl.dispatch(CounterAction::Increase);
        }
        for _ in 0..3 {
            ctl.dispatch(CounterAction::Decrease);
        }
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(ctl.current_state(), counter_state(-1, false));
    }

    #[tokio::test(start_paused = true)]
    async fn lazy_starts_on_first_use() {
        let ctl = bench(Config::default());
        assert_eq!(ctl.status(), Status::NotStarted);

        assert_eq!(ctl.current_state(), 0);
        assert_eq!(ctl.status(), Status::Running);
        assert!(!ctl.start());
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_starts_while_building() {
        let ctl = Controller::builder(Bench, 0)
            .with_config(Config::default())
            .with_start(ControllerStart::Immediate)
            .build();
        assert_eq!(ctl.status(), Status::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_buffers_actions_until_started() {
        let ctl = Controller::builder(Bench, 0)
            .with_config(Config::default())
            .with_start(ControllerStart::Manual)
            .build();

        ctl.dispatch(Cmd::Add(2));
        let mut states = ctl.state();
        settle().await;
        assert_eq!(ctl.current_state(), 0);
        assert_eq!(ctl.status(), Status::NotStarted);

        assert!(ctl.start());
        assert!(!ctl.start());
        settle().await;

        assert_eq!(ctl.current_state(), 2);
        assert_eq!(states.recv().await, Ok(0));
        assert_eq!(states.recv().await, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent_and_freezes_state() {
        let ctl = bench(Config::default());
        ctl.dispatch(Cmd::Add(1));
        settle().await;
        let mut states = ctl.state();

        ctl.cancel();
        ctl.cancel();
        assert!(ctl.closed().await.is_none());
        assert_eq!(ctl.status(), Status::Cancelled);
        assert!(ctl.is_cancelled());

        ctl.dispatch(Cmd::Add(10));
        settle().await;
        assert_eq!(ctl.current_state(), 1);

        assert_eq!(states.recv().await, Ok(1));
        assert_eq!(states.recv().await, Err(RecvError::Closed));
        assert_eq!(ctl.state().recv().await, Err(RecvError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_start_prevents_start() {
        let ctl = Controller::builder(Bench, 0)
            .with_config(Config::default())
            .with_start(ControllerStart::Manual)
            .build();

        ctl.cancel();
        assert_eq!(ctl.status(), Status::Cancelled);
        assert!(!ctl.start());
        assert!(ctl.closed().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_mutate_is_aborted_on_cancel() {
        let (cfg, errors) = collecting();
        let ctl = bench(cfg);

        ctl.dispatch(Cmd::Hang);
        settle().await;
        ctl.cancel();
        ctl.closed().await;

        assert_eq!(ctl.current_state(), 0);
        assert!(errors.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reduce_keeps_last_good_state() {
        let (cfg, errors) = collecting();
        let ctl = bench(cfg);

        ctl.dispatch(Cmd::Add(1));
        ctl.dispatch(Cmd::BadReduce);
        ctl.dispatch(Cmd::PanicReduce);
        ctl.dispatch(Cmd::Add(2));
        settle().await;

        assert_eq!(ctl.current_state(), 3);
        assert_eq!(ctl.status(), Status::Running);

        let errors = errors.lock();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.as_label() == "controller_reduce_failed"));
        assert!(errors.iter().any(|e| e.to_string().contains("rejected")));
        assert!(errors.iter().any(|e| e.to_string().contains("reducer exploded")));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_mutate_is_logged_and_skipped() {
        let (cfg, errors) = collecting();
        let ctl = bench(cfg);

        ctl.dispatch(Cmd::FailMutate);
        ctl.dispatch(Cmd::PanicMutate);
        settle().await;
        ctl.dispatch(Cmd::Add(5));
        settle().await;

        assert_eq!(ctl.current_state(), 5);
        let errors = errors.lock();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.as_label() == "controller_mutate_failed"));
        assert!(errors.iter().any(|e| e.to_string().contains("FailMutate")));
        assert!(errors.iter().any(|e| e.to_string().contains("mutate blew up")));
    }

    #[tokio::test(start_paused = true)]
    async fn escalation_terminates_the_controller() {
        let (cfg, errors) = collecting();
        let scope = CancellationToken::new();
        let ctl = Controller::builder(Bench, 0)
            .with_config(cfg.with_escalation(true))
            .with_scope(&scope)
            .with_tag("bench")
            .build();
        let mut states = ctl.state();

        ctl.dispatch(Cmd::BadReduce);
        let fatal = ctl.closed().await.expect("escalated error");

        assert_eq!(fatal.as_label(), "controller_reduce_failed");
        assert_eq!(fatal.tag(), "bench");
        assert_eq!(errors.lock().len(), 1);
        assert_eq!(ctl.status(), Status::Cancelled);
        assert!(!scope.is_cancelled());

        ctl.dispatch(Cmd::Add(1));
        settle().await;
        assert_eq!(ctl.current_state(), 0);
        assert_eq!(states.recv().await, Ok(0));
        assert_eq!(states.recv().await, Err(RecvError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn escalated_mutate_failure_terminates() {
        let (cfg, errors) = collecting();
        let ctl = bench(cfg.with_escalation(true));

        ctl.dispatch(Cmd::FailMutate);
        let fatal = ctl.closed().await.expect("escalated error");

        assert_eq!(fatal.as_label(), "controller_mutate_failed");
        assert!(fatal.to_string().contains("backend unavailable"));
        assert_eq!(errors.lock().len(), 1);
        assert_eq!(ctl.status(), Status::Cancelled);

        ctl.dispatch(Cmd::Add(1));
        settle().await;
        assert_eq!(ctl.current_state(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn escalated_effect_overflow_terminates() {
        let (cfg, errors) = collecting();
        let ctl = Controller::builder(Bench, 0)
            .with_config(cfg.with_escalation(true))
            .with_effect_capacity(1)
            .build();
        let mut fx = ctl.effects();

        ctl.dispatch(Cmd::Toast(1));
        ctl.dispatch(Cmd::Toast(2));
        let fatal = ctl.closed().await.expect("escalated error");

        assert_eq!(fatal.as_label(), "controller_effect_overflow");
        assert!(matches!(fatal, ControllerError::Effect { capacity: 1, .. }));
        assert_eq!(errors.lock().len(), 1);
        assert_eq!(ctl.status(), Status::Cancelled);

        let mut delivered = Vec::new();
        while let Ok(n) = fx.recv().await {
            delivered.push(n);
        }
        assert!(!delivered.contains(&2), "{delivered:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn unread_effects_overflow_through_the_controller() {
        let (cfg, errors) = collecting();
        let ctl = Controller::builder(Bench, 0)
            .with_config(cfg)
            .with_effect_capacity(2)
            .build();
        let mut fx = ctl.effects();

        for n in 1..=3 {
            ctl.dispatch(Cmd::Toast(n));
        }
        settle().await;

        {
            let errors = errors.lock();
            assert_eq!(errors.len(), 1);
            assert!(matches!(errors[0], ControllerError::Effect { capacity: 2, .. }));
        }

        let mut delivered = vec![fx.recv().await.unwrap(), fx.recv().await.unwrap()];
        delivered.sort_unstable();
        assert_eq!(delivered, vec![1, 2]);

        ctl.dispatch(Cmd::Toast(4));
        assert_eq!(fx.recv().await, Ok(4));
        assert_eq!(errors.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn effect_overflow_is_reported_once() {
        let (cfg, errors) = collecting();
        let ctl = Controller::builder(Bench, 0)
            .with_config(cfg)
            .with_effect_capacity(2)
            .build();

        ctl.dispatch(Cmd::Toast(1));
        ctl.dispatch(Cmd::Toast(2));
        ctl.dispatch(Cmd::Toast(3));
        settle().await;

        {
            let errors = errors.lock();
            assert_eq!(errors.len(), 1);
            assert!(matches!(errors[0], ControllerError::Effect { capacity: 2, .. }));
        }

        let mut fx = ctl.effects();
        let mut delivered = vec![fx.recv().await.unwrap(), fx.recv().await.unwrap()];
        delivered.sort_unstable();
        assert_eq!(delivered, vec![1, 2]);
        assert_eq!(ctl.status(), Status::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn reducer_effect_overflow_skips_the_mutation() {
        let (cfg, errors) = collecting();
        let ctl = Controller::builder(Bench, 0)
            .with_config(cfg)
            .with_effect_capacity(1)
            .build();

        ctl.dispatch(Cmd::Notify(1));
        ctl.dispatch(Cmd::Notify(2));
        settle().await;

        assert_eq!(ctl.current_state(), 1);
        let errors = errors.lock();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].as_label(), "controller_effect_overflow");
    }

    #[tokio::test(start_paused = true)]
    async fn shared_effects_reach_every_observer() {
        let ctl = bench(Config::default());
        let mut a = ctl.effects();
        let mut b = ctl.effects();

        ctl.dispatch(Cmd::Toast(7));

        assert_eq!(a.recv().await, Ok(7));
        assert_eq!(b.recv().await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn exclusive_effects_admit_one_observer() {
        let ctl = Controller::builder(Bench, 0)
            .with_config(Config::default())
            .with_effect_delivery(Delivery::Exclusive)
            .build();

        let first = ctl.effects();
        let mut second = ctl.effects();
        assert_eq!(second.recv().await, Err(RecvError::Occupied));

        drop(first);
        let mut third = ctl.effects();
        assert!(third.failure().is_none());

        ctl.dispatch(Cmd::Toast(9));
        assert_eq!(third.recv().await, Ok(9));
    }

    #[tokio::test(start_paused = true)]
    async fn mutate_can_dispatch_follow_up_actions() {
        let ctl = bench(Config::default());
        ctl.dispatch(Cmd::Countdown(3));
        settle().await;
        assert_eq!(ctl.current_state(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn scope_cancellation_tears_down() {
        let scope = CancellationToken::new();
        let ctl = Controller::builder(Bench, 0)
            .with_config(Config::default())
            .with_scope(&scope)
            .build();
        ctl.dispatch(Cmd::Add(1));
        settle().await;

        scope.cancel();
        assert!(ctl.closed().await.is_none());
        assert_eq!(ctl.status(), Status::Cancelled);
        assert_eq!(ctl.current_state(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unstarted_controller_reports_scope_cancellation() {
        let scope = CancellationToken::new();
        let ctl = Controller::builder(Bench, 0)
            .with_config(Config::default())
            .with_start(ControllerStart::Manual)
            .with_scope(&scope)
            .build();

        scope.cancel();
        assert_eq!(ctl.status(), Status::Cancelled);
        assert!(ctl.closed().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_last_handle_cancels() {
        let ctl = bench(Config::default());
        let other = ctl.clone();
        let mut states = ctl.state();
        assert_eq!(states.recv().await, Ok(0));

        drop(ctl);
        other.dispatch(Cmd::Add(4));
        assert_eq!(states.recv().await, Ok(4));

        drop(other);
        assert_eq!(states.recv().await, Err(RecvError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn op_events_follow_the_lifecycle() {
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&kinds);
        let cfg = Config::default().with_op_logger(move |ev| {
            assert_eq!(ev.tag.as_deref(), Some("Bench"));
            sink.lock().push(ev.kind);
        });
        let ctl = bench(cfg);

        ctl.dispatch(Cmd::Add(1));
        settle().await;
        ctl.cancel();
        ctl.closed().await;

        assert_eq!(
            *kinds.lock(),
            vec![
                EventKind::Created,
                EventKind::Started,
                EventKind::Action,
                EventKind::Mutation,
                EventKind::State,
                EventKind::Completed,
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn dispatch_from_many_tasks() {
        let ctl = Controller::builder(Bench, 0)
            .with_config(Config::default())
            .with_handle(tokio::runtime::Handle::current())
            .build();
        let mut states = ctl.state();

        let mut senders = Vec::new();
        for _ in 0..10 {
            let ctl = ctl.clone();
            senders.push(tokio::spawn(async move {
                for _ in 0..10 {
                    ctl.dispatch(Cmd::Add(1));
                }
            }));
        }
        for s in senders {
            s.await.unwrap();
        }

        let reached = tokio::time::timeout(Duration::from_secs(5), async {
            while let Ok(v) = states.recv().await {
                if v == 100 {
                    return true;
                }
            }
            false
        })
        .await;
        assert_eq!(reached, Ok(true));
        assert_eq!(ctl.current_state(), 100);
    }
}
