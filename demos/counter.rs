//! # Example: Counter with loading flag
//!
//! Two increases and a decrease run concurrently; every intermediate state is printed.
//! Op events are rendered through the built-in `LogWriter`.
//!
//! Run with: `RUST_LOG=debug cargo run --example counter`

use std::time::Duration;

use async_trait::async_trait;
use statevisor::{Config, Controller, ControllerStart, EffectEmitter, Machine, MutationContext};
use tracing_subscriber::EnvFilter;

struct Counter;

#[derive(Debug)]
enum Action {
    Increase,
    Decrease,
}

#[derive(Debug)]
enum Mutation {
    Add(i64),
    SetLoading(bool),
}

#[derive(Debug, Clone, PartialEq)]
struct State {
    value: i64,
    loading: bool,
}

#[derive(Debug, Clone)]
enum Effect {
    Toast(String),
}

#[async_trait]
impl Machine for Counter {
    type Action = Action;
    type Mutation = Mutation;
    type State = State;
    type Effect = Effect;

    async fn mutate(&self, ctx: &MutationContext<Self>, action: Action) -> anyhow::Result<()> {
        let delta = match action {
            Action::Increase => 1,
            Action::Decrease => -1,
        };
        ctx.emit(Mutation::SetLoading(true));
        tokio::select! {
            _ = ctx.cancelled() => return Ok(()),
            _ = tokio::time::sleep(Duration::from_millis(500)) => {}
        }
        ctx.emit(Mutation::Add(delta));
        ctx.emit(Mutation::SetLoading(false));
        Ok(())
    }

    fn reduce(&self, state: &State, mutation: &Mutation, effects: &EffectEmitter<Effect>) -> anyhow::Result<State> {
        let mut next = state.clone();
        match mutation {
            Mutation::Add(n) => {
                next.value += n;
                if next.value < 0 {
                    effects.emit(Effect::Toast(format!("went negative: {}", next.value)))?;
                }
            }
            Mutation::SetLoading(l) => next.loading = *l,
        }
        Ok(next)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let ctl = Controller::builder(Counter, State { value: 0, loading: false })
        .with_tag("counter")
        .with_start(ControllerStart::Manual)
        .with_config(Config::default().with_op_logging(true))
        .build();

    let mut effects = ctl.effects();
    let toasts = tokio::spawn(async move {
        while let Ok(Effect::Toast(msg)) = effects.recv().await {
            println!("[toast] {msg}");
        }
    });

    let mut states = ctl.state();
    ctl.start();

    ctl.dispatch(Action::Decrease);
    ctl.dispatch(Action::Decrease);
    ctl.dispatch(Action::Increase);

    let printer = tokio::spawn(async move {
        while let Ok(state) = states.recv().await {
            println!("[state] {state:?}");
        }
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    println!("final: {:?}", ctl.current_state());

    ctl.cancel();
    if let Some(err) = ctl.closed().await {
        eprintln!("terminated: {err}");
    }
    printer.await?;
    toasts.await?;
    Ok(())
}
