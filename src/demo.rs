//! Counter demo - one loop surviving several view recreations.
//!
//! Each cycle creates a fresh view, shows it, dispatches events, hides it
//! while more events arrive, and destroys it. Signals emitted while hidden are
//! buffered and handed to the next view as a backlog.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use colored::*;
use eyre::{Context, Result};
use log::{info, warn};

use loopview::runtime::{EffectHandler, EventSender, Next, ReducerLoopFactory};
use loopview::{
    DeliveryThread, First, HostConfig, LoopHost, SignalSender, ViewBinding, WorkRunner,
};

use crate::config::DemoConfig;

const SETTLE: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Counter {
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Increment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Greet,
    Milestone(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Toast {
    Welcome,
    Reached(u32),
}

struct ToastEffects {
    signals: SignalSender<Toast>,
}

#[async_trait]
impl EffectHandler<Effect, Event> for ToastEffects {
    async fn handle(&self, effect: Effect, _events: EventSender<Event>) {
        let toast = match effect {
            Effect::Greet => Toast::Welcome,
            Effect::Milestone(count) => Toast::Reached(count),
        };
        if let Err(e) = self.signals.send(toast) {
            warn!("Dropping toast: {}", e);
        }
    }
}

/// Delivery counts observed by the views over the whole run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DemoReport {
    pub models: usize,
    pub signals: usize,
    pub final_count: u32,
}

fn update(signal_every: u32) -> impl Fn(&Counter, Event) -> Next<Counter, Effect> + Send + Sync + 'static {
    move |model: &Counter, event: Event| match event {
        Event::Increment => {
            let count = model.count + 1;
            if count % signal_every == 0 {
                Next::next_with(Counter { count }, vec![Effect::Milestone(count)])
            } else {
                Next::next(Counter { count })
            }
        }
    }
}

fn init(model: Counter) -> loopview::Result<First<Counter, Effect>> {
    Ok(First::with_effects(model, vec![Effect::Greet]))
}

fn describe(toast: &Toast) -> String {
    match toast {
        Toast::Welcome => "welcome".to_string(),
        Toast::Reached(count) => format!("reached {}", count),
    }
}

/// Run the demo on the current tokio runtime
pub async fn run(demo: &DemoConfig, host_config: HostConfig) -> Result<DemoReport> {
    let runner: Arc<dyn WorkRunner> = Arc::new(DeliveryThread::spawn().context("Failed to start delivery thread")?);
    let signal_every = demo.signal_every;

    let host: LoopHost<Counter, Event, Toast> = LoopHost::builder(
        move |signals| ReducerLoopFactory::new(update(signal_every), ToastEffects { signals }),
        Counter::default(),
        init,
    )
    .config(host_config)
    .work_runner(Arc::clone(&runner))
    .before_dispose(|| info!("Counter loop shutting down"))
    .build()
    .context("Failed to start counter loop")?;

    let models = Arc::new(AtomicUsize::new(0));
    let signals = Arc::new(AtomicUsize::new(0));

    for cycle in 1..=demo.view_cycles {
        println!("{} {}", "View".cyan(), format!("#{} created", cycle).bold());

        let model_count = Arc::clone(&models);
        let live_count = Arc::clone(&signals);
        let backlog_count = Arc::clone(&signals);
        let view = ViewBinding::for_host(
            &host,
            move |model: Counter| {
                model_count.fetch_add(1, Ordering::SeqCst);
                println!("  {} count = {}", "model".green(), model.count);
            },
            move |toast: Toast| {
                live_count.fetch_add(1, Ordering::SeqCst);
                println!("  {} {}", "signal".yellow(), describe(&toast));
            },
        )
        .with_backlog(move |batch: Vec<Toast>| {
            backlog_count.fetch_add(batch.len(), Ordering::SeqCst);
            let described: Vec<String> = batch.iter().map(describe).collect();
            println!("  {} {}", "backlog".magenta(), described.join(", "));
        });
        let view = Arc::new(Mutex::new(view));

        on_delivery(&runner, &view, |v| v.on_resume());
        for _ in 0..demo.events {
            host.dispatch(Event::Increment);
        }
        tokio::time::sleep(SETTLE).await;

        on_delivery(&runner, &view, |v| v.on_pause());
        println!("  {}", "(hidden)".dimmed());
        for _ in 0..demo.events {
            host.dispatch(Event::Increment);
        }
        tokio::time::sleep(SETTLE).await;

        on_delivery(&runner, &view, |v| v.on_destroy());
        tokio::time::sleep(SETTLE).await;
        println!("{} {}", "View".cyan(), format!("#{} destroyed", cycle).bold());
    }

    let final_count = host.model().count;
    host.dispose();
    host.dispatch(Event::Increment);

    Ok(DemoReport {
        models: models.load(Ordering::SeqCst),
        signals: signals.load(Ordering::SeqCst),
        final_count,
    })
}

// Lifecycle transitions touch observer slots, so they run on the delivery context.
fn on_delivery<M, V>(
    runner: &Arc<dyn WorkRunner>,
    view: &Arc<Mutex<ViewBinding<M, V>>>,
    transition: impl FnOnce(&mut ViewBinding<M, V>) + Send + 'static,
) where
    M: Clone + Send + Sync + 'static,
    V: Send + 'static,
{
    let view = Arc::clone(view);
    runner.post(Box::new(move || {
        let mut view = view.lock().unwrap_or_else(|e| e.into_inner());
        transition(&mut view);
    }));
}
