// view.rs — dashboard and watch: the plan view in a terminal.
//
// `watch` owns a single PlanView on the main thread. Three sources feed it
// signals over one channel:
//   - a notify watcher on the store directory (other processes' writes)
//   - the store's change bus (transitions typed into this process)
//   - stdin lines (commands)

use std::io::BufRead;
use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::thread;

use dte_progress::{
    DirStore, Entry, Milestone, PendingNotification, PlanView, Signal, Step, ViewUpdate,
};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::progress::{ensure_unlocked, print_state};
use super::Context;

enum Input {
    Signal(Signal),
    Line(String),
}

pub fn dashboard(ctx: &Context, from_discover: bool) -> anyhow::Result<()> {
    let mut view = PlanView::open(&ctx.store, &ctx.session, entry(from_discover))
        .with_delay(ctx.config.notification_delay());
    render(&view.enter());
    Ok(())
}

pub fn watch(ctx: &Context, from_discover: bool) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel();

    let _watcher = StoreWatcher::new(ctx.store.backend().dir(), tx.clone())?;

    let bus_tx = tx.clone();
    let _subscription = ctx.store.bus().on_change(move |signal| {
        let _ = bus_tx.send(Input::Signal(signal.clone()));
    });

    let stdin_tx = tx.clone();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if stdin_tx.send(Input::Line(line)).is_err() {
                break;
            }
        }
    });

    // Attaching the terminal counts as the view becoming visible.
    let _ = tx.send(Input::Signal(Signal::VisibilityChanged { visible: true }));
    drop(tx);

    let mut view = PlanView::open(&ctx.store, &ctx.session, entry(from_discover))
        .with_delay(ctx.config.notification_delay());
    render(&view.enter());
    println!(
        "\nWatching {} (discover/train/execute/reset/status/quit)",
        ctx.store.backend().dir().display()
    );

    for input in rx {
        match input {
            Input::Signal(signal) => {
                if let Some(update) = view.handle(&signal) {
                    if let Some(pending) = update.notification {
                        show(&pending);
                    }
                }
            }
            Input::Line(line) => match line.trim() {
                "" => {}
                "quit" | "q" | "exit" => break,
                "status" => print_state(&view.state()),
                "reset" => {
                    ctx.store.reset();
                    println!("Progress reset.");
                }
                other => match other.parse::<Step>() {
                    Ok(step) => match ensure_unlocked(&view.state(), step) {
                        Ok(()) => {
                            ctx.store.complete(step);
                            println!("{} completed.", step.title());
                        }
                        Err(e) => eprintln!("{}", e),
                    },
                    Err(e) => eprintln!("{}", e),
                },
            },
        }
    }

    Ok(())
}

fn entry(from_discover: bool) -> Entry {
    if from_discover {
        Entry::FromDiscover
    } else {
        Entry::Direct
    }
}

fn render(update: &ViewUpdate) {
    print_state(&update.state);
    if let Some(ref pending) = update.notification {
        show(pending);
    }
}

/// Show an unlock notification after its delay.
fn show(pending: &PendingNotification) {
    thread::sleep(pending.delay);
    println!();
    println!("{}", notification_text(pending.milestone));
}

fn notification_text(milestone: Milestone) -> String {
    let done = match milestone {
        Milestone::Train => Step::Discover,
        Milestone::Execute => Step::Train,
    };
    format!(
        "** {} unlocked! You finished {}; {} is ready to start. **",
        milestone.step().title(),
        done.title(),
        milestone.step().title()
    )
}

/// Forwards writes to the store directory as storage-change signals.
struct StoreWatcher {
    _watcher: RecommendedWatcher,
}

impl StoreWatcher {
    fn new(dir: &Path, tx: Sender<Input>) -> anyhow::Result<Self> {
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    for signal in storage_signals(&event) {
                        let _ = tx.send(Input::Signal(signal));
                    }
                }
                Err(e) => tracing::warn!("store watch error: {:?}", e),
            }
        })?;

        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        tracing::debug!("watching {}", dir.display());

        Ok(Self { _watcher: watcher })
    }
}

/// Map a file-system event to one signal per changed key file.
/// Temp files and access events are ignored.
fn storage_signals(event: &Event) -> Vec<Signal> {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return Vec::new();
    }

    event
        .paths
        .iter()
        .filter_map(|path| path.file_name()?.to_str())
        .filter(|name| DirStore::is_key_file(name))
        .map(|name| Signal::StorageChanged {
            key: Some(name.to_string()),
        })
        .collect()
}
