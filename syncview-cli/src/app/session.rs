use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use color_eyre::Result;
use color_eyre::eyre::{bail, eyre};
use syncview_core::{BulkAction, EngineConfig, Pending, SyncEngine, ViewList};
use tracing::{debug, info};

use super::action::{Action, ViewArgs};
use super::report::{bulk_lines, diff_lines, entity_line, reaction_line, status_line};

const TICK: Duration = Duration::from_millis(100);
const READY_TIMEOUT: Duration = Duration::from_secs(15);

pub fn run(config: EngineConfig, action: Action) -> Result<()> {
    let mut engine = SyncEngine::connect(config)?;
    engine.start();

    let result = match action {
        Action::Watch { view, for_secs } => {
            watch(&mut engine, &view, for_secs.map(Duration::from_secs))
        }
        Action::List { view, json } => list(&mut engine, &view, json),
        Action::Command { action, name } => command(&mut engine, action, &name),
        Action::Bulk {
            action,
            names,
            all_eligible,
            view,
        } => bulk(&mut engine, action, names, all_eligible, &view),
    };

    engine.stop();
    result
}

/// Applies the view flags and returns whether details are shown. Only
/// flags that were given touch the saved preferences.
fn apply_view(engine: &SyncEngine, view: &ViewArgs) -> bool {
    let mut options = engine.options().borrow_mut();
    if let Some(sort) = view.sort {
        options.set_sort_method(sort);
    }
    options.set_status_filter(view.status);
    options.set_name_filter(view.filter.as_deref());
    if let Some(show) = view.show_details() {
        options.set_show_details(show);
    }
    options.current().show_details
}

fn wait_ready(engine: &mut SyncEngine) -> Result<()> {
    let deadline = Instant::now() + READY_TIMEOUT;
    while !engine.is_ready() {
        if Instant::now() >= deadline {
            bail!(
                "no file list from the server within {}s ({})",
                READY_TIMEOUT.as_secs(),
                status_line(engine.status())
            );
        }
        engine.pump_for(TICK);
    }
    debug!(files = engine.files().len(), "model ready");
    Ok(())
}

fn wait_for<T: Send + 'static>(engine: &mut SyncEngine, pending: &Pending<T>) -> std::sync::Arc<T> {
    loop {
        if let Some(result) = pending.poll() {
            // let the engine observe completion too
            engine.pump();
            return result;
        }
        engine.pump_for(TICK);
    }
}

fn watch(engine: &mut SyncEngine, view: &ViewArgs, limit: Option<Duration>) -> Result<()> {
    let details = apply_view(engine, view);

    let previous = Rc::new(RefCell::new(ViewList::default()));
    let _files = {
        let previous = Rc::clone(&previous);
        engine
            .projector()
            .borrow()
            .subscribe_filtered(move |next: &ViewList| {
                let mut previous = previous.borrow_mut();
                for line in diff_lines(&previous, next, details) {
                    println!("{}", line);
                }
                *previous = next.clone();
            })
    };
    let _connection = engine.connection().borrow().subscribe(|connected: &bool| {
        if *connected {
            println!("# connected");
        } else {
            println!("# disconnected");
        }
    });

    let started = Instant::now();
    loop {
        if limit.is_some_and(|l| started.elapsed() >= l) {
            info!("watch time limit reached");
            return Ok(());
        }
        engine.pump_for(TICK);
    }
}

fn list(engine: &mut SyncEngine, view: &ViewArgs, json: bool) -> Result<()> {
    let details = apply_view(engine, view);
    wait_ready(engine)?;

    for entity in engine.filtered().iter() {
        if json {
            println!("{}", serde_json::to_string(entity)?);
        } else {
            println!("{}", entity_line(entity, details));
        }
    }
    Ok(())
}

fn command(engine: &mut SyncEngine, action: BulkAction, name: &str) -> Result<()> {
    wait_ready(engine)?;
    let pending = engine.command(action, name);
    let reaction = wait_for(engine, &pending);
    println!("{}", reaction_line(action.as_str(), name, &reaction));
    if !reaction.success {
        return Err(eyre!("{} {} failed", action, name));
    }
    Ok(())
}

fn bulk(
    engine: &mut SyncEngine,
    action: BulkAction,
    names: Vec<String>,
    all_eligible: bool,
    view: &ViewArgs,
) -> Result<()> {
    apply_view(engine, view);
    wait_ready(engine)?;

    let pending = if all_eligible {
        let visible = engine.filtered();
        engine
            .selection()
            .borrow_mut()
            .select_all_visible(visible.names());
        engine.bulk_selected(action)
    } else {
        engine.bulk(action, names)
    };
    let result = wait_for(engine, &pending);

    for line in bulk_lines(&result) {
        println!("{}", line);
    }
    if !result.all_succeeded() {
        bail!("{} did not succeed for every file", action);
    }
    Ok(())
}
