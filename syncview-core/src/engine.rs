//! Owns every component of the sync pipeline and wires them together:
//! stream → model store → view projector → selection, with view options
//! driving the projector's sort and filter.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::{MAX_TIMER_DELAY, SharedClock, SystemClock};
use crate::command::{
    BulkAction, BulkExecutor, BulkResult, CommandTransport, FileCommands, Pending,
    UreqCommandTransport, WebReaction, eligible_names,
};
use crate::model::ModelStore;
use crate::prefs::PrefsFile;
use crate::publish::Subscription;
use crate::selection::{SelectionManager, SelectionSnapshot};
use crate::stream::{
    ChannelConfig, ChannelStatus, ConnectionState, EventChannel, HttpStreamTransport,
    SharedConsumer, StreamTransport,
};
use crate::view::{SortMethod, ViewList, ViewOptions, ViewOptionsService, ViewProjector, ViewStatus};
use crate::Result;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the sync server, e.g. `http://localhost:8800`
    pub server_url: String,
    pub channel: ChannelConfig,
    /// Where view preferences are kept; `None` keeps them in memory only
    pub prefs_path: Option<PathBuf>,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8800".to_string(),
            channel: ChannelConfig::default(),
            prefs_path: None,
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    pub fn stream_url(&self) -> String {
        format!(
            "{}{}",
            self.server_url.trim_end_matches('/'),
            self.channel.stream_path
        )
    }
}

/// The live file list of one server.
///
/// Single-threaded: call [`pump`](Self::pump) or
/// [`pump_for`](Self::pump_for) from the event loop. Components are
/// shared as `Rc<RefCell<_>>` so a UI layer can subscribe to them
/// directly.
pub struct SyncEngine<T = HttpStreamTransport, C = UreqCommandTransport> {
    channel: EventChannel<T>,
    store: Rc<RefCell<ModelStore>>,
    connection: Rc<RefCell<ConnectionState>>,
    projector: Rc<RefCell<ViewProjector>>,
    selection: Rc<RefCell<SelectionManager>>,
    options: Rc<RefCell<ViewOptionsService>>,
    commands: FileCommands<C>,
    bulk: BulkExecutor<C>,
    bulk_in_flight: Vec<Pending<BulkResult>>,
    _subscriptions: Vec<Subscription>,
}

impl SyncEngine {
    /// Engine talking HTTP to `config.server_url`. Nothing is opened
    /// until [`start`](Self::start).
    pub fn connect(config: EngineConfig) -> Result<Self> {
        // A silent socket is detected by the idle timer; the read timeout
        // only has to free the reader thread eventually.
        let read_timeout = config
            .channel
            .idle_timeout
            .saturating_mul(2)
            .min(MAX_TIMER_DELAY);
        let stream = HttpStreamTransport::new(config.stream_url(), config.connect_timeout, read_timeout);
        let commands = Arc::new(UreqCommandTransport::new(
            &config.server_url,
            config.command_timeout,
        ));
        let options = match &config.prefs_path {
            Some(path) => ViewOptionsService::with_prefs(PrefsFile::new(path)),
            None => ViewOptionsService::new(ViewOptions::default()),
        };

        info!(server = %config.server_url, "creating sync engine");
        Self::with_transports(stream, commands, config.channel, options, SystemClock::shared())
    }
}

impl<T: StreamTransport, C: CommandTransport + 'static> SyncEngine<T, C> {
    pub fn with_transports(
        stream: T,
        commands: Arc<C>,
        channel_config: ChannelConfig,
        options: ViewOptionsService,
        clock: SharedClock,
    ) -> Result<Self> {
        let store = Rc::new(RefCell::new(ModelStore::new()));
        let connection = Rc::new(RefCell::new(ConnectionState::new()));
        let projector = Rc::new(RefCell::new(ViewProjector::new()));
        let selection = Rc::new(RefCell::new(SelectionManager::new()));
        let options = Rc::new(RefCell::new(options));

        let mut subscriptions = Vec::new();

        // Selection follows the full list
        subscriptions.push({
            let selection = Rc::clone(&selection);
            projector.borrow().subscribe_files(move |files: &ViewList| {
                let mut selection = selection.borrow_mut();
                selection.prune_selection(files.names());
                selection.on_list_changed(files);
            })
        });

        // Options drive sort and filter
        subscriptions.push({
            let projector = Rc::clone(&projector);
            let mut last_sort: Option<SortMethod> = None;
            let mut last_filter: Option<(Option<ViewStatus>, Option<String>)> = None;
            options.borrow().subscribe(move |opts: &ViewOptions| {
                let mut projector = projector.borrow_mut();
                if last_sort != Some(opts.sort_method) {
                    projector.set_sort_method(opts.sort_method);
                    last_sort = Some(opts.sort_method);
                }
                let filter_key = (opts.status_filter, opts.name_filter.clone());
                if last_filter.as_ref() != Some(&filter_key) {
                    projector.set_filter_boxed(opts.filter());
                    last_filter = Some(filter_key);
                }
            })
        });

        // Model drives the list
        subscriptions.push({
            let projector = Rc::clone(&projector);
            store
                .borrow()
                .subscribe(move |snapshot| projector.borrow_mut().on_model(snapshot))
        });

        let mut channel = EventChannel::new(stream, channel_config, clock);
        let store_consumer: SharedConsumer = store.clone();
        let connection_consumer: SharedConsumer = connection.clone();
        channel.register_consumer(store_consumer)?;
        channel.register_consumer(connection_consumer)?;

        Ok(Self {
            channel,
            store,
            connection,
            projector,
            selection,
            options,
            commands: FileCommands::new(Arc::clone(&commands)),
            bulk: BulkExecutor::new(commands),
            bulk_in_flight: Vec::new(),
            _subscriptions: subscriptions,
        })
    }

    pub fn start(&mut self) {
        self.channel.start();
    }

    pub fn stop(&mut self) {
        self.channel.stop();
    }

    /// Process whatever has arrived without blocking
    pub fn pump(&mut self) -> usize {
        let handled = self.channel.pump();
        self.reap_bulk();
        handled
    }

    /// Wait up to `timeout` for stream activity, then process it
    pub fn pump_for(&mut self, timeout: Duration) -> usize {
        let handled = self.channel.pump_for(timeout);
        self.reap_bulk();
        handled
    }

    pub fn status(&self) -> ChannelStatus {
        self.channel.status()
    }

    pub fn channel(&self) -> &EventChannel<T> {
        &self.channel
    }

    pub fn is_connected(&self) -> bool {
        self.connection.borrow().is_connected()
    }

    /// Connected and holding a full model
    pub fn is_ready(&self) -> bool {
        self.is_connected() && self.store.borrow().is_initialized()
    }

    pub fn store(&self) -> &Rc<RefCell<ModelStore>> {
        &self.store
    }

    pub fn connection(&self) -> &Rc<RefCell<ConnectionState>> {
        &self.connection
    }

    pub fn projector(&self) -> &Rc<RefCell<ViewProjector>> {
        &self.projector
    }

    pub fn selection(&self) -> &Rc<RefCell<SelectionManager>> {
        &self.selection
    }

    pub fn options(&self) -> &Rc<RefCell<ViewOptionsService>> {
        &self.options
    }

    pub fn files(&self) -> ViewList {
        self.projector.borrow().files().clone()
    }

    pub fn filtered(&self) -> ViewList {
        self.projector.borrow().filtered().clone()
    }

    pub fn selection_snapshot(&self) -> SelectionSnapshot {
        self.selection.borrow().snapshot().clone()
    }

    /// Run a single-file command. Names the model does not know fail
    /// without a request.
    pub fn command(&self, action: BulkAction, name: &str) -> Pending<WebReaction> {
        if !self.store.borrow().snapshot().contains(name) {
            warn!(action = action.as_str(), name, "command for unknown file");
            return Pending::ready(WebReaction::failed(format!("File '{}' not found", name)));
        }
        self.commands.execute(action, name)
    }

    /// Run `action` over `names` in one request. Selection pruning is held
    /// off until the result arrives.
    pub fn bulk(&mut self, action: BulkAction, names: Vec<String>) -> Pending<BulkResult> {
        let pending = self.bulk.execute(action, names);
        if !pending.is_settled() {
            self.selection.borrow_mut().begin_operation();
            self.bulk_in_flight.push(pending.clone());
        }
        pending
    }

    /// Run `action` over the selected entities it applies to
    pub fn bulk_selected(&mut self, action: BulkAction) -> Pending<BulkResult> {
        let names = eligible_names(action, &self.files(), &self.selection_snapshot());
        debug!(action = action.as_str(), eligible = names.len(), "bulk over selection");
        self.bulk(action, names)
    }

    fn reap_bulk(&mut self) {
        if self.bulk_in_flight.is_empty() {
            return;
        }
        self.bulk_in_flight.retain(|p| p.poll().is_none());
        if self.bulk_in_flight.is_empty() {
            let files = self.files();
            let mut selection = self.selection.borrow_mut();
            selection.end_operation();
            selection.prune_selection(files.names());
            debug!("bulk operations finished");
        }
    }
}
