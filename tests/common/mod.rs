// Shared fixtures for the integration tests: a backend that records what the
// core asked of it and a scriptable probe plugin.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use axiom_shell::arbiter::Capabilities;
use axiom_shell::input::ActivatorSource;
use axiom_shell::types::{BindingId, IdleHandle, SubscriptionId, TimerId};
use axiom_shell::{
    Core, OutputId, Plugin, PluginHandle, Rectangle, ShellBackend, ShellConfig, Signal, SurfaceId,
    Task, ViewId, ViewRole,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Command(String),
    Close(ViewId),
    PopupDone(SurfaceId),
    Terminate,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    calls: Rc<RefCell<Vec<Call>>>,
}

impl RecordingBackend {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Command(cmd) => Some(cmd.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl ShellBackend for RecordingBackend {
    fn run_command(&mut self, command: &str) {
        self.calls.borrow_mut().push(Call::Command(command.to_string()));
    }

    fn close_view(&mut self, view: ViewId) {
        self.calls.borrow_mut().push(Call::Close(view));
    }

    fn send_popup_done(&mut self, surface: SurfaceId) {
        self.calls.borrow_mut().push(Call::PopupDone(surface));
    }

    fn terminate(&mut self) {
        self.calls.borrow_mut().push(Call::Terminate);
    }
}

pub const SCREEN: Rectangle = Rectangle {
    x: 0,
    y: 0,
    width: 1920,
    height: 1080,
};

/// A core with one output and the configured plugins loaded on it
pub fn setup(config: ShellConfig) -> (Core, RecordingBackend, OutputId) {
    let backend = RecordingBackend::default();
    let mut core = Core::new(config, Box::new(backend.clone()));
    let output = core.add_output("HEADLESS-1", SCREEN);
    core.load_configured_plugins(output);
    (core, backend, output)
}

pub fn config_with_plugins(plugins: &[&str]) -> ShellConfig {
    let mut config = ShellConfig::default();
    config.core.plugins = plugins.iter().map(|p| p.to_string()).collect();
    config
}

/// Create a view on `output` and map it
pub fn mapped_view(core: &mut Core, output: OutputId, role: ViewRole, geometry: Rectangle) -> ViewId {
    let view = core.create_view("test", role, geometry);
    core.set_view_output(view, Some(output));
    core.map_view(view);
    view
}

/// What a probe was asked to handle
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Init,
    Fini,
    Signal(SubscriptionId, Signal),
    Task(IdleHandle, Task),
    Timer(TimerId),
    Activator(BindingId, ActivatorSource, u32),
}

pub type Log = Rc<RefCell<Vec<(String, Event)>>>;

type Hook = Box<dyn FnMut(&mut Core, PluginHandle, &Event)>;

/// Plugin that logs every callback and hands it to an optional hook
pub struct Probe {
    name: String,
    caps: Capabilities,
    log: Log,
    hook: Option<Hook>,
}

impl Probe {
    pub fn new(name: &str, log: &Log) -> Self {
        Self {
            name: name.to_string(),
            caps: Capabilities::new(),
            log: log.clone(),
            hook: None,
        }
    }

    pub fn with_capabilities(mut self, caps: Capabilities) -> Self {
        self.caps = caps;
        self
    }

    pub fn with_hook(mut self, hook: impl FnMut(&mut Core, PluginHandle, &Event) + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    fn handle(&mut self, core: &mut Core, me: PluginHandle, event: Event) {
        self.log.borrow_mut().push((self.name.clone(), event.clone()));
        if let Some(hook) = self.hook.as_mut() {
            hook(core, me, &event);
        }
    }
}

impl Plugin for Probe {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.caps.clone()
    }

    fn init(&mut self, core: &mut Core, me: PluginHandle) {
        self.handle(core, me, Event::Init);
    }

    fn fini(&mut self, core: &mut Core, me: PluginHandle) {
        self.handle(core, me, Event::Fini);
    }

    fn on_signal(&mut self, core: &mut Core, me: PluginHandle, sub: SubscriptionId, signal: &Signal) {
        self.handle(core, me, Event::Signal(sub, signal.clone()));
    }

    fn on_task(&mut self, core: &mut Core, me: PluginHandle, handle: IdleHandle, task: Task) {
        self.handle(core, me, Event::Task(handle, task));
    }

    fn on_timer(&mut self, core: &mut Core, me: PluginHandle, timer: TimerId) {
        self.handle(core, me, Event::Timer(timer));
    }

    fn on_activator(
        &mut self,
        core: &mut Core,
        me: PluginHandle,
        binding: BindingId,
        source: ActivatorSource,
        code: u32,
    ) -> bool {
        self.handle(core, me, Event::Activator(binding, source, code));
        true
    }
}

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Names of the probes that saw a signal on `channel`, in delivery order
pub fn signal_order(log: &Log, channel: &str) -> Vec<String> {
    log.borrow()
        .iter()
        .filter(|(_, e)| matches!(e, Event::Signal(_, s) if s.is(channel)))
        .map(|(name, _)| name.clone())
        .collect()
}

/// Channels a single probe saw, in order
pub fn channels_seen(log: &Log, probe: &str) -> Vec<String> {
    log.borrow()
        .iter()
        .filter(|(name, _)| name == probe)
        .filter_map(|(_, e)| match e {
            Event::Signal(_, s) => Some(s.channel.clone()),
            _ => None,
        })
        .collect()
}
