//! The applet core: owns the detected monitors and the popup menu built from them.
//!
//! Detection runs as a single tokio task that awaits every ddcutil invocation
//! before issuing the next one, so at most one ddcutil process is alive at a
//! time. Each run carries a generation number; a refresh bumps it and aborts the
//! previous task, and results from an older generation are never published.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::cache::MonitorCache;
use crate::command_builder::CommandBuilder;
use crate::error::{DdcswError, ErrorReporting, ValidationError};
use crate::executor::{ToolOutput, ToolRunner};
use crate::menu::{build_menu, selectable_entry, DisplayPreferences, MenuItem, MenuState};
use crate::monitor::Monitor;
use crate::parser::{parse_capabilities, parse_current_input, parse_detect};
use crate::Result;

/// Exit code used in the menu when ddcutil produced no exit status at all
/// (timeout, killed, spawn failure).
const NO_EXIT_CODE: i32 = -1;

#[derive(Debug, Clone)]
pub struct AppletSettings {
    pub use_cache: bool,
    pub cache_file: PathBuf,
    pub cache_max_age: Duration,
    pub preferences: HashMap<String, DisplayPreferences>,
}

impl Default for AppletSettings {
    fn default() -> Self {
        Self {
            use_cache: true,
            cache_file: MonitorCache::get_cache_file(),
            cache_max_age: Duration::from_secs(90 * 24 * 3600),
            preferences: HashMap::new(),
        }
    }
}

#[derive(Debug)]
struct AppletState {
    status: MenuState,
    monitors: Vec<Monitor>,
    generation: u64,
}

/// Result of activating a menu entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    InputSelected { display: u32, code: u16 },
    RefreshStarted,
}

pub struct Applet {
    state: Arc<Mutex<AppletState>>,
    runner: Arc<dyn ToolRunner>,
    commands: CommandBuilder,
    settings: Arc<AppletSettings>,
    runtime: Handle,
    detection: Mutex<Option<JoinHandle<()>>>,
}

impl Applet {
    /// Must be called from within a tokio runtime; detection tasks are spawned on it.
    pub fn new(runner: Arc<dyn ToolRunner>, commands: CommandBuilder, settings: AppletSettings) -> Self {
        Self {
            state: Arc::new(Mutex::new(AppletState {
                status: MenuState::Detecting,
                monitors: Vec::new(),
                generation: 0,
            })),
            runner,
            commands,
            settings: Arc::new(settings),
            runtime: Handle::current(),
            detection: Mutex::new(None),
        }
    }

    /// Initial detection; cached monitors are reused.
    pub fn start(&self) {
        log::info!("Starting monitor detection");
        self.spawn_detection(false);
    }

    /// Throws away every known monitor and detects again without consulting the cache.
    pub fn refresh(&self) {
        log::info!("Refreshing monitor list");
        self.spawn_detection(true);
    }

    /// Waits for the running detection, if any, to finish.
    pub async fn wait_idle(&self) {
        let handle = lock(&self.detection).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    log::error!("Detection task failed: {}", e);
                }
            }
        }
    }

    pub fn menu(&self) -> Vec<MenuItem> {
        let state = lock(&self.state);
        build_menu(state.status, &state.monitors, &self.settings.preferences)
    }

    pub fn status(&self) -> (MenuState, Vec<Monitor>) {
        let state = lock(&self.state);
        (state.status, state.monitors.clone())
    }

    pub async fn select_input(&self, display: u32, code: u16) -> Result<()> {
        {
            let state = lock(&self.state);
            let monitor = state
                .monitors
                .iter()
                .find(|m| m.number == display)
                .ok_or(DdcswError::Validation(ValidationError::UnknownDisplay { display }))?;
            // No known inputs (still detecting, or capabilities failed): let ddcutil decide
            if !monitor.inputs().is_empty() && !monitor.supports_input(code) {
                return Err(DdcswError::Validation(ValidationError::UnsupportedInput { display, code }));
            }
        }

        let args = self.commands.set_input(display, code);
        let command_line = self.commands.command_line(&args);
        log::info!("Switching display {} to input 0x{:02x}", display, code);

        let output = match self.runner.run(&args).await {
            Err(e) if e.is_tool_missing() => {
                self.mark_tool_missing();
                return Err(e);
            }
            result => result?,
        };
        if output.tool_missing() {
            self.mark_tool_missing();
        }
        output.check(&self.runner.tool_name(), &command_line)?;

        let mut state = lock(&self.state);
        if let Some(monitor) = state.monitors.iter_mut().find(|m| m.number == display) {
            monitor.current_input = Some(code);
        }
        Ok(())
    }

    /// Activates the `index`-th selectable menu entry (1-based).
    pub async fn activate(&self, index: usize) -> Result<Activation> {
        let entry = selectable_entry(&self.menu(), index).cloned();
        match entry {
            Some(MenuItem::Input { display, code, .. }) => {
                self.select_input(display, code).await?;
                Ok(Activation::InputSelected { display, code })
            }
            Some(MenuItem::Refresh) => {
                self.refresh();
                Ok(Activation::RefreshStarted)
            }
            _ => Err(DdcswError::Validation(ValidationError::UnknownMenuEntry { index })),
        }
    }

    /// ddcutil vanished: drop every monitor and stop any running detection.
    fn mark_tool_missing(&self) {
        log::warn!("ddcutil is no longer available");
        {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.status = MenuState::ToolMissing;
            state.monitors.clear();
        }
        if let Some(previous) = lock(&self.detection).take() {
            previous.abort();
        }
    }

    fn spawn_detection(&self, bypass_cache: bool) {
        let generation = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.status = MenuState::Detecting;
            state.monitors.clear();
            state.generation
        };

        let task = DetectionTask {
            state: Arc::clone(&self.state),
            runner: Arc::clone(&self.runner),
            commands: self.commands.clone(),
            settings: Arc::clone(&self.settings),
            generation,
            bypass_cache,
        };

        let mut slot = lock(&self.detection);
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        *slot = Some(self.runtime.spawn(task.run()));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Everything one detection run needs, handed over explicitly.
struct DetectionTask {
    state: Arc<Mutex<AppletState>>,
    runner: Arc<dyn ToolRunner>,
    commands: CommandBuilder,
    settings: Arc<AppletSettings>,
    generation: u64,
    bypass_cache: bool,
}

enum Step {
    Done(ToolOutput),
    ToolMissing,
    Failed(i32),
}

impl DetectionTask {
    async fn run(self) {
        let detect = match self.invoke(self.commands.detect()).await {
            Step::Done(output) => output,
            Step::ToolMissing => {
                self.publish(MenuState::ToolMissing, &[]);
                return;
            }
            Step::Failed(code) => {
                self.publish(MenuState::ToolError(code), &[]);
                return;
            }
        };

        let mut monitors: Vec<Monitor> = parse_detect(&detect.stdout)
            .into_iter()
            .map(|display| display.into_monitor())
            .collect();

        if monitors.is_empty() {
            log::info!("ddcutil detected no monitors");
            self.publish(MenuState::NoMonitors, &[]);
            return;
        }

        log::info!("Detected {} monitor(s)", monitors.len());
        if !self.publish(MenuState::Detecting, &monitors) {
            return;
        }

        let mut cache = self.load_cache();
        let mut cache_dirty = false;

        for i in 0..monitors.len() {
            let number = monitors[i].number;
            let cached = match (&cache, monitors[i].key()) {
                (Some(cache), Some(key)) if !self.bypass_cache => cache.lookup(&key).cloned(),
                _ => None,
            };

            if let Some(entry) = cached {
                log::info!("Display {}: inputs restored from cache", number);
                entry.restore_into(&mut monitors[i]);
                if let (Some(cache), Some(key)) = (cache.as_mut(), monitors[i].key()) {
                    cache.touch(&key);
                    cache_dirty = true;
                }
            } else {
                match self.invoke(self.commands.capabilities(number)).await {
                    Step::Done(output) => {
                        let capabilities = parse_capabilities(&output.stdout);
                        let monitor = &mut monitors[i];
                        if monitor.name.is_empty() {
                            if let Some(model) = capabilities.model {
                                monitor.name = model;
                            }
                        }
                        log::info!(
                            "Display {} ({}): {} input(s)",
                            number,
                            monitor.display_name(),
                            capabilities.inputs.len()
                        );
                        monitor.set_inputs(capabilities.inputs);
                        if let Some(cache) = cache.as_mut() {
                            cache_dirty |= cache.store(monitor);
                        }
                    }
                    Step::ToolMissing => {
                        self.publish(MenuState::ToolMissing, &[]);
                        return;
                    }
                    Step::Failed(code) => {
                        log::warn!("Display {}: capabilities query failed ({})", number, code);
                        monitors[i].set_inputs(Vec::new());
                    }
                }
            }

            if !self.publish(MenuState::Detecting, &monitors) {
                return;
            }

            if monitors[i].inputs().is_empty() {
                continue;
            }

            match self.invoke(self.commands.get_input(number)).await {
                Step::Done(output) => {
                    monitors[i].current_input = parse_current_input(&output.stdout);
                    if monitors[i].current_input.is_none() {
                        log::warn!("Display {}: could not parse current input", number);
                    }
                }
                Step::ToolMissing => {
                    self.publish(MenuState::ToolMissing, &[]);
                    return;
                }
                Step::Failed(code) => {
                    log::warn!("Display {}: reading current input failed ({})", number, code);
                }
            }

            if !self.publish(MenuState::Detecting, &monitors) {
                return;
            }
        }

        if let Some(cache) = cache.as_mut() {
            if cache_dirty {
                if let Err(e) = cache.save(&self.settings.cache_file) {
                    e.log_error("Failed to save monitor cache");
                }
            }
        }

        self.publish(MenuState::Ready, &monitors);
        log::info!("Monitor detection complete");
    }

    async fn invoke(&self, args: Vec<String>) -> Step {
        match self.runner.run(&args).await {
            Ok(output) if output.success() => Step::Done(output),
            Ok(output) if output.tool_missing() => Step::ToolMissing,
            Ok(output) => Step::Failed(output.exit_code),
            Err(e) if e.is_tool_missing() => Step::ToolMissing,
            Err(e) => {
                e.log_error(&self.commands.command_line(&args));
                Step::Failed(NO_EXIT_CODE)
            }
        }
    }

    fn load_cache(&self) -> Option<MonitorCache> {
        if !self.settings.use_cache {
            return None;
        }
        let mut cache = MonitorCache::load(&self.settings.cache_file).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable monitor cache: {}", e.user_friendly_message());
            MonitorCache::new()
        });
        cache.cleanup_stale(self.settings.cache_max_age);
        Some(cache)
    }

    /// Returns false when a newer detection has taken over.
    fn publish(&self, status: MenuState, monitors: &[Monitor]) -> bool {
        let mut state = lock(&self.state);
        if state.generation != self.generation {
            log::debug!("Discarding results of detection run {}", self.generation);
            return false;
        }
        state.status = status;
        state.monitors = monitors.to_vec();
        true
    }
}
