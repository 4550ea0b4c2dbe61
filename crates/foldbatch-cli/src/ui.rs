use foldbatch::engine::progress::{Progress, ProgressCallback};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::warn;

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const SPINNER_TICK_MS: u64 = 80;

#[derive(Debug)]
pub enum UiEvent {
    Progress(Progress),
    Log(String),
}

/// Owns the terminal while a command runs: progress bars below, log lines above.
pub struct UiManager {
    mp: Arc<MultiProgress>,
    state: BarState,
    event_receiver: mpsc::Receiver<UiEvent>,
    shutdown_receiver: watch::Receiver<bool>,
    _sentinel_bar: ProgressBar,
}

#[derive(Default)]
struct BarState {
    active_bar: Option<ProgressBar>,
    phase: String,
}

impl UiManager {
    pub fn new() -> (Self, mpsc::Sender<UiEvent>, watch::Sender<bool>) {
        let (event_sender, event_receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown_sender, shutdown_receiver) = watch::channel(false);
        let mp = Arc::new(MultiProgress::new());
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
        let _sentinel_bar = mp.add(ProgressBar::hidden());
        let manager = Self {
            mp,
            state: BarState::default(),
            event_receiver,
            shutdown_receiver,
            _sentinel_bar,
        };

        (manager, event_sender, shutdown_sender)
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(event) = self.event_receiver.recv() => {
                    self.handle_event(event);
                }
                result = self.shutdown_receiver.changed() => {
                    if result.is_err() || *self.shutdown_receiver.borrow() {
                        break;
                    }
                }
            }
        }
        // Drain whatever was queued before the shutdown signal.
        while let Ok(event) = self.event_receiver.try_recv() {
            self.handle_event(event);
        }
        if let Some(bar) = self.state.active_bar.take() {
            bar.finish_and_clear();
        }
        self._sentinel_bar.finish_and_clear();
    }

    fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Log(line) => {
                self.mp.println(line).ok();
            }
            UiEvent::Progress(progress) => self.handle_progress(progress),
        }
    }

    fn handle_progress(&mut self, progress: Progress) {
        match progress {
            Progress::PhaseStart { name } => {
                if let Some(bar) = self.state.active_bar.take() {
                    bar.finish_and_clear();
                }

                let pb = self.mp.add(ProgressBar::new_spinner());
                pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                pb.set_style(Self::spinner_style());
                pb.set_message(name.clone());

                self.state.active_bar = Some(pb);
                self.state.phase = name;
            }
            Progress::PhaseFinish => {
                if let Some(bar) = self.state.active_bar.take() {
                    bar.finish_and_clear();
                }
                self.mp.println(format!("✓ {}", self.state.phase)).ok();
                self.state.phase.clear();
            }
            Progress::TaskStart { total } => {
                if let Some(bar) = self.state.active_bar.as_ref() {
                    bar.disable_steady_tick();
                    bar.set_style(Self::bar_style());
                    bar.set_length(total);
                    bar.set_position(0);
                }
            }
            Progress::TaskIncrement { amount } => {
                if let Some(bar) = self.state.active_bar.as_ref() {
                    bar.inc(amount);
                }
            }
            Progress::TaskFinish => {
                if let Some(bar) = self.state.active_bar.as_ref() {
                    bar.finish();
                }
            }
            Progress::StatusUpdate { text } => {
                if let Some(bar) = self.state.active_bar.as_ref() {
                    bar.set_message(format!("{} ({})", self.state.phase, text));
                }
            }
            Progress::Message(msg) => {
                self.mp.println(format!("  {}", msg)).ok();
            }
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .expect("Invalid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{msg:<40} [{bar:40.cyan/blue}] {pos}/{len} mutations ({elapsed}, eta {eta})",
        )
        .expect("Invalid template")
        .with_key(
            "eta",
            |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                let _ = write!(w, "{}", humanize(state.eta()));
            },
        )
        .progress_chars("━╸ ")
    }
}

/// Formats a duration at a coarse, human-readable resolution.
fn humanize(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        0..60 => format!("{}s", secs),
        60..3600 => format!("{}m{:02}s", secs / 60, secs % 60),
        _ => format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60),
    }
}

#[derive(Clone)]
pub struct CliProgressHandler {
    sender: mpsc::Sender<UiEvent>,
}

impl CliProgressHandler {
    pub fn new(sender: mpsc::Sender<UiEvent>) -> Self {
        Self { sender }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let sender = self.sender.clone();
        Box::new(move |progress: Progress| {
            if let Err(e) = sender.try_send(UiEvent::Progress(progress)) {
                warn!("Failed to send progress update to UI channel: {}", e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_manager() -> (UiManager, mpsc::Sender<UiEvent>, watch::Sender<bool>) {
        let (manager, sender, shutdown) = UiManager::new();
        manager.mp.set_draw_target(ProgressDrawTarget::hidden());
        (manager, sender, shutdown)
    }

    fn start_phase(manager: &mut UiManager, name: &str) {
        manager.handle_event(UiEvent::Progress(Progress::PhaseStart {
            name: name.to_string(),
        }));
    }

    #[test]
    fn phase_start_creates_spinner_with_phase_name() {
        let (mut manager, _, _) = setup_manager();
        assert!(manager.state.active_bar.is_none());

        start_phase(&mut manager, "Preparation");

        let bar = manager.state.active_bar.as_ref().unwrap();
        assert_eq!(bar.message(), "Preparation");
        assert_eq!(manager.state.phase, "Preparation");
    }

    #[test]
    fn phase_start_replaces_existing_bar() {
        let (mut manager, _, _) = setup_manager();
        start_phase(&mut manager, "Preparation");
        start_phase(&mut manager, "Evaluating mutations");

        let bar = manager.state.active_bar.as_ref().unwrap();
        assert_eq!(bar.message(), "Evaluating mutations");
        assert_eq!(manager.state.phase, "Evaluating mutations");
    }

    #[test]
    fn phase_finish_clears_active_bar() {
        let (mut manager, _, _) = setup_manager();
        start_phase(&mut manager, "Preparation");

        manager.handle_event(UiEvent::Progress(Progress::PhaseFinish));

        assert!(manager.state.active_bar.is_none());
        assert!(manager.state.phase.is_empty());
    }

    #[test]
    fn task_events_drive_bar_length_and_position() {
        let (mut manager, _, _) = setup_manager();
        start_phase(&mut manager, "Evaluating mutations");

        manager.handle_event(UiEvent::Progress(Progress::TaskStart { total: 12 }));
        {
            let bar = manager.state.active_bar.as_ref().unwrap();
            assert_eq!(bar.length(), Some(12));
            assert_eq!(bar.position(), 0);
        }

        manager.handle_event(UiEvent::Progress(Progress::TaskIncrement { amount: 1 }));
        manager.handle_event(UiEvent::Progress(Progress::TaskIncrement { amount: 4 }));
        assert_eq!(manager.state.active_bar.as_ref().unwrap().position(), 5);

        manager.handle_event(UiEvent::Progress(Progress::TaskFinish));
        assert!(manager.state.active_bar.as_ref().unwrap().is_finished());
    }

    #[test]
    fn status_update_names_the_current_protein() {
        let (mut manager, _, _) = setup_manager();
        start_phase(&mut manager, "Evaluating mutations");

        manager.handle_event(UiEvent::Progress(Progress::StatusUpdate {
            text: "P12345".into(),
        }));

        let bar = manager.state.active_bar.as_ref().unwrap();
        assert_eq!(bar.message(), "Evaluating mutations (P12345)");
    }

    #[test]
    fn events_without_an_active_bar_are_ignored() {
        let (mut manager, _, _) = setup_manager();
        manager.handle_event(UiEvent::Progress(Progress::TaskIncrement { amount: 3 }));
        manager.handle_event(UiEvent::Progress(Progress::StatusUpdate {
            text: "P1".into(),
        }));
        manager.handle_event(UiEvent::Log("a log line".to_string()));
        manager.handle_event(UiEvent::Progress(Progress::Message("a message".to_string())));
        assert!(manager.state.active_bar.is_none());
    }

    #[test]
    fn humanize_picks_coarse_units() {
        assert_eq!(humanize(Duration::from_secs(42)), "42s");
        assert_eq!(humanize(Duration::from_secs(125)), "2m05s");
        assert_eq!(humanize(Duration::from_secs(7260)), "2h01m");
    }

    #[tokio::test]
    async fn cli_progress_handler_sends_progress_event() {
        let (sender, mut receiver) = mpsc::channel(1);
        let handler = CliProgressHandler::new(sender);
        let callback = handler.get_callback();

        callback(Progress::TaskStart { total: 7 });

        match receiver.recv().await.unwrap() {
            UiEvent::Progress(Progress::TaskStart { total }) => assert_eq!(total, 7),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn manager_stops_on_shutdown_signal() {
        let (manager, sender, shutdown) = setup_manager();
        let handle = tokio::spawn(manager.run());

        sender.send(UiEvent::Log("before shutdown".to_string())).await.unwrap();
        shutdown.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
