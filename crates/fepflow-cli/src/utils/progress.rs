use fepflow::workflows::progress::{Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

#[derive(Clone)]
pub struct CliProgressHandler {
    pb: Arc<Mutex<ProgressBar>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let pb = ProgressBar::new_spinner()
            .with_style(Self::spinner_style())
            .with_message("Initializing...");
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.finish_and_clear();

        Self {
            pb: Arc::new(Mutex::new(pb)),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let pb_clone = self.pb.clone();

        Box::new(move |progress: Progress| {
            let Ok(pb_guard) = pb_clone.lock() else {
                warn!("Progress spinner mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::StageStart { stage } => {
                    pb_guard.reset();
                    pb_guard.set_style(Self::spinner_style());
                    pb_guard.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                    pb_guard.set_message(format!("{}...", capitalize(&stage.to_string())));
                }
                Progress::StageFinish { stage } => {
                    pb_guard.disable_steady_tick();
                    pb_guard.finish_with_message(format!("✓ {}", capitalize(&stage.to_string())));
                }
                Progress::Message(msg) => {
                    if !pb_guard.is_finished() {
                        pb_guard.println(format!("  {}", msg));
                    } else {
                        pb_guard.set_message(msg);
                    }
                }
            }
        })
    }

    /// Stops the spinner without leaving a line behind, e.g. after a failure.
    pub fn clear(&self) {
        if let Ok(pb) = self.pb.lock() {
            pb.disable_steady_tick();
            pb.finish_and_clear();
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fepflow::workflows::window::RunStage;
    use std::thread;

    #[test]
    fn handler_initializes_in_a_clean_state() {
        let handler = CliProgressHandler::new();
        let pb = handler.pb.lock().unwrap();
        assert!(pb.is_finished());
    }

    #[test]
    fn callback_tracks_stage_transitions() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        callback(Progress::StageStart {
            stage: RunStage::EngineRunning,
        });
        {
            let pb = handler.pb.lock().unwrap();
            assert_eq!(pb.message(), "Engine run...");
            assert!(!pb.is_finished());
        }

        callback(Progress::Message("still running".to_string()));

        callback(Progress::StageFinish {
            stage: RunStage::EngineRunning,
        });
        {
            let pb = handler.pb.lock().unwrap();
            assert!(pb.is_finished());
            assert_eq!(pb.message(), "✓ Engine run");
        }

        callback(Progress::Message("copied".to_string()));
        assert_eq!(handler.pb.lock().unwrap().message(), "copied");
    }

    #[test]
    fn callback_is_thread_safe() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        thread::spawn(move || {
            callback(Progress::StageStart {
                stage: RunStage::DeckAssembled,
            });
            callback(Progress::StageFinish {
                stage: RunStage::DeckAssembled,
            });
        })
        .join()
        .unwrap();

        let pb = handler.pb.lock().unwrap();
        assert!(pb.is_finished());
        assert_eq!(pb.message(), "✓ Deck assembly");
    }

    #[test]
    fn clear_stops_an_active_spinner() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();
        callback(Progress::StageStart {
            stage: RunStage::ScheduleComputed,
        });
        handler.clear();
        assert!(handler.pb.lock().unwrap().is_finished());
    }

    #[test]
    fn capitalize_handles_empty_and_ascii_text() {
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("result copy"), "Result copy");
    }
}
