use tokio::sync::broadcast;

use crate::models::match_result::{MatchAlert, MatchResult, ResultsSnapshot, ScanEvent};

/// Receives store changes from the scanner. Rendering and sound live behind this.
pub trait Presenter: Send + Sync {
    /// Called with a freshly sorted snapshot after each insertion or sort change.
    fn on_results_changed(&self, snapshot: &ResultsSnapshot);

    /// Called once per newly stored match. `audible` mirrors the notification toggle.
    fn on_match(&self, result: &MatchResult, audible: bool);
}

/// Fans events out to stream subscribers and logs every new match.
#[derive(Debug, Clone)]
pub struct BroadcastPresenter {
    broadcaster: broadcast::Sender<ScanEvent>,
}

impl BroadcastPresenter {
    pub fn new(broadcaster: broadcast::Sender<ScanEvent>) -> Self {
        Self { broadcaster }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.broadcaster.subscribe()
    }
}

impl Presenter for BroadcastPresenter {
    fn on_results_changed(&self, snapshot: &ResultsSnapshot) {
        // No subscribers is fine
        let _ = self.broadcaster.send(ScanEvent::Snapshot(snapshot.clone()));
    }

    fn on_match(&self, result: &MatchResult, audible: bool) {
        tracing::warn!(
            "🚨 REVERSAL: {} on {} - breakout close ${} (vol {:.2}) | targets {} | stop {}",
            result.symbol,
            result.timeframe,
            result.price,
            result.volume,
            result.targets_label(),
            result.stop_loss
        );

        let _ = self.broadcaster.send(ScanEvent::Match(MatchAlert {
            result: result.clone(),
            audible,
        }));
    }
}
