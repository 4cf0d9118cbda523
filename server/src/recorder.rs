use log::info;
use shared::MatchResult;
use std::sync::Mutex;

/// Receives the outcome of every finished session, e.g. to persist it elsewhere.
pub trait MatchRecorder: Send + Sync {
    fn record(&self, session_id: &str, aliases: [&str; 2], result: &MatchResult);
}

/// Writes results to the log.
#[derive(Debug, Default)]
pub struct LogRecorder;

impl MatchRecorder for LogRecorder {
    fn record(&self, session_id: &str, aliases: [&str; 2], result: &MatchResult) {
        info!(
            "Session {} result: {} {} - {} {} ({:?}, winner {:?})",
            session_id,
            aliases[0],
            result.scores.left,
            result.scores.right,
            aliases[1],
            result.reason,
            result.winner
        );
    }
}

/// Keeps results in memory.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    results: Mutex<Vec<(String, MatchResult)>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<(String, MatchResult)> {
        self.results
            .lock()
            .map(|results| results.clone())
            .unwrap_or_default()
    }
}

impl MatchRecorder for MemoryRecorder {
    fn record(&self, session_id: &str, _aliases: [&str; 2], result: &MatchResult) {
        if let Ok(mut results) = self.results.lock() {
            results.push((session_id.to_string(), result.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{EndReason, PlayerStats, Scores, Side, SideStats};

    #[test]
    fn test_memory_recorder_keeps_results() {
        let recorder = MemoryRecorder::new();
        let result = MatchResult {
            winner: Some(Side::Left),
            reason: EndReason::ScoreReached,
            scores: Scores { left: 3, right: 1 },
            stats: SideStats {
                left: PlayerStats::default(),
                right: PlayerStats::default(),
            },
        };

        recorder.record("s1", ["a", "b"], &result);
        LogRecorder.record("s1", ["a", "b"], &result);

        let results = recorder.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "s1");
        assert_eq!(results[0].1, result);
    }
}
