//! Bounded polling of an asynchronous query execution.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use campaign_etl_core::contract::QueryJob;
use campaign_etl_core::query::{PollConfig, QueryState};

use crate::adapters::query_engine::{QueryEngine, ResultsPage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    /// A status or results call failed at the service boundary.
    Transport(String),
    /// The query reached a terminal state other than SUCCEEDED.
    Terminal(QueryState),
    /// The deadline elapsed before any terminal state was observed.
    DeadlineExceeded { waited_ms: u128 },
    /// The cancellation flag was raised.
    Cancelled,
}

impl std::fmt::Display for PollError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(cause) => write!(f, "query poll failed: {cause}"),
            Self::Terminal(state) => write!(f, "query finished in state {state}"),
            Self::DeadlineExceeded { waited_ms } => {
                write!(f, "query did not finish within the deadline ({waited_ms} ms)")
            }
            Self::Cancelled => f.write_str("query wait was cancelled"),
        }
    }
}

impl std::error::Error for PollError {}

/// Polls the execution status at the configured interval until a terminal
/// state, the deadline, or cancellation, whichever comes first.
pub fn await_completion(
    engine: &dyn QueryEngine,
    execution_id: &str,
    config: &PollConfig,
    cancel: &AtomicBool,
) -> Result<(), PollError> {
    let started = Instant::now();
    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(PollError::Cancelled);
        }

        let state = engine
            .execution_state(execution_id)
            .map_err(PollError::Transport)?;
        if state.is_terminal() {
            return if state == QueryState::Succeeded {
                Ok(())
            } else {
                Err(PollError::Terminal(state))
            };
        }

        if started.elapsed() >= config.deadline {
            return Err(PollError::DeadlineExceeded {
                waited_ms: started.elapsed().as_millis(),
            });
        }
        thread::sleep(config.interval);
    }
}

/// Paginates result pages in order and parses each row's first column as a
/// 64-bit integer. Unparsable rows, including the column-header row the
/// engine returns first, are skipped without error.
pub fn collect_results(engine: &dyn QueryEngine, execution_id: &str) -> Result<Vec<i64>, String> {
    let mut ids = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let ResultsPage { rows, next_token } =
            engine.results_page(execution_id, page_token.as_deref())?;
        for row in rows {
            let Some(first) = row.into_iter().next().flatten() else {
                continue;
            };
            if let Ok(id) = first.trim().parse::<i64>() {
                ids.push(id);
            }
        }
        match next_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }
    Ok(ids)
}

/// Submit, wait, and collect in one step.
pub fn run_query(
    engine: &dyn QueryEngine,
    job: &QueryJob,
    config: &PollConfig,
    cancel: &AtomicBool,
) -> Result<Vec<i64>, PollError> {
    let execution_id = engine.submit(job).map_err(PollError::Transport)?;
    await_completion(engine, &execution_id, config, cancel)?;
    collect_results(engine, &execution_id).map_err(PollError::Transport)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    struct ScriptedEngine {
        states: Mutex<VecDeque<Result<QueryState, String>>>,
        pages: Mutex<VecDeque<ResultsPage>>,
        state_calls: Mutex<usize>,
    }

    impl ScriptedEngine {
        fn new(states: Vec<Result<QueryState, String>>, pages: Vec<ResultsPage>) -> Self {
            Self {
                states: Mutex::new(states.into()),
                pages: Mutex::new(pages.into()),
                state_calls: Mutex::new(0),
            }
        }

        fn state_calls(&self) -> usize {
            *self.state_calls.lock().expect("poisoned mutex")
        }
    }

    impl QueryEngine for ScriptedEngine {
        fn submit(&self, _job: &QueryJob) -> Result<String, String> {
            Ok("exec-1".to_string())
        }

        fn execution_state(&self, _execution_id: &str) -> Result<QueryState, String> {
            *self.state_calls.lock().expect("poisoned mutex") += 1;
            self.states
                .lock()
                .expect("poisoned mutex")
                .pop_front()
                .unwrap_or(Ok(QueryState::Running))
        }

        fn results_page(
            &self,
            _execution_id: &str,
            _page_token: Option<&str>,
        ) -> Result<ResultsPage, String> {
            Ok(self
                .pages
                .lock()
                .expect("poisoned mutex")
                .pop_front()
                .unwrap_or_default())
        }
    }

    fn fast_poll() -> PollConfig {
        PollConfig {
            interval: Duration::ZERO,
            deadline: Duration::from_secs(5),
        }
    }

    #[test]
    fn wait_stops_at_the_first_terminal_state() {
        let engine = ScriptedEngine::new(
            vec![
                Ok(QueryState::Queued),
                Ok(QueryState::Running),
                Ok(QueryState::Succeeded),
            ],
            Vec::new(),
        );
        let cancel = AtomicBool::new(false);

        await_completion(&engine, "exec-1", &fast_poll(), &cancel).expect("wait should succeed");
        assert_eq!(engine.state_calls(), 3);
    }

    #[test]
    fn non_succeeded_terminal_state_is_an_error() {
        let engine = ScriptedEngine::new(vec![Ok(QueryState::Cancelled)], Vec::new());
        let cancel = AtomicBool::new(false);

        let error = await_completion(&engine, "exec-1", &fast_poll(), &cancel)
            .expect_err("cancelled query should error");
        assert_eq!(error, PollError::Terminal(QueryState::Cancelled));
    }

    #[test]
    fn deadline_bounds_the_wait() {
        let engine = ScriptedEngine::new(Vec::new(), Vec::new());
        let cancel = AtomicBool::new(false);
        let config = PollConfig {
            interval: Duration::ZERO,
            deadline: Duration::ZERO,
        };

        let error = await_completion(&engine, "exec-1", &config, &cancel)
            .expect_err("wait should time out");
        assert!(matches!(error, PollError::DeadlineExceeded { .. }));
    }

    #[test]
    fn cancellation_stops_the_wait_before_polling() {
        let engine = ScriptedEngine::new(Vec::new(), Vec::new());
        let cancel = AtomicBool::new(true);

        let error = await_completion(&engine, "exec-1", &fast_poll(), &cancel)
            .expect_err("wait should be cancelled");
        assert_eq!(error, PollError::Cancelled);
        assert_eq!(engine.state_calls(), 0);
    }

    #[test]
    fn transport_error_aborts_the_wait() {
        let engine = ScriptedEngine::new(vec![Err("socket closed".to_string())], Vec::new());
        let cancel = AtomicBool::new(false);

        let error = await_completion(&engine, "exec-1", &fast_poll(), &cancel)
            .expect_err("wait should fail");
        assert_eq!(error, PollError::Transport("socket closed".to_string()));
    }

    #[test]
    fn results_are_collected_in_page_order_skipping_unparsable_rows() {
        let engine = ScriptedEngine::new(
            Vec::new(),
            vec![
                ResultsPage {
                    rows: vec![
                        vec![Some("campaign_id".to_string())],
                        vec![Some("101".to_string()), Some("ignored".to_string())],
                        vec![Some("102".to_string())],
                        vec![None],
                    ],
                    next_token: Some("page-2".to_string()),
                },
                ResultsPage {
                    rows: vec![vec![Some(" 103 ".to_string())], Vec::new()],
                    next_token: None,
                },
            ],
        );

        let ids = collect_results(&engine, "exec-1").expect("collect should succeed");
        assert_eq!(ids, vec![101, 102, 103]);
    }

    #[test]
    fn run_query_submits_waits_and_collects() {
        let engine = ScriptedEngine::new(
            vec![Ok(QueryState::Running), Ok(QueryState::Succeeded)],
            vec![ResultsPage {
                rows: vec![vec![Some("7".to_string())]],
                next_token: None,
            }],
        );
        let cancel = AtomicBool::new(false);
        let job = QueryJob {
            sql: "SELECT campaign_id FROM campaigns".to_string(),
            database: "analytics".to_string(),
            output_location: "s3://results/queries/".to_string(),
        };

        let ids = run_query(&engine, &job, &fast_poll(), &cancel).expect("query should succeed");
        assert_eq!(ids, vec![7]);
    }
}
