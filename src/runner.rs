/// Suite runner: executes each configured test command as a subprocess,
/// sending the watchdog a heartbeat before each one. Stands in for the
/// "framework" side of the lifecycle hooks; a real harness embedding the
/// watchdog would call `on_test_start` from its own before-each hook.
use crate::config::SuiteConfig;
use crate::watchdog::Watchdog;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Result of one completed test command.
#[derive(Debug)]
pub struct TestOutcome {
    pub name: String,
    /// Process exit code (None if killed by signal).
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl TestOutcome {
    pub fn passed(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Results for the whole suite, in run order.
#[derive(Debug)]
pub struct SuiteSummary {
    pub outcomes: Vec<TestOutcome>,
}

impl SuiteSummary {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.passed()).count()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

/// Errors that can occur while running the suite.
#[derive(Debug)]
pub enum RunnerError {
    /// Failed to spawn or wait on a test command.
    Exec {
        name: String,
        source: std::io::Error,
    },
}

impl std::fmt::Display for RunnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunnerError::Exec { name, source } => {
                write!(f, "failed to run test {name}: {source}")
            }
        }
    }
}

impl std::error::Error for RunnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunnerError::Exec { source, .. } => Some(source),
        }
    }
}

/// Run every test in the suite, heartbeating the watchdog before each.
///
/// A failing test does not stop the suite; it is recorded and the run
/// continues. Only a hang does (the watchdog aborts the process).
pub async fn run_suite(
    suite: &SuiteConfig,
    watchdog: &Watchdog,
) -> Result<SuiteSummary, RunnerError> {
    let mut outcomes = Vec::new();

    for test in &suite.tests {
        watchdog.on_test_start(&test.name);
        tracing::info!(name = %test.name, command = %test.command, "running test");

        let start = Instant::now();
        let status = Command::new(&suite.shell)
            .arg("-c")
            .arg(&test.command)
            .status()
            .await
            .map_err(|e| RunnerError::Exec {
                name: test.name.clone(),
                source: e,
            })?;
        let duration = start.elapsed();

        let exit_code = status.code();
        if exit_code == Some(0) {
            tracing::info!(
                name = %test.name,
                duration_ms = duration.as_millis() as u64,
                "test passed"
            );
        } else {
            tracing::warn!(
                name = %test.name,
                exit_code = ?exit_code,
                duration_ms = duration.as_millis() as u64,
                "test failed"
            );
        }

        outcomes.push(TestOutcome {
            name: test.name.clone(),
            exit_code,
            duration,
        });
    }

    Ok(SuiteSummary { outcomes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TestCase;
    use crate::report::AlarmReporter;

    fn suite(tests: Vec<(&str, &str)>) -> SuiteConfig {
        SuiteConfig {
            shell: "sh".to_string(),
            tests: tests
                .into_iter()
                .map(|(name, command)| TestCase {
                    name: name.to_string(),
                    command: command.to_string(),
                })
                .collect(),
        }
    }

    // A generous timeout: these suites finish in milliseconds, the
    // watchdog just has to not get in the way.
    fn arm() -> Watchdog {
        Watchdog::arm(Duration::from_secs(30), AlarmReporter::default())
    }

    #[tokio::test]
    async fn test_passing_suite() {
        let mut watchdog = arm();
        let summary = run_suite(&suite(vec![("hello", "echo hello")]), &watchdog)
            .await
            .unwrap();
        watchdog.disarm().await;

        assert_eq!(summary.total(), 1);
        assert!(summary.all_passed());
        assert_eq!(summary.outcomes[0].exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_suite_continues() {
        let mut watchdog = arm();
        let summary = run_suite(
            &suite(vec![("bad", "exit 3"), ("good", "true")]),
            &watchdog,
        )
        .await
        .unwrap();
        watchdog.disarm().await;

        assert_eq!(summary.total(), 2);
        assert_eq!(summary.failed(), 1);
        assert!(!summary.all_passed());
        assert_eq!(summary.outcomes[0].exit_code, Some(3));
        assert!(summary.outcomes[1].passed());
    }

    #[tokio::test]
    async fn test_empty_suite() {
        let mut watchdog = arm();
        let summary = run_suite(&suite(vec![]), &watchdog).await.unwrap();
        watchdog.disarm().await;

        assert_eq!(summary.total(), 0);
        assert!(summary.all_passed());
    }

    #[tokio::test]
    async fn test_bad_shell_is_an_error() {
        let mut watchdog = arm();
        let bad = SuiteConfig {
            shell: "nonexistent-shell-xyz".to_string(),
            tests: vec![TestCase {
                name: "never runs".to_string(),
                command: "true".to_string(),
            }],
        };
        let err = run_suite(&bad, &watchdog).await.unwrap_err();
        watchdog.disarm().await;

        assert!(matches!(err, RunnerError::Exec { .. }));
        assert!(err.to_string().contains("never runs"));
    }

    #[tokio::test]
    async fn test_duration_is_recorded() {
        let mut watchdog = arm();
        let summary = run_suite(&suite(vec![("nap", "sleep 0.1")]), &watchdog)
            .await
            .unwrap();
        watchdog.disarm().await;

        assert!(summary.outcomes[0].duration >= Duration::from_millis(80));
    }
}
