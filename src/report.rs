/// Alarm-path diagnostics: what gets written to stderr when a test
/// exceeds its deadline, and how the process is then terminated.
use std::backtrace::Backtrace;
use std::io::Write;
use std::time::Duration;

/// Exit status used when the watchdog aborts the run.
pub const TIMEOUT_EXIT_CODE: i32 = 2;

/// Process termination as an explicit operation, so tests can substitute
/// a fake instead of actually exiting the test process.
pub trait ProcessTerminator: Send + Sync {
    fn terminate(&self, code: i32);
}

/// The real thing.
pub struct ExitProcess;

impl ProcessTerminator for ExitProcess {
    fn terminate(&self, code: i32) {
        std::process::exit(code);
    }
}

/// Receives the alarm before the process terminates.
pub trait AlarmSink: Send + Sync {
    fn alarm(&self, description: &str, timeout: Duration);
}

/// Production alarm sink: writes the hung test's description and stack
/// diagnostics to stderr.
#[derive(Debug, Clone)]
pub struct AlarmReporter {
    /// Raise SIGQUIT so an external native stack dumper can run first.
    native_stack_dump: bool,
    /// Bounded pause for that asynchronous dump to complete.
    dump_grace: Duration,
}

impl Default for AlarmReporter {
    fn default() -> Self {
        Self {
            native_stack_dump: false,
            dump_grace: Duration::from_secs(1),
        }
    }
}

impl AlarmReporter {
    pub fn new(native_stack_dump: bool, dump_grace: Duration) -> Self {
        Self {
            native_stack_dump,
            dump_grace,
        }
    }

    pub fn from_config(config: &crate::config::WatchdogConfig) -> Self {
        Self::new(config.native_stack_dump, config.dump_grace())
    }

    /// The notice block: blank line, test description, exceeded-timeout line.
    fn write_notice<W: Write>(
        &self,
        out: &mut W,
        description: &str,
        timeout: Duration,
    ) -> std::io::Result<()> {
        writeln!(out)?;
        writeln!(out, "{description}")?;
        writeln!(
            out,
            "test took longer than the configured timeout of {}s",
            timeout.as_secs_f64()
        )?;
        out.flush()
    }

    /// Backtrace of the monitor thread, labeled with pid and thread name.
    /// Full cross-thread enumeration needs runtime support we may not
    /// have; a single forced capture is the documented best effort.
    fn write_backtrace<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let thread = std::thread::current();
        writeln!(
            out,
            "\nbacktrace (pid {}, thread {:?}):",
            std::process::id(),
            thread.name().unwrap_or("<unnamed>")
        )?;
        writeln!(out, "{}", Backtrace::force_capture())?;
        out.flush()
    }

    /// Ask the environment's native stack dumper (if the embedder
    /// installed one) to print its threads, then wait out the grace
    /// period. A blocking sleep is fine here: the process is aborting.
    fn request_native_dump<W: Write>(&self, out: &mut W) {
        let _ = writeln!(out, "\nnative stack traces:");
        let _ = out.flush();
        if let Err(e) = nix::sys::signal::raise(nix::sys::signal::Signal::SIGQUIT) {
            tracing::warn!(error = %e, "failed to raise SIGQUIT for native stack dump");
            return;
        }
        std::thread::sleep(self.dump_grace);
    }
}

impl AlarmSink for AlarmReporter {
    fn alarm(&self, description: &str, timeout: Duration) {
        let stderr = std::io::stderr();
        let mut out = stderr.lock();

        // Notice first and flushed, so it survives even if stack capture
        // itself goes wrong.
        let _ = self.write_notice(&mut out, description, timeout);

        if self.native_stack_dump {
            self.request_native_dump(&mut out);
        }
        let _ = self.write_backtrace(&mut out);
    }
}
