use std::io;

use crate::{
    formatter::{
        FmtNodeOutcome, FmtNodeStart, FmtRunOutcome, FmtRunStart, RunFormatter,
        common::color::{ColorSetting, SupportsColor, colors::*},
    },
    outcome::NodeStatus,
};

/// A formatter printing one line per node start and outcome.
///
/// ```text
/// === RUN   Suite/TestOne
/// --- PASS: Suite/TestOne (0.01s)
/// ```
///
/// Log lines of a node are printed below its outcome line when the node
/// failed, or always when the formatter is verbose.
#[derive(Debug)]
pub struct PrettyFormatter<W: io::Write> {
    target: W,
    color_setting: ColorSetting,
    verbose: bool,
}

impl Default for PrettyFormatter<io::Stdout> {
    fn default() -> Self {
        Self {
            target: io::stdout(),
            color_setting: ColorSetting::default(),
            verbose: false,
        }
    }
}

impl<W: io::Write> PrettyFormatter<W> {
    pub fn with_target<WithTarget: io::Write>(
        self,
        target: WithTarget,
    ) -> PrettyFormatter<WithTarget> {
        PrettyFormatter {
            target,
            color_setting: self.color_setting,
            verbose: self.verbose,
        }
    }

    pub fn with_color_setting(self, color_setting: impl Into<ColorSetting>) -> Self {
        Self {
            color_setting: color_setting.into(),
            ..self
        }
    }

    pub fn with_verbose(self, verbose: bool) -> Self {
        Self { verbose, ..self }
    }
}

impl<W: io::Write + SupportsColor> PrettyFormatter<W> {
    /// Return whether this formatter will currently emit colored output.
    pub fn use_color(&self) -> bool {
        match self.color_setting {
            ColorSetting::Automatic => self.target.supports_color(),
            ColorSetting::Always => true,
            ColorSetting::Never => false,
        }
    }

    fn write_status(&mut self, status: &NodeStatus) -> io::Result<()> {
        let label = status.label();
        match (status, self.use_color()) {
            (_, false) => write!(self.target, "{label}"),
            (NodeStatus::Passed, true) => write!(self.target, "{GREEN}{label}{RESET}"),
            (NodeStatus::Failed, true) => write!(self.target, "{RED}{label}{RESET}"),
            (NodeStatus::Skipped, true) => write!(self.target, "{YELLOW}{label}{RESET}"),
        }
    }
}

impl<W: io::Write + Send + SupportsColor> RunFormatter for PrettyFormatter<W> {
    type Error = io::Error;

    fn fmt_run_start(&mut self, data: FmtRunStart<'_>) -> io::Result<()> {
        if self.verbose {
            writeln!(
                self.target,
                "running {} with up to {} parallel nodes",
                data.name, data.parallelism
            )?;
        }
        Ok(())
    }

    fn fmt_node_start(&mut self, data: FmtNodeStart<'_>) -> io::Result<()> {
        writeln!(self.target, "=== RUN   {}", data.name)
    }

    fn fmt_node_outcome(&mut self, FmtNodeOutcome { outcome }: FmtNodeOutcome<'_>) -> io::Result<()> {
        let indent = "    ".repeat(outcome.depth());
        write!(self.target, "{indent}--- ")?;
        self.write_status(&outcome.status)?;
        writeln!(
            self.target,
            ": {} ({:.2}s)",
            outcome.name,
            outcome.duration.as_secs_f64()
        )?;

        if self.verbose || outcome.failed() {
            for log in outcome.logs.iter() {
                for line in log.lines() {
                    writeln!(self.target, "{indent}    {line}")?;
                }
            }
        }
        Ok(())
    }

    fn fmt_run_outcome(&mut self, data: FmtRunOutcome<'_>) -> io::Result<()> {
        writeln!(self.target)?;
        let ok = data.failed() == 0;
        match (ok, self.use_color()) {
            (true, false) => write!(self.target, "ok")?,
            (true, true) => write!(self.target, "{GREEN}ok{RESET}")?,
            (false, false) => write!(self.target, "FAILED")?,
            (false, true) => write!(self.target, "{RED}FAILED{RESET}")?,
        }
        writeln!(
            self.target,
            ". {} passed; {} failed; {} skipped; finished in {:.2}s",
            data.passed(),
            data.failed(),
            data.skipped(),
            data.duration.as_secs_f64()
        )
    }
}
