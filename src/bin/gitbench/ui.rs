use indicatif::{ProgressBar, ProgressStyle};
use nu_ansi_term::{Color, Style};
use std::io::IsTerminal;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Theme {
    Auto,
    Light,
    Dark,
    Plain,
}

/// Status output on stderr; stdout is reserved for reports.
pub struct Ui {
    palette: Palette,
    paint: bool,
    quiet: bool,
}

impl Ui {
    pub fn new(theme: Theme, quiet: bool) -> Self {
        let stderr_is_tty = std::io::stderr().is_terminal();
        let paint = theme != Theme::Plain && stderr_is_tty && !quiet;

        #[cfg(windows)]
        if paint {
            let _ = nu_ansi_term::enable_ansi_support();
        }

        let palette = match theme {
            Theme::Plain => Palette::plain(),
            Theme::Light => Palette::light(),
            Theme::Dark | Theme::Auto => Palette::dark(),
        };
        Self {
            palette,
            paint,
            quiet,
        }
    }

    pub fn heading(&self, title: &str) {
        self.emit(self.palette.heading, HEADING_ICON, title);
    }

    pub fn info(&self, message: &str) {
        self.emit(self.palette.info, INFO_ICON, message);
    }

    pub fn success(&self, message: &str) {
        self.emit(self.palette.success, SUCCESS_ICON, message);
    }

    pub fn warn(&self, message: &str) {
        // Warnings survive --quiet.
        if self.quiet {
            eprintln!("{message}");
        } else {
            self.emit(self.palette.warn, WARNING_ICON, message);
        }
    }

    /// Bar counting benchmark invocations.
    pub fn progress(&self, total: u64, label: &str) -> Progress {
        let bar = (!self.quiet && std::io::stderr().is_terminal()).then(|| {
            let bar = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::with_template(
                "{prefix} [{elapsed_precise}] {bar:32.cyan/blue} {pos}/{len} {msg}",
            ) {
                bar.set_style(style.progress_chars("=> "));
            }
            bar.set_prefix(self.paint(self.palette.info, PROGRESS_ICON));
            bar.enable_steady_tick(Duration::from_millis(250));
            bar
        });
        Progress {
            label: label.to_string(),
            start: Instant::now(),
            finished: false,
            quiet: self.quiet,
            bar,
        }
    }

    fn emit(&self, style: Style, icon: &str, message: &str) {
        if self.quiet {
            return;
        }
        eprintln!("{} {message}", self.paint(style, icon));
    }

    fn paint(&self, style: Style, text: &str) -> String {
        if self.paint {
            style.paint(text).to_string()
        } else {
            text.to_string()
        }
    }
}

pub struct Progress {
    label: String,
    start: Instant,
    finished: bool,
    quiet: bool,
    bar: Option<ProgressBar>,
}

impl Progress {
    pub fn set_message(&self, message: String) {
        if let Some(bar) = &self.bar {
            bar.set_message(message);
        }
    }

    pub fn inc(&self) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    pub fn finish(mut self) -> Duration {
        self.finished = true;
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        self.start.elapsed()
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let message = format!(
            "{} interrupted after {}",
            self.label,
            format_duration(self.start.elapsed())
        );
        match self.bar.take() {
            Some(bar) => bar.abandon_with_message(message),
            None if !self.quiet => eprintln!("{message}"),
            None => {}
        }
    }
}

pub fn format_duration(duration: Duration) -> String {
    let whole_secs = duration.as_secs();
    if whole_secs >= 3600 {
        return format!("{}h{:02}m", whole_secs / 3600, (whole_secs % 3600) / 60);
    }
    let secs = duration.as_secs_f64();
    if secs >= 1.0 {
        format!("{secs:.2}s")
    } else {
        format!("{:.0}ms", secs * 1_000.0)
    }
}

struct Palette {
    heading: Style,
    info: Style,
    success: Style,
    warn: Style,
}

impl Palette {
    fn dark() -> Self {
        Self {
            heading: Style::new().fg(Color::Purple).bold(),
            info: Style::new().fg(Color::LightCyan),
            success: Style::new().fg(Color::LightGreen).bold(),
            warn: Style::new().fg(Color::Yellow).bold(),
        }
    }

    fn light() -> Self {
        Self {
            heading: Style::new().fg(Color::Blue).bold(),
            info: Style::new().fg(Color::Purple),
            success: Style::new().fg(Color::Green).bold(),
            warn: Style::new().fg(Color::Red).bold(),
        }
    }

    fn plain() -> Self {
        Self {
            heading: Style::new(),
            info: Style::new(),
            success: Style::new(),
            warn: Style::new(),
        }
    }
}

const HEADING_ICON: &str = "▸";
const SUCCESS_ICON: &str = "✔";
const WARNING_ICON: &str = "⚠";
const INFO_ICON: &str = "ℹ";
const PROGRESS_ICON: &str = "▶";
