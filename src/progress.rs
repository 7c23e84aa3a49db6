use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::time::Duration;

/// Progress indicator manager
pub struct ProgressManager {
    multi: Arc<MultiProgress>,
    enabled: bool,
    verbose: bool,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(quiet: bool, verbose: bool) -> Self {
        // Only enable progress if we're in a terminal and not in quiet mode
        let enabled = !quiet && io::stderr().is_terminal();

        Self {
            multi: Arc::new(MultiProgress::new()),
            enabled,
            verbose,
        }
    }

    /// A manager that never draws anything
    pub fn disabled() -> Self {
        Self {
            multi: Arc::new(MultiProgress::new()),
            enabled: false,
            verbose: false,
        }
    }

    /// Spinner for open-ended work such as paginating the search
    pub fn spinner(&self, message: &str) -> Option<ProgressBar> {
        if !self.enabled {
            return None;
        }

        let pb = self.multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style.tick_strings(&["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"]));
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Some(pb)
    }

    /// Bar for a known number of steps
    pub fn bar(&self, total: u64, message: &str) -> Option<ProgressBar> {
        if !self.enabled || total == 0 {
            return None;
        }

        let pb = self.multi.add(ProgressBar::new(total));
        if let Ok(style) =
            ProgressStyle::default_bar().template("{msg}\n{bar:40.cyan/blue} {pos}/{len} ({percent}%) {eta}")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb.set_message(message.to_string());

        Some(pb)
    }

    /// Show a simple message (for verbose mode)
    pub fn show_message(&self, message: &str) {
        if self.verbose && self.enabled {
            let _ = self.multi.println(format!("🔍 {}", message));
        }
    }

    /// Check if progress is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Progress messages for different operations
pub mod messages {
    pub const CONNECTING: &str = "Opening session...";
    pub const EXTRACTING: &str = "Extracting records";
    pub const SUMMARIZING: &str = "Waiting for the summary...";

    pub fn discovering(page: u32) -> String {
        format!("Scanning result page {}...", page)
    }

    pub fn summarized(count: usize) -> String {
        format!("{} summaries written", count)
    }
}
