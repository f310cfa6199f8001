use std::io::Write;
use std::time::Instant;

use tracing::info;

/// Progress of an export run, redrawn in place on stdout.
pub struct ExportStats {
    stopwatch: Instant,
    total: usize,
    saved: usize,
    failed: usize,
    log_output: String,
}

impl ExportStats {
    pub fn new(total: usize) -> Self {
        ExportStats {
            stopwatch: Instant::now(),
            total,
            saved: 0,
            failed: 0,
            log_output: String::new(),
        }
    }

    /// Records one exported batch and rewrites the progress line.
    pub fn update(&mut self, saved: usize, failed: usize) {
        self.saved += saved;
        self.failed += failed;

        let elapsed = self.stopwatch.elapsed().as_secs();

        self.log_output = format!(
            "saved {}/{}, failed {}, T:{}m{}s\r",
            self.saved,
            self.total,
            self.failed,
            elapsed / 60,
            elapsed % 60
        );

        print!("{}", &self.log_output);
        std::io::stdout().flush().ok();
    }

    /// Ends the progress line and logs the summary.
    pub fn flush(&mut self) {
        println!();
        let elapsed = self.stopwatch.elapsed();
        info!(
            "Export finished: {} saved, {} failed of {} in {:.1}s",
            self.saved,
            self.failed,
            self.total,
            elapsed.as_secs_f32()
        );
        self.stopwatch = Instant::now();
    }

    pub fn saved(&self) -> usize {
        self.saved
    }

    pub fn failed(&self) -> usize {
        self.failed
    }
}
