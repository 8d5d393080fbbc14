//! Run statistics.

use std::time::Duration;

use dispatcher::DispatchReport;
use model_runner::LoopStats;

/// Statistics from one `run`
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub duration: Duration,

    /// None when the loop never started
    pub loop_stats: Option<LoopStats>,

    /// None when the dispatcher did not drain in time
    pub dispatch: Option<DispatchReport>,

    pub interrupted: bool,
}

impl PipelineStats {
    pub fn iterations(&self) -> u64 {
        self.loop_stats.as_ref().map_or(0, |s| s.iterations)
    }

    /// Achieved loop frequency
    pub fn cycle_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.iterations() as f64 / secs
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                      Model Loop Statistics                   ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Iterations: {}", self.iterations());
        println!("   ├─ Loop rate: {:.2} Hz", self.cycle_rate());
        println!("   └─ Interrupted: {}", self.interrupted);

        if let Some(ref stats) = self.loop_stats {
            let sync = &stats.sync;
            println!("\nFrame Sync");
            println!("   ├─ Synced pairs: {}", sync.synced);
            println!("   ├─ Main frames received: {}", sync.main_frames_received);
            println!("   ├─ Extra frames received: {}", sync.extra_frames_received);
            println!("   ├─ Main stream misses: {}", sync.main_misses);
            println!("   ├─ Extra stream misses: {}", sync.extra_misses);
            println!("   └─ Desync events: {}", sync.desync_events);

            println!();
            print!("{}", stats.summary);
        }

        if let Some(ref dispatch) = self.dispatch {
            let summary = &dispatch.summary;
            println!("\nPublish");
            println!("   ├─ Records: {}", summary.records);
            println!("   ├─ Undelivered: {}", summary.undelivered);
            println!("   ├─ Camera frames dropped: {}", summary.camera_frames_dropped);
            println!("   └─ Max drop ratio: {:.3}", summary.max_drop_ratio);

            if !dispatch.sinks.is_empty() {
                println!("\nSinks");
                for (name, snapshot) in &dispatch.sinks {
                    println!(
                        "   ├─ {}: written {}, failed {}, queue full {}, frame gaps {}",
                        name,
                        snapshot.write_count,
                        snapshot.failure_count,
                        snapshot.dropped_count,
                        snapshot.frame_gap_total
                    );
                }
            }
        }

        println!();
    }
}
