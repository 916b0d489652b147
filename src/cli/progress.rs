use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Verified,
    Unverified,
    Failed,
}

pub struct ProgressIndicator {
    total: usize,
    verified: usize,
    unverified: usize,
    failed: usize,
    start_time: Instant,
}

impl ProgressIndicator {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            verified: 0,
            unverified: 0,
            failed: 0,
            start_time: Instant::now(),
        }
    }

    pub fn start_item(&self, name: &str) {
        println!(
            "Linting: {} ({}/{})",
            name,
            self.verified + self.unverified + self.failed + 1,
            self.total
        );
    }

    pub fn complete_item(&mut self, name: &str, status: ItemStatus) {
        match status {
            ItemStatus::Verified => {
                self.verified += 1;
                println!("✓ {}", name);
            }
            ItemStatus::Unverified => {
                self.unverified += 1;
                println!("⚠ {} (not fully verified)", name);
            }
            ItemStatus::Failed => self.failed += 1,
        }
    }

    pub fn finish(&self) {
        let elapsed = self.start_time.elapsed();
        println!("\n{}", "=".repeat(60));
        println!("Summary:");
        println!("  Total:       {}", self.total);
        println!("  Verified:    {}", self.verified);
        println!("  Unverified:  {}", self.unverified);
        println!("  Failed:      {}", self.failed);
        println!("  Duration:    {:.2}s", elapsed.as_secs_f64());
        println!("{}", "=".repeat(60));
    }
}
