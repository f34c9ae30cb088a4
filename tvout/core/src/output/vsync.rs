//! Inter-vsync interval tracking.

use log::warn;

use crate::hw::VsyncInfo;

/// Clean fields needed before another anomaly is reported.
pub const ANOMALY_REPORT_INTERVAL: u32 = 60;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct VsyncStats {
    pub fields: u64,
    pub last_interval_us: i64,
    pub anomalies: u32,
    /// Timestamp went backwards.
    pub backwards: u32,
    /// More than two field periods between interrupts, i.e. missed vsyncs.
    pub overlong: u32,
    /// Anomalies that made it to the log.
    pub reported: u32,
}

#[derive(Debug, Default)]
pub struct VsyncMonitor {
    stats: VsyncStats,
    backoff: u32,
    primed: bool,
}

impl VsyncMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> VsyncStats {
        self.stats
    }

    /// Forget the previous field, the next interval has no reference.
    pub fn restart(&mut self) {
        self.primed = false;
    }

    /// Returns true if the interval was anomalous. Never fails.
    pub fn record(&mut self, info: VsyncInfo, expected_us: u32) -> bool {
        if !self.primed {
            self.primed = true;
            return false;
        }

        self.stats.fields += 1;
        self.stats.last_interval_us = info.interval_us;

        let backwards = info.interval_us < 0;
        let overlong = expected_us > 0 && info.interval_us > 2 * i64::from(expected_us);
        if !backwards && !overlong {
            self.backoff = self.backoff.saturating_sub(1);
            return false;
        }

        self.stats.anomalies += 1;
        if backwards {
            self.stats.backwards += 1;
        } else {
            self.stats.overlong += 1;
        }

        if self.backoff == 0 {
            self.backoff = ANOMALY_REPORT_INTERVAL;
            self.stats.reported += 1;
            warn!(target: "vsync", "vsync interval {}us (expected {}us), {} anomalies so far",
                info.interval_us, expected_us, self.stats.anomalies);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::VtgEvent;

    fn field(interval_us: i64) -> VsyncInfo {
        VsyncInfo { event: VtgEvent::TopField, interval_us }
    }

    #[test]
    fn first_field_is_only_a_reference() {
        let mut mon = VsyncMonitor::new();
        assert!(!mon.record(field(-5), 20_000));
        assert_eq!(mon.stats().fields, 0);
        assert!(mon.record(field(-5), 20_000));
    }

    #[test]
    fn classifies_anomalies() {
        let mut mon = VsyncMonitor::new();
        mon.record(field(20_000), 20_000);

        assert!(!mon.record(field(20_010), 20_000));
        assert!(!mon.record(field(40_000), 20_000));
        assert!(mon.record(field(40_001), 20_000));
        assert!(mon.record(field(-1), 20_000));

        let stats = mon.stats();
        assert_eq!(stats.fields, 4);
        assert_eq!(stats.anomalies, 2);
        assert_eq!(stats.overlong, 1);
        assert_eq!(stats.backwards, 1);
        assert_eq!(stats.last_interval_us, -1);
    }

    #[test]
    fn reports_at_most_once_per_interval() {
        let mut mon = VsyncMonitor::new();
        mon.record(field(20_000), 20_000);

        for _ in 0..ANOMALY_REPORT_INTERVAL {
            mon.record(field(-100), 20_000);
        }
        assert_eq!(mon.stats().anomalies, ANOMALY_REPORT_INTERVAL);
        assert_eq!(mon.stats().reported, 1);

        mon.record(field(-100), 20_000);
        assert_eq!(mon.stats().reported, 1);
    }

    #[test]
    fn only_clean_fields_count_down() {
        let mut mon = VsyncMonitor::new();
        mon.record(field(20_000), 20_000);
        mon.record(field(-100), 20_000);
        assert_eq!(mon.stats().reported, 1);

        for _ in 1..ANOMALY_REPORT_INTERVAL {
            mon.record(field(20_000), 20_000);
        }
        mon.record(field(90_000), 20_000);
        assert_eq!(mon.stats().reported, 1);

        mon.record(field(20_000), 20_000);
        mon.record(field(90_000), 20_000);
        assert_eq!(mon.stats().reported, 2);
        assert_eq!(mon.stats().anomalies, 3);
    }
}
