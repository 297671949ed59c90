//! Terminal rendering for engine status and replay results.

use cardcast_core::verify::Tally;
use cardcast_core::{ChannelBinding, StatusReport};
use cardcast_relay::{DeliveryReport, Outcome};

/// Totals over a replayed update stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub updates: usize,
    pub handled: usize,
    pub ignored: usize,
    pub rejected: usize,
    pub rate_limited: usize,
    pub delivery: DeliveryReport,
}

impl ReplaySummary {
    pub fn add(&mut self, outcome: &Outcome) {
        self.updates += 1;
        match outcome {
            Outcome::Handled(report) => {
                self.handled += 1;
                self.delivery.sent += report.sent;
                self.delivery.edited += report.edited;
                self.delivery.failed += report.failed;
            }
            Outcome::Ignored(_) => self.ignored += 1,
            Outcome::Rejected(_) => self.rejected += 1,
            Outcome::RateLimited { .. } => self.rate_limited += 1,
        }
    }
}

fn row(label: &str, value: impl std::fmt::Display) {
    println!("  {label:<22} {value}");
}

fn channel(id: Option<i64>) -> String {
    id.map_or_else(|| "(unbound)".to_string(), |id| id.to_string())
}

pub fn print_status(report: &StatusReport, channels: &ChannelBinding, tally: &Tally) {
    println!("=== cardcast ===");
    println!();
    println!("Channels");
    row("source", channel(channels.source_channel_id));
    row("output", channel(channels.output_channel_id));
    println!();

    println!("Predictions");
    row("pending", tally.pending);
    row("confirmed", tally.confirmed);
    row("failed", tally.failed);
    println!();

    println!("Learned rules");
    row("active", report.learned_active);
    row("samples", report.sample_count);
    for rule in &report.rules {
        row(&rule.trigger_cards.to_string(), format!("x{}", rule.frequency));
    }
    println!();

    println!("{}", report.text);
}

pub fn print_replay_summary(summary: &ReplaySummary, dry_run: bool) {
    println!(
        "=== replay{} ===",
        if dry_run { " (dry run)" } else { "" }
    );
    row("updates", summary.updates);
    row("handled", summary.handled);
    row("ignored", summary.ignored);
    row("rejected", summary.rejected);
    row("rate limited", summary.rate_limited);
    row("messages sent", summary.delivery.sent);
    row("messages edited", summary.delivery.edited);
    row("delivery failures", summary.delivery.failed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_accumulates_outcomes() {
        let mut summary = ReplaySummary::default();
        summary.add(&Outcome::Handled(DeliveryReport {
            sent: 1,
            edited: 0,
            failed: 1,
        }));
        summary.add(&Outcome::Handled(DeliveryReport {
            sent: 0,
            edited: 2,
            failed: 0,
        }));
        summary.add(&Outcome::Ignored("message without text"));
        summary.add(&Outcome::Rejected("bad".into()));
        summary.add(&Outcome::RateLimited { user_id: 1 });

        assert_eq!(summary.updates, 5);
        assert_eq!(summary.handled, 2);
        assert_eq!(summary.delivery.sent, 1);
        assert_eq!(summary.delivery.edited, 2);
        assert_eq!(summary.delivery.failed, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.rate_limited, 1);
    }

    #[test]
    fn unbound_channel_label() {
        assert_eq!(channel(None), "(unbound)");
        assert_eq!(channel(Some(-100)), "-100");
    }
}
