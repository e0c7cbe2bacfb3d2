use eraser_core::trace::ReplayOutcome;
use std::fmt::Write;

const DEFAULT_LIMIT: usize = 10;

/// Human-readable summary of a replay.
pub fn render_outcome(outcome: &ReplayOutcome) -> String {
    render_outcome_with_limit(outcome, DEFAULT_LIMIT)
}

pub fn render_outcome_with_limit(outcome: &ReplayOutcome, limit: usize) -> String {
    let mut out = String::new();
    let stats = &outcome.statistics;

    let _ = writeln!(out, "🔍 Replayed {} steps", outcome.steps);
    let _ = writeln!(
        out,
        "• Accesses: {}  • Acquisitions: {}  • Releases: {}  • Races: {}",
        stats.accesses, stats.acquisitions, stats.releases, stats.races_detected
    );

    if !outcome.races.is_empty() {
        let _ = writeln!(out, "\n⚠️  Data races:");
        for race in outcome.races.iter().take(limit) {
            let report = &race.report;
            let _ = writeln!(
                out,
                "  [step {}] {} {} '{}' ({} ↔ {}, state {}, candidates {:?})",
                race.step,
                report.thread,
                report.access,
                report.variable_name,
                report.thread,
                report.conflicting_thread,
                report.state,
                report.candidate_locks,
            );
        }
        if outcome.races.len() > limit {
            let _ = writeln!(
                out,
                "  … {} more (use --json for full details)",
                outcome.races.len() - limit
            );
        }
    }

    if !outcome.rejected.is_empty() {
        let _ = writeln!(out, "\n🚫 Rejected steps:");
        for rejected in outcome.rejected.iter().take(limit) {
            let _ = writeln!(out, "  [step {}] {}", rejected.step, rejected.error);
        }
        if outcome.rejected.len() > limit {
            let _ = writeln!(out, "  … {} more", outcome.rejected.len() - limit);
        }
    }

    if outcome.verdict.race_ever_detected {
        let _ = writeln!(out, "\n❌ Warning: data race detected!");
    } else {
        let _ = writeln!(out, "\n✅ Data race not detected");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use eraser_core::config::DetectorConfig;
    use eraser_core::trace::{replay, Trace, TraceStep};
    use eraser_core::{AccessType, Detector, NullSink, ThreadId};
    use std::sync::Arc;

    fn racy_trace() -> Trace {
        let mut steps = vec![
            TraceStep::RegisterThread { thread: ThreadId(1) },
            TraceStep::RegisterThread { thread: ThreadId(2) },
            TraceStep::RegisterVariable { name: "var1".into() },
        ];
        for thread in [1, 2, 1, 2] {
            steps.push(TraceStep::Access {
                thread: ThreadId(thread),
                variable: "var1".into(),
                access: AccessType::Write,
            });
        }
        Trace::new(steps)
    }

    #[test]
    fn test_render_racy_outcome() {
        let detector = Detector::new(DetectorConfig::default(), Arc::new(NullSink));
        let outcome = replay(&detector, &racy_trace());
        assert_eq!(outcome.races.len(), 3);

        let text = render_outcome_with_limit(&outcome, 2);
        assert!(text.contains("Replayed 7 steps"));
        assert!(text.contains("Races: 3"));
        assert!(text.contains("'var1'"));
        assert!(text.contains("1 more"));
        assert!(text.contains("data race detected"));
    }

    #[test]
    fn test_render_clean_outcome() {
        let detector = Detector::new(DetectorConfig::default(), Arc::new(NullSink));
        let outcome = replay(&detector, &Trace::default());

        let text = render_outcome(&outcome);
        assert!(text.contains("Data race not detected"));
        assert!(!text.contains("Rejected"));
    }
}
