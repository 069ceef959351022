//! Timeout evaluator.
//!
//! There is no timer anywhere in the controller: expiry is noticed only
//! because running jobs are requeued periodically and every pass calls
//! `evaluate` again.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{AerJobSpec, AerJobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutCheck {
    NotExpired,
    Expired { elapsed: Duration, limit: Duration },
}

impl TimeoutCheck {
    pub fn is_expired(&self) -> bool {
        matches!(self, TimeoutCheck::Expired { .. })
    }
}

/// Has the job outlived `spec.timeout`?
///
/// Expired iff the job has a start time, the timeout is positive, the phase
/// is not terminal and strictly more than `timeout` seconds have passed.
/// Phases this controller does not understand are left alone.
pub fn evaluate(spec: &AerJobSpec, status: &AerJobStatus, now: DateTime<Utc>) -> TimeoutCheck {
    let Some(start) = status.start_time else {
        return TimeoutCheck::NotExpired;
    };
    if spec.timeout <= 0 || status.phase.is_terminal() || !status.phase.is_known() {
        return TimeoutCheck::NotExpired;
    }
    // Limits beyond what `Duration` can hold are never reached.
    let Some(limit) = Duration::try_seconds(spec.timeout) else {
        return TimeoutCheck::NotExpired;
    };
    let elapsed = now - start;
    if elapsed > limit {
        TimeoutCheck::Expired { elapsed, limit }
    } else {
        TimeoutCheck::NotExpired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobPhase;
    use chrono::TimeZone;
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    fn status(phase: JobPhase, started_secs_ago: Option<i64>) -> AerJobStatus {
        AerJobStatus {
            phase,
            start_time: started_secs_ago.map(|s| now() - Duration::seconds(s)),
            ..Default::default()
        }
    }

    #[test]
    fn expires_one_second_past_the_limit() {
        let spec = AerJobSpec::new("UVBZ").with_timeout(60);
        let check = evaluate(&spec, &status(JobPhase::Progress, Some(61)), now());
        assert_eq!(
            check,
            TimeoutCheck::Expired {
                elapsed: Duration::seconds(61),
                limit: Duration::seconds(60),
            }
        );
    }

    #[rstest]
    #[case::one_second_left(59)]
    #[case::exactly_at_limit(60)]
    fn does_not_expire_within_the_limit(#[case] started_secs_ago: i64) {
        let spec = AerJobSpec::new("UVBZ").with_timeout(60);
        let check = evaluate(&spec, &status(JobPhase::Progress, Some(started_secs_ago)), now());
        assert_eq!(check, TimeoutCheck::NotExpired);
    }

    #[rstest]
    #[case::a_century(100 * 365 * 24 * 3600)]
    #[case::beyond_duration_range(i64::MAX / 1000 + 1)]
    #[case::huge(i64::MAX)]
    fn enormous_timeout_does_not_expire(#[case] timeout: i64) {
        let spec = AerJobSpec::new("UVBZ").with_timeout(timeout);
        let check = evaluate(&spec, &status(JobPhase::Progress, Some(3600)), now());
        assert_eq!(check, TimeoutCheck::NotExpired);
    }

    #[rstest]
    #[case::disabled(0)]
    #[case::negative(-5)]
    fn non_positive_timeout_never_expires(#[case] timeout: i64) {
        let spec = AerJobSpec::new("UVBZ").with_timeout(timeout);
        let ancient = status(JobPhase::Progress, Some(10 * 365 * 24 * 3600));
        assert!(!evaluate(&spec, &ancient, now()).is_expired());
    }

    #[rstest]
    #[case(JobPhase::Completed)]
    #[case(JobPhase::Failed)]
    #[case::future_schema(JobPhase::Unknown("Archived".into()))]
    fn terminal_or_unknown_jobs_never_expire(#[case] phase: JobPhase) {
        let spec = AerJobSpec::new("UVBZ").with_timeout(1);
        assert!(!evaluate(&spec, &status(phase, Some(3600)), now()).is_expired());
    }

    #[test]
    fn unstarted_job_never_expires() {
        let spec = AerJobSpec::new("UVBZ").with_timeout(1);
        assert!(!evaluate(&spec, &status(JobPhase::New, None), now()).is_expired());
    }

    #[rstest]
    #[case(JobPhase::Pending)]
    #[case(JobPhase::Progress)]
    fn non_terminal_phases_expire(#[case] phase: JobPhase) {
        let spec = AerJobSpec::new("UVBZ").with_timeout(10);
        assert!(evaluate(&spec, &status(phase, Some(11)), now()).is_expired());
    }
}
