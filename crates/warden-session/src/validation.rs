//! The per-session validation rule.
//!
//! Foreground access and the background sweep both judge a session with
//! [`judge`], so the two paths can't drift apart. `judge` is pure: it looks
//! at a session and an instant and says what state the session is in. It's
//! up to the caller to persist a [`Verdict::TimedOut`] result (mark the
//! session expired, write it back, announce it).

use std::time::SystemTime;

use crate::{InvalidSession, Session};

/// The outcome of validating one session at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Still active and within its timeout.
    Valid,
    /// Explicitly stopped earlier.
    Stopped,
    /// Already marked expired by an earlier validation.
    Expired,
    /// Idle past its timeout right now; not yet marked.
    TimedOut,
}

impl Verdict {
    /// `true` only for [`Verdict::Valid`].
    pub fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }

    /// `true` if the session is, or is about to become, expired.
    pub fn is_expiry(self) -> bool {
        matches!(self, Self::Expired | Self::TimedOut)
    }

    /// The caller-facing failure for this verdict, if any.
    ///
    /// This is the strict form used by mutating operations: anything but
    /// `Valid` is an error.
    pub fn into_result(self, session: &Session) -> Result<(), InvalidSession> {
        match self {
            Self::Valid => Ok(()),
            Self::Stopped => Err(InvalidSession::Stopped(session.id().clone())),
            Self::Expired | Self::TimedOut => {
                Err(InvalidSession::Expired(session.id().clone()))
            }
        }
    }
}

/// Judges `session` as of `now`.
///
/// Order matters: an expired flag wins over a stop timestamp, and a stopped
/// session is never reported as timed out.
pub fn judge(session: &Session, now: SystemTime) -> Verdict {
    if session.is_expired() {
        Verdict::Expired
    } else if session.is_stopped() {
        Verdict::Stopped
    } else if session.is_timed_out(now) {
        Verdict::TimedOut
    } else {
        Verdict::Valid
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::SessionId;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn session(timeout_secs: u64) -> Session {
        Session::started_at(None, Duration::from_secs(timeout_secs), at(100))
            .with_id(SessionId::from("v-1"))
    }

    #[test]
    fn test_judge_fresh_session_is_valid() {
        assert_eq!(judge(&session(10), at(105)), Verdict::Valid);
    }

    #[test]
    fn test_judge_idle_session_is_timed_out() {
        assert_eq!(judge(&session(10), at(111)), Verdict::TimedOut);
    }

    #[test]
    fn test_judge_disabled_timeout_is_valid_forever() {
        assert_eq!(judge(&session(0), at(1_000_000)), Verdict::Valid);
    }

    #[test]
    fn test_judge_marked_session_is_expired() {
        let mut s = session(10);
        s.mark_expired();
        assert_eq!(judge(&s, at(101)), Verdict::Expired);
    }

    #[test]
    fn test_judge_stopped_session_is_stopped_even_when_idle() {
        let mut s = session(10);
        s.stop(at(101)).unwrap();
        assert_eq!(judge(&s, at(500)), Verdict::Stopped);
    }

    #[test]
    fn test_judge_is_pure() {
        let s = session(10);
        let before = s.clone();
        let _ = judge(&s, at(999));
        assert_eq!(s, before);
    }

    #[test]
    fn test_into_result_maps_verdicts() {
        let s = session(10);
        assert!(Verdict::Valid.into_result(&s).is_ok());
        assert!(matches!(
            Verdict::Stopped.into_result(&s),
            Err(InvalidSession::Stopped(_))
        ));
        assert!(matches!(
            Verdict::TimedOut.into_result(&s),
            Err(InvalidSession::Expired(_))
        ));
        assert!(matches!(
            Verdict::Expired.into_result(&s),
            Err(InvalidSession::Expired(_))
        ));
    }

    #[test]
    fn test_verdict_predicates() {
        assert!(Verdict::Valid.is_valid());
        assert!(!Verdict::Stopped.is_valid());
        assert!(Verdict::TimedOut.is_expiry());
        assert!(Verdict::Expired.is_expiry());
        assert!(!Verdict::Stopped.is_expiry());
    }
}
