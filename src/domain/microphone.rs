use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::DomainError;

const FREE: u8 = 0;

/// The session kind currently holding the microphone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MicrophoneHolder {
    /// Live speech recognition.
    Recognition = 1,
    /// Buffered recording for cloud transcription.
    Recording = 2,
}

impl MicrophoneHolder {
    fn from_raw(value: u8) -> Option<Self> {
        match value {
            1 => Some(MicrophoneHolder::Recognition),
            2 => Some(MicrophoneHolder::Recording),
            _ => None,
        }
    }
}

impl fmt::Display for MicrophoneHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MicrophoneHolder::Recognition => write!(f, "recognition"),
            MicrophoneHolder::Recording => write!(f, "recording"),
        }
    }
}

/// Lock-free arbiter for the single microphone.
///
/// At most one of the recognition or recording sessions holds the
/// microphone at a time. Ownership is expressed by a [`MicrophoneLease`],
/// which releases the microphone when dropped.
#[derive(Debug, Default)]
pub struct MicrophoneArbiter {
    holder: AtomicU8,
}

impl MicrophoneArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current holder, or `None` if the microphone is free.
    pub fn holder(&self) -> Option<MicrophoneHolder> {
        MicrophoneHolder::from_raw(self.holder.load(Ordering::Acquire))
    }

    pub fn is_free(&self) -> bool {
        self.holder().is_none()
    }

    /// Take exclusive ownership of the microphone for `holder`.
    ///
    /// Fails with `MicrophoneUnavailable` naming the current holder if the
    /// microphone is already taken, including by the same session kind.
    pub fn acquire(
        self: &Arc<Self>,
        holder: MicrophoneHolder,
    ) -> Result<MicrophoneLease, DomainError> {
        match self.holder.compare_exchange(
            FREE,
            holder as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                debug!(%holder, "Microphone acquired");
                Ok(MicrophoneLease {
                    arbiter: Arc::clone(self),
                    holder,
                })
            }
            Err(current) => Err(DomainError::MicrophoneUnavailable {
                holder: MicrophoneHolder::from_raw(current).unwrap_or(holder),
            }),
        }
    }
}

/// Exclusive hold on the microphone. Dropping it frees the microphone.
#[derive(Debug)]
pub struct MicrophoneLease {
    arbiter: Arc<MicrophoneArbiter>,
    holder: MicrophoneHolder,
}

impl MicrophoneLease {
    pub fn holder(&self) -> MicrophoneHolder {
        self.holder
    }
}

impl Drop for MicrophoneLease {
    fn drop(&mut self) {
        let _ = self.arbiter.holder.compare_exchange(
            self.holder as u8,
            FREE,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        debug!(holder = %self.holder, "Microphone released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let arbiter = Arc::new(MicrophoneArbiter::new());
        assert!(arbiter.is_free());

        let lease = arbiter.acquire(MicrophoneHolder::Recognition).unwrap();
        assert_eq!(lease.holder(), MicrophoneHolder::Recognition);
        assert_eq!(arbiter.holder(), Some(MicrophoneHolder::Recognition));

        drop(lease);
        assert!(arbiter.is_free());
    }

    #[test]
    fn test_second_holder_is_rejected() {
        let arbiter = Arc::new(MicrophoneArbiter::new());
        let _lease = arbiter.acquire(MicrophoneHolder::Recognition).unwrap();

        let err = arbiter.acquire(MicrophoneHolder::Recording).unwrap_err();
        assert!(matches!(
            err,
            DomainError::MicrophoneUnavailable {
                holder: MicrophoneHolder::Recognition
            }
        ));

        // Same kind twice is also rejected
        assert!(arbiter.acquire(MicrophoneHolder::Recognition).is_err());
    }

    #[test]
    fn test_released_microphone_can_change_hands() {
        let arbiter = Arc::new(MicrophoneArbiter::new());
        drop(arbiter.acquire(MicrophoneHolder::Recording).unwrap());

        let lease = arbiter.acquire(MicrophoneHolder::Recognition).unwrap();
        assert_eq!(lease.holder(), MicrophoneHolder::Recognition);
    }
}
