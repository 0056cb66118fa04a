// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::model::{CompletedPart, FileDescriptor, ObjectId, UploadTarget};
use crate::strategy::Strategy;
use std::collections::BTreeMap;

/// The states of a single upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SessionState {
    Idle,
    StrategyChosen(Strategy),
    SingleInFlight,
    MultipartInFlight,
    Finalizing,
    Done,
    Failed,
}

impl SessionState {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::StrategyChosen(s) => write!(f, "ready for a {s} upload"),
            Self::SingleInFlight => f.write_str("sending a single-shot upload"),
            Self::MultipartInFlight => f.write_str("sending parts"),
            Self::Finalizing => f.write_str("finalizing"),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub(crate) enum SessionError {
    #[error("cannot {action} while the upload is {state}")]
    IllegalTransition {
        action: &'static str,
        state: SessionState,
    },
    #[error("part {0} was already completed")]
    DuplicatePart(u32),
    #[error("expected parts 1 through {expected}, found {found} parts ending at {last:?}")]
    IncompleteParts {
        expected: u32,
        found: usize,
        last: Option<u32>,
    },
}

type SessionResult<T> = std::result::Result<T, SessionError>;

/// The transient state of one upload.
///
/// A session follows exactly one strategy. Completed parts are keyed by part
/// number, so the finalize request is sorted regardless of the order in which
/// parts completed.
pub(crate) struct UploadSession {
    target: UploadTarget,
    descriptor: FileDescriptor,
    state: SessionState,
    /// Set when the multipart upload is created on the service.
    object_id: Option<ObjectId>,
    /// The entity tag of each completed part.
    parts: BTreeMap<u32, String>,
}

// The part map can be large, print a summary.
impl std::fmt::Debug for UploadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadSession")
            .field("target", &self.target)
            .field("filename", &self.descriptor.filename)
            .field("content_length", &self.descriptor.content_length)
            .field("state", &self.state)
            .field("object_id", &self.object_id)
            .field("parts.len", &self.parts.len())
            .field("parts.last", &self.parts.keys().next_back())
            .finish()
    }
}

impl UploadSession {
    pub(crate) fn new(target: UploadTarget, descriptor: FileDescriptor) -> Self {
        Self {
            target,
            descriptor,
            state: SessionState::Idle,
            object_id: None,
            parts: BTreeMap::new(),
        }
    }

    pub(crate) fn target(&self) -> &UploadTarget {
        &self.target
    }

    pub(crate) fn descriptor(&self) -> &FileDescriptor {
        &self.descriptor
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn object_id(&self) -> Option<&ObjectId> {
        self.object_id.as_ref()
    }

    pub(crate) fn choose_strategy(&mut self, threshold: u64) -> SessionResult<Strategy> {
        self.expect_state(SessionState::Idle, "choose a strategy")?;
        let strategy = Strategy::select(self.descriptor.content_length, threshold);
        self.state = SessionState::StrategyChosen(strategy);
        Ok(strategy)
    }

    pub(crate) fn begin_single(&mut self) -> SessionResult<()> {
        self.expect_state(
            SessionState::StrategyChosen(Strategy::Single),
            "start a single-shot upload",
        )?;
        self.state = SessionState::SingleInFlight;
        Ok(())
    }

    pub(crate) fn begin_multipart(&mut self, object_id: ObjectId) -> SessionResult<()> {
        self.expect_state(
            SessionState::StrategyChosen(Strategy::Multipart),
            "start a multipart upload",
        )?;
        self.object_id = Some(object_id);
        self.state = SessionState::MultipartInFlight;
        Ok(())
    }

    pub(crate) fn record_part(&mut self, part: CompletedPart) -> SessionResult<()> {
        self.expect_state(SessionState::MultipartInFlight, "record a part")?;
        if self.parts.contains_key(&part.part_number) {
            return Err(SessionError::DuplicatePart(part.part_number));
        }
        self.parts.insert(part.part_number, part.etag);
        Ok(())
    }

    /// Moves to `Finalizing` and returns the parts in ascending order.
    ///
    /// The parts must be exactly `1..=expected`.
    pub(crate) fn begin_finalize(&mut self, expected: u32) -> SessionResult<Vec<CompletedPart>> {
        self.expect_state(SessionState::MultipartInFlight, "finalize")?;
        let last = self.parts.keys().next_back().copied();
        // Keys are unique and start at 1, so the count and the maximum key
        // determine whether there are gaps.
        let contiguous = self.parts.keys().next().is_none_or(|first| *first == 1)
            && last.unwrap_or(0) == expected
            && self.parts.len() == expected as usize;
        if !contiguous {
            return Err(SessionError::IncompleteParts {
                expected,
                found: self.parts.len(),
                last,
            });
        }
        self.state = SessionState::Finalizing;
        Ok(self.completed_parts())
    }

    pub(crate) fn finish(&mut self) -> SessionResult<()> {
        match self.state {
            SessionState::SingleInFlight | SessionState::Finalizing => {
                self.state = SessionState::Done;
                Ok(())
            }
            state => Err(SessionError::IllegalTransition {
                action: "complete the upload",
                state,
            }),
        }
    }

    /// Moves to `Failed`.
    ///
    /// Returns the multipart upload id if the service holds an unfinalized
    /// upload that should be aborted.
    pub(crate) fn fail(&mut self) -> Option<ObjectId> {
        if self.state.is_terminal() {
            return None;
        }
        let pending = matches!(
            self.state,
            SessionState::MultipartInFlight | SessionState::Finalizing
        );
        self.state = SessionState::Failed;
        if pending { self.object_id.clone() } else { None }
    }

    /// The completed parts sorted by part number.
    pub(crate) fn completed_parts(&self) -> Vec<CompletedPart> {
        self.parts
            .iter()
            .map(|(n, etag)| CompletedPart::new(*n, etag.clone()))
            .collect()
    }

    fn expect_state(&self, want: SessionState, action: &'static str) -> SessionResult<()> {
        if self.state == want {
            return Ok(());
        }
        Err(SessionError::IllegalTransition {
            action,
            state: self.state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    type TestResult = anyhow::Result<()>;

    fn new_session(size: u64) -> UploadSession {
        UploadSession::new(
            UploadTarget::new("group-1"),
            FileDescriptor::new("data.bin", size),
        )
    }

    #[test]
    fn single_path() -> TestResult {
        let mut session = new_session(10);
        assert_eq!(session.choose_strategy(100)?, Strategy::Single);
        assert_eq!(
            session.state(),
            SessionState::StrategyChosen(Strategy::Single)
        );
        session.begin_single()?;
        session.finish()?;
        assert_eq!(session.state(), SessionState::Done);
        assert_eq!(session.fail(), None);
        assert_eq!(session.state(), SessionState::Done);
        Ok(())
    }

    #[test]
    fn multipart_path() -> TestResult {
        let mut session = new_session(250);
        assert_eq!(session.choose_strategy(100)?, Strategy::Multipart);
        session.begin_multipart(ObjectId::new("obj-1"))?;
        // Record the parts out of order, finalize sorts them.
        session.record_part(CompletedPart::new(2, "b"))?;
        session.record_part(CompletedPart::new(3, "c"))?;
        session.record_part(CompletedPart::new(1, "a"))?;
        let parts = session.begin_finalize(3)?;
        assert_eq!(
            parts,
            vec![
                CompletedPart::new(1, "a"),
                CompletedPart::new(2, "b"),
                CompletedPart::new(3, "c"),
            ]
        );
        assert_eq!(session.state(), SessionState::Finalizing);
        session.finish()?;
        assert_eq!(session.state(), SessionState::Done);
        Ok(())
    }

    #[test]
    fn strategies_do_not_mix() -> TestResult {
        let mut session = new_session(10);
        session.choose_strategy(100)?;
        let err = session
            .begin_multipart(ObjectId::new("obj-1"))
            .expect_err("a single-shot session cannot start a multipart upload");
        assert!(matches!(err, SessionError::IllegalTransition { .. }), "{err:?}");

        let mut session = session_multipart()?;
        let err = session
            .finish()
            .expect_err("parts must be finalized before completing");
        assert!(matches!(err, SessionError::IllegalTransition { .. }), "{err:?}");
        Ok(())
    }

    fn session_multipart() -> anyhow::Result<UploadSession> {
        let mut session = new_session(250);
        session.choose_strategy(100)?;
        session.begin_multipart(ObjectId::new("obj-1"))?;
        Ok(session)
    }

    #[test]
    fn duplicate_part() -> TestResult {
        let mut session = session_multipart()?;
        session.record_part(CompletedPart::new(1, "a"))?;
        let err = session
            .record_part(CompletedPart::new(1, "z"))
            .expect_err("duplicates are rejected");
        assert_eq!(err, SessionError::DuplicatePart(1));
        assert_eq!(session.completed_parts(), vec![CompletedPart::new(1, "a")]);
        Ok(())
    }

    #[test]
    fn finalize_requires_every_part() -> TestResult {
        let mut session = session_multipart()?;
        session.record_part(CompletedPart::new(1, "a"))?;
        session.record_part(CompletedPart::new(3, "c"))?;
        let err = session
            .begin_finalize(3)
            .expect_err("part 2 is missing");
        assert!(matches!(err, SessionError::IncompleteParts { .. }), "{err:?}");
        assert_eq!(session.state(), SessionState::MultipartInFlight);

        let err = session
            .begin_finalize(2)
            .expect_err("part 3 is unexpected");
        assert!(matches!(err, SessionError::IncompleteParts { .. }), "{err:?}");
        Ok(())
    }

    #[test]
    fn finalize_twice() -> TestResult {
        let mut session = session_multipart()?;
        session.record_part(CompletedPart::new(1, "a"))?;
        session.begin_finalize(1)?;
        let err = session
            .begin_finalize(1)
            .expect_err("finalize happens at most once");
        assert!(matches!(err, SessionError::IllegalTransition { .. }), "{err:?}");
        Ok(())
    }

    #[test]
    fn fail_returns_pending_upload() -> TestResult {
        let mut session = session_multipart()?;
        session.record_part(CompletedPart::new(1, "a"))?;
        assert_eq!(session.fail(), Some(ObjectId::new("obj-1")));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.fail(), None);

        let mut session = new_session(10);
        session.choose_strategy(100)?;
        session.begin_single()?;
        assert_eq!(session.fail(), None);
        Ok(())
    }

    #[test]
    fn debug_is_summarized() -> TestResult {
        let mut session = session_multipart()?;
        for n in 1..=100 {
            session.record_part(CompletedPart::new(n, format!("etag-{n}")))?;
        }
        let fmt = format!("{session:?}");
        assert!(fmt.contains("parts.len: 100"), "{fmt}");
        assert!(!fmt.contains("etag-50"), "{fmt}");
        Ok(())
    }
}
