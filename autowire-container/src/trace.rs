//! The build trace: which resolutions are currently in progress.
//!
//! Every resolution step pushes a breadcrumb (`'<id>'` for a top-level
//! request, `<type> $<name>` for a constructor parameter) and pops it when
//! it finishes, even by unwinding. When a step fails, the error is wrapped
//! once into [`Error::Build`] with a snapshot of the breadcrumbs; the
//! frames above it pass the wrapped error through untouched.
//!
//! Frames carry what they build: a binding (identifier and generation)
//! or an unbound builder such as a contextual override (its address).
//! Entering the same one twice is reported as a
//! [`CircularDependency`](Error::CircularDependency) instead of
//! recursing until the stack overflows.

use parking_lot::Mutex;
use tracing::warn;

use crate::error::{BuildError, CircularDependencyError, Error, Result};
use crate::id::Identifier;

/// What a frame is building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FrameKey {
    /// A binding, at the generation that was looked up.
    Binding(Identifier, u64),
    /// A builder outside the registry, by address.
    Builder(usize),
}

struct Frame {
    crumb: String,
    key: Option<FrameKey>,
}

/// Stack of in-progress resolution steps.
#[derive(Default)]
pub(crate) struct BuildTrace {
    frames: Mutex<Vec<Frame>>,
}

/// Pops its frame when dropped.
pub(crate) struct TraceGuard<'a> {
    trace: &'a BuildTrace,
}

impl Drop for TraceGuard<'_> {
    fn drop(&mut self) {
        self.trace.frames.lock().pop();
    }
}

impl BuildTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a frame. `key` identifies what is being built, if anything.
    pub fn enter(&self, crumb: String, key: Option<FrameKey>) -> Result<TraceGuard<'_>> {
        let mut frames = self.frames.lock();

        if let Some(key) = &key {
            let repeated = frames.iter().position(|frame| frame.key.as_ref() == Some(key));

            if let Some(start) = repeated {
                let mut chain: Vec<String> = frames[start..].iter().map(|f| f.crumb.clone()).collect();
                chain.push(crumb.clone());
                warn!(key = ?key, chain = ?chain, "Circular dependency detected");

                let mut trail: Vec<String> = frames.iter().map(|f| f.crumb.clone()).collect();
                trail.push(crumb);
                return Err(Error::Build(BuildError {
                    trail,
                    source: Box::new(Error::CircularDependency(CircularDependencyError { chain })),
                }));
            }
        }

        frames.push(Frame { crumb, key });
        Ok(TraceGuard { trace: self })
    }

    /// Runs `step` inside a frame, wrapping its failure with the trail.
    pub fn run<T>(
        &self,
        crumb: String,
        key: Option<FrameKey>,
        step: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let _guard = self.enter(crumb, key)?;
        step().map_err(|err| self.wrap(err, None))
    }

    /// Wraps an error raised before a frame for `crumb` was entered.
    pub fn fail_at(&self, crumb: String, err: Error) -> Error {
        self.wrap(err, Some(crumb))
    }

    fn wrap(&self, err: Error, extra: Option<String>) -> Error {
        match err {
            Error::Build(_) => err,
            other => {
                let mut trail = self.snapshot();
                trail.extend(extra);
                Error::Build(BuildError {
                    trail,
                    source: Box::new(other),
                })
            }
        }
    }

    /// Current breadcrumbs, outermost first.
    pub fn snapshot(&self) -> Vec<String> {
        self.frames.lock().iter().map(|frame| frame.crumb.clone()).collect()
    }

    pub fn depth(&self) -> usize {
        self.frames.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::{Missing, NotFoundError};

    fn not_found(id: &str) -> Error {
        Error::NotFound(NotFoundError::new(Missing::Entry(id.into())))
    }

    #[test]
    fn frames_pop_on_drop() {
        let trace = BuildTrace::new();
        {
            let _outer = trace.enter("'Outer'".into(), None).unwrap();
            let _inner = trace.enter("Inner $inner".into(), None).unwrap();
            assert_eq!(trace.snapshot(), vec!["'Outer'", "Inner $inner"]);
        }
        assert_eq!(trace.depth(), 0);
    }

    #[test]
    fn failure_is_wrapped_once_at_the_deepest_frame() {
        let trace = BuildTrace::new();

        let err = trace
            .run("'Outer'".into(), None, || {
                trace.run("Middle $middle".into(), None, || -> Result<()> { Err(not_found("Inner")) })
            })
            .unwrap_err();

        match err {
            Error::Build(build) => {
                assert_eq!(build.trail, vec!["'Outer'", "Middle $middle"]);
                assert!(build.source.is_not_found());
            }
            other => panic!("expected a build error, got {other:?}"),
        }
        assert_eq!(trace.depth(), 0);
    }

    #[test]
    fn fail_at_adds_the_missing_crumb() {
        let trace = BuildTrace::new();
        let _outer = trace.enter("'Outer'".into(), None).unwrap();

        let err = trace.fail_at("Missing $missing".into(), not_found("Missing"));
        assert!(err.to_string().starts_with("'Outer' => Missing $missing => Error while making Missing $missing"));
    }

    #[test]
    fn same_binding_twice_is_a_cycle() {
        let trace = BuildTrace::new();
        let chicken = Identifier::from("Chicken");
        let egg = Identifier::from("Egg");

        let _a = trace
            .enter("'Chicken'".into(), Some(FrameKey::Binding(chicken.clone(), 1)))
            .unwrap();
        let _b = trace.enter("Egg $egg".into(), Some(FrameKey::Binding(egg, 2))).unwrap();
        let err = trace
            .enter("Chicken $chicken".into(), Some(FrameKey::Binding(chicken, 1)))
            .err()
            .unwrap();

        assert!(matches!(err.root_cause(), Error::CircularDependency(_)));
        assert!(err.to_string().contains("'Chicken' => Egg $egg => Chicken $chicken"));
    }

    #[test]
    fn new_generation_is_not_a_cycle() {
        let trace = BuildTrace::new();
        let mailer = Identifier::from("mailer");

        let _a = trace
            .enter("'mailer'".into(), Some(FrameKey::Binding(mailer.clone(), 1)))
            .unwrap();
        assert!(trace.enter("'mailer'".into(), Some(FrameKey::Binding(mailer, 2))).is_ok());
    }

    #[test]
    fn same_builder_twice_is_a_cycle() {
        let trace = BuildTrace::new();

        let _a = trace.enter("Egg $egg".into(), Some(FrameKey::Builder(0x10))).unwrap();
        let _b = trace.enter("Chicken $chicken".into(), Some(FrameKey::Builder(0x20))).unwrap();
        let err = trace.enter("Egg $egg".into(), Some(FrameKey::Builder(0x10))).err().unwrap();

        assert!(err.to_string().contains("Egg $egg => Chicken $chicken => Egg $egg"));
        assert_eq!(trace.depth(), 2);
    }
}
