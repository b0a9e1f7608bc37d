//! Per-build driver for module extension resolution
//!
//! A session loads the lockfile once, evaluates any number of extensions in
//! parallel, retries the ones that were not ready, and writes the lockfile at
//! most once when the build finishes.

use crate::config::LockfileMode;
use crate::eval::{
    Environment, EvaluationOutput, ExtensionError, LoadedScript, ScriptError, SingleExtensionEvalValue,
    SingleExtensionEvaluator, Step,
};
use crate::lockfile::{Lockfile, LockfileError, LockfileStore, LockfileUpdater, ResolutionInputs};
use crate::model::{Label, ModuleExtensionId, SingleExtensionUsages};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{source}")]
    Extension {
        extension_id: ModuleExtensionId,
        source: ExtensionError,
    },

    #[error(transparent)]
    Lockfile(#[from] LockfileError),

    #[error("Lock file is no longer up-to-date because: {}", .reasons.join(", "))]
    StaleModuleInputs { reasons: Vec<String> },

    #[error("module extensions still waiting for inputs after {rounds} rounds: {}", .pending.join(", "))]
    NoProgress { rounds: usize, pending: Vec<String> },

    #[error("resolution was cancelled")]
    Cancelled,
}

/// Environment seen by evaluators: the caller's, with the session's lockfile
struct SessionEnvironment<'a> {
    inner: &'a dyn Environment,
    lockfile: Arc<Lockfile>,
}

impl Environment for SessionEnvironment<'_> {
    fn extension_usages(&self, id: &ModuleExtensionId) -> Step<Arc<SingleExtensionUsages>> {
        self.inner.extension_usages(id)
    }

    fn load_script(&self, label: &Label) -> Result<Step<Arc<LoadedScript>>, ScriptError> {
        self.inner.load_script(label)
    }

    fn lockfile(&self) -> Step<Arc<Lockfile>> {
        Step::Ready(Arc::clone(&self.lockfile))
    }

    fn input(&self, label: &Label) -> Result<Step<Arc<[u8]>>, ScriptError> {
        self.inner.input(label)
    }
}

pub struct ResolutionSession {
    store: LockfileStore,
    lockfile: Arc<Lockfile>,
    evaluator: SingleExtensionEvaluator,
    updater: LockfileUpdater,
    max_rounds: usize,
    cancelled: AtomicBool,
}

impl ResolutionSession {
    /// Start a session, loading the lockfile unless the mode ignores it
    pub fn open(
        store: LockfileStore,
        evaluator: SingleExtensionEvaluator,
        max_rounds: usize,
    ) -> Result<Self, SessionError> {
        let lockfile = match evaluator.mode() {
            LockfileMode::Off => Lockfile::default(),
            LockfileMode::Update | LockfileMode::Error => store.load_or_default()?,
        };
        Ok(Self::with_lockfile(store, lockfile, evaluator, max_rounds))
    }

    pub fn with_lockfile(
        store: LockfileStore,
        lockfile: Lockfile,
        evaluator: SingleExtensionEvaluator,
        max_rounds: usize,
    ) -> Self {
        Self {
            store,
            lockfile: Arc::new(lockfile),
            evaluator,
            updater: LockfileUpdater::new(),
            max_rounds: max_rounds.max(1),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn lockfile(&self) -> &Arc<Lockfile> {
        &self.lockfile
    }

    pub fn mode(&self) -> LockfileMode {
        self.evaluator.mode()
    }

    pub fn evaluator(&self) -> &SingleExtensionEvaluator {
        &self.evaluator
    }

    /// Compare the locked module inputs and flags with the current ones
    ///
    /// In error mode any difference fails the build; otherwise the reasons
    /// are returned for logging.
    pub fn check_module_inputs(&self, current: &ResolutionInputs) -> Result<Vec<String>, SessionError> {
        if self.mode() == LockfileMode::Off {
            return Ok(Vec::new());
        }
        let reasons = self.lockfile.module_and_flags_diff(current);
        if self.mode() == LockfileMode::Error && !reasons.is_empty() {
            return Err(SessionError::StaleModuleInputs { reasons });
        }
        for reason in &reasons {
            debug!("Module inputs changed: {}", reason);
        }
        Ok(reasons)
    }

    /// Evaluate one extension; a fresh result is kept for the lockfile
    pub fn evaluate(
        &self,
        id: &ModuleExtensionId,
        env: &dyn Environment,
    ) -> Result<Step<SingleExtensionEvalValue>, SessionError> {
        if self.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        let env = self.environment(env);
        let step = self
            .evaluator
            .evaluate(id, &env)
            .map_err(|source| SessionError::Extension {
                extension_id: id.clone(),
                source,
            })?;
        Ok(step.map(|output| self.accept(output)))
    }

    /// Evaluate every id in parallel, re-running those that were not ready until all settle
    ///
    /// Results are keyed by id. When several extensions fail in the same round
    /// the error of the smallest id is returned and none of that round's
    /// results reach the lockfile.
    pub fn evaluate_all(
        &self,
        ids: &[ModuleExtensionId],
        env: &dyn Environment,
    ) -> Result<BTreeMap<ModuleExtensionId, SingleExtensionEvalValue>, SessionError> {
        let env = self.environment(env);
        let mut pending: Vec<ModuleExtensionId> = ids.to_vec();
        pending.sort();
        pending.dedup();

        let mut values = BTreeMap::new();
        let mut rounds = 0;
        while !pending.is_empty() {
            if self.is_cancelled() {
                return Err(SessionError::Cancelled);
            }
            if rounds == self.max_rounds {
                return Err(SessionError::NoProgress {
                    rounds,
                    pending: pending.iter().map(ToString::to_string).collect(),
                });
            }
            rounds += 1;
            debug!("Evaluation round {} with {} extensions", rounds, pending.len());

            let outcomes: Vec<(ModuleExtensionId, Result<Step<EvaluationOutput>, ExtensionError>)> = pending
                .par_iter()
                .map(|id| (id.clone(), self.evaluator.evaluate(id, &env)))
                .collect();

            // A failing round records nothing
            let mut ready = Vec::new();
            let mut next = Vec::new();
            for (id, outcome) in outcomes {
                match outcome {
                    Ok(Step::Ready(output)) => ready.push((id, output)),
                    Ok(Step::NotReady) => next.push(id),
                    Err(source) => {
                        return Err(SessionError::Extension {
                            extension_id: id,
                            source,
                        })
                    }
                }
            }
            for (id, output) in ready {
                values.insert(id, self.accept(output));
            }
            pending = next;
        }

        info!("Resolved {} module extensions in {} rounds", values.len(), rounds);
        Ok(values)
    }

    /// Stop the session: no lockfile will be written and running evaluations lose their working directories
    pub fn cancel(&self) -> usize {
        self.cancelled.store(true, Ordering::SeqCst);
        let removed = self.evaluator.abort_in_flight();
        warn!("Resolution cancelled; removed {} working directories", removed);
        removed
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Write the lockfile for the finished build, if this session should write one
    ///
    /// Only update mode writes, and only when the content changed or no file
    /// exists yet. Returns the lockfile that was written.
    pub fn finish(self, inputs: ResolutionInputs) -> Result<Option<Lockfile>, SessionError> {
        if self.is_cancelled() {
            warn!("Skipping lockfile write for cancelled resolution");
            return Ok(None);
        }
        if self.mode() != LockfileMode::Update {
            return Ok(None);
        }

        let next = self.updater.build(&self.lockfile, inputs)?;
        if *self.lockfile == next && self.store.exists() {
            debug!("Lockfile is up to date");
            return Ok(None);
        }

        self.store.save(&next)?;
        Ok(Some(next))
    }

    fn environment<'a>(&self, inner: &'a dyn Environment) -> SessionEnvironment<'a> {
        SessionEnvironment {
            inner,
            lockfile: Arc::clone(&self.lockfile),
        }
    }

    fn accept(&self, output: EvaluationOutput) -> SingleExtensionEvalValue {
        if let Some(resolution) = output.resolution {
            self.updater.record(resolution);
        }
        output.value
    }
}
