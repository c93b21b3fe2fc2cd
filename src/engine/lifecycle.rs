//! engine::lifecycle
//!
//! The configuration lifecycle: `init`, `get`/`set`, `diff`, `apply`.
//!
//! # Apply contract
//!
//! 1. Gate on the detected [`LifecycleState`], then take the directory lock
//! 2. Compute drift between the seed and the working copy
//! 3. Run the pre-apply hook (a failure aborts before any write)
//! 4. Without drift and without force, stop here: nothing is written
//! 5. Snapshot the current document and write the apply marker
//! 6. Replace the current document atomically and commit
//! 7. If the commit fails, restore the snapshot and clear the marker. If the
//!    restore fails too, the marker stays behind with phase `failed`
//! 8. Clear the marker and run the post-apply hook. Once the commit is
//!    recorded nothing is rolled back: a marker that cannot be cleared or a
//!    failed post hook is reported next to the successful result
//!
//! # Example
//!
//! ```no_run
//! use confkit::core::types::VariablePath;
//! use confkit::engine::ConfigurationManager;
//! use confkit::git::GitBackend;
//!
//! let mut manager = ConfigurationManager::new("/etc/myapp", "/usr/share/myapp/default.yml", GitBackend::default());
//! manager.init(false)?;
//! manager.set_variable(&VariablePath::parse("db.port")?, "5433", "integer", false)?;
//! let record = manager.apply("bump port", false)?;
//! println!("{:?}", record.outcome);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::hooks::{self, HookContext, HookFailure, HookPhase, HookStage, LifecycleHooks, NoHooks};
use super::rollback::{rollback, FileSnapshot, RollbackError};
use crate::core::coerce::{CoerceError, TypeRegistry, TypedValue};
use crate::core::document::{Document, DocumentError, VariableStore};
use crate::core::drift::{self, ChangeSet};
use crate::core::ops::{
    write_atomic_via, ApplyMarker, ApplyPhase, DirLock, LockError, MarkerError, OpId,
};
use crate::core::paths::ConfigPaths;
use crate::core::state::{GateError, LifecycleState, Operation};
use crate::core::types::{CommitId, Fingerprint, VariablePath};
use crate::git::{GitError, VersionControl};

/// Commit message used by `init`.
pub const INIT_MESSAGE: &str = "[autocommit] due to 'configure init'";

/// Commit message used by `init --reset`.
pub const RESET_MESSAGE: &str = "[autocommit] due to 'configure init --reset'";

/// Errors from lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("configuration directory {} does not exist", dir.display())]
    ConfigDirMissing { dir: PathBuf },

    #[error("configuration directory {} is not initialised (run init first)", dir.display())]
    NotInitialised { dir: PathBuf },

    #[error("configuration directory {} is already initialised (use reset to start over)", dir.display())]
    AlreadyInitialised { dir: PathBuf },

    #[error("a previous apply in {} did not finish ({state}); rerun with force", dir.display())]
    ApplyInterrupted { dir: PathBuf, state: LifecycleState },

    /// Not found, parse and persist failures of a document.
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Coerce(#[from] CoerceError),

    #[error(transparent)]
    Hook(#[from] HookFailure),

    /// The commit failed and the files were put back.
    #[error("commit failed, {} left unchanged: {source}", path.display())]
    CommitFailed {
        path: PathBuf,
        #[source]
        source: GitError,
    },

    /// The commit failed and the files could not be put back.
    #[error("commit failed ({commit}) and restoring the previous configuration failed ({restore}); fix the cause and rerun apply with force")]
    InconsistentState {
        commit: GitError,
        restore: RollbackError,
    },

    #[error("configuration directory {} is locked by another process", dir.display())]
    Locked { dir: PathBuf },

    #[error(transparent)]
    Lock(LockError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Marker(#[from] MarkerError),

    #[error(transparent)]
    Rollback(#[from] RollbackError),

    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<GateError> for LifecycleError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::ConfigDirMissing { dir } => LifecycleError::ConfigDirMissing { dir },
            GateError::NotInitialised { dir } => LifecycleError::NotInitialised { dir },
            GateError::AlreadyInitialised { dir } => LifecycleError::AlreadyInitialised { dir },
            GateError::ApplyInterrupted { dir, state } => {
                LifecycleError::ApplyInterrupted { dir, state }
            }
        }
    }
}

/// Result of `init`.
#[derive(Debug)]
pub struct InitRecord {
    /// `None` if the seed matched what was already committed.
    pub commit: Option<CommitId>,
    pub reset: bool,
    pub post_hook: Option<HookFailure>,
}

impl InitRecord {
    pub fn is_degraded(&self) -> bool {
        self.post_hook.is_some()
    }
}

/// What an apply ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Committed(CommitId),
    /// The document was written but matched the last commit.
    NothingToCommit,
    /// No drift from the seed and not forced; nothing was written.
    NoDrift,
}

/// Result of `apply`.
#[derive(Debug)]
pub struct ApplyRecord {
    pub op_id: OpId,
    pub message: String,
    pub outcome: ApplyOutcome,
    /// Files replaced.
    pub files: Vec<PathBuf>,
    /// Variables assigned since the working copy was loaded.
    pub variables: Vec<VariablePath>,
    /// Cleanup that failed after the commit was recorded.
    pub warnings: Vec<String>,
    pub post_hook: Option<HookFailure>,
}

impl ApplyRecord {
    pub fn is_degraded(&self) -> bool {
        self.post_hook.is_some() || !self.warnings.is_empty()
    }
}

/// Owns one configuration directory and drives its lifecycle.
///
/// Holds the single in-memory working copy of the current document. It is
/// loaded on first use and shared by `get`, `set`, `diff` and `apply`.
pub struct ConfigurationManager {
    paths: ConfigPaths,
    seed: PathBuf,
    vcs: Box<dyn VersionControl>,
    hooks: Box<dyn LifecycleHooks>,
    registry: TypeRegistry,
    store: Option<VariableStore>,
}

impl ConfigurationManager {
    pub fn new(
        dir: impl Into<PathBuf>,
        seed: impl Into<PathBuf>,
        vcs: impl VersionControl + 'static,
    ) -> Self {
        Self {
            paths: ConfigPaths::new(dir),
            seed: seed.into(),
            vcs: Box::new(vcs),
            hooks: Box::new(NoHooks),
            registry: TypeRegistry::default(),
            store: None,
        }
    }

    pub fn with_hooks(mut self, hooks: impl LifecycleHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn with_registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn seed_path(&self) -> &Path {
        &self.seed
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn state(&self) -> Result<LifecycleState, LifecycleError> {
        Ok(LifecycleState::detect(&self.paths, self.vcs.as_ref())?)
    }

    /// Create the current document from the seed and put the directory
    /// under version control.
    ///
    /// With `reset`, an initialised directory is overwritten with the seed
    /// and the reset is committed.
    pub fn init(&mut self, reset: bool) -> Result<InitRecord, LifecycleError> {
        self.gate(Operation::Init, reset)?;

        let seed_text = self.read_seed()?;
        Document::parse(seed_text.as_str(), &self.seed.display().to_string())?;

        hooks::run(
            self.hooks.as_ref(),
            HookStage::Pre,
            HookPhase::Init,
            &self.hook_context(None, reset),
        )?;

        let dir = self.paths.dir().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| LifecycleError::Io {
            path: dir.clone(),
            source,
        })?;
        let _lock = self.lock()?;

        let document = self.paths.current_document();
        let staging = self.paths.staging_dir();
        let snapshots = [
            FileSnapshot::capture(self.paths.gitignore_path())?.staged_in(&staging),
            FileSnapshot::capture(&document)?.staged_in(&staging),
        ];

        let written = write_ignore_file(&self.paths)
            .and_then(|()| persist(&self.paths, seed_text.as_str()));
        if let Err(e) = written {
            rollback(&snapshots);
            return Err(e);
        }

        let message = if reset { RESET_MESSAGE } else { INIT_MESSAGE };
        let committed = if self.vcs.exists(&dir) {
            self.vcs.commit(&dir, message, false)
        } else {
            self.vcs.initialise(&dir, message)
        };
        let commit = match committed {
            Ok(id) => id,
            Err(source) => {
                warn!(error = %source, "init commit failed, restoring");
                return Err(restore_after(&snapshots, document, source));
            }
        };

        self.store = None;
        info!(path = %dir.display(), reset, "configuration initialised");

        let post_hook = self.run_post_hook(HookPhase::Init, None, reset);
        Ok(InitRecord {
            commit,
            reset,
            post_hook,
        })
    }

    /// The value at `path`, or `None` when it does not resolve.
    pub fn get_variable(&mut self, path: &VariablePath) -> Result<Option<Value>, LifecycleError> {
        self.gate(Operation::Get, false)?;
        Ok(self.store()?.get(path).cloned())
    }

    /// Coerce `raw` to `type_name` and assign it at `path` in memory.
    ///
    /// Nothing is written; see [`save_current`](Self::save_current) and
    /// [`apply`](Self::apply).
    pub fn set_variable(
        &mut self,
        path: &VariablePath,
        raw: &str,
        type_name: &str,
        force: bool,
    ) -> Result<TypedValue, LifecycleError> {
        self.gate(Operation::Set, force)?;
        let typed = self.registry.coerce(raw, type_name)?;
        self.store()?.set(path, typed.clone())?;
        Ok(typed)
    }

    /// Write the working copy to the current document without committing.
    ///
    /// Returns whether anything was written.
    pub fn save_current(&mut self, force: bool) -> Result<bool, LifecycleError> {
        self.gate(Operation::Set, force)?;
        let _lock = self.lock()?;
        match self.store.as_mut() {
            Some(store) if store.is_dirty() => {
                store.save()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Drift between the seed and the working copy.
    pub fn diff(&mut self) -> Result<ChangeSet, LifecycleError> {
        self.gate(Operation::Diff, false)?;
        let seed_text = self.read_seed()?;
        Ok(drift::diff(&seed_text, self.store()?.text()))
    }

    /// Persist the working copy and commit it with `message`.
    ///
    /// `force` commits even without drift and recovers a directory left
    /// behind by an interrupted apply.
    pub fn apply(&mut self, message: &str, force: bool) -> Result<ApplyRecord, LifecycleError> {
        self.gate(Operation::Apply, force)?;
        let _lock = self.lock()?;

        let seed_text = self.read_seed()?;
        let store = self.store()?;
        let target = store.text().to_string();
        let variables = store.modified_paths().to_vec();
        let drift = drift::diff(&seed_text, &target);

        hooks::run(
            self.hooks.as_ref(),
            HookStage::Pre,
            HookPhase::Apply,
            &self.hook_context(Some(message), force),
        )?;

        let op_id = OpId::new();
        let mut warnings = Vec::new();
        let (outcome, files) = if drift.is_empty() && !force {
            info!("no drift from seed, nothing to apply");
            (ApplyOutcome::NoDrift, Vec::new())
        } else {
            debug!(%op_id, added = drift.added(), removed = drift.removed(), "applying");
            let outcome = self.persist_and_commit(message, force, &target, &mut warnings)?;
            (outcome, vec![self.paths.current_document()])
        };

        match &outcome {
            ApplyOutcome::Committed(id) => info!(commit = %id.short(7), "configuration applied"),
            ApplyOutcome::NothingToCommit => info!("configuration already committed"),
            ApplyOutcome::NoDrift => {}
        }

        let post_hook = self.run_post_hook(HookPhase::Apply, Some(message), force);
        Ok(ApplyRecord {
            op_id,
            message: message.to_string(),
            outcome,
            files,
            variables,
            warnings,
            post_hook,
        })
    }

    fn persist_and_commit(
        &mut self,
        message: &str,
        force: bool,
        target: &str,
        warnings: &mut Vec<String>,
    ) -> Result<ApplyOutcome, LifecycleError> {
        let document = self.paths.current_document();
        let snapshot = FileSnapshot::capture(&document)?.staged_in(self.paths.staging_dir());
        let mut marker = ApplyMarker::new(
            message,
            Fingerprint::of(snapshot.content().unwrap_or_default()),
            Fingerprint::of(target.as_bytes()),
        );
        marker.write(&self.paths)?;

        if let Err(e) = persist(&self.paths, target) {
            ApplyMarker::remove(&self.paths)?;
            return Err(e);
        }
        if let Err(e) = marker.update_phase(ApplyPhase::Committing, &self.paths) {
            warn!(error = %e, "cannot record commit phase");
        }

        match self.vcs.commit(self.paths.dir(), message, force) {
            Ok(id) => {
                // The commit stands from here on; cleanup failures are only reported.
                if let Err(e) = clear_marker(&self.paths) {
                    warn!(error = %e, "commit recorded but apply marker not removed");
                    warnings.push(format!(
                        "apply marker not removed ({e}); the next apply needs force"
                    ));
                }
                // The working copy now matches the file; reload on next use.
                self.store = None;
                Ok(id.map_or(ApplyOutcome::NothingToCommit, ApplyOutcome::Committed))
            }
            Err(source) => {
                warn!(error = %source, "commit failed, restoring previous configuration");
                let err = restore_after(std::slice::from_ref(&snapshot), document, source);
                if matches!(err, LifecycleError::InconsistentState { .. }) {
                    if let Err(e) = marker.update_phase(ApplyPhase::Failed, &self.paths) {
                        warn!(error = %e, "cannot record failed apply");
                    }
                } else {
                    ApplyMarker::remove(&self.paths)?;
                }
                Err(err)
            }
        }
    }

    fn gate(&self, op: Operation, force: bool) -> Result<LifecycleState, LifecycleError> {
        let state = self.state()?;
        state.verify_allowed(op, force, &self.paths)?;
        debug!(%state, operation = %op, "operation allowed");
        Ok(state)
    }

    fn lock(&self) -> Result<DirLock, LifecycleError> {
        DirLock::acquire(&self.paths).map_err(|e| match e {
            LockError::AlreadyLocked => LifecycleError::Locked {
                dir: self.paths.dir().to_path_buf(),
            },
            other => LifecycleError::Lock(other),
        })
    }

    fn store(&mut self) -> Result<&mut VariableStore, LifecycleError> {
        let store = match self.store.take() {
            Some(store) => store,
            None => VariableStore::load(self.paths.current_document())?
                .with_staging(self.paths.staging_dir()),
        };
        Ok(self.store.insert(store))
    }

    fn read_seed(&self) -> Result<String, LifecycleError> {
        fs::read_to_string(&self.seed).map_err(|e| {
            let path = self.seed.clone();
            LifecycleError::Document(match e.kind() {
                ErrorKind::NotFound => DocumentError::NotFound { path },
                _ => DocumentError::Read { path, source: e },
            })
        })
    }

    fn hook_context<'a>(&'a self, message: Option<&'a str>, force: bool) -> HookContext<'a> {
        HookContext {
            paths: &self.paths,
            seed: &self.seed,
            message,
            force,
        }
    }

    fn run_post_hook(
        &self,
        phase: HookPhase,
        message: Option<&str>,
        force: bool,
    ) -> Option<HookFailure> {
        let ctx = self.hook_context(message, force);
        let failure = hooks::run(self.hooks.as_ref(), HookStage::Post, phase, &ctx).err();
        if let Some(f) = &failure {
            warn!(error = %f, "post hook failed");
        }
        failure
    }
}

/// Replace the current document with `target`.
fn persist(paths: &ConfigPaths, target: &str) -> Result<(), LifecycleError> {
    let document = paths.current_document();

    #[cfg(any(test, feature = "fault_injection"))]
    super::failpoints::check(super::failpoints::PERSIST_DOCUMENT).map_err(|message| {
        DocumentError::Persist {
            path: document.clone(),
            source: io::Error::other(message),
        }
    })?;

    write_atomic_via(&document, target.as_bytes(), &paths.staging_dir()).map_err(|source| {
        LifecycleError::Document(DocumentError::Persist {
            path: document,
            source,
        })
    })
}

fn clear_marker(paths: &ConfigPaths) -> Result<(), MarkerError> {
    #[cfg(any(test, feature = "fault_injection"))]
    super::failpoints::check(super::failpoints::CLEAR_MARKER)
        .map_err(|message| MarkerError::Io(io::Error::other(message)))?;

    ApplyMarker::remove(paths)
}

fn write_ignore_file(paths: &ConfigPaths) -> Result<(), LifecycleError> {
    let path = paths.gitignore_path();
    if path.exists() {
        return Ok(());
    }
    let content = ConfigPaths::gitignore_content();
    write_atomic_via(&path, content.as_bytes(), &paths.staging_dir())
        .map_err(|source| LifecycleError::Io { path, source })
}

/// Roll back after a failed commit and pick the error to report.
fn restore_after(snapshots: &[FileSnapshot], path: PathBuf, commit: GitError) -> LifecycleError {
    let result = rollback(snapshots);
    debug!(summary = %result.summary(), "rollback finished");
    match result.failed.into_iter().next() {
        None => LifecycleError::CommitFailed {
            path,
            source: commit,
        },
        Some(restore) => LifecycleError::InconsistentState { commit, restore },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::failpoints;
    use crate::engine::hooks::HookError;
    use crate::git::mock::{FailOn, MockOperation, MockVcs};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    const SEED: &str = "# database settings\ndb:\n  host: localhost # primary\n  port: 5432\n";

    struct Fixture {
        _tmp: TempDir,
        dir: PathBuf,
        seed: PathBuf,
        vcs: MockVcs,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let seed = tmp.path().join("default.yml");
            fs::write(&seed, SEED).unwrap();
            Self {
                dir: tmp.path().join("cfg"),
                seed,
                vcs: MockVcs::new(),
                _tmp: tmp,
            }
        }

        fn manager(&self) -> ConfigurationManager {
            ConfigurationManager::new(&self.dir, &self.seed, self.vcs.clone())
        }

        fn initialised(&self) -> ConfigurationManager {
            let mut manager = self.manager();
            manager.init(false).unwrap();
            manager
        }

        fn current(&self) -> String {
            fs::read_to_string(self.dir.join("settings.yml")).unwrap()
        }

        fn commits(&self) -> Vec<String> {
            self.vcs.history(&self.dir)
        }
    }

    fn path(s: &str) -> VariablePath {
        VariablePath::parse(s).unwrap()
    }

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Rc<RefCell<Vec<String>>>,
        fail: Option<&'static str>,
    }

    impl Recorder {
        fn failing(at: &'static str) -> Self {
            Self {
                fail: Some(at),
                ..Self::default()
            }
        }

        fn record(&self, name: &str) -> Result<(), HookError> {
            self.calls.borrow_mut().push(name.to_string());
            if self.fail == Some(name) {
                return Err(HookError::new(format!("{name} refused")));
            }
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl LifecycleHooks for Recorder {
        fn pre_configure_init(&self, _ctx: &HookContext<'_>) -> Result<(), HookError> {
            self.record("pre-init")
        }

        fn post_configure_init(&self, _ctx: &HookContext<'_>) -> Result<(), HookError> {
            self.record("post-init")
        }

        fn pre_configure_apply(&self, _ctx: &HookContext<'_>) -> Result<(), HookError> {
            self.record("pre-apply")
        }

        fn post_configure_apply(&self, _ctx: &HookContext<'_>) -> Result<(), HookError> {
            self.record("post-apply")
        }
    }

    mod init {
        use super::*;

        #[test]
        fn copies_seed_and_commits() {
            let fx = Fixture::new();
            let record = fx.manager().init(false).unwrap();

            assert!(record.commit.is_some());
            assert!(!record.is_degraded());
            assert_eq!(fx.current(), SEED);
            assert_eq!(
                fs::read_to_string(fx.dir.join(".gitignore")).unwrap(),
                ".generated*\n.metadata*\n"
            );
            assert_eq!(fx.commits(), [INIT_MESSAGE]);
            assert_eq!(fx.manager().state().unwrap(), LifecycleState::Unmodified);
        }

        #[test]
        fn second_init_needs_reset() {
            let fx = Fixture::new();
            let mut manager = fx.initialised();
            assert!(matches!(
                manager.init(false),
                Err(LifecycleError::AlreadyInitialised { .. })
            ));

            manager.set_variable(&path("db.port"), "1", "integer", false).unwrap();
            manager.apply("tune", false).unwrap();
            let record = manager.init(true).unwrap();
            assert!(record.reset);
            assert!(record.commit.is_some());
            assert_eq!(fx.current(), SEED);
            assert_eq!(fx.commits(), [INIT_MESSAGE, "tune", RESET_MESSAGE]);
            assert_eq!(manager.get_variable(&path("db.port")).unwrap(), Some(Value::from(5432)));
        }

        #[test]
        fn missing_seed_writes_nothing() {
            let fx = Fixture::new();
            fs::remove_file(&fx.seed).unwrap();
            let err = fx.manager().init(false).unwrap_err();
            assert!(matches!(
                err,
                LifecycleError::Document(DocumentError::NotFound { .. })
            ));
            assert!(!fx.dir.exists());
        }

        #[test]
        fn malformed_seed_is_rejected() {
            let fx = Fixture::new();
            fs::write(&fx.seed, "db: [unclosed\n").unwrap();
            assert!(matches!(
                fx.manager().init(false),
                Err(LifecycleError::Document(DocumentError::Parse { .. }))
            ));
            assert!(!fx.dir.exists());
        }

        #[test]
        fn pre_hook_failure_aborts_before_writing() {
            let fx = Fixture::new();
            let hooks = Recorder::failing("pre-init");
            let err = fx.manager().with_hooks(hooks.clone()).init(false).unwrap_err();

            match err {
                LifecycleError::Hook(failure) => {
                    assert_eq!(failure.stage, HookStage::Pre);
                    assert_eq!(failure.phase, HookPhase::Init);
                }
                other => panic!("expected hook failure, got {other:?}"),
            }
            assert_eq!(hooks.calls(), ["pre-init"]);
            assert!(!fx.dir.exists());
        }

        #[test]
        fn post_hook_failure_is_degraded_success() {
            let fx = Fixture::new();
            let hooks = Recorder::failing("post-init");
            let record = fx.manager().with_hooks(hooks.clone()).init(false).unwrap();

            assert!(record.is_degraded());
            assert_eq!(hooks.calls(), ["pre-init", "post-init"]);
            assert_eq!(fx.current(), SEED);
        }

        #[test]
        fn failed_initialise_removes_written_files() {
            let fx = Fixture::new();
            let mut manager =
                ConfigurationManager::new(&fx.dir, &fx.seed, fx.vcs.clone().fail_on(FailOn::Initialise));
            assert!(matches!(
                manager.init(false),
                Err(LifecycleError::CommitFailed { .. })
            ));
            assert!(!fx.dir.join("settings.yml").exists());
            assert!(!fx.dir.join(".gitignore").exists());
        }

        #[test]
        fn existing_document_without_repository_is_kept() {
            let fx = Fixture::new();
            let operator = "db:\n  port: 9999 # operator\n";
            fs::create_dir_all(&fx.dir).unwrap();
            fs::write(fx.dir.join("settings.yml"), operator).unwrap();

            assert!(matches!(
                fx.manager().init(false),
                Err(LifecycleError::AlreadyInitialised { .. })
            ));
            assert_eq!(fx.current(), operator);
            assert!(fx.commits().is_empty());

            let record = fx.manager().init(true).unwrap();
            assert!(record.commit.is_some());
            assert_eq!(fx.current(), SEED);
            assert_eq!(fx.commits(), [RESET_MESSAGE]);
        }

        #[test]
        fn existing_ignore_file_is_kept() {
            let fx = Fixture::new();
            fs::create_dir_all(&fx.dir).unwrap();
            fs::write(fx.dir.join(".gitignore"), "*.bak\n").unwrap();
            fx.manager().init(false).unwrap();
            assert_eq!(
                fs::read_to_string(fx.dir.join(".gitignore")).unwrap(),
                "*.bak\n"
            );
        }
    }

    mod variables {
        use super::*;

        #[test]
        fn set_then_get_without_persisting() {
            let fx = Fixture::new();
            let mut manager = fx.initialised();

            let typed = manager
                .set_variable(&path("db.port"), "5433", "integer", false)
                .unwrap();
            assert_eq!(typed, TypedValue::Integer(5433));
            assert_eq!(
                manager.get_variable(&path("db.port")).unwrap(),
                Some(Value::from(5433))
            );
            assert_eq!(fx.current(), SEED);
        }

        #[test]
        fn missing_path_is_none() {
            let fx = Fixture::new();
            let mut manager = fx.initialised();
            assert_eq!(manager.get_variable(&path("db.missing.path")).unwrap(), None);
            assert_eq!(manager.get_variable(&path("db.host.deeper")).unwrap(), None);
        }

        #[test]
        fn subtree_reads_as_mapping() {
            let fx = Fixture::new();
            let mut manager = fx.initialised();
            let db = manager.get_variable(&path("db")).unwrap().unwrap();
            assert!(db.is_mapping());
            assert_eq!(db["host"], Value::from("localhost"));
        }

        #[test]
        fn bad_type_and_bad_value() {
            let fx = Fixture::new();
            let mut manager = fx.initialised();
            assert!(matches!(
                manager.set_variable(&path("a"), "1", "uuid", false),
                Err(LifecycleError::Coerce(CoerceError::UnsupportedTypeKind { .. }))
            ));
            assert!(matches!(
                manager.set_variable(&path("a"), "many", "integer", false),
                Err(LifecycleError::Coerce(CoerceError::ValueCoercion { .. }))
            ));
            assert_eq!(manager.get_variable(&path("a")).unwrap(), None);
        }

        #[test]
        fn uninitialised_directory_is_gated() {
            let fx = Fixture::new();
            let mut manager = fx.manager();
            assert!(matches!(
                manager.get_variable(&path("db.port")),
                Err(LifecycleError::ConfigDirMissing { .. })
            ));
            fs::create_dir_all(&fx.dir).unwrap();
            assert!(matches!(
                manager.set_variable(&path("db.port"), "1", "integer", false),
                Err(LifecycleError::NotInitialised { .. })
            ));
        }

        #[test]
        fn save_current_writes_without_committing() {
            let fx = Fixture::new();
            let mut manager = fx.initialised();
            assert!(!manager.save_current(false).unwrap());

            manager.set_variable(&path("db.port"), "5433", "integer", false).unwrap();
            assert!(manager.save_current(false).unwrap());
            assert!(fx.current().contains("port: 5433"));
            assert!(fx.current().contains("# primary"));
            assert_eq!(fx.commits(), [INIT_MESSAGE]);
            assert_eq!(manager.state().unwrap(), LifecycleState::Modified);
        }
    }

    mod diff {
        use super::*;

        #[test]
        fn fresh_directory_has_no_drift() {
            let fx = Fixture::new();
            let mut manager = fx.initialised();
            assert!(manager.diff().unwrap().is_empty());
        }

        #[test]
        fn reports_in_memory_changes() {
            let fx = Fixture::new();
            let mut manager = fx.initialised();
            manager.set_variable(&path("db.port"), "5433", "integer", false).unwrap();

            let changes = manager.diff().unwrap();
            assert_eq!(changes.added(), 1);
            assert_eq!(changes.removed(), 1);
            let unified = changes.unified("default", "current", 3);
            assert!(unified.contains("-  port: 5432\n"));
            assert!(unified.contains("+  port: 5433\n"));
        }
    }

    mod apply {
        use super::*;

        #[test]
        fn no_drift_is_a_noop_but_runs_hooks() {
            let fx = Fixture::new();
            let hooks = Recorder::default();
            let mut manager = fx.initialised().with_hooks(hooks.clone());

            let record = manager.apply("nothing", false).unwrap();
            assert_eq!(record.outcome, ApplyOutcome::NoDrift);
            assert!(record.files.is_empty());
            assert_eq!(fx.commits(), [INIT_MESSAGE]);
            assert_eq!(hooks.calls(), ["pre-apply", "post-apply"]);
        }

        #[test]
        fn forced_apply_commits_without_drift() {
            let fx = Fixture::new();
            let mut manager = fx.initialised();
            let record = manager.apply("forced", true).unwrap();
            assert!(matches!(record.outcome, ApplyOutcome::Committed(_)));
            assert_eq!(fx.commits(), [INIT_MESSAGE, "forced"]);
        }

        #[test]
        fn commits_changes_and_clears_marker() {
            let fx = Fixture::new();
            let mut manager = fx.initialised();
            manager.set_variable(&path("db.port"), "5433", "integer", false).unwrap();
            manager.set_variable(&path("cache.ttl"), "60", "integer", false).unwrap();

            let record = manager.apply("tune", false).unwrap();
            assert!(matches!(record.outcome, ApplyOutcome::Committed(_)));
            assert_eq!(record.message, "tune");
            assert_eq!(record.variables, [path("db.port"), path("cache.ttl")]);
            assert_eq!(record.files, [fx.dir.join("settings.yml")]);

            assert!(fx.current().contains("port: 5433"));
            assert!(fx.current().contains("# database settings"));
            assert!(!ApplyMarker::exists(manager.paths()));
            assert_eq!(manager.state().unwrap(), LifecycleState::Unmodified);
            assert!(fx.vcs.operations().contains(&MockOperation::Commit {
                dir: fx.dir.clone(),
                message: "tune".to_string(),
                allow_empty: false,
            }));
        }

        #[test]
        fn reapplying_committed_drift_commits_nothing() {
            let fx = Fixture::new();
            let mut manager = fx.initialised();
            manager.set_variable(&path("db.port"), "5433", "integer", false).unwrap();
            manager.apply("first", false).unwrap();

            let record = manager.apply("again", false).unwrap();
            assert_eq!(record.outcome, ApplyOutcome::NothingToCommit);
            assert!(record.variables.is_empty());
            assert_eq!(fx.commits(), [INIT_MESSAGE, "first"]);
        }

        #[test]
        fn commit_failure_restores_document() {
            let fx = Fixture::new();
            fx.initialised();
            let mut manager =
                ConfigurationManager::new(&fx.dir, &fx.seed, fx.vcs.clone().fail_on(FailOn::Commit));
            manager.set_variable(&path("db.port"), "5433", "integer", false).unwrap();

            let err = manager.apply("doomed", false).unwrap_err();
            assert!(matches!(err, LifecycleError::CommitFailed { .. }));
            assert_eq!(fx.current(), SEED);
            assert!(!ApplyMarker::exists(manager.paths()));
            assert_eq!(fx.commits(), [INIT_MESSAGE]);

            // The working copy survives for a retry.
            fx.vcs.clear_fail_on();
            assert_eq!(
                manager.get_variable(&path("db.port")).unwrap(),
                Some(Value::from(5433))
            );
            let record = manager.apply("retry", false).unwrap();
            assert!(matches!(record.outcome, ApplyOutcome::Committed(_)));
        }

        #[test]
        fn failed_restore_leaves_failed_marker() {
            let fx = Fixture::new();
            fx.initialised();
            let mut manager =
                ConfigurationManager::new(&fx.dir, &fx.seed, fx.vcs.clone().fail_on(FailOn::Commit));
            manager.set_variable(&path("db.port"), "5433", "integer", false).unwrap();

            failpoints::fail_at(failpoints::RESTORE_DOCUMENT, "read-only filesystem");
            let err = manager.apply("doomed", false).unwrap_err();
            failpoints::clear();

            assert!(matches!(err, LifecycleError::InconsistentState { .. }));
            let marker = ApplyMarker::read(manager.paths()).unwrap().unwrap();
            assert_eq!(marker.phase, ApplyPhase::Failed);
            assert_eq!(manager.state().unwrap(), LifecycleState::Failed);

            assert!(matches!(
                manager.apply("again", false),
                Err(LifecycleError::ApplyInterrupted { .. })
            ));
            fx.vcs.clear_fail_on();
            let record = manager.apply("recover", true).unwrap();
            assert!(matches!(record.outcome, ApplyOutcome::Committed(_)));
            assert_eq!(manager.state().unwrap(), LifecycleState::Unmodified);
        }

        #[test]
        fn marker_cleanup_failure_keeps_commit() {
            let fx = Fixture::new();
            let hooks = Recorder::default();
            let mut manager = fx.initialised().with_hooks(hooks.clone());
            manager.set_variable(&path("db.port"), "5433", "integer", false).unwrap();

            failpoints::fail_at(failpoints::CLEAR_MARKER, "permission denied");
            let record = manager.apply("tune", false).unwrap();
            failpoints::clear();

            assert!(matches!(record.outcome, ApplyOutcome::Committed(_)));
            assert!(record.is_degraded());
            assert_eq!(record.warnings.len(), 1);
            assert!(record.warnings[0].contains("permission denied"));
            assert_eq!(hooks.calls(), ["pre-apply", "post-apply"]);

            // Nothing was rolled back.
            assert!(fx.current().contains("port: 5433"));
            assert_eq!(fx.commits(), [INIT_MESSAGE, "tune"]);
            assert_eq!(manager.state().unwrap(), LifecycleState::Applying);

            let record = manager.apply("clear", true).unwrap();
            assert!(record.warnings.is_empty());
            assert!(!ApplyMarker::exists(manager.paths()));
        }

        #[test]
        fn persist_failure_changes_nothing() {
            let fx = Fixture::new();
            let mut manager = fx.initialised();
            manager.set_variable(&path("db.port"), "5433", "integer", false).unwrap();

            failpoints::fail_at(failpoints::PERSIST_DOCUMENT, "disk full");
            let err = manager.apply("doomed", false).unwrap_err();
            failpoints::clear();

            assert!(matches!(
                err,
                LifecycleError::Document(DocumentError::Persist { .. })
            ));
            assert_eq!(fx.current(), SEED);
            assert!(!ApplyMarker::exists(manager.paths()));
        }

        #[test]
        fn pre_hook_failure_aborts() {
            let fx = Fixture::new();
            let hooks = Recorder::failing("pre-apply");
            let mut manager = fx.initialised().with_hooks(hooks.clone());
            manager.set_variable(&path("db.port"), "5433", "integer", false).unwrap();

            assert!(matches!(
                manager.apply("msg", false),
                Err(LifecycleError::Hook(HookFailure {
                    stage: HookStage::Pre,
                    ..
                }))
            ));
            assert_eq!(hooks.calls(), ["pre-apply"]);
            assert_eq!(fx.current(), SEED);
            assert_eq!(fx.commits(), [INIT_MESSAGE]);
        }

        #[test]
        fn post_hook_failure_keeps_commit() {
            let fx = Fixture::new();
            let hooks = Recorder::failing("post-apply");
            let mut manager = fx.initialised().with_hooks(hooks.clone());
            manager.set_variable(&path("db.port"), "5433", "integer", false).unwrap();

            let record = manager.apply("msg", false).unwrap();
            assert!(record.is_degraded());
            assert!(matches!(record.outcome, ApplyOutcome::Committed(_)));
            assert_eq!(fx.commits(), [INIT_MESSAGE, "msg"]);
        }

        #[test]
        fn missing_directory() {
            let fx = Fixture::new();
            assert!(matches!(
                fx.manager().apply("msg", false),
                Err(LifecycleError::ConfigDirMissing { .. })
            ));
        }

        #[test]
        fn concurrent_writer_is_locked_out() {
            let fx = Fixture::new();
            let mut manager = fx.initialised();
            let _held = DirLock::acquire(manager.paths()).unwrap();
            assert!(matches!(
                manager.apply("msg", true),
                Err(LifecycleError::Locked { .. })
            ));
        }
    }
}
