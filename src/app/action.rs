//! Runs one configured chooser action from start to finish:
//! load defaults, ask the helper, check the answer, remember it, apply it.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::events::UserEvent;
use super::host::HostBridge;
use super::proxy::EventProxy;
use crate::config::{CancelPolicy, ChooserConfig};
use crate::core::arguments::{build_request, render_args, starting_directory, DocumentContext};
use crate::core::invoker::{HelperCommand, HelperInvoker, HelperOutput};
use crate::core::parser::parse_outcome;
use crate::core::policy::{Halt, PolicyPipeline, SandboxPathRejection, Verdict};
use crate::core::profile::ActionProfile;
use crate::core::state_store::StateStore;
use crate::core::{ChooserError, Mode, Outcome, PersistedState};

/// How an action ended when it did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The host was asked to save or open `path`.
    Completed { path: PathBuf },
    /// The user dismissed the dialog (or the caller cancelled the run).
    Cancelled,
    /// The pick was refused by the sandbox check.
    Rejected { path: PathBuf },
    /// The helper's answer was missing, late or unusable.
    Aborted { reason: String },
}

pub struct ChooserAction {
    profile: ActionProfile,
    store: StateStore,
    helper: HelperCommand,
    timeout: Option<Duration>,
    pipeline: PolicyPipeline,
    on_cancel: CancelPolicy,
}

impl ChooserAction {
    pub fn new(
        profile: ActionProfile,
        store: StateStore,
        helper: HelperCommand,
        timeout: Option<Duration>,
        sandbox: SandboxPathRejection,
        on_cancel: CancelPolicy,
    ) -> Self {
        let pipeline = PolicyPipeline::for_profile(&profile, sandbox);
        Self {
            profile,
            store,
            helper,
            timeout,
            pipeline,
            on_cancel,
        }
    }

    pub fn from_config(
        profile: ActionProfile,
        config: &ChooserConfig,
    ) -> Result<Self, ChooserError> {
        let sandbox = SandboxPathRejection::new(&config.sandbox_pattern)?;
        Ok(Self::new(
            profile,
            StateStore::new(config.state_directory()),
            config.helper.clone(),
            config.timeout(),
            sandbox,
            config.on_cancel,
        ))
    }

    /// Runs the action once.
    ///
    /// Everything that goes wrong inside the helper boundary ends the action
    /// quietly with `Ok`. Only a missing helper, a failed directory creation
    /// and host failures are returned as errors.
    pub async fn run<H, P>(
        &self,
        host: &mut H,
        proxy: &P,
        cancel: &CancellationToken,
    ) -> Result<ActionOutcome, ChooserError>
    where
        H: HostBridge,
        P: EventProxy,
    {
        let action_id = self.profile.id.as_str();
        tracing::info!("Starting chooser action '{}'", action_id);

        let helper = match self.helper.locate() {
            Ok(helper) => helper,
            Err(ChooserError::HelperNotFound { program }) => {
                tracing::error!("Helper not found: {:?}", program);
                proxy.send_event(UserEvent::HelperMissing {
                    program: program.clone(),
                });
                return Err(ChooserError::HelperNotFound { program });
            }
            Err(e) => return Err(e),
        };

        let previous = self.store.load(action_id);
        let document = DocumentContext {
            path: host.current_document_path(),
        };
        let request = build_request(&self.profile, &previous, &document);
        tracing::debug!(
            "Dialog '{}' starts in {:?}",
            request.title,
            starting_directory(&request)
        );
        let args = render_args(&request, self.timeout);

        let invoker = HelperInvoker::new(helper, self.timeout);
        let raw = match invoker.invoke(&args, cancel).await {
            HelperOutput::Text(raw) => raw,
            HelperOutput::NoOutput => {
                return Ok(self.end_quietly(proxy, "the helper produced no output"));
            }
            HelperOutput::TimedOut => {
                return Ok(self.end_quietly(proxy, "the dialog timed out"));
            }
            HelperOutput::Cancelled => {
                tracing::info!("Action '{}' cancelled by caller", action_id);
                return Ok(ActionOutcome::Cancelled);
            }
        };

        let outcome = match parse_outcome(&raw) {
            Ok(outcome) => outcome,
            Err(failure) => {
                tracing::warn!("Discarding helper reply: {}", failure);
                return Ok(self.end_quietly(proxy, &failure.to_string()));
            }
        };
        if outcome.is_cancelled() {
            tracing::info!("Dialog for '{}' was cancelled", action_id);
            if self.on_cancel == CancelPolicy::Notify {
                proxy.send_event(UserEvent::Cancelled);
            }
            return Ok(ActionOutcome::Cancelled);
        }

        // Remember where the user browsed to, not where a subdirectory put the file.
        let chosen_directory = outcome
            .selected_path
            .as_ref()
            .and_then(|p| p.parent())
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf());

        let final_outcome = match self.pipeline.run(outcome) {
            Ok(Verdict::Proceed(outcome)) => outcome,
            Ok(Verdict::Halt(Halt::SandboxRejected { path })) => {
                tracing::warn!("Rejected sandbox path {:?}", path);
                proxy.send_event(UserEvent::SandboxRejected { path: path.clone() });
                return Ok(ActionOutcome::Rejected { path });
            }
            Ok(Verdict::Halt(Halt::Cancelled)) => return Ok(ActionOutcome::Cancelled),
            Err(ChooserError::DirectoryCreate(source, directory)) => {
                tracing::error!("Failed to create {:?}: {}", directory, source);
                proxy.send_event(UserEvent::DirectoryCreateFailed {
                    directory: directory.clone(),
                    reason: source.to_string(),
                });
                return Err(ChooserError::DirectoryCreate(source, directory));
            }
            Err(e) => return Err(e),
        };
        let Some(final_path) = final_outcome.selected_path.clone() else {
            return Ok(ActionOutcome::Cancelled);
        };

        self.remember(&previous, chosen_directory, &final_outcome);
        self.apply(host, &final_path, &final_outcome)?;

        tracing::info!("Action '{}' completed with {:?}", action_id, final_path);
        Ok(ActionOutcome::Completed { path: final_path })
    }

    fn end_quietly<P: EventProxy>(&self, proxy: &P, reason: &str) -> ActionOutcome {
        tracing::info!("Action '{}' ended without a selection: {}", self.profile.id, reason);
        if self.on_cancel == CancelPolicy::Notify {
            proxy.send_event(UserEvent::HelperFailed {
                reason: reason.to_string(),
            });
        }
        ActionOutcome::Aborted {
            reason: reason.to_string(),
        }
    }

    /// Writes the new defaults. A failed write is logged, not fatal.
    fn remember(&self, previous: &PersistedState, directory: Option<PathBuf>, outcome: &Outcome) {
        let mut state = previous.clone();
        state.last_directory = directory.or(state.last_directory);
        state.options.extend(outcome.options.clone());
        state.retain_declared(&self.profile.options);

        if let Err(e) = self.store.save(&self.profile.id, &state) {
            tracing::warn!("{}", e);
        }
    }

    fn apply<H: HostBridge>(
        &self,
        host: &mut H,
        path: &std::path::Path,
        outcome: &Outcome,
    ) -> Result<(), ChooserError> {
        let hooks = &self.profile.hooks;
        match self.profile.mode {
            Mode::Save => host.save_document(path)?,
            Mode::Open => {
                if ActionProfile::hook_enabled(hooks.new_container.as_ref(), &outcome.options) {
                    host.open_new_document_container()?;
                }
                host.open_document(path)?;
                if ActionProfile::hook_enabled(hooks.effects_offline.as_ref(), &outcome.options) {
                    let document = host.ensure_active_document(path)?;
                    host.set_all_effects_offline(document)?;
                }
            }
        }
        Ok(())
    }
}
