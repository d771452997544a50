//! Device-side client for the device integration API

use std::time::Instant;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::ddi::config_data::{push_config_data, ConfigDataPayload};
use crate::ddi::feedback::{post_cancel_feedback, post_feedback};
use crate::ddi::identity::ServerIdentity;
use crate::ddi::links::LinkSet;
use crate::ddi::poll::{PollScheduler, PollState};
use crate::deploy::cancel::check_cancel;
use crate::deploy::executor::execute_update;
use crate::deploy::fetcher::fetch_deployment;
use crate::deploy::fsm::{next_step, Action, ExecutionStatus, Step};
use crate::http::client::HttpClient;
use crate::http::headers::HeaderFactory;
use crate::http::transport::Transport;
use crate::installer::FirmwareInstaller;
use crate::models::feedback::ConfigDataMode;

/// What the caller has to do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    /// Keep ticking
    Continue,

    /// An action was closed and reported; the device must restart
    RestartRequired,
}

/// Drives the poll, deployment and feedback cycle.
///
/// Not reentrant: every operation takes `&mut self` and runs its exchanges
/// one after the other. Callers sharing a client across tasks must
/// serialize calls themselves.
pub struct DdiClient<T, I> {
    identity: ServerIdentity,
    http: HttpClient<T>,
    installer: I,
    scheduler: PollScheduler,
    links: LinkSet,
    action: Action,
    config_data: ConfigDataPayload,
}

impl<T: Transport, I: FirmwareInstaller> DdiClient<T, I> {
    /// Create a client; nothing is sent until [`DdiClient::initialize`]
    pub fn new(identity: ServerIdentity, transport: T, installer: I) -> Self {
        let token = SecretString::from(identity.credential.expose_secret().to_owned());
        let headers = HeaderFactory::new(identity.credential_kind, token);
        Self {
            http: HttpClient::new(transport, headers),
            identity,
            installer,
            scheduler: PollScheduler::new(),
            links: LinkSet::default(),
            action: Action::new(Instant::now()),
            config_data: ConfigDataPayload::default(),
        }
    }

    pub fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn links(&self) -> &LinkSet {
        &self.links
    }

    pub fn poll_state(&self) -> &PollState {
        self.scheduler.state()
    }

    pub fn installer(&self) -> &I {
        &self.installer
    }

    pub fn transport(&self) -> &T {
        self.http.transport()
    }

    /// Replace the config data sent on the next push
    pub fn set_config_data(&mut self, payload: ConfigDataPayload) {
        self.config_data = payload;
    }

    /// Push the current config data with `mode`; a failed push is only logged
    pub async fn push_config_data(&mut self, mode: ConfigDataMode) {
        push_config_data(
            &mut self.http,
            &self.identity,
            &self.action,
            &self.config_data,
            mode,
        )
        .await;
    }

    /// Check in, push the config data in `replace` mode, then act on the reply.
    ///
    /// If the first poll fails the following ticks keep retrying it.
    pub async fn initialize(&mut self, now: Instant) -> WorkOutcome {
        info!(
            "Initializing controller {} on {}:{}",
            self.identity.controller_id, self.identity.host, self.identity.port
        );
        self.action = Action::new(now);
        let polled = self.poll(now).await;
        push_config_data(
            &mut self.http,
            &self.identity,
            &self.action,
            &self.config_data,
            ConfigDataMode::Replace,
        )
        .await;

        if polled {
            // The full set was just replaced
            self.links.config_data.clear();
            self.handle_links(now).await;
        }
        self.work_action(now).await
    }

    /// Run one cycle: poll when due, act on the links, then advance the action.
    ///
    /// Errors are logged and never abandon more than the step that hit them.
    pub async fn tick(&mut self, now: Instant) -> WorkOutcome {
        if self.poll(now).await {
            self.handle_links(now).await;
        }
        self.work_action(now).await
    }

    async fn poll(&mut self, now: Instant) -> bool {
        match self
            .scheduler
            .maybe_poll(&mut self.http, &self.identity, &mut self.links, now)
            .await
        {
            Ok(polled) => polled,
            Err(e) => {
                warn!("Poll failed: {}", e);
                false
            }
        }
    }

    async fn handle_links(&mut self, now: Instant) {
        if !self.links.config_data.is_empty() {
            self.links.config_data.clear();
            push_config_data(
                &mut self.http,
                &self.identity,
                &self.action,
                &self.config_data,
                ConfigDataMode::Merge,
            )
            .await;
        }

        if let Err(e) =
            fetch_deployment(&mut self.http, &mut self.links, &mut self.action, now).await
        {
            warn!("Deployment fetch failed: {}", e);
        }

        if let Err(e) = check_cancel(&mut self.http, &mut self.links, &mut self.action).await {
            warn!("Cancel check failed: {}", e);
        }
    }

    async fn work_action(&mut self, now: Instant) -> WorkOutcome {
        if !self.action.is_active() {
            return WorkOutcome::Continue;
        }

        // A change made while handling links is reported before stepping on
        if !self.action.feedback_dirty() {
            match next_step(self.action.status(), self.action.scheduled_at(), now) {
                Step::Install => {
                    execute_update(&mut self.http, &mut self.installer, &mut self.action).await
                }
                Step::Transition(status, result) => self.action.transition(status, result),
                Step::Hold => {}
            }
        }

        if self.action.feedback_dirty() {
            self.report().await;
        }

        if self.action.status() == ExecutionStatus::Closed {
            info!("Action {} closed with {:?}", self.action.id(), self.action.result());
            self.action.release();
            return WorkOutcome::RestartRequired;
        }
        WorkOutcome::Continue
    }

    async fn report(&mut self) {
        if self.action.status() == ExecutionStatus::Canceled {
            post_cancel_feedback(&mut self.http, &self.identity, &mut self.action).await;
        } else {
            post_feedback(&mut self.http, &self.identity, &self.action).await;
        }
        self.action.feedback_attempted();
        debug!("Action after feedback: {:?}", self.action);
    }
}
