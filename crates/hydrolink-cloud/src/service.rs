//! Background cloud service: login and periodic device refresh.
//!
//! The login job runs after a short initial delay and retries on a fixed
//! re-login delay until it succeeds. Once logged in, the refresh job
//! periodically pulls the device inventory and pushes each snapshot into
//! the registry (which forwards it to any registered handler). Failures
//! are logged and retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use hydrolink_core::{CloudConfig, DeviceRegistry, Program};

use crate::client::{CloudClient, CloudSession};
use crate::{CloudError, Result};

/// Delays for the background jobs. The refresh period itself comes from
/// [`CloudConfig::refresh_interval`].
#[derive(Debug, Clone)]
pub struct ServiceTiming {
    /// Delay before the first login attempt.
    pub login_delay: Duration,
    /// Delay before retrying a failed login.
    pub relogin_delay: Duration,
    /// Delay before the first device refresh after login.
    pub refresh_initial_delay: Duration,
}

impl Default for ServiceTiming {
    fn default() -> Self {
        Self {
            login_delay: Duration::from_secs(6),
            relogin_delay: Duration::from_secs(60),
            refresh_initial_delay: Duration::from_secs(4),
        }
    }
}

struct ServiceState {
    session: Option<CloudSession>,
    login_job: Option<JoinHandle<()>>,
    refresh_job: Option<JoinHandle<()>>,
}

struct Inner {
    config: CloudConfig,
    timing: ServiceTiming,
    client: CloudClient,
    registry: Arc<DeviceRegistry>,
    state: Mutex<ServiceState>,
}

/// The long-running cloud side of the client. Cheap to clone.
#[derive(Clone)]
pub struct CloudService {
    inner: Arc<Inner>,
}

impl CloudService {
    pub fn new(config: CloudConfig, client: CloudClient, registry: Arc<DeviceRegistry>) -> Self {
        Self::with_timing(config, client, registry, ServiceTiming::default())
    }

    pub fn with_timing(
        config: CloudConfig,
        client: CloudClient,
        registry: Arc<DeviceRegistry>,
        timing: ServiceTiming,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                timing,
                client,
                registry,
                state: Mutex::new(ServiceState {
                    session: None,
                    login_job: None,
                    refresh_job: None,
                }),
            }),
        }
    }

    /// Arm the login job. Idempotent while a job is armed.
    pub async fn start(&self) {
        let mut state = self.inner.state.lock().await;
        if state.login_job.is_some() {
            debug!("cloud service already started");
            return;
        }
        debug!(
            delay_secs = self.inner.timing.login_delay.as_secs_f64(),
            "scheduling login job"
        );
        let this = self.clone();
        state.login_job = Some(tokio::spawn(async move {
            this.login_loop().await;
        }));
    }

    /// Cancel both jobs. The session token, if any, is kept so reads keep
    /// working until a restart replaces it.
    pub async fn stop(&self) {
        let mut state = self.inner.state.lock().await;
        debug!("stopping cloud service");
        if let Some(job) = state.login_job.take() {
            job.abort();
        }
        if let Some(job) = state.refresh_job.take() {
            job.abort();
        }
    }

    /// Current session token, once the login job has succeeded.
    pub async fn session_token(&self) -> Option<String> {
        let state = self.inner.state.lock().await;
        state.session.as_ref().map(|session| session.token.clone())
    }

    pub async fn is_logged_in(&self) -> bool {
        self.inner.state.lock().await.session.is_some()
    }

    /// The registry this service feeds.
    pub fn registry(&self) -> Arc<DeviceRegistry> {
        self.inner.registry.clone()
    }

    /// Fetch the programs of a device using the current session.
    pub async fn programs(&self, device_id: &str) -> Result<Vec<Program>> {
        let session = self.current_session().await?;
        self.inner.client.programs(&session, device_id).await
    }

    /// Pull the device inventory once and apply it to the registry.
    /// Returns the number of devices reported.
    pub async fn refresh_devices(&self) -> Result<usize> {
        let session = self.current_session().await?;
        let devices = self.inner.client.devices(&session).await?;
        let count = devices.len();
        debug!(count, "device inventory refreshed");
        for device in devices {
            self.inner.registry.apply_device_update(device).await;
        }
        Ok(count)
    }

    async fn current_session(&self) -> Result<CloudSession> {
        self.inner
            .state
            .lock()
            .await
            .session
            .clone()
            .ok_or(CloudError::NotLoggedIn)
    }

    async fn login_loop(&self) {
        tokio::time::sleep(self.inner.timing.login_delay).await;
        loop {
            debug!("logging in to cloud service");
            match self
                .inner
                .client
                .login(&self.inner.config.email, &self.inner.config.password)
                .await
            {
                Ok(session) => {
                    info!(user_id = %session.user_id, "logged in to cloud service");
                    let mut state = self.inner.state.lock().await;
                    state.session = Some(session);
                    if state.refresh_job.is_none() {
                        let this = self.clone();
                        state.refresh_job = Some(tokio::spawn(async move {
                            this.refresh_loop().await;
                        }));
                    }
                    return;
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_secs = self.inner.timing.relogin_delay.as_secs_f64(),
                        "login failed"
                    );
                    tokio::time::sleep(self.inner.timing.relogin_delay).await;
                }
            }
        }
    }

    async fn refresh_loop(&self) {
        tokio::time::sleep(self.inner.timing.refresh_initial_delay).await;
        loop {
            if let Err(e) = self.refresh_devices().await {
                // recovered by the next tick
                warn!(error = %e, "device refresh failed");
            }
            tokio::time::sleep(self.inner.config.refresh_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> CloudService {
        let config = CloudConfig::new("user@example.com", "secret");
        // Non-routable endpoints: these tests never hit the network.
        let client = CloudClient::with_endpoints(
            "http://127.0.0.1:9/session",
            "http://127.0.0.1:9/devices?user_id=",
            "http://127.0.0.1:9/programs?device_id=",
        );
        CloudService::with_timing(
            config,
            client,
            Arc::new(DeviceRegistry::new()),
            ServiceTiming {
                login_delay: Duration::from_secs(3600),
                relogin_delay: Duration::from_secs(3600),
                refresh_initial_delay: Duration::from_secs(3600),
            },
        )
    }

    #[tokio::test]
    async fn not_logged_in_before_login_job_runs() {
        let service = service();
        assert!(!service.is_logged_in().await);
        assert!(service.session_token().await.is_none());
        assert!(matches!(
            service.refresh_devices().await,
            Err(CloudError::NotLoggedIn)
        ));
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_cancels() {
        let service = service();
        service.start().await;
        service.start().await;
        {
            let state = service.inner.state.lock().await;
            assert!(state.login_job.is_some());
        }
        service.stop().await;
        let state = service.inner.state.lock().await;
        assert!(state.login_job.is_none());
        assert!(state.refresh_job.is_none());
    }
}
