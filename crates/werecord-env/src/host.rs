use std::{fmt::Write as _, sync::Arc};

use tracing::info;
use werecord_core::{channel::FileChannel, config::ConfigCache};

use crate::{
    environment::{Environment, EnvironmentSettings},
    error::EnvError,
};

const UNKNOWN: &str = "<unknown>";

/// Owns the one live [`Environment`] of the process.
#[derive(Default)]
pub struct EnvironmentHost {
    current: Option<Environment>,
}

impl EnvironmentHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh context, destroying whatever was there before.
    pub fn create(
        &mut self,
        channel: Arc<dyn FileChannel>,
        config: Arc<dyn ConfigCache>,
        settings: EnvironmentSettings,
    ) -> Result<&mut Environment, EnvError> {
        self.destroy()?;
        let env = Environment::new(channel, config, settings)?;
        info!("environment created");
        Ok(self.current.insert(env))
    }

    pub fn current(&self) -> Result<&Environment, EnvError> {
        self.current.as_ref().ok_or(EnvError::NoEnvironment)
    }

    pub fn current_mut(&mut self) -> Result<&mut Environment, EnvError> {
        self.current.as_mut().ok_or(EnvError::NoEnvironment)
    }

    /// Destroy and release the live context, if any.
    pub fn destroy(&mut self) -> Result<(), EnvError> {
        match self.current.take() {
            Some(mut env) => env.destroy(),
            None => Ok(()),
        }
    }

    /// Plain-text status report for support requests.
    pub fn diagnostics(&self) -> String {
        let mut report = String::new();
        let status = self
            .current
            .as_ref()
            .map(|env| env.state().to_string())
            .unwrap_or_else(|| "NOT CREATED".to_owned());
        let sdk = self
            .current
            .as_ref()
            .map(|env| env.settings().platform.sdk_int.to_string())
            .unwrap_or_else(|| UNKNOWN.to_owned());
        let _ = writeln!(report, "Env status: {status}");
        let _ = writeln!(report, "=====B=====");
        let _ = writeln!(report, "release: {UNKNOWN}");
        let _ = writeln!(report, "SDK: {sdk}");
        let _ = writeln!(report, "brand: {UNKNOWN}");
        let _ = writeln!(report, "model: {UNKNOWN}");
        let _ = writeln!(report, "CPU_ABI: {}", std::env::consts::ARCH);
        let _ = writeln!(report, "=====A=====");
        let _ = writeln!(report, "app_version_name: {}", env!("CARGO_PKG_VERSION"));
        let _ = writeln!(report, "=====V=====");
        let _ = writeln!(report, "target_version_name: {UNKNOWN}");
        if let Some(block) = self.current.as_ref().and_then(Environment::diagnostics_user_block) {
            let _ = writeln!(report, "=====U=====");
            report.push_str(&block);
        }
        report
    }
}
