//! Command sequences against the deployed checkout.
//!
//! The checkout moves through `absent -> cloned -> checked out -> running ->
//! stopped`. Each operation here is one short, ordered list of remote
//! commands; composites in [`crate::deploy`] chain them.

use crate::defaults::StagehandConfig;
use crate::environment::Branch;
use crate::error::{Error, Result};
use crate::remote::{HostOutput, Remote, RemoteCommand};
use crate::session::EnvironmentTarget;

pub struct Lifecycle<'a> {
    remote: &'a Remote<'a>,
    config: &'a StagehandConfig,
}

impl<'a> Lifecycle<'a> {
    pub fn new(remote: &'a Remote<'a>, config: &'a StagehandConfig) -> Self {
        Self { remote, config }
    }

    fn checkout(&self) -> &str {
        &self.config.checkout_path
    }

    fn in_checkout(&self, program: &str) -> RemoteCommand {
        RemoteCommand::new(program).in_dir(self.checkout())
    }

    /// Clone the service repository. Fails if the checkout already exists.
    pub fn clone_repository(&self) -> Result<()> {
        self.remote.run(
            &RemoteCommand::new("git").args([
                "clone",
                self.config.repository.as_str(),
                self.checkout(),
            ]),
        )?;
        Ok(())
    }

    /// Make the working tree match the remote tip of `branch`, whatever local drift exists.
    pub fn checkout_latest(&self, branch: &Branch) -> Result<()> {
        let name = branch.name();
        self.remote
            .run(&self.in_checkout("git").args(["fetch", "--all"]))?;
        self.remote.run(
            &self
                .in_checkout("git")
                .args(["reset", "--hard", format!("origin/{}", name).as_str()]),
        )?;
        self.remote
            .run(&self.in_checkout("git").args(["checkout", "-f", name]))?;
        self.remote
            .run(&self.in_checkout("git").args(["pull", "origin", name]))?;
        Ok(())
    }

    /// Hard-reset to a commit or tag. No data or schema compatibility is implied.
    pub fn reset_to_commit(&self, commit: &str) -> Result<()> {
        self.remote
            .run(&self.in_checkout("git").args(["reset", "--hard", commit]))?;
        Ok(())
    }

    /// Commit currently checked out, as reported by the first host.
    pub fn current_commit(&self) -> Result<String> {
        let outputs = self
            .remote
            .run(&self.in_checkout("git").args(["rev-parse", "HEAD"]))?;
        Ok(outputs
            .into_iter()
            .next()
            .map(|out| out.stdout)
            .unwrap_or_default())
    }

    /// Supervisor globally (elevated), then the project's dependencies.
    pub fn install_requirements(&self) -> Result<()> {
        self.remote
            .run(&RemoteCommand::new("npm").args(["install", "-g", "pm2"]).sudo())?;
        self.remote.run(&self.in_checkout("npm").arg("install"))?;
        Ok(())
    }

    /// Start the main service and the maintenance process under pm2.
    pub fn boot(&self, target: &EnvironmentTarget) -> Result<()> {
        let process = &self.config.process;
        let settings_name = target.settings_name();
        let with_env = |command: RemoteCommand| {
            command
                .env(process.settings_env.as_str(), settings_name.as_str())
                .env("NODE_PATH", process.module_path.as_str())
        };

        self.remote.run(&with_env(self.in_checkout("pm2").args([
            "start",
            process.main.as_str(),
            "-i",
            process.instances.to_string().as_str(),
            "--name",
            process.name.as_str(),
        ])))?;
        self.remote.run(&with_env(self.in_checkout("pm2").args([
            "start",
            process.maintenance_script.as_str(),
            "--name",
            process.maintenance_name().as_str(),
        ])))?;
        Ok(())
    }

    /// Restart whatever runs the service on this environment.
    ///
    /// Containerized hosts get their containers stopped and the supervisor is left
    /// alone. Otherwise the legacy supervisor and pm2 are stopped (either may be
    /// absent) and the service is booted again.
    pub fn reboot(&self, target: &EnvironmentTarget) -> Result<()> {
        if target.settings.dockerized {
            return self.stop_containers();
        }

        self.remote.run(
            &RemoteCommand::new("forever")
                .arg("stopall")
                .tolerate_failure(),
        )?;
        self.remote
            .run(&RemoteCommand::new("pm2").arg("kill").tolerate_failure())?;
        self.boot(target)
    }

    /// Stop every running container, host by host.
    pub fn stop_containers(&self) -> Result<()> {
        let list = RemoteCommand::new("docker").args(["ps", "-q"]).sudo();
        for host in self.remote.hosts() {
            let running = self.remote.run_on(host, &list)?;
            let ids: Vec<&str> = running.stdout.split_whitespace().collect();
            if ids.is_empty() {
                log_status!("reboot", "{}: no running containers", host);
                continue;
            }
            self.remote.run_on(
                host,
                &RemoteCommand::new("docker").arg("stop").args(ids).sudo(),
            )?;
        }
        Ok(())
    }

    /// Remove both managed processes and delete the checkout. No confirmation.
    pub fn destroy(&self) -> Result<()> {
        let checkout = self.checkout().trim();
        if checkout.is_empty() || matches!(checkout, "/" | "~" | "." | "..") {
            return Err(Error::config_invalid_value(
                "checkoutPath",
                Some(checkout.to_string()),
                "Refusing to delete this path",
            ));
        }

        let process = &self.config.process;
        self.remote.run(
            &RemoteCommand::new("pm2")
                .args(["delete", process.name.as_str()])
                .tolerate_failure(),
        )?;
        self.remote.run(
            &RemoteCommand::new("pm2")
                .args(["delete", process.maintenance_name().as_str()])
                .tolerate_failure(),
        )?;
        self.remote
            .run(&RemoteCommand::new("rm").args(["-rf", checkout]))?;
        Ok(())
    }

    /// The supervisor's process table, verbatim, per host.
    pub fn list_processes(&self) -> Result<Vec<HostOutput>> {
        self.remote.run(&RemoteCommand::new("pm2").arg("list"))
    }
}
