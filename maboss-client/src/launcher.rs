//! Spawning and signalling the server process.

use crate::config::ServerConfig;
use crate::endpoint::LocalEndpoint;
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;

/// Program and arguments for starting a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl LaunchCommand {
    /// Builds `<binary> --host <host> [-q] --port <socket> --pidfile <marker>`.
    pub fn server(config: &ServerConfig, local: &LocalEndpoint) -> Self {
        let mut args: Vec<OsString> = vec!["--host".into(), config.host.clone().into()];
        if config.quiet {
            args.push("-q".into());
        }
        args.push("--port".into());
        args.push(local.socket_path.clone().into_os_string());
        args.push("--pidfile".into());
        args.push(local.marker_path.clone().into_os_string());

        Self {
            program: config.binary.clone(),
            args,
        }
    }

    /// Returns the argument following `flag`, if present.
    pub fn value_of(&self, flag: &str) -> Option<&OsStr> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(OsString::as_os_str)
    }
}

/// A running server.
pub trait ServerProcess: Send {
    fn id(&self) -> u32;

    /// Asks the process to exit (SIGTERM on Unix).
    fn terminate(&mut self) -> io::Result<()>;

    /// Returns whether the process has exited, reaping it if so.
    fn try_wait(&mut self) -> io::Result<bool>;

    /// Forcibly kills the process.
    fn kill(&mut self) -> io::Result<()>;
}

/// Starts server processes.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, command: &LaunchCommand) -> io::Result<Box<dyn ServerProcess>>;
}

impl<L: ProcessLauncher + ?Sized> ProcessLauncher for Arc<L> {
    fn launch(&self, command: &LaunchCommand) -> io::Result<Box<dyn ServerProcess>> {
        (**self).launch(command)
    }
}

/// Launches real executables through `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandLauncher;

impl ProcessLauncher for CommandLauncher {
    fn launch(&self, command: &LaunchCommand) -> io::Result<Box<dyn ServerProcess>> {
        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .spawn()?;
        tracing::debug!(
            "Spawned {} with pid {}",
            command.program.display(),
            child.id()
        );
        Ok(Box::new(ChildProcess { child }))
    }
}

struct ChildProcess {
    child: Child,
}

impl ServerProcess for ChildProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> io::Result<()> {
        let pid = libc::pid_t::try_from(self.child.id())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
        // SAFETY: kill(2) only sends a signal; pid belongs to our unreaped child.
        let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> io::Result<()> {
        self.child.kill()
    }

    fn try_wait(&mut self) -> io::Result<bool> {
        Ok(self.child.try_wait()?.is_some())
    }

    fn kill(&mut self) -> io::Result<()> {
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }
}
