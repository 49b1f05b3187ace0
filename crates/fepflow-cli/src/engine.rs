use crate::config::EngineConfig;
use fepflow::workflows::window::{EngineInvocation, EngineOutcome, EngineRunner};
use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Runs the engine as a child process, optionally through a launcher such as
/// `srun`, with both output streams captured in the invocation's log file.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    config: EngineConfig,
}

impl ProcessRunner {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// `<launcher> <launcher-args> <executable> +p<N> <deck>`
    fn argv(&self, invocation: &EngineInvocation) -> Vec<OsString> {
        let mut argv: Vec<OsString> = Vec::new();
        if let Some(launcher) = &self.config.launcher {
            argv.push(launcher.into());
            argv.extend(self.config.launcher_args.iter().map(OsString::from));
        }
        argv.push((&self.config.executable).into());
        argv.push(format!("+p{}", invocation.parallelism).into());
        argv.push(invocation.deck_path.as_os_str().to_owned());
        argv
    }
}

impl EngineRunner for ProcessRunner {
    fn run(&self, invocation: &EngineInvocation) -> io::Result<EngineOutcome> {
        let argv = self.argv(invocation);
        let Some((program, args)) = argv.split_first() else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty engine command"));
        };

        let log = File::create(&invocation.log_path)?;
        let log_err = log.try_clone()?;

        info!("Launching {:?}", argv);
        let status = Command::new(program)
            .args(args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(log_err)
            .status()?;
        debug!("Engine process exited with {}", status);

        Ok(EngineOutcome {
            exit_code: status.code(),
        })
    }
}
