//! Runs embedded `PostgreSQL` lifecycle steps on behalf of the integration tests.
//!
//! ```text
//! pg_worker <setup|start|stop> <config-path>
//! ```
//!
//! The file at `config-path` holds a JSON [`WorkerPayload`]: the
//! `postgresql_embedded` settings plus environment overrides to apply before
//! the cluster is touched. When launched as root the worker re-executes
//! itself as `nobody`, because `initdb` refuses to run with root privileges.

#[cfg(unix)]
use camino::{Utf8Path, Utf8PathBuf};
#[cfg(unix)]
use nix::unistd::{Uid, User, initgroups, setgid, setuid};
#[cfg(unix)]
use pg_embedded_setup_unpriv::ambient_dir_and_path;
#[cfg(unix)]
use pg_embedded_setup_unpriv::worker::{PlainSecret, WorkerPayload};
#[cfg(unix)]
use postgresql_embedded::{PostgreSQL, Status};
#[cfg(unix)]
use std::{env, ffi::CString, io, io::Read, process::Command};
#[cfg(unix)]
use thiserror::Error;

#[cfg(unix)]
const REEXEC_MARKER: &str = "PG_WORKER_REEXEC";
#[cfg(unix)]
const TRUSTED_PATH: &str = "/usr/sbin:/usr/bin:/sbin:/bin";
#[cfg(unix)]
const UNPRIVILEGED_USER: &str = "nobody";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[cfg(unix)]
#[derive(Debug, Error)]
enum WorkerError {
    #[error("invalid arguments: {0}")]
    Usage(String),
    #[error("failed to read worker payload: {0}")]
    PayloadRead(#[source] BoxError),
    #[error("failed to parse worker payload: {0}")]
    PayloadParse(#[source] serde_json::Error),
    #[error("invalid cluster settings: {0}")]
    Settings(String),
    #[error("failed to start runtime: {0}")]
    Runtime(#[source] io::Error),
    #[error("failed to drop privileges: {0}")]
    Privileges(String),
    #[error("cluster {step} failed: {message}")]
    Cluster { step: &'static str, message: String },
}

#[cfg(unix)]
impl WorkerError {
    fn cluster(step: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Cluster {
            step,
            message: err.to_string(),
        }
    }
}

#[cfg(unix)]
#[derive(Debug, Clone, Copy)]
enum Step {
    Setup,
    Start,
    Stop,
}

#[cfg(unix)]
impl Step {
    fn parse(arg: &str) -> Result<Self, WorkerError> {
        match arg {
            "setup" => Ok(Self::Setup),
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            other => Err(WorkerError::Usage(format!(
                "unknown step '{other}', expected setup, start or stop"
            ))),
        }
    }
}

#[cfg(unix)]
fn main() -> Result<(), BoxError> {
    let args = utf8_args()?;
    reexec_unprivileged(&args)?;
    let (step, payload_path) = parse_args(&args)?;
    run(step, &payload_path).map_err(Into::into)
}

#[cfg(unix)]
fn utf8_args() -> Result<Vec<Utf8PathBuf>, WorkerError> {
    env::args_os()
        .map(|arg| {
            arg.into_string()
                .map(Utf8PathBuf::from)
                .map_err(|_| WorkerError::Usage("arguments must be valid UTF-8".to_owned()))
        })
        .collect()
}

#[cfg(unix)]
fn parse_args(args: &[Utf8PathBuf]) -> Result<(Step, Utf8PathBuf), WorkerError> {
    match args {
        [_, step, payload] => Ok((Step::parse(step.as_str())?, payload.clone())),
        [_] | [_, _] => Err(WorkerError::Usage(
            "expected a step and a payload path".to_owned(),
        )),
        _ => Err(WorkerError::Usage(format!(
            "expected two arguments, got {}",
            args.len().saturating_sub(1)
        ))),
    }
}

#[cfg(unix)]
fn run(step: Step, payload_path: &Utf8Path) -> Result<(), WorkerError> {
    let payload = read_payload(payload_path)?;
    demote_if_root()?;
    let settings = payload
        .settings
        .into_settings()
        .map_err(|err| WorkerError::Settings(err.to_string()))?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(WorkerError::Runtime)?;
    apply_environment(&payload.environment);

    let mut postgres = PostgreSQL::new(settings);
    runtime.block_on(async move {
        match step {
            Step::Setup => {
                postgres
                    .setup()
                    .await
                    .map_err(|err| WorkerError::cluster("setup", err))?;
                start_if_stopped(&mut postgres).await
            }
            Step::Start => {
                start_if_stopped(&mut postgres).await?;
                // The cluster must outlive this process.
                std::mem::forget(postgres);
                Ok(())
            }
            Step::Stop => postgres
                .stop()
                .await
                .map_err(|err| WorkerError::cluster("stop", err)),
        }
    })
}

#[cfg(unix)]
async fn start_if_stopped(postgres: &mut PostgreSQL) -> Result<(), WorkerError> {
    if matches!(postgres.status(), Status::Started) {
        return Ok(());
    }
    postgres
        .start()
        .await
        .map_err(|err| WorkerError::cluster("start", err))
}

#[cfg(unix)]
fn read_payload(path: &Utf8Path) -> Result<WorkerPayload, WorkerError> {
    let bytes = read_file(path).map_err(WorkerError::PayloadRead)?;
    serde_json::from_slice(&bytes).map_err(WorkerError::PayloadParse)
}

#[cfg(unix)]
fn read_file(path: &Utf8Path) -> Result<Vec<u8>, BoxError> {
    let (dir, relative) = ambient_dir_and_path(path)?;
    let mut file = dir.open(relative.as_std_path())?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

#[cfg(unix)]
fn reexec_unprivileged(args: &[Utf8PathBuf]) -> Result<(), WorkerError> {
    if !Uid::effective().is_root() || env::var_os(REEXEC_MARKER).is_some() {
        return Ok(());
    }

    let exe = env::current_exe()
        .map_err(WorkerError::Runtime)?
        .into_os_string()
        .into_string()
        .map(Utf8PathBuf::from)
        .map_err(|_| WorkerError::Usage("executable path must be valid UTF-8".to_owned()))?;
    let forwarded = args.get(1..).unwrap_or_default();

    let status = match Command::new("runuser")
        .args(["-u", UNPRIVILEGED_USER, "--"])
        .arg(exe.as_std_path())
        .args(forwarded.iter().map(|arg| arg.as_std_path()))
        .env(REEXEC_MARKER, "1")
        .env("PATH", TRUSTED_PATH)
        .status()
    {
        Ok(status) => status,
        Err(err) if err.kind() == io::ErrorKind::NotFound => reexec_via_su(&exe, forwarded)?,
        Err(err) => return Err(WorkerError::Privileges(err.to_string())),
    };
    std::process::exit(status.code().unwrap_or(1));
}

#[cfg(unix)]
fn reexec_via_su(
    exe: &Utf8Path,
    forwarded: &[Utf8PathBuf],
) -> Result<std::process::ExitStatus, WorkerError> {
    let mut script = format!("{REEXEC_MARKER}=1 exec {}", shell_quote(exe.as_str()));
    for arg in forwarded {
        script.push(' ');
        script.push_str(&shell_quote(arg.as_str()));
    }
    Command::new("/bin/su")
        .args(["-s", "/bin/sh", UNPRIVILEGED_USER, "-c"])
        .arg(script)
        .env("PATH", TRUSTED_PATH)
        .status()
        .map_err(|err| WorkerError::Privileges(err.to_string()))
}

/// Wraps `value` in single quotes for `/bin/sh`.
#[cfg(unix)]
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(unix)]
fn demote_if_root() -> Result<(), WorkerError> {
    if !Uid::effective().is_root() {
        return Ok(());
    }
    let privileges = |err: nix::Error| WorkerError::Privileges(err.to_string());
    let user = User::from_name(UNPRIVILEGED_USER)
        .map_err(privileges)?
        .ok_or_else(|| WorkerError::Privileges(format!("user '{UNPRIVILEGED_USER}' not found")))?;
    let name = CString::new(user.name.clone())
        .map_err(|err| WorkerError::Privileges(format!("invalid user name: {err}")))?;
    initgroups(&name, user.gid).map_err(privileges)?;
    setgid(user.gid).map_err(privileges)?;
    setuid(user.uid).map_err(privileges)?;

    // SAFETY: no other threads exist yet.
    unsafe {
        env::set_var("HOME", &user.dir);
        env::set_var("USER", &user.name);
        env::set_var("LOGNAME", &user.name);
    }
    Ok(())
}

#[cfg(unix)]
fn apply_environment(environment: &[(String, Option<PlainSecret>)]) {
    for (key, value) in environment {
        // SAFETY: the current-thread runtime has not spawned any tasks yet.
        unsafe {
            match value {
                Some(secret) => env::set_var(key, secret.expose()),
                None => env::remove_var(key),
            }
        }
    }
}

#[cfg(not(unix))]
fn main() -> Result<(), BoxError> {
    Err("pg_worker requires a Unix platform".into())
}
