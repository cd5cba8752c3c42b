//! Embedded `PostgreSQL` cluster shared by the integration tests.
//!
//! The cluster starts once per test binary. Unprivileged runners drive
//! `postgresql_embedded` in-process; root runners go through the `pg_worker`
//! binary, which drops to `nobody` before touching the data directory.

use crate::test_helpers::EnvVarGuard;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs::{Permissions, PermissionsExt};
use cap_std::fs_utf8::Dir;
use diesel::prelude::*;
use pg_embedded_setup_unpriv::worker_process_test_api::{
    WorkerOperation, WorkerRequest, WorkerRequestArgs, run as run_worker,
};
use pg_embedded_setup_unpriv::{
    ExecutionPrivileges, TestBootstrapSettings, bootstrap_for_tests, detect_execution_privileges,
};
use postgresql_embedded::{PostgreSQL, Settings, Status};
use rstest::fixture;
use std::ffi::OsString;
use std::io;
use std::net::TcpListener;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Duration;
use tokio::runtime::Runtime;

/// Error type used throughout the harness.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Handle to the cluster shared by every test in the binary.
pub type PostgresCluster = &'static ManagedCluster;

static SHARED_CLUSTER: OnceLock<ManagedCluster> = OnceLock::new();
static TEMPLATE_LOCK: Mutex<()> = Mutex::new(());
static STAGED_WORKER: OnceLock<Utf8PathBuf> = OnceLock::new();

fn boxed(err: impl std::error::Error + Send + Sync + 'static) -> BoxError {
    Box::new(err)
}

/// A running embedded cluster and the settings used to reach it.
pub struct ManagedCluster {
    bootstrap: TestBootstrapSettings,
    env_vars: Vec<(String, Option<String>)>,
    runtime: Option<Runtime>,
    postgres: Option<PostgreSQL>,
}

impl ManagedCluster {
    fn start() -> Result<Self, BoxError> {
        let overrides = EnvVarGuard::set_many(&bootstrap_environment()?);
        let mut bootstrap = bootstrap_for_tests().map_err(boxed)?;
        drop(overrides);
        read_password_file(&mut bootstrap.settings)?;
        let env_vars = bootstrap.environment.to_env();
        let mut cluster = Self {
            bootstrap,
            env_vars,
            runtime: None,
            postgres: None,
        };
        match cluster.bootstrap.privileges {
            ExecutionPrivileges::Root => cluster.start_via_worker()?,
            ExecutionPrivileges::Unprivileged => cluster.start_in_process()?,
        }
        Ok(cluster)
    }

    /// Returns the connection URL for `database` on this cluster.
    #[must_use]
    pub fn database_url(&self, database: &str) -> String {
        self.bootstrap.settings.url(database)
    }

    /// Clones `template` into a new database called `name`.
    ///
    /// # Errors
    ///
    /// Returns an error when the statement fails.
    pub fn create_database_from_template(&self, name: &str, template: &str) -> Result<(), BoxError> {
        self.execute_admin_sql(&format!(
            "CREATE DATABASE {} TEMPLATE {}",
            quote_identifier(name),
            quote_identifier(template),
        ))
    }

    /// Drops the database called `name`, terminating open sessions first.
    ///
    /// # Errors
    ///
    /// Returns an error when the statement fails.
    pub fn drop_database(&self, name: &str) -> Result<(), BoxError> {
        self.execute_admin_sql(&format!(
            "DROP DATABASE IF EXISTS {} WITH (FORCE)",
            quote_identifier(name)
        ))
    }

    /// Creates `template` and runs `migrate` against it unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns an error when creation or migration fails. A template whose
    /// migration failed is dropped again.
    pub fn ensure_template_exists<F>(&self, template: &str, migrate: F) -> Result<(), BoxError>
    where
        F: FnOnce(&str) -> Result<(), BoxError>,
    {
        let _serialised = TEMPLATE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        if self.database_exists(template)? {
            return Ok(());
        }
        self.execute_admin_sql(&format!("CREATE DATABASE {}", quote_identifier(template)))?;
        if let Err(err) = migrate(&self.database_url(template)) {
            self.drop_database(template)?;
            return Err(err);
        }
        Ok(())
    }

    fn start_in_process(&mut self) -> Result<(), BoxError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(boxed)?;
        let overrides = EnvVarGuard::set_many(&as_os_pairs(&self.env_vars));
        let mut postgres = PostgreSQL::new(self.bootstrap.settings.clone());
        runtime.block_on(async {
            postgres.setup().await.map_err(boxed)?;
            if !matches!(postgres.status(), Status::Started) {
                postgres.start().await.map_err(boxed)?;
            }
            Ok::<(), BoxError>(())
        })?;
        drop(overrides);
        self.bootstrap.settings = postgres.settings().clone();
        read_port_from_pid_file(&mut self.bootstrap.settings)?;
        self.runtime = Some(runtime);
        self.postgres = Some(postgres);
        Ok(())
    }

    fn start_via_worker(&mut self) -> Result<(), BoxError> {
        self.worker(WorkerOperation::Setup, self.bootstrap.setup_timeout)?;
        self.worker(WorkerOperation::Start, self.bootstrap.start_timeout)?;
        read_port_from_pid_file(&mut self.bootstrap.settings)
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        match (self.postgres.take(), &self.runtime) {
            (Some(postgres), Some(runtime)) => {
                runtime.block_on(async { postgres.stop().await.map_err(boxed) })
            }
            (None, _) if matches!(self.bootstrap.privileges, ExecutionPrivileges::Root) => {
                self.worker(WorkerOperation::Stop, self.bootstrap.shutdown_timeout)
            }
            _ => Ok(()),
        }
    }

    fn worker(&self, operation: WorkerOperation, timeout: Duration) -> Result<(), BoxError> {
        let worker = self.bootstrap.worker_binary.as_ref().ok_or_else(|| {
            boxed(io::Error::new(
                io::ErrorKind::NotFound,
                "PG_EMBEDDED_WORKER is required when running as root",
            ))
        })?;
        let request = WorkerRequest::new(WorkerRequestArgs {
            worker: worker.as_path(),
            settings: &self.bootstrap.settings,
            env_vars: &self.env_vars,
            operation,
            timeout,
        });
        run_worker(&request).map_err(boxed)
    }

    fn execute_admin_sql(&self, sql: &str) -> Result<(), BoxError> {
        let mut conn = PgConnection::establish(&self.database_url("postgres")).map_err(boxed)?;
        diesel::sql_query(sql).execute(&mut conn).map_err(boxed)?;
        Ok(())
    }

    fn database_exists(&self, name: &str) -> Result<bool, BoxError> {
        #[derive(QueryableByName)]
        struct Exists {
            #[diesel(sql_type = diesel::sql_types::Bool)]
            exists: bool,
        }

        let mut conn = PgConnection::establish(&self.database_url("postgres")).map_err(boxed)?;
        let row = diesel::sql_query(
            "SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1) AS exists",
        )
        .bind::<diesel::sql_types::Text, _>(name)
        .get_result::<Exists>(&mut conn)
        .map_err(boxed)?;
        Ok(row.exists)
    }
}

impl Drop for ManagedCluster {
    fn drop(&mut self) {
        drop(self.stop());
    }
}

/// Provides the shared cluster, starting it on first use.
#[fixture]
pub fn postgres_cluster() -> PostgresCluster {
    SHARED_CLUSTER.get_or_init(|| match ManagedCluster::start() {
        Ok(cluster) => cluster,
        Err(err) => panic!("SKIP-TEST-CLUSTER: failed to start PostgreSQL: {err}"),
    })
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn as_os_pairs(pairs: &[(String, Option<String>)]) -> Vec<(OsString, Option<OsString>)> {
    pairs
        .iter()
        .map(|(key, value)| (OsString::from(key), value.as_ref().map(OsString::from)))
        .collect()
}

/// Environment the bootstrap step needs: a free port unless `PG_PORT` is
/// pinned, and a staged worker binary when running as root.
fn bootstrap_environment() -> Result<Vec<(OsString, Option<OsString>)>, BoxError> {
    let mut changes = Vec::new();
    if std::env::var_os("PG_PORT").is_none() {
        changes.push((OsString::from("PG_PORT"), Some(free_port()?.to_string().into())));
    }
    if matches!(detect_execution_privileges(), ExecutionPrivileges::Root)
        && std::env::var_os("PG_EMBEDDED_WORKER").is_none()
    {
        let worker = locate_worker().ok_or_else(|| {
            boxed(io::Error::new(
                io::ErrorKind::NotFound,
                "pg_worker binary not found and PG_EMBEDDED_WORKER is unset",
            ))
        })?;
        let staged = stage_worker(&worker)?;
        changes.push((OsString::from("PG_EMBEDDED_WORKER"), Some(staged.into_string().into())));
    }
    Ok(changes)
}

fn free_port() -> Result<u16, BoxError> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).map_err(boxed)?;
    Ok(listener.local_addr().map_err(boxed)?.port())
}

/// Finds the `pg_worker` binary built alongside this test target.
fn locate_worker() -> Option<Utf8PathBuf> {
    let built = option_env!("CARGO_BIN_EXE_pg_worker").map(Utf8PathBuf::from);
    let near_target = || {
        let exe = Utf8PathBuf::try_from(std::env::current_exe().ok()?).ok()?;
        let candidate = exe.parent()?.parent()?.join("pg_worker");
        candidate.is_file().then_some(candidate)
    };
    built.filter(|path| path.is_file()).or_else(near_target)
}

/// Copies the worker into the temp directory so `nobody` can execute it.
fn stage_worker(worker: &Utf8Path) -> Result<Utf8PathBuf, BoxError> {
    if let Some(staged) = STAGED_WORKER.get() {
        return Ok(staged.clone());
    }
    let temp = Utf8PathBuf::try_from(std::env::temp_dir()).map_err(boxed)?;
    let name = format!("pg_worker_{}", std::process::id());
    let (source_dir, source_name) = open_parent(worker)?;
    let target_dir = Dir::open_ambient_dir(&temp, ambient_authority()).map_err(boxed)?;
    if let Err(err) = target_dir.remove_file(&name) {
        if err.kind() != io::ErrorKind::NotFound {
            return Err(boxed(err));
        }
    }
    source_dir
        .copy(source_name, &target_dir, &name)
        .map_err(boxed)?;
    target_dir
        .set_permissions(&name, Permissions::from_mode(0o755))
        .map_err(boxed)?;
    Ok(STAGED_WORKER.get_or_init(|| temp.join(&name)).clone())
}

fn open_parent(path: &Utf8Path) -> Result<(Dir, &str), BoxError> {
    let name = path
        .file_name()
        .ok_or_else(|| boxed(io::Error::other(format!("{path} has no file name"))))?;
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(boxed)?;
    Ok((dir, name))
}

fn utf8(path: &std::path::Path) -> Result<&Utf8Path, BoxError> {
    Utf8Path::from_path(path).ok_or_else(|| {
        boxed(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} is not valid UTF-8", path.display()),
        ))
    })
}

fn read_password_file(settings: &mut Settings) -> Result<(), BoxError> {
    let (dir, name) = open_parent(utf8(&settings.password_file)?)?;
    match dir.read_to_string(name) {
        Ok(contents) => {
            let password = contents.trim_end();
            if !password.is_empty() {
                password.clone_into(&mut settings.password);
            }
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(boxed(err)),
    }
}

/// The fourth line of `postmaster.pid` holds the port the server bound.
fn read_port_from_pid_file(settings: &mut Settings) -> Result<(), BoxError> {
    let dir = Dir::open_ambient_dir(utf8(&settings.data_dir)?, ambient_authority()).map_err(boxed)?;
    let contents = match dir.read_to_string("postmaster.pid") {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(boxed(err)),
    };
    if let Some(port) = contents
        .lines()
        .nth(3)
        .and_then(|line| line.trim().parse::<u16>().ok())
    {
        settings.port = port;
    }
    Ok(())
}
