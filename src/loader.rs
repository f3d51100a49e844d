use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::env::{Host, HostEnv, Scope};
use crate::error::{Error, FormatError, PathError};
use crate::expand::{CommandRunner, ShellCommandRunner, VariableView};
use crate::model::{Declaration, LoadReport};
use crate::parser;
use crate::registry::MemorizedNames;

pub const DEFAULT_ENV_KEY: &str = "APP_ENV";
pub const DEFAULT_DEBUG_KEY: &str = "APP_DEBUG";
pub const DEFAULT_REGISTRY_PREFIX: &str = "APP";
const REGISTRY_SUFFIX: &str = "_DOTENV_VARS";

/// Names carrying request provenance; their server-scope copy is never
/// replaced once set from outside.
pub(crate) const REQUEST_METADATA_PREFIX: &str = "HTTP_";

pub(crate) fn is_request_metadata(name: &str) -> bool {
    name.starts_with(REQUEST_METADATA_PREFIX)
}

/// Builder-style dotenv loader bound to a set of host stores.
#[derive(Clone)]
pub struct Dotenv<H = HostEnv> {
    host: H,
    pub(crate) env_key: String,
    pub(crate) debug_key: String,
    pub(crate) registry_var: String,
    pub(crate) use_process_env: bool,
    pub(crate) override_existing: bool,
    pub(crate) default_env: String,
    pub(crate) test_envs: Vec<String>,
    pub(crate) skipped_envs: Vec<String>,
    pub(crate) prod_envs: Vec<String>,
    runner: Arc<dyn CommandRunner + Send + Sync>,
}

impl Dotenv<HostEnv> {
    /// A loader writing to in-memory stores only.
    pub fn new() -> Self {
        Self::with_host(HostEnv::memory())
    }
}

impl Default for Dotenv<HostEnv> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Debug> Debug for Dotenv<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dotenv")
            .field("host", &self.host)
            .field("env_key", &self.env_key)
            .field("debug_key", &self.debug_key)
            .field("registry_var", &self.registry_var)
            .field("use_process_env", &self.use_process_env)
            .field("override_existing", &self.override_existing)
            .field("default_env", &self.default_env)
            .field("test_envs", &self.test_envs)
            .field("skipped_envs", &self.skipped_envs)
            .field("prod_envs", &self.prod_envs)
            .finish_non_exhaustive()
    }
}

impl<H: Host> Dotenv<H> {
    pub fn with_host(host: H) -> Self {
        Self {
            host,
            env_key: DEFAULT_ENV_KEY.to_owned(),
            debug_key: DEFAULT_DEBUG_KEY.to_owned(),
            registry_var: format!("{DEFAULT_REGISTRY_PREFIX}{REGISTRY_SUFFIX}"),
            use_process_env: false,
            override_existing: false,
            default_env: "dev".to_owned(),
            test_envs: vec!["test".to_owned()],
            skipped_envs: vec!["local".to_owned()],
            prod_envs: vec!["prod".to_owned()],
            runner: Arc::new(ShellCommandRunner),
        }
    }

    /// Variable holding the environment name, `APP_ENV` by default.
    pub fn env_key(mut self, env_key: impl Into<String>) -> Self {
        self.env_key = env_key.into();
        self
    }

    pub fn debug_key(mut self, debug_key: impl Into<String>) -> Self {
        self.debug_key = debug_key.into();
        self
    }

    /// Store memorized names in `<PREFIX>_DOTENV_VARS`.
    pub fn registry_prefix(mut self, prefix: &str) -> Self {
        self.registry_var = format!("{prefix}{REGISTRY_SUFFIX}");
        self
    }

    /// Also write populated values to the process scope.
    pub fn use_process_env(mut self, use_process_env: bool) -> Self {
        self.use_process_env = use_process_env;
        self
    }

    /// Override policy for [`load_env`](Self::load_env) and
    /// [`boot_env`](Self::boot_env).
    pub fn override_existing(mut self, override_existing: bool) -> Self {
        self.override_existing = override_existing;
        self
    }

    pub fn default_env(mut self, default_env: impl Into<String>) -> Self {
        self.default_env = default_env.into();
        self
    }

    /// Environment names for which `<path>.local` is not loaded.
    pub fn test_envs<I, S>(mut self, test_envs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.test_envs = test_envs.into_iter().map(Into::into).collect();
        self
    }

    /// Environment names for which `<path>.<env>` files are not loaded.
    pub fn skipped_envs<I, S>(mut self, skipped_envs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skipped_envs = skipped_envs.into_iter().map(Into::into).collect();
        self
    }

    /// Environment names that default the debug flag to off.
    pub fn prod_envs<I, S>(mut self, prod_envs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prod_envs = prod_envs.into_iter().map(Into::into).collect();
        self
    }

    pub fn command_runner(mut self, runner: impl CommandRunner + Send + Sync + 'static) -> Self {
        self.runner = Arc::new(runner);
        self
    }

    pub fn registry_var(&self) -> &str {
        &self.registry_var
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// Parse `data` against the current host stores without populating.
    pub fn parse(&self, data: &str, path: &str) -> Result<Vec<Declaration>, FormatError> {
        let view = HostView {
            host: &self.host,
            memorized: self.memorized_names(),
        };
        parser::parse(data, path, &view, self.runner.as_ref())
    }

    /// Load files in order without overriding existing variables.
    pub fn load<I, P>(&mut self, paths: I) -> Result<LoadReport, Error>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.load_paths(false, paths)
    }

    /// Load files in order, overriding existing variables.
    pub fn overload<I, P>(&mut self, paths: I) -> Result<LoadReport, Error>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.load_paths(true, paths)
    }

    pub(crate) fn load_paths<I, P>(
        &mut self,
        override_existing: bool,
        paths: I,
    ) -> Result<LoadReport, Error>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut report = LoadReport::default();
        for path in paths {
            let path = path.as_ref();
            let content = read_env_file(path)?;
            let declarations = self.parse(&content, &path.to_string_lossy())?;
            debug!(
                path = %path.display(),
                declarations = declarations.len(),
                override_existing,
                "loaded dotenv file"
            );

            report += self.populate(
                declarations
                    .iter()
                    .map(|declaration| (declaration.name.as_str(), declaration.value.as_str())),
                override_existing,
            );
            report.files_read += 1;
        }
        Ok(report)
    }

    /// The registry of names previously written by [`populate`](Self::populate).
    pub fn memorized_names(&self) -> MemorizedNames {
        [Scope::Server, Scope::Request, Scope::Process]
            .into_iter()
            .find_map(|scope| self.host.get(scope, &self.registry_var))
            .map(|raw| MemorizedNames::decode(&raw))
            .unwrap_or_default()
    }
}

fn read_env_file(path: &Path) -> Result<String, Error> {
    if path.is_dir() {
        return Err(PathError::new(path, None).into());
    }
    let bytes = std::fs::read(path).map_err(|err| PathError::new(path, Some(err)))?;
    String::from_utf8(bytes).map_err(|err| Error::InvalidEncoding {
        path: PathBuf::from(path),
        source: err.utf8_error(),
    })
}

/// Live lookup order used while expanding: request, server (except request
/// metadata), then process. Substituted commands see the same layering.
struct HostView<'a, H> {
    host: &'a H,
    memorized: MemorizedNames,
}

impl<H: Host> VariableView for HostView<'_, H> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.host
            .get(Scope::Request, name)
            .or_else(|| {
                if is_request_metadata(name) {
                    None
                } else {
                    self.host.get(Scope::Server, name)
                }
            })
            .or_else(|| self.host.get(Scope::Process, name))
    }

    fn is_memorized(&self, name: &str) -> bool {
        self.memorized.contains(name)
    }

    fn live_vars(&self) -> Vec<(String, String)> {
        let server = self
            .host
            .vars(Scope::Server)
            .into_iter()
            .filter(|(name, _)| !is_request_metadata(name));
        self.host
            .vars(Scope::Process)
            .into_iter()
            .chain(server)
            .chain(self.host.vars(Scope::Request))
            .collect()
    }
}
