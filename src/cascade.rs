use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::env::{Host, Scope};
use crate::error::{Error, PathError};
use crate::loader::Dotenv;
use crate::model::LoadReport;

/// Role of a file in the `load_env` cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// `X`
    Base,
    /// `X.local`
    Local,
    /// `X.<env>`
    EnvSpecific,
    /// `X.<env>.local`
    EnvSpecificLocal,
    /// `X.dist`
    Distribution,
    /// `X.local.json`, a precompiled name/value snapshot.
    Snapshot,
}

/// A candidate file derived from the base path and environment name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub role: Role,
}

impl CandidateFile {
    pub fn new(base: &Path, role: Role, env: &str) -> Self {
        let path = match role {
            Role::Base => base.to_path_buf(),
            Role::Local => with_suffix(base, &[".local"]),
            Role::EnvSpecific => with_suffix(base, &[".", env]),
            Role::EnvSpecificLocal => with_suffix(base, &[".", env, ".local"]),
            Role::Distribution => with_suffix(base, &[".dist"]),
            Role::Snapshot => with_suffix(base, &[".local.json"]),
        };
        Self { path, role }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

fn with_suffix(base: &Path, parts: &[&str]) -> PathBuf {
    let mut path = OsString::from(base.as_os_str());
    for part in parts {
        path.push(part);
    }
    PathBuf::from(path)
}

impl<H: Host> Dotenv<H> {
    /// Load `path` and its environment-specific companions.
    ///
    /// Later files win over earlier ones because every name written by the
    /// cascade is memorized; values that existed before any dotenv activity
    /// are kept unless override is enabled.
    pub fn load_env(&mut self, path: impl AsRef<Path>) -> Result<LoadReport, Error> {
        let base = path.as_ref();
        let override_existing = self.override_existing;
        let mut report = LoadReport::default();

        let base_file = CandidateFile::new(base, Role::Base, "");
        let dist_file = CandidateFile::new(base, Role::Distribution, "");
        if base_file.exists() {
            report += self.load_candidate(&base_file, override_existing)?;
        } else if dist_file.exists() {
            report += self.load_candidate(&dist_file, override_existing)?;
        }

        let mut env = match self.current_env() {
            Some(env) => env,
            None => {
                let env = self.default_env.clone();
                let env_key = self.env_key.clone();
                report += self.populate([(env_key.as_str(), env.as_str())], override_existing);
                env
            }
        };

        let local_file = CandidateFile::new(base, Role::Local, &env);
        if self.test_envs.contains(&env) {
            debug!(env = %env, "skipping local file for test environment");
        } else if local_file.exists() {
            report += self.load_candidate(&local_file, override_existing)?;
            env = self.current_env().unwrap_or(env);
        }

        if self.skipped_envs.contains(&env) {
            debug!(env = %env, "skipping environment-specific files");
            return Ok(report);
        }

        for role in [Role::EnvSpecific, Role::EnvSpecificLocal] {
            let candidate = CandidateFile::new(base, role, &env);
            if candidate.exists() {
                report += self.load_candidate(&candidate, override_existing)?;
            }
        }

        Ok(report)
    }

    /// Populate from the `.local.json` snapshot when it matches the live
    /// environment, otherwise run [`load_env`](Self::load_env). Then derive
    /// the debug flag from its server, request or process value (or the
    /// environment name) and write it back normalized to `"1"` or `"0"`.
    pub fn boot_env(&mut self, path: impl AsRef<Path>) -> Result<LoadReport, Error> {
        let base = path.as_ref();
        let snapshot = CandidateFile::new(base, Role::Snapshot, "");
        let values = if snapshot.exists() {
            Some(read_snapshot(&snapshot.path)?)
        } else {
            None
        };

        let report = match values {
            Some(values) if self.snapshot_applies(&values) => {
                debug!(path = %snapshot.path.display(), "populating from snapshot");
                let override_existing = self.override_existing;
                let mut report = self.populate(&values, override_existing);
                report.files_read += 1;
                report
            }
            _ => self.load_env(base)?,
        };

        let env = self
            .current_env()
            .unwrap_or_else(|| self.default_env.clone());
        let debug = match self.lookup_live(&self.debug_key) {
            Some(raw) => is_truthy(&raw),
            None => !self.prod_envs.contains(&env),
        };
        let flag = if debug { "1" } else { "0" };
        let debug_key = self.debug_key.clone();
        self.host_mut().set(Scope::Server, &debug_key, flag);
        self.host_mut().set(Scope::Request, &debug_key, flag);

        Ok(report)
    }

    /// Run [`load_env`](Self::load_env) and write every variable it defined
    /// to `<path>.local.json`.
    pub fn dump_env(&mut self, path: impl AsRef<Path>) -> Result<PathBuf, Error> {
        let base = path.as_ref();
        self.load_env(base)?;

        let values = self
            .memorized_names()
            .iter()
            .filter_map(|name| {
                self.host()
                    .get(Scope::Request, name)
                    .map(|value| (name.to_owned(), value))
            })
            .collect::<BTreeMap<_, _>>();

        let snapshot = CandidateFile::new(base, Role::Snapshot, "");
        let json = serde_json::to_string_pretty(&values).map_err(|source| Error::Snapshot {
            path: snapshot.path.clone(),
            source,
        })?;
        std::fs::write(&snapshot.path, json)
            .map_err(|err| PathError::new(&snapshot.path, Some(err)))?;
        debug!(path = %snapshot.path.display(), variables = values.len(), "wrote snapshot");

        Ok(snapshot.path)
    }

    /// The environment name currently visible to the host.
    pub fn current_env(&self) -> Option<String> {
        self.lookup_live(&self.env_key)
    }

    fn lookup_live(&self, name: &str) -> Option<String> {
        let host = self.host();
        host.get(Scope::Server, name)
            .or_else(|| host.get(Scope::Request, name))
            .or_else(|| host.get(Scope::Process, name))
    }

    fn load_candidate(
        &mut self,
        candidate: &CandidateFile,
        override_existing: bool,
    ) -> Result<LoadReport, Error> {
        debug!(path = %candidate.path.display(), role = ?candidate.role, "loading cascade file");
        self.load_paths(override_existing, [&candidate.path])
    }

    fn snapshot_applies(&self, values: &BTreeMap<String, String>) -> bool {
        let Some(snapshot_env) = values.get(&self.env_key) else {
            return true;
        };
        self.override_existing
            || self
                .current_env()
                .is_none_or(|live_env| &live_env == snapshot_env)
    }
}

fn read_snapshot(path: &Path) -> Result<BTreeMap<String, String>, Error> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| PathError::new(path, Some(err)))?;
    serde_json::from_str(&content).map_err(|source| Error::Snapshot {
        path: path.to_path_buf(),
        source,
    })
}

fn is_truthy(raw: &str) -> bool {
    let raw = raw.trim();
    if let Ok(number) = raw.parse::<i64>() {
        return number != 0;
    }
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "true" | "on" | "yes"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_paths_follow_naming_scheme() {
        let base = Path::new("/app/.env");
        let names = [
            Role::Base,
            Role::Local,
            Role::EnvSpecific,
            Role::EnvSpecificLocal,
            Role::Distribution,
            Role::Snapshot,
        ]
        .map(|role| CandidateFile::new(base, role, "dev").path);

        assert_eq!(
            names,
            [
                "/app/.env",
                "/app/.env.local",
                "/app/.env.dev",
                "/app/.env.dev.local",
                "/app/.env.dist",
                "/app/.env.local.json",
            ]
            .map(PathBuf::from)
        );
    }

    #[test]
    fn truthy_values() {
        for raw in ["1", "true", "ON", " yes ", "42"] {
            assert!(is_truthy(raw), "{raw}");
        }
        for raw in ["0", "false", "off", "", "nope"] {
            assert!(!is_truthy(raw), "{raw}");
        }
    }
}
