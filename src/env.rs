use std::collections::BTreeMap;

/// One of the three host-provided variable stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The live process environment.
    Process,
    /// Variables visible to the current request or unit of work.
    Request,
    /// Server and request metadata, some of it trusted input.
    Server,
}

/// String-keyed stores the populator reads and writes.
pub trait Host {
    fn get(&self, scope: Scope, key: &str) -> Option<String>;

    fn set(&mut self, scope: Scope, key: &str, value: &str);

    fn contains(&self, scope: Scope, key: &str) -> bool {
        self.get(scope, key).is_some()
    }

    /// Every variable in `scope`. Hosts that cannot list a scope return
    /// nothing, which only limits what substituted commands see.
    fn vars(&self, _scope: Scope) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Storage behind one [`Scope`]: either the live process environment or a
/// private map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeStore {
    backing: Backing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Backing {
    /// Writes go through [`std::env::set_var`] and are visible process-wide.
    ProcessEnv,
    Map(BTreeMap<String, String>),
}

impl Default for ScopeStore {
    fn default() -> Self {
        Self::memory()
    }
}

impl FromIterator<(String, String)> for ScopeStore {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

impl ScopeStore {
    /// A store backed by the real process environment.
    ///
    /// # Safety
    ///
    /// No other thread may read or write the process environment while this
    /// store is being written to.
    pub unsafe fn process() -> Self {
        Self {
            backing: Backing::ProcessEnv,
        }
    }

    pub fn memory() -> Self {
        Self::from_map(BTreeMap::new())
    }

    pub fn from_map(map: BTreeMap<String, String>) -> Self {
        Self {
            backing: Backing::Map(map),
        }
    }

    /// `true` when writes reach the process environment.
    pub fn is_process(&self) -> bool {
        matches!(self.backing, Backing::ProcessEnv)
    }

    /// The private map, or `None` for the process environment.
    pub fn as_map(&self) -> Option<&BTreeMap<String, String>> {
        match &self.backing {
            Backing::Map(map) => Some(map),
            Backing::ProcessEnv => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match &self.backing {
            Backing::Map(map) => map.get(key).cloned(),
            Backing::ProcessEnv => {
                std::env::var_os(key).map(|value| value.to_string_lossy().into_owned())
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        match &self.backing {
            Backing::Map(map) => map.contains_key(key),
            Backing::ProcessEnv => std::env::var_os(key).is_some(),
        }
    }

    pub fn vars(&self) -> Vec<(String, String)> {
        match &self.backing {
            Backing::Map(map) => map
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            Backing::ProcessEnv => std::env::vars_os()
                .map(|(key, value)| {
                    (
                        key.to_string_lossy().into_owned(),
                        value.to_string_lossy().into_owned(),
                    )
                })
                .collect(),
        }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        match &mut self.backing {
            Backing::Map(map) => {
                map.insert(key.to_owned(), value.to_owned());
            }
            // SAFETY: upheld by the caller of `ScopeStore::process`.
            Backing::ProcessEnv => unsafe { std::env::set_var(key, value) },
        }
    }
}

/// The default [`Host`]: one [`ScopeStore`] per scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEnv {
    process: ScopeStore,
    request: ScopeStore,
    server: ScopeStore,
}

impl HostEnv {
    /// All three scopes in memory. Nothing touches the real process.
    pub fn memory() -> Self {
        Self::default()
    }

    /// The process scope backed by the real process environment.
    ///
    /// # Safety
    ///
    /// Same contract as [`ScopeStore::process`].
    pub unsafe fn process() -> Self {
        Self {
            // SAFETY: forwarded to the caller.
            process: unsafe { ScopeStore::process() },
            ..Self::default()
        }
    }

    pub fn from_parts(process: ScopeStore, request: ScopeStore, server: ScopeStore) -> Self {
        Self {
            process,
            request,
            server,
        }
    }

    pub fn scope(&self, scope: Scope) -> &ScopeStore {
        match scope {
            Scope::Process => &self.process,
            Scope::Request => &self.request,
            Scope::Server => &self.server,
        }
    }

    pub fn scope_mut(&mut self, scope: Scope) -> &mut ScopeStore {
        match scope {
            Scope::Process => &mut self.process,
            Scope::Request => &mut self.request,
            Scope::Server => &mut self.server,
        }
    }

    /// Builder helper that seeds a value into one scope.
    pub fn with_var(mut self, scope: Scope, key: &str, value: &str) -> Self {
        self.scope_mut(scope).set(key, value);
        self
    }
}

impl Host for HostEnv {
    fn get(&self, scope: Scope, key: &str) -> Option<String> {
        self.scope(scope).get(key)
    }

    fn set(&mut self, scope: Scope, key: &str, value: &str) {
        self.scope_mut(scope).set(key, value);
    }

    fn contains(&self, scope: Scope, key: &str) -> bool {
        self.scope(scope).contains(key)
    }

    fn vars(&self, scope: Scope) -> Vec<(String, String)> {
        self.scope(scope).vars()
    }
}
