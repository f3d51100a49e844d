use dotenv_cascade::{
    CommandError, CommandRunner, Dotenv, HostEnv, LoadReport, MemorizedNames, Scope,
};

#[test]
fn existing_values_are_not_overwritten() {
    let host = HostEnv::memory()
        .with_var(Scope::Process, "TEST_ENV_VAR", "original_value")
        .with_var(Scope::Server, "TEST_ENV_VAR", "original_value");
    let mut dotenv = Dotenv::with_host(host).use_process_env(true);

    let report = dotenv.populate([("TEST_ENV_VAR", "new_value")], false);

    assert_eq!(
        report,
        LoadReport {
            loaded: 0,
            skipped_existing: 1,
            files_read: 0,
        }
    );
    assert_eq!(get(&dotenv, Scope::Process, "TEST_ENV_VAR"), Some("original_value"));
    assert_eq!(get(&dotenv, Scope::Request, "TEST_ENV_VAR"), None);
    assert_eq!(get(&dotenv, Scope::Server, "TEST_ENV_VAR"), Some("original_value"));
    assert_eq!(get(&dotenv, Scope::Server, "APP_DOTENV_VARS"), None);
}

#[test]
fn override_replaces_existing_values() {
    let host = HostEnv::memory()
        .with_var(Scope::Process, "TEST_ENV_VAR", "original_value")
        .with_var(Scope::Server, "TEST_ENV_VAR", "original_value");
    let mut dotenv = Dotenv::with_host(host).use_process_env(true);

    dotenv.populate([("TEST_ENV_VAR", "new_value")], true);

    for scope in [Scope::Process, Scope::Request, Scope::Server] {
        assert_eq!(get(&dotenv, scope, "TEST_ENV_VAR"), Some("new_value"), "{scope:?}");
    }
}

#[test]
fn request_metadata_is_partially_overridden() {
    let host = HostEnv::memory().with_var(Scope::Server, "HTTP_TEST_ENV_VAR", "http_value");
    let mut dotenv = Dotenv::with_host(host).use_process_env(true);

    dotenv.populate([("HTTP_TEST_ENV_VAR", "env_value")], false);

    assert_eq!(get(&dotenv, Scope::Process, "HTTP_TEST_ENV_VAR"), Some("env_value"));
    assert_eq!(get(&dotenv, Scope::Request, "HTTP_TEST_ENV_VAR"), Some("env_value"));
    assert_eq!(get(&dotenv, Scope::Server, "HTTP_TEST_ENV_VAR"), Some("http_value"));
}

#[test]
fn server_only_values_are_protected() {
    let host = HostEnv::memory().with_var(Scope::Server, "argc", "1");
    let mut dotenv = Dotenv::with_host(host);

    dotenv.populate([("argc", "new_value")], false);

    assert_eq!(get(&dotenv, Scope::Server, "argc"), Some("1"));
}

#[test]
fn memorizes_loaded_names() {
    let mut dotenv = Dotenv::new().use_process_env(true);
    dotenv.populate(
        [("APP_DEBUG", "1"), ("DATABASE_URL", "mysql://root@localhost/db")],
        false,
    );

    for scope in [Scope::Process, Scope::Request, Scope::Server] {
        assert_eq!(
            get(&dotenv, scope, "APP_DOTENV_VARS"),
            Some("APP_DEBUG,DATABASE_URL"),
            "{scope:?}"
        );
    }
}

#[test]
fn memorizes_only_names_it_wrote() {
    let host = HostEnv::memory().with_var(Scope::Process, "APP_DEBUG", "1");
    let mut dotenv = Dotenv::with_host(host).use_process_env(true);

    dotenv.populate(
        [("APP_DEBUG", "0"), ("DATABASE_URL", "mysql://root@localhost/db")],
        false,
    );

    assert_eq!(get(&dotenv, Scope::Server, "APP_DOTENV_VARS"), Some("DATABASE_URL"));
    assert_eq!(get(&dotenv, Scope::Process, "APP_DEBUG"), Some("1"));
}

#[test]
fn second_pass_extends_the_registry() {
    let mut dotenv = Dotenv::new();
    dotenv.populate([("APP_ENV", "dev")], false);
    dotenv.populate([("APP_ENV", "test"), ("DATABASE_URL", "sqlite://")], false);

    assert_eq!(get(&dotenv, Scope::Server, "APP_DOTENV_VARS"), Some("APP_ENV,DATABASE_URL"));
    assert_eq!(get(&dotenv, Scope::Server, "APP_ENV"), Some("test"));
    assert_eq!(dotenv.memorized_names().len(), 2);
}

#[test]
fn memorized_names_are_overwritten() {
    let host = HostEnv::memory()
        .with_var(Scope::Server, "APP_DOTENV_VARS", "FOO,BAR,BAZ")
        .with_var(Scope::Server, "FOO", "foo")
        .with_var(Scope::Server, "BAR", "bar")
        .with_var(Scope::Server, "BAZ", "baz")
        .with_var(Scope::Server, "DOCUMENT_ROOT", "/var/www");
    let mut dotenv = Dotenv::with_host(host);

    let report = dotenv.populate(
        [
            ("FOO", "foo1"),
            ("BAR", "bar1"),
            ("BAZ", "baz1"),
            ("DOCUMENT_ROOT", "/boot"),
        ],
        false,
    );

    assert_eq!(report.loaded, 3);
    assert_eq!(report.skipped_existing, 1);
    assert_eq!(get(&dotenv, Scope::Server, "FOO"), Some("foo1"));
    assert_eq!(get(&dotenv, Scope::Server, "BAR"), Some("bar1"));
    assert_eq!(get(&dotenv, Scope::Server, "BAZ"), Some("baz1"));
    assert_eq!(get(&dotenv, Scope::Server, "DOCUMENT_ROOT"), Some("/var/www"));
    // Nothing new was memorized, so the registry is left as it was.
    assert_eq!(get(&dotenv, Scope::Request, "APP_DOTENV_VARS"), None);
}

#[test]
fn memorized_request_metadata_is_overwritten_in_server_scope() {
    let mut dotenv = Dotenv::new();
    dotenv.populate([("HTTP_X_CUSTOM", "first")], false);
    dotenv.populate([("HTTP_X_CUSTOM", "second")], false);

    assert_eq!(get(&dotenv, Scope::Server, "HTTP_X_CUSTOM"), Some("second"));
}

#[test]
fn populate_is_idempotent() {
    let values = [("FOO", "1"), ("BAR", "2")];
    let mut dotenv = Dotenv::new();
    dotenv.populate(values, false);
    let after_first = dotenv.host().clone();

    dotenv.populate(values, false);

    assert_eq!(dotenv.host(), &after_first);
}

#[test]
fn process_scope_is_untouched_by_default() {
    let mut dotenv = Dotenv::new();
    dotenv.populate([("FOO", "1")], false);

    assert_eq!(get(&dotenv, Scope::Process, "FOO"), None);
    assert_eq!(get(&dotenv, Scope::Process, "APP_DOTENV_VARS"), None);
    assert_eq!(get(&dotenv, Scope::Request, "FOO"), Some("1"));
}

#[test]
fn custom_registry_prefix() {
    let mut dotenv = Dotenv::new().registry_prefix("MYAPP");
    dotenv.populate([("FOO", "1")], false);

    assert_eq!(dotenv.registry_var(), "MYAPP_DOTENV_VARS");
    assert_eq!(get(&dotenv, Scope::Server, "MYAPP_DOTENV_VARS"), Some("FOO"));
    assert_eq!(get(&dotenv, Scope::Server, "APP_DOTENV_VARS"), None);
}

#[test]
fn registry_is_read_from_request_scope_when_server_lacks_it() {
    let host = HostEnv::memory()
        .with_var(Scope::Request, "APP_DOTENV_VARS", "FOO")
        .with_var(Scope::Request, "FOO", "old");
    let mut dotenv = Dotenv::with_host(host);

    dotenv.populate([("FOO", "new")], false);

    assert_eq!(get(&dotenv, Scope::Request, "FOO"), Some("new"));
    assert_eq!(
        dotenv.memorized_names(),
        MemorizedNames::decode("FOO")
    );
}

#[test]
fn memorized_values_win_during_expansion() {
    let host = HostEnv::memory().with_var(Scope::Server, "APP_ENV", "prod");
    let mut dotenv = Dotenv::with_host(host);
    dotenv.populate([("BASE", "/srv")], false);

    let parsed = dotenv
        .parse("BASE=/opt\nBIN=${BASE}/bin\nMODE=$APP_ENV\n", ".env")
        .expect("parse should succeed");

    assert_eq!(parsed[1].value, "/opt/bin");
    assert_eq!(parsed[2].value, "prod");
}

/// Prints the named variable from the environment it was given.
struct PrintVar;

impl CommandRunner for PrintVar {
    fn run(&self, command: &str, env: &[(String, String)]) -> Result<String, CommandError> {
        let name = command.trim_start_matches("printenv ");
        Ok(env
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| format!("{value}\n"))
            .unwrap_or_default())
    }
}

#[test]
fn substituted_commands_see_live_values() {
    let host = HostEnv::memory()
        .with_var(Scope::Request, "LIVE_FOO", "request")
        .with_var(Scope::Server, "SERVER_FOO", "server")
        .with_var(Scope::Server, "HTTP_HOST", "example.com");
    let dotenv = Dotenv::with_host(host).command_runner(PrintVar);

    let parsed = dotenv
        .parse(
            "A=$LIVE_FOO\nB=$(printenv LIVE_FOO)\nC=$(printenv SERVER_FOO)\nD=$(printenv HTTP_HOST)\n",
            ".env",
        )
        .expect("parse should succeed");

    let values = parsed
        .iter()
        .map(|declaration| declaration.value.as_str())
        .collect::<Vec<_>>();
    assert_eq!(values, ["request", "request", "server", ""]);
}

#[test]
fn substituted_commands_prefer_request_over_server_values() {
    let host = HostEnv::memory()
        .with_var(Scope::Request, "FOO", "request")
        .with_var(Scope::Server, "FOO", "server")
        .with_var(Scope::Process, "FOO", "process");
    let dotenv = Dotenv::with_host(host).command_runner(PrintVar);

    let parsed = dotenv
        .parse("FOO=file\nA=$(printenv FOO)\n", ".env")
        .expect("parse should succeed");

    assert_eq!(parsed[1].value, "request");
}

#[cfg(unix)]
#[test]
fn shell_substitution_matches_reference_expansion() {
    let host = HostEnv::memory().with_var(Scope::Request, "DOTENV_CASCADE_LIVE", "live");
    let dotenv = Dotenv::with_host(host);

    let parsed = dotenv
        .parse(
            "A=$DOTENV_CASCADE_LIVE\nB=$(echo $DOTENV_CASCADE_LIVE)\n",
            ".env",
        )
        .expect("parse should succeed");

    assert_eq!(parsed[0].value, "live");
    assert_eq!(parsed[1].value, "live");
}

fn get<'a>(dotenv: &'a Dotenv, scope: Scope, name: &str) -> Option<&'a str> {
    dotenv
        .host()
        .scope(scope)
        .as_map()
        .and_then(|map| map.get(name))
        .map(String::as_str)
}
