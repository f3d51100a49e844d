//! Parse shell-like `.env` files, expand references and command
//! substitutions in their values, and merge the result into host variable
//! stores.
//!
//! [`Dotenv::load_env`] resolves the usual cascade (`.env`, `.env.local`,
//! `.env.<env>`, `.env.<env>.local`, `.env.dist`). [`Dotenv::populate`] only
//! replaces values that did not exist before, unless they were written by an
//! earlier call or override is requested; the names it wrote are remembered
//! in a `<PREFIX>_DOTENV_VARS` variable.
//!
//! The default [`HostEnv`] keeps every store in memory. Writing to the real
//! process environment requires [`HostEnv::process`], which is `unsafe`
//! because callers must guarantee no concurrent process-environment access.

mod cascade;
mod cursor;
mod env;
mod error;
mod expand;
mod loader;
mod model;
mod parser;
mod populate;
mod registry;

pub use cascade::{CandidateFile, Role};
pub use cursor::FormatErrorContext;
pub use env::{Host, HostEnv, Scope, ScopeStore};
pub use error::{CommandError, Error, FormatError, FormatErrorKind, PathError};
pub use expand::{CommandRunner, EmptyView, ShellCommandRunner, VariableView};
pub use loader::{DEFAULT_DEBUG_KEY, DEFAULT_ENV_KEY, DEFAULT_REGISTRY_PREFIX, Dotenv};
pub use model::{Declaration, LoadReport};
pub use parser::{parse, parse_str};
pub use registry::MemorizedNames;
