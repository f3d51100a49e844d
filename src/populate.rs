use tracing::{debug, trace};

use crate::env::{Host, Scope};
use crate::loader::{Dotenv, is_request_metadata};
use crate::model::LoadReport;

impl<H: Host> Dotenv<H> {
    /// Merge `values` into the host stores.
    ///
    /// A name is written when it was memorized by an earlier call, when it is
    /// not defined yet, or when `override_existing` is set. Server-scope
    /// request metadata that did not come from here is left untouched.
    /// Newly written names are appended to the memorized registry.
    pub fn populate<I, K, V>(&mut self, values: I, override_existing: bool) -> LoadReport
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut memorized = self.memorized_names();
        let mut registry_changed = false;
        let mut report = LoadReport::default();

        for (name, value) in values {
            let (name, value) = (name.as_ref(), value.as_ref());
            let ours = memorized.contains(name);
            if !ours && !override_existing && self.is_defined(name) {
                trace!(name, "skipping existing variable");
                report.skipped_existing += 1;
                continue;
            }

            if self.use_process_env {
                self.host_mut().set(Scope::Process, name, value);
            }
            self.host_mut().set(Scope::Request, name, value);
            if ours || !is_request_metadata(name) || !self.host().contains(Scope::Server, name) {
                self.host_mut().set(Scope::Server, name, value);
            }

            registry_changed |= memorized.insert(name);
            report.loaded += 1;
        }

        if registry_changed {
            let encoded = memorized.encode();
            debug!(registry = %self.registry_var, names = memorized.len(), "updating memorized names");
            let registry_var = self.registry_var.clone();
            if self.use_process_env {
                self.host_mut().set(Scope::Process, &registry_var, &encoded);
            }
            self.host_mut().set(Scope::Request, &registry_var, &encoded);
            self.host_mut().set(Scope::Server, &registry_var, &encoded);
        }

        report
    }

    fn is_defined(&self, name: &str) -> bool {
        let host = self.host();
        host.contains(Scope::Request, name)
            || (!is_request_metadata(name) && host.contains(Scope::Server, name))
            || host.contains(Scope::Process, name)
    }
}
