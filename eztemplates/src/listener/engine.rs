//! The save listener driving template propagation.

use super::repository::{JobRepository, SharedJob};
use crate::change::{self, ChangeContext, ChangeScope, ScopeTarget};
use crate::config::EngineConfig;
use crate::errors::{EzTemplatesError, Result};
use crate::propagation::{PropagationFailure, SaveReport, TemplatePropagator};
use std::sync::Arc;
use tracing::{debug, error, info_span, warn};

/// Reacts to job saves by propagating templates.
///
/// Two scope contexts keep this loop-free. A template being pushed holds a
/// [`ChangeContext::TEMPLATE`] scope; an implementation being updated holds
/// a [`ChangeContext::IMPLEMENTATION`] scope. The implementation's own save
/// comes back through [`on_saved`](Self::on_saved), which sees the open
/// scope and does not pull the template again, but still pushes onward if
/// the implementation is itself a template.
///
/// Hosts may call [`on_saved`](Self::on_saved) from inside
/// [`Saveable::save`](crate::host::Saveable::save). While the engine performs
/// an implementation's real save it holds that job's lock and a scope under
/// its own private context; a listener call for that job returns at once
/// without locking anything, and the engine continues the cascade itself
/// once the save returns.
pub struct TemplateEngine<R: JobRepository> {
    repository: Arc<R>,
    propagator: TemplatePropagator,
    config: EngineConfig,
    saving: ChangeContext,
}

impl<R: JobRepository> TemplateEngine<R> {
    /// Creates an engine with the built-in exclusions and default config.
    #[must_use]
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            propagator: TemplatePropagator::default(),
            config: EngineConfig::default(),
            saving: ChangeContext::new(),
        }
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the propagator (and with it the exclusion registry).
    #[must_use]
    pub fn with_propagator(mut self, propagator: TemplatePropagator) -> Self {
        self.propagator = propagator;
        self
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handles a save of `name`, which the host has already persisted.
    ///
    /// Failures of individual implementations are collected in the report
    /// unless [`EngineConfig::fail_fast`] is set. Errors about `name` itself
    /// are returned.
    pub fn on_saved(&self, name: &str) -> Result<SaveReport> {
        let span = info_span!("template_save", job = %name);
        let _entered = span.enter();

        let mut report = SaveReport::new(name);
        self.handle_saved(name, &mut report)?;
        Ok(report)
    }

    fn lookup(&self, name: &str) -> Result<SharedJob> {
        self.repository
            .job(name)
            .ok_or_else(|| EzTemplatesError::UnknownJob(name.to_string()))
    }

    fn handle_saved(&self, name: &str, report: &mut SaveReport) -> Result<()> {
        if change::contains(&ScopeTarget::saveable(name), self.saving) {
            debug!(job = %name, "Save listener re-entered during propagation save");
            return Ok(());
        }

        let (id, is_template, implements) = {
            let job = self.lookup(name)?;
            let job = job.lock();
            (job.saveable_id(), job.is_template(), job.implemented_template())
        };
        let target = ScopeTarget::from(&id);

        if let Some(template) = implements {
            if change::contains(&target, ChangeContext::IMPLEMENTATION) {
                debug!(job = %name, "Implementation already being templated");
            } else if self.repository.job(&template).is_none() {
                // Its own implementations still get pushed below.
                let e = EzTemplatesError::UnknownJob(template.clone());
                warn!(job = %name, template = %template, "Implemented template does not exist");
                record_failure(report, &template, name, &e);
                if self.config.fail_fast {
                    return Err(e);
                }
            } else {
                // Re-saving the updated implementation re-enters here and
                // pushes onward from there.
                return self.update_implementation(&template, name, report);
            }
        }

        if is_template {
            if change::contains(&target, ChangeContext::TEMPLATE) {
                debug!(job = %name, "Template already being propagated");
            } else {
                self.push_template(name, target, report)?;
            }
        }

        Ok(())
    }

    fn push_template(&self, template: &str, target: ScopeTarget, report: &mut SaveReport) -> Result<()> {
        let mut scope = ChangeScope::open(target, ChangeContext::TEMPLATE);

        for implementation in self.repository.implementations_of(template) {
            if let Err(e) = self.update_implementation(template, &implementation, report) {
                error!(
                    template = %template,
                    implementation = %implementation,
                    error = %e,
                    "Failed to propagate template"
                );
                record_failure(report, template, &implementation, &e);
                if self.config.fail_fast {
                    scope.abort();
                    return Err(e);
                }
            }
        }

        scope.commit();
        Ok(())
    }

    fn update_implementation(&self, template: &str, implementation: &str, report: &mut SaveReport) -> Result<()> {
        let template_job = self.lookup(template)?;
        let implementation_job = self.lookup(implementation)?;

        let id = implementation_job.lock().saveable_id();
        if change::contains(&ScopeTarget::from(&id), ChangeContext::IMPLEMENTATION) {
            debug!(template = %template, implementation = %implementation, "Skipping implementation already in scope");
            report.skipped.push(implementation.to_string());
            return Ok(());
        }

        let (configuration, exclusions) = {
            let template_job = template_job.lock();
            let exclusions = template_job
                .template_settings()
                .map_or_else(|| self.config.default_exclusions.clone(), |settings| settings.exclusions);
            (template_job.configuration(), exclusions)
        };

        let mut scope = ChangeScope::open(id, ChangeContext::IMPLEMENTATION);

        let propagation = {
            let mut job = implementation_job.lock();
            let mut propagation = self
                .propagator
                .reconfigure(template, &configuration, &mut *job, &exclusions)?;

            // The host's save listeners may call back into `on_saved` here.
            let mut saving = ChangeScope::open(ScopeTarget::saveable(implementation), self.saving);
            self.propagator.save(&mut *job, &mut propagation)?;
            saving.commit();
            propagation
        };
        report.propagations.push(propagation);

        // Stands in for the listener call absorbed during the save.
        self.handle_saved(implementation, report)?;

        scope.commit();
        Ok(())
    }
}

fn record_failure(report: &mut SaveReport, template: &str, implementation: &str, error: &EzTemplatesError) {
    report.failures.push(PropagationFailure {
        template: template.to_string(),
        implementation: implementation.to_string(),
        error: error.to_string(),
    });
}

impl<R: JobRepository> std::fmt::Debug for TemplateEngine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("propagator", &self.propagator)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
