//! Template-to-implementation propagation.

use super::PropagationReport;
use crate::change::{ChangeContext, ChangeScope};
use crate::errors::{EzTemplatesError, Result};
use crate::exclusion::{Exclusion, ExclusionRegistry, ExclusionSnapshot};
use crate::host::{Job, JobConfiguration};
use std::sync::Arc;
use tracing::{info, warn};

/// Applies a template's configuration to an implementation while keeping
/// the implementation's excluded fields.
#[derive(Debug, Clone)]
pub struct TemplatePropagator {
    registry: Arc<ExclusionRegistry>,
}

impl Default for TemplatePropagator {
    fn default() -> Self {
        Self::new(Arc::new(ExclusionRegistry::builtin()))
    }
}

impl TemplatePropagator {
    /// Creates a propagator drawing exclusions from `registry`.
    #[must_use]
    pub fn new(registry: Arc<ExclusionRegistry>) -> Self {
        Self { registry }
    }

    /// The exclusion registry in use.
    #[must_use]
    pub fn registry(&self) -> &ExclusionRegistry {
        &self.registry
    }

    /// Copies `configuration` (the template's) onto `implementation` and
    /// saves it.
    ///
    /// Equivalent to [`reconfigure`](Self::reconfigure) followed by
    /// [`save`](Self::save).
    pub fn apply(
        &self,
        template: &str,
        configuration: &JobConfiguration,
        implementation: &mut dyn Job,
        exclusion_ids: &[String],
    ) -> Result<PropagationReport> {
        let mut report = self.reconfigure(template, configuration, implementation, exclusion_ids)?;
        self.save(implementation, &mut report)?;
        Ok(report)
    }

    /// The in-memory half of [`apply`](Self::apply).
    ///
    /// All changes happen under a persistence scope on the implementation, so
    /// host setters that save are vetoed. Exclusions that fail to capture or
    /// restore are logged, recorded in the report and skipped. Host errors
    /// abort propagation for this implementation. Nothing is persisted.
    pub fn reconfigure(
        &self,
        template: &str,
        configuration: &JobConfiguration,
        implementation: &mut dyn Job,
        exclusion_ids: &[String],
    ) -> Result<PropagationReport> {
        let mut report = PropagationReport::new(template, implementation.full_name());

        let (exclusions, unknown) = self.registry.resolve(exclusion_ids);
        for id in unknown {
            warn!(template = %template, exclusion = %id, "Skipping unknown exclusion");
            let reason = EzTemplatesError::UnknownExclusion(id.clone());
            report.skip(id, reason);
        }

        let mut scope = ChangeScope::open(implementation.saveable_id(), ChangeContext::PERSISTENCE);

        let snapshots = self.capture_all(&exclusions, implementation, &mut report);
        implementation.apply_configuration(configuration)?;
        self.restore_all(snapshots, implementation, &mut report);

        scope.commit();
        Ok(report)
    }

    /// Performs the one real save after [`reconfigure`](Self::reconfigure)
    /// and records its outcome.
    pub fn save(&self, implementation: &mut dyn Job, report: &mut PropagationReport) -> Result<()> {
        report.save = Some(implementation.save()?);
        info!(
            template = %report.template,
            implementation = %report.implementation,
            retained = ?report.applied_exclusions,
            skipped = report.skipped_exclusions.len(),
            "Propagated template"
        );
        Ok(())
    }

    fn capture_all(
        &self,
        exclusions: &[Arc<dyn Exclusion>],
        implementation: &dyn Job,
        report: &mut PropagationReport,
    ) -> Vec<(Arc<dyn Exclusion>, ExclusionSnapshot)> {
        exclusions
            .iter()
            .filter_map(|exclusion| match exclusion.capture(implementation) {
                Ok(snapshot) => Some((Arc::clone(exclusion), snapshot)),
                Err(e) => {
                    warn!(
                        implementation = %implementation.full_name(),
                        exclusion = %exclusion.id(),
                        error = %e,
                        "Could not capture excluded field, skipping exclusion"
                    );
                    report.skip(exclusion.id(), e);
                    None
                }
            })
            .collect()
    }

    fn restore_all(
        &self,
        snapshots: Vec<(Arc<dyn Exclusion>, ExclusionSnapshot)>,
        implementation: &mut dyn Job,
        report: &mut PropagationReport,
    ) {
        for (exclusion, snapshot) in snapshots {
            match exclusion.restore(implementation, snapshot) {
                Ok(()) => report.applied_exclusions.push(exclusion.id().to_string()),
                Err(e) => {
                    warn!(
                        implementation = %implementation.full_name(),
                        exclusion = %exclusion.id(),
                        error = %e,
                        "Could not restore excluded field, skipping exclusion"
                    );
                    report.skip(exclusion.id(), e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change;
    use crate::config::DEFAULT_EXCLUSIONS;
    use crate::errors::FieldAccessError;
    use crate::exclusion::FieldExclusion;
    use crate::host::{SaveOutcome, Saveable};
    use crate::testing::{assert_no_open_scopes, assert_save_counts, InMemoryJob};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| (*id).to_string()).collect()
    }

    fn template() -> InMemoryJob {
        InMemoryJob::template("tpl")
            .with_disabled(false)
            .with_field("description", json!("template description"))
            .with_field("scm", json!({"url": "git@example.com:tpl.git"}))
            .with_field("triggers", json!(["@daily"]))
    }

    #[test]
    fn test_copies_configuration_and_retains_exclusions() {
        let tpl = template();
        let mut implementation = InMemoryJob::implementation("impl", "tpl")
            .with_disabled(true)
            .with_field("description", json!("local"));

        let propagator = TemplatePropagator::default();
        let report = propagator
            .apply("tpl", &tpl.configuration(), &mut implementation, &ids(DEFAULT_EXCLUSIONS))
            .unwrap();

        assert_eq!(report.applied_exclusions, vec!["ez-templates", "disabled", "description"]);
        assert!(report.is_clean());
        assert_eq!(report.save, Some(SaveOutcome::Saved));

        assert!(implementation.is_disabled());
        assert!(!implementation.is_template());
        assert_eq!(implementation.implemented_template(), Some("tpl".to_string()));
        assert_eq!(implementation.field("description").unwrap(), json!("local"));
        assert_eq!(implementation.field("scm").unwrap(), json!({"url": "git@example.com:tpl.git"}));
        assert_eq!(implementation.field("triggers").unwrap(), json!(["@daily"]));

        assert_save_counts(&implementation, 1, 0);
        assert_eq!(implementation.persisted().unwrap()["disabled"], json!(true));
        assert_no_open_scopes();
    }

    #[test]
    fn test_missing_field_skips_only_that_exclusion() {
        let tpl = template();
        let mut implementation = InMemoryJob::implementation("impl", "tpl")
            .with_field("description", json!("local"))
            .without_field("disabled");

        let report = TemplatePropagator::default()
            .apply("tpl", &tpl.configuration(), &mut implementation, &ids(DEFAULT_EXCLUSIONS))
            .unwrap();

        assert_eq!(report.applied_exclusions, vec!["ez-templates", "description"]);
        assert_eq!(report.skipped_exclusions.len(), 1);
        assert_eq!(report.skipped_exclusions[0].exclusion, "disabled");
        assert!(report.skipped_exclusions[0].reason.contains("'disabled'"));
        assert_eq!(implementation.field("description").unwrap(), json!("local"));
        assert_eq!(report.save, Some(SaveOutcome::Saved));
    }

    #[test]
    fn test_unknown_exclusion_is_reported() {
        let tpl = template();
        let mut implementation = InMemoryJob::implementation("impl", "tpl");

        let report = TemplatePropagator::default()
            .apply("tpl", &tpl.configuration(), &mut implementation, &ids(&["ez-templates", "nope"]))
            .unwrap();

        assert_eq!(report.applied_exclusions, vec!["ez-templates"]);
        assert_eq!(report.skipped_exclusions[0].exclusion, "nope");
        assert_eq!(report.skipped_exclusions[0].reason, "Unknown exclusion: nope");
    }

    #[test]
    fn test_without_exclusions_implementation_becomes_copy() {
        let tpl = template();
        let mut implementation = InMemoryJob::implementation("impl", "tpl").with_disabled(true);

        TemplatePropagator::default()
            .apply("tpl", &tpl.configuration(), &mut implementation, &[])
            .unwrap();

        assert!(!implementation.is_disabled());
        assert!(implementation.is_template());
        assert_eq!(implementation.implemented_template(), None);
    }

    #[test]
    fn test_host_save_failure_closes_scope() {
        let tpl = template();
        let mut implementation = InMemoryJob::implementation("impl", "tpl").failing_saves("read-only filesystem");

        let err = TemplatePropagator::default()
            .apply("tpl", &tpl.configuration(), &mut implementation, &ids(DEFAULT_EXCLUSIONS))
            .unwrap_err();

        assert!(matches!(err, EzTemplatesError::Host(_)));
        assert_no_open_scopes();
        assert!(!change::contains(
            &implementation.saveable_id().into(),
            ChangeContext::PERSISTENCE
        ));
    }

    /// Retains the description, then saves the way a host setter would.
    #[derive(Debug)]
    struct SavingDescription;

    impl Exclusion for SavingDescription {
        fn id(&self) -> &str {
            "saving-description"
        }

        fn description(&self) -> &str {
            "Retain description through a saving setter"
        }

        fn capture(&self, source: &dyn Job) -> std::result::Result<ExclusionSnapshot, FieldAccessError> {
            Ok(ExclusionSnapshot::new(self.id()).with_value("description", source.field("description")?))
        }

        fn restore(&self, target: &mut dyn Job, snapshot: ExclusionSnapshot) -> Result<()> {
            snapshot.ensure_owned_by(self.id())?;
            let value = snapshot.value("description").cloned().unwrap_or_default();
            target.force_field("description", value)?;
            assert_eq!(target.save()?, SaveOutcome::Suppressed);
            Ok(())
        }
    }

    #[test]
    fn test_saves_during_propagation_are_vetoed() {
        let registry = ExclusionRegistry::builtin();
        registry.register(Arc::new(SavingDescription));
        let propagator = TemplatePropagator::new(Arc::new(registry));

        let tpl = template();
        let mut implementation = InMemoryJob::implementation("impl", "tpl").with_field("description", json!("local"));

        let report = propagator
            .apply(
                "tpl",
                &tpl.configuration(),
                &mut implementation,
                &ids(&["ez-templates", "saving-description"]),
            )
            .unwrap();

        assert_eq!(report.applied_exclusions, vec!["ez-templates", "saving-description"]);
        assert_eq!(report.save, Some(SaveOutcome::Saved));
        assert_save_counts(&implementation, 1, 1);
        assert_eq!(implementation.persisted().unwrap()["description"], json!("local"));
        assert_no_open_scopes();
    }

    #[test]
    fn test_reconfigure_does_not_save() {
        let tpl = template();
        let mut implementation = InMemoryJob::implementation("impl", "tpl");
        let propagator = TemplatePropagator::default();

        let mut report = propagator
            .reconfigure("tpl", &tpl.configuration(), &mut implementation, &ids(DEFAULT_EXCLUSIONS))
            .unwrap();
        assert_eq!(report.save, None);
        assert_save_counts(&implementation, 0, 0);
        assert_eq!(implementation.field("scm").unwrap(), json!({"url": "git@example.com:tpl.git"}));

        propagator.save(&mut implementation, &mut report).unwrap();
        assert_eq!(report.save, Some(SaveOutcome::Saved));
        assert_save_counts(&implementation, 1, 0);
    }

    #[test]
    fn test_custom_registry() {
        let registry = ExclusionRegistry::new();
        registry.register(Arc::new(FieldExclusion::new("notes", "Retain notes", ["notes"])));
        let propagator = TemplatePropagator::new(Arc::new(registry));

        let tpl = template().with_field("notes", json!("template"));
        let mut implementation = InMemoryJob::implementation("impl", "tpl").with_field("notes", json!("mine"));

        propagator
            .apply("tpl", &tpl.configuration(), &mut implementation, &ids(&["notes"]))
            .unwrap();

        assert_eq!(implementation.field("notes").unwrap(), json!("mine"));
        assert_eq!(propagator.registry().len(), 1);
    }
}
