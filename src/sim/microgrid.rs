//! Microgrid assembly and synchronized per-step orchestration.

use std::collections::BTreeMap;

use tracing::{trace, warn};

use crate::error::MicrogridError;
use crate::modules::types::{Action, BALANCE_TOLERANCE, Module, ModuleKey, StepOutput};
use crate::modules::unbalanced::UnbalancedModule;

/// A module paired with its naming within a microgrid.
///
/// `auto` derives the name from the module kind; duplicates of one name must
/// carry explicit distinguishing indices.
#[derive(Debug, Clone)]
pub struct NamedModule {
    name: Option<String>,
    index: Option<usize>,
    module: Module,
}

impl NamedModule {
    /// Names the module after its kind (`"battery"`, `"load"`, ...).
    pub fn auto(module: Module) -> Self {
        Self {
            name: None,
            index: None,
            module,
        }
    }

    /// Explicit name, index 0.
    pub fn named(name: impl Into<String>, module: Module) -> Self {
        Self {
            name: Some(name.into()),
            index: None,
            module,
        }
    }

    /// Explicit `(name, index)` pair for duplicates sharing a name.
    pub fn indexed(name: impl Into<String>, index: usize, module: Module) -> Self {
        Self {
            name: Some(name.into()),
            index: Some(index),
            module,
        }
    }

    /// The name this module will carry in the microgrid.
    pub fn effective_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.module.kind_name())
    }
}

/// Chosen actions for one step, keyed by controllable module.
pub type ActionMap = BTreeMap<ModuleKey, Action>;

/// Realized per-module outputs of one executed step.
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// Step index this record was produced at.
    pub step: usize,
    /// Per-module realized outputs, in module insertion order (slack last).
    pub outputs: Vec<(ModuleKey, StepOutput)>,
    /// Imbalance before slack absorption (production minus consumption).
    pub residual: f64,
    /// Total cost of the step including slack penalties.
    pub total_cost: f64,
}

/// A named collection of modules sharing one step counter.
///
/// Owns zero or one slack module that absorbs residual imbalance; without
/// it, any imbalance beyond tolerance is a balance error. All modules share
/// the synchronized counter and the episode ends at the shortest exogenous
/// series.
#[derive(Debug, Clone)]
pub struct Microgrid {
    modules: Vec<(ModuleKey, Module)>,
    current_step: usize,
}

impl Microgrid {
    /// Builds a microgrid from named modules, auto-appending a default slack
    /// module unless disabled or one was supplied explicitly.
    ///
    /// # Errors
    ///
    /// `Configuration` on key collisions (same name without explicit
    /// distinguishing indices, or identical explicit keys) and when no
    /// module carries forecast data.
    pub fn new(
        modules: Vec<NamedModule>,
        add_unbalanced_module: bool,
    ) -> Result<Self, MicrogridError> {
        let mut keyed: Vec<(ModuleKey, Module)> = Vec::with_capacity(modules.len() + 1);
        for named in modules {
            let key = ModuleKey::new(named.effective_name(), named.index.unwrap_or(0));
            if let Some((existing, _)) = keyed.iter().find(|(k, _)| *k == key) {
                let reason = if named.index.is_some() {
                    format!("duplicate module key {existing}")
                } else {
                    format!(
                        "module name '{}' collides; provide explicit indices for duplicates",
                        key.name
                    )
                };
                return Err(MicrogridError::Configuration(reason));
            }
            keyed.push((key, named.module));
        }

        let has_slack = keyed
            .iter()
            .any(|(_, m)| matches!(m, Module::Unbalanced(_)));
        if add_unbalanced_module && !has_slack {
            keyed.push((
                ModuleKey::new("unbalanced", 0),
                Module::Unbalanced(UnbalancedModule::default()),
            ));
        }

        let grid = Self {
            modules: keyed,
            current_step: 0,
        };
        if grid.modules.iter().all(|(_, m)| m.series_len().is_none()) {
            return Err(MicrogridError::Configuration(
                "microgrid has no forecast data: add at least one time-series module".into(),
            ));
        }
        Ok(grid)
    }

    /// Starts a builder over a module catalog.
    pub fn builder(catalog: Vec<NamedModule>) -> MicrogridBuilder {
        MicrogridBuilder::new(catalog)
    }

    /// Modules in insertion order.
    pub fn modules(&self) -> impl Iterator<Item = &(ModuleKey, Module)> {
        self.modules.iter()
    }

    /// Looks up a module by `(name, index)`.
    pub fn module(&self, name: &str, index: usize) -> Option<&Module> {
        self.modules
            .iter()
            .find(|(k, _)| k.name == name && k.index == index)
            .map(|(_, m)| m)
    }

    /// Keys of all controllable modules, in insertion order.
    pub fn controllable_keys(&self) -> Vec<ModuleKey> {
        self.modules
            .iter()
            .filter(|(_, m)| m.is_controllable())
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// The shared step counter.
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Episode length: the shortest exogenous series among all modules.
    pub fn episode_len(&self) -> usize {
        self.modules
            .iter()
            .filter_map(|(_, m)| m.series_len())
            .min()
            .unwrap_or(0)
    }

    /// Whether the forecast data has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.current_step >= self.episode_len()
    }

    /// Whether a slack module is present.
    pub fn has_slack(&self) -> bool {
        self.modules
            .iter()
            .any(|(_, m)| matches!(m, Module::Unbalanced(_)))
    }

    /// Advances every module by one step.
    ///
    /// Controllable modules step with their entry from `actions`; exogenous
    /// modules step on their natural forecast value. The net residual routes
    /// to the slack module when present; otherwise any residual beyond
    /// tolerance is a `Balance` error.
    ///
    /// The step is transactional: modules run against a staged copy that is
    /// committed only once every module succeeded and the balance holds, so
    /// a failure leaves all module state and counters untouched and the same
    /// step can be retried with corrected actions.
    ///
    /// # Errors
    ///
    /// `EpisodeExhausted` past the episode length, `Configuration` on
    /// missing or unknown action keys, `InfeasibleAction` from any module,
    /// `Balance` on an unabsorbed residual.
    pub fn step(&mut self, actions: &ActionMap) -> Result<StepRecord, MicrogridError> {
        if self.is_exhausted() {
            return Err(MicrogridError::EpisodeExhausted {
                steps: self.current_step,
            });
        }

        for key in actions.keys() {
            match self.modules.iter().find(|(k, _)| k == key) {
                None => {
                    return Err(MicrogridError::Configuration(format!(
                        "action for unknown module {key}"
                    )));
                }
                Some((_, m)) if !m.is_controllable() => {
                    return Err(MicrogridError::Configuration(format!(
                        "action for non-controllable module {key}"
                    )));
                }
                Some(_) => {}
            }
        }

        let step = self.current_step;
        let mut staged = self.modules.clone();
        let mut outputs: Vec<(ModuleKey, StepOutput)> = Vec::with_capacity(staged.len());
        let mut provided = 0.0;
        let mut absorbed = 0.0;
        let mut total_cost = 0.0;
        let mut slack_idx = None;

        for (idx, (key, module)) in staged.iter_mut().enumerate() {
            if matches!(module, Module::Unbalanced(_)) {
                slack_idx = Some(idx);
                continue;
            }
            let action = if module.is_controllable() {
                *actions
                    .get(key)
                    .ok_or_else(|| {
                        MicrogridError::Configuration(format!(
                            "missing action for controllable module {key}"
                        ))
                    })?
            } else {
                Action::None
            };
            let out = module.step(action).map_err(|e| match e {
                MicrogridError::InfeasibleAction { reason, .. } => {
                    MicrogridError::InfeasibleAction {
                        module: key.to_string(),
                        reason,
                    }
                }
                other => other,
            })?;
            provided += out.provided;
            absorbed += out.absorbed;
            total_cost += out.cost;
            outputs.push((key.clone(), out));
        }

        let residual = provided - absorbed;
        match slack_idx {
            Some(idx) => {
                if residual.abs() > 1e-3 {
                    warn!(step, residual, "slack module absorbing large imbalance");
                } else {
                    trace!(step, residual, "slack module absorbing residual");
                }
                let (key, module) = &mut staged[idx];
                let Module::Unbalanced(slack) = module else {
                    unreachable!("slack index points at the unbalanced module");
                };
                let out = slack.absorb(residual);
                total_cost += out.cost;
                outputs.push((key.clone(), out));
            }
            None => {
                if residual.abs() > BALANCE_TOLERANCE {
                    return Err(MicrogridError::Balance { step, residual });
                }
            }
        }

        self.modules = staged;
        self.current_step += 1;
        Ok(StepRecord {
            step,
            outputs,
            residual,
            total_cost,
        })
    }
}

/// Keyword-style microgrid construction over a module catalog.
///
/// `remove_modules` and `retain_only` are mutually exclusive; removal of an
/// unknown name is a configuration error. Additional modules merge in after
/// removal.
#[derive(Debug, Clone)]
pub struct MicrogridBuilder {
    catalog: Vec<NamedModule>,
    remove: Vec<String>,
    retain: Option<Vec<String>>,
    additional: Vec<NamedModule>,
    add_unbalanced: bool,
}

impl MicrogridBuilder {
    pub fn new(catalog: Vec<NamedModule>) -> Self {
        Self {
            catalog,
            remove: Vec::new(),
            retain: None,
            additional: Vec::new(),
            add_unbalanced: true,
        }
    }

    /// Excludes the named modules from the catalog.
    pub fn remove_modules<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remove.extend(names.into_iter().map(Into::into));
        self
    }

    /// Keeps only the named catalog modules.
    pub fn retain_only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retain = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Merges extra modules in after removal.
    pub fn additional_modules(mut self, modules: Vec<NamedModule>) -> Self {
        self.additional.extend(modules);
        self
    }

    /// Controls auto-injection of the slack module (default enabled).
    pub fn add_unbalanced_module(mut self, add: bool) -> Self {
        self.add_unbalanced = add;
        self
    }

    /// Resolves the catalog and builds the microgrid.
    pub fn build(self) -> Result<Microgrid, MicrogridError> {
        if self.retain.is_some() && !self.remove.is_empty() {
            return Err(MicrogridError::Configuration(
                "use either remove_modules or retain_only, not both".into(),
            ));
        }

        let mut kept: Vec<NamedModule> = match &self.retain {
            Some(retain) => self
                .catalog
                .into_iter()
                .filter(|m| retain.iter().any(|n| n == m.effective_name()))
                .collect(),
            None => {
                let mut catalog = self.catalog;
                for name in &self.remove {
                    let before = catalog.len();
                    catalog.retain(|m| m.effective_name() != name);
                    if catalog.len() == before {
                        return Err(MicrogridError::Configuration(format!(
                            "module '{name}' not in catalog"
                        )));
                    }
                }
                catalog
            }
        };
        kept.extend(self.additional);

        Microgrid::new(kept, self.add_unbalanced)
    }
}
