//! Horizon problem construction: the current microgrid state plus each
//! module's forecast window, assembled into a linear program.

use good_lp::{Constraint, Expression, ProblemVariables, Variable, constraint, variable, variables};

use crate::error::MicrogridError;
use crate::modules::types::{Module, ModuleKey};
use crate::sim::microgrid::Microgrid;

/// Objective epsilon separating equally-priced dispatch options.
pub const TIE_BREAK_EPS: f64 = 1e-6;

/// Deterministic preference order among module kinds.
///
/// Among equally-cheap feasible dispatch options the solver is free to pick
/// any vertex; ranking each kind's decision variables with a tiny objective
/// epsilon pins a reproducible choice. Earlier kinds are preferred.
#[derive(Debug, Clone)]
pub struct TieBreak {
    order: Vec<String>,
}

impl Default for TieBreak {
    fn default() -> Self {
        Self::new(["renewable", "battery", "genset", "grid", "unbalanced"])
    }
}

impl TieBreak {
    pub fn new<I, S>(order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            order: order.into_iter().map(Into::into).collect(),
        }
    }

    /// Epsilon added to every decision variable of the given kind.
    pub fn epsilon(&self, kind: &str) -> f64 {
        let rank = self
            .order
            .iter()
            .position(|n| n == kind)
            .unwrap_or(self.order.len());
        TIE_BREAK_EPS * (rank + 1) as f64
    }
}

/// MPC tuning knobs.
#[derive(Debug, Clone)]
pub struct MpcOptions {
    /// Number of future steps considered per solve (>= 1).
    pub horizon: usize,
    /// Per-offset objective discount in `(0, 1]`.
    pub discount: f64,
    pub tie_break: TieBreak,
}

impl Default for MpcOptions {
    fn default() -> Self {
        Self {
            horizon: 1,
            discount: 1.0,
            tie_break: TieBreak::default(),
        }
    }
}

/// Offset-0 decision variable handles for one controllable module, kept for
/// extraction after the solve.
#[derive(Debug, Clone, Copy)]
pub(crate) enum DecisionVars {
    Battery {
        charge: Variable,
        discharge: Variable,
        max_charge: f64,
        max_discharge: f64,
    },
    Genset {
        production: Variable,
        running_min: f64,
        running_max: f64,
    },
    Renewable {
        used: Variable,
        availability: f64,
    },
    Grid {
        import: Variable,
        export: Variable,
        max_import: f64,
        max_export: f64,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct ModuleEntry {
    pub(crate) key: ModuleKey,
    pub(crate) decision: DecisionVars,
}

/// A transient horizon LP: built fresh each control step from the live
/// microgrid state, consumed by the solver adapter, then discarded.
pub struct HorizonProblem {
    /// Effective horizon: requested horizon clipped to the remaining data.
    pub horizon: usize,
    pub(crate) vars: ProblemVariables,
    pub(crate) objective: Expression,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) entries: Vec<ModuleEntry>,
    n_variables: usize,
}

impl std::fmt::Debug for HorizonProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HorizonProblem")
            .field("horizon", &self.horizon)
            .field("n_variables", &self.n_variables)
            .field("n_constraints", &self.constraints.len())
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl HorizonProblem {
    /// Number of decision variables (including projected-state variables).
    pub fn n_variables(&self) -> usize {
        self.n_variables
    }

    /// Number of constraints beyond variable bounds.
    pub fn n_constraints(&self) -> usize {
        self.constraints.len()
    }
}

/// Builds the horizon LP for the microgrid's current state.
///
/// One balance equality per horizon offset couples all modules; batteries
/// contribute a projected charge-level chain starting at the live level, so
/// the lookahead never mutates real state. Gensets use the continuous
/// commitment relaxation of their off-or-running band; their `start_up_cost`
/// is charged only at realization and not priced into the objective, so
/// planned cost can undershoot realized cost on an off-to-on transition.
///
/// # Errors
///
/// `EpisodeExhausted` when no forecast data remains.
pub fn build_horizon_problem(
    microgrid: &Microgrid,
    options: &MpcOptions,
) -> Result<HorizonProblem, MicrogridError> {
    let start = microgrid.current_step();
    let remaining = microgrid.episode_len().saturating_sub(start);
    if remaining == 0 {
        return Err(MicrogridError::EpisodeExhausted { steps: start });
    }
    let horizon = options.horizon.min(remaining);

    let mut vars = variables!();
    let mut n_variables = 0;
    let mut objective = Expression::from(0.0);
    let mut constraints: Vec<Constraint> = Vec::new();
    let mut entries: Vec<ModuleEntry> = Vec::new();
    // Net balance expression per offset; constrained to zero at the end.
    let mut balance: Vec<Expression> = vec![Expression::from(0.0); horizon];

    for (key, module) in microgrid.modules() {
        let eps = options.tie_break.epsilon(module.kind_name());
        match module {
            Module::Battery(b) => {
                let inv_eff = 1.0 / b.efficiency;
                let mut level = Expression::from(b.charge_level());
                let mut first: Option<(Variable, Variable)> = None;
                for t in 0..horizon {
                    let disc = options.discount.powi(t as i32);
                    let charge = vars.add(variable().min(0.0).max(b.max_charge));
                    let discharge = vars.add(variable().min(0.0).max(b.max_discharge));
                    let next = vars.add(variable().min(b.min_capacity).max(b.max_capacity));
                    n_variables += 3;
                    first.get_or_insert((charge, discharge));

                    // level[t+1] = level[t] + eff * charge - discharge / eff
                    let recursion = Expression::from(next)
                        - level.clone()
                        - b.efficiency * charge
                        + inv_eff * discharge;
                    constraints.push(constraint!(recursion == 0.0));
                    level = Expression::from(next);

                    balance[t] = balance[t].clone() + discharge - charge;
                    objective = objective
                        + (disc * b.marginal_cost + eps) * charge
                        + (disc * b.marginal_cost + eps) * discharge;
                }
                let (charge, discharge) = first.expect("horizon >= 1");
                entries.push(ModuleEntry {
                    key: key.clone(),
                    decision: DecisionVars::Battery {
                        charge,
                        discharge,
                        max_charge: b.max_charge,
                        max_discharge: b.max_discharge,
                    },
                });
            }
            Module::Genset(g) => {
                let mut first: Option<Variable> = None;
                for t in 0..horizon {
                    let disc = options.discount.powi(t as i32);
                    let production = vars.add(variable().min(0.0).max(g.running_max_production));
                    let commitment = vars.add(variable().min(0.0).max(1.0));
                    n_variables += 2;
                    first.get_or_insert(production);

                    // Continuous relaxation of the off-or-running band.
                    constraints.push(constraint!(
                        production - g.running_min_production * commitment >= 0.0
                    ));
                    constraints.push(constraint!(
                        production - g.running_max_production * commitment <= 0.0
                    ));

                    balance[t] = balance[t].clone() + production;
                    objective = objective + (disc * g.genset_cost + eps) * production;
                }
                entries.push(ModuleEntry {
                    key: key.clone(),
                    decision: DecisionVars::Genset {
                        production: first.expect("horizon >= 1"),
                        running_min: g.running_min_production,
                        running_max: g.running_max_production,
                    },
                });
            }
            Module::Renewable(r) => {
                let availability = r.forecast(horizon);
                if r.curtailable {
                    let mut first: Option<Variable> = None;
                    for t in 0..horizon {
                        let avail = availability.get(t).copied().unwrap_or(0.0);
                        let used = vars.add(variable().min(0.0).max(avail));
                        n_variables += 1;
                        first.get_or_insert(used);

                        balance[t] = balance[t].clone() + used;
                        objective = objective + eps * used;
                    }
                    entries.push(ModuleEntry {
                        key: key.clone(),
                        decision: DecisionVars::Renewable {
                            used: first.expect("horizon >= 1"),
                            availability: availability.first().copied().unwrap_or(0.0),
                        },
                    });
                } else {
                    for t in 0..horizon {
                        let avail = availability.get(t).copied().unwrap_or(0.0);
                        balance[t] = balance[t].clone() + avail;
                    }
                }
            }
            Module::Load(l) => {
                let demand = l.forecast(horizon);
                for t in 0..horizon {
                    balance[t] = balance[t].clone() - demand.get(t).copied().unwrap_or(0.0);
                }
            }
            Module::Grid(g) => {
                let import_price = g.import_price_forecast(horizon);
                let export_price = g.export_price_forecast(horizon);
                let mut first: Option<(Variable, Variable)> = None;
                for t in 0..horizon {
                    let disc = options.discount.powi(t as i32);
                    let import = vars.add(variable().min(0.0).max(g.max_import));
                    let export = vars.add(variable().min(0.0).max(g.max_export));
                    n_variables += 2;
                    first.get_or_insert((import, export));

                    balance[t] = balance[t].clone() + import - export;
                    let buy = import_price.get(t).copied().unwrap_or(0.0);
                    let sell = export_price.get(t).copied().unwrap_or(0.0);
                    objective = objective
                        + (disc * buy + eps) * import
                        + (-disc * sell + eps) * export;
                }
                let (import, export) = first.expect("horizon >= 1");
                entries.push(ModuleEntry {
                    key: key.clone(),
                    decision: DecisionVars::Grid {
                        import,
                        export,
                        max_import: g.max_import,
                        max_export: g.max_export,
                    },
                });
            }
            Module::Unbalanced(u) => {
                for t in 0..horizon {
                    let disc = options.discount.powi(t as i32);
                    let loss_load = vars.add(variable().min(0.0));
                    let overgeneration = vars.add(variable().min(0.0));
                    n_variables += 2;

                    balance[t] = balance[t].clone() + loss_load - overgeneration;
                    objective = objective
                        + (disc * u.loss_load_cost + eps) * loss_load
                        + (disc * u.overgeneration_cost + eps) * overgeneration;
                }
            }
        }
    }

    // One exact balance equality per horizon offset.
    for net in balance {
        constraints.push(constraint!(net == 0.0));
    }

    Ok(HorizonProblem {
        horizon,
        vars,
        objective,
        constraints,
        entries,
        n_variables,
    })
}
