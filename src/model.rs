//! Reaction network model: ordered species and reactions plus the static
//! dependency graph used for incremental propensity updates.

use std::collections::HashMap;

use crate::error::SimError;

/// A species with a name and a non-negative initial count.
#[derive(Clone, Debug)]
pub struct Species {
    pub name: String,
    pub initial: i32,
}

/// One reactant slot of a reaction: which species is consumed and with what
/// stoichiometric coefficient.
#[derive(Clone, Debug)]
pub struct Reactant {
    pub species: usize,
    pub count: i32,
}

/// Sparse net-change entry applied to the state vector when a reaction fires.
#[derive(Clone, Debug)]
pub struct SpeciesDelta {
    pub species: usize,
    pub delta: i32,
}

/// An immutable reaction: rate constant, reactant stoichiometry, and the net
/// state change derived from reactants and products.
#[derive(Clone, Debug)]
pub struct Reaction {
    pub name: String,
    pub rate: f64,
    pub reactants: Vec<Reactant>,
    pub deltas: Vec<SpeciesDelta>,
}

/// A finalized reaction network. Construct with [`Network::builder`]; the
/// simulation layer never mutates it.
#[derive(Clone, Debug)]
pub struct Network {
    name: String,
    species: Vec<Species>,
    reactions: Vec<Reaction>,
    species_index: HashMap<String, usize>,
    dependencies: Vec<Vec<usize>>,
}

impl Network {
    pub fn builder(name: impl Into<String>) -> NetworkBuilder {
        NetworkBuilder {
            name: name.into(),
            species: Vec::new(),
            reactions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n_species(&self) -> usize {
        self.species.len()
    }

    pub fn n_reactions(&self) -> usize {
        self.reactions.len()
    }

    pub fn species(&self) -> &[Species] {
        &self.species
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    /// Name → index lookup for species.
    pub fn species_index(&self) -> &HashMap<String, usize> {
        &self.species_index
    }

    /// Fresh state vector holding the initial counts.
    pub fn initial_state(&self) -> Vec<i32> {
        self.species.iter().map(|s| s.initial).collect()
    }

    /// Reactions whose propensity must be recomputed after `reaction` fires.
    /// The set always contains `reaction` itself.
    pub fn dependencies(&self, reaction: usize) -> &[usize] {
        &self.dependencies[reaction]
    }

    /// Apply the net change vector of `reaction` to `state`.
    #[inline]
    pub(crate) fn apply_deltas(&self, reaction: usize, state: &mut [i32]) {
        for delta in &self.reactions[reaction].deltas {
            state[delta.species] += delta.delta;
        }
    }
}

struct ReactionDef {
    name: String,
    rate: f64,
    reactants: Vec<(String, i32)>,
    products: Vec<(String, i32)>,
}

/// Accumulates species and reaction definitions; `build` validates everything
/// at once and produces an immutable [`Network`].
pub struct NetworkBuilder {
    name: String,
    species: Vec<Species>,
    reactions: Vec<ReactionDef>,
}

impl NetworkBuilder {
    pub fn species(mut self, name: impl Into<String>, initial: i32) -> Self {
        self.species.push(Species {
            name: name.into(),
            initial,
        });
        self
    }

    /// Define a reaction from `(species, coefficient)` lists of reactants and
    /// products. Zero-order production uses an empty reactant list; pure
    /// decay uses an empty product list.
    pub fn reaction(
        mut self,
        name: impl Into<String>,
        rate: f64,
        reactants: &[(&str, i32)],
        products: &[(&str, i32)],
    ) -> Self {
        self.reactions.push(ReactionDef {
            name: name.into(),
            rate,
            reactants: reactants
                .iter()
                .map(|&(s, c)| (s.to_string(), c))
                .collect(),
            products: products
                .iter()
                .map(|&(s, c)| (s.to_string(), c))
                .collect(),
        });
        self
    }

    pub fn build(self) -> Result<Network, SimError> {
        if self.species.is_empty() || self.reactions.is_empty() {
            return Err(SimError::Model(
                "a network requires at least one species and one reaction".into(),
            ));
        }

        let mut species_index = HashMap::with_capacity(self.species.len());
        for (idx, species) in self.species.iter().enumerate() {
            if species.initial < 0 {
                return Err(SimError::Model(format!(
                    "species '{}' has negative initial count {}",
                    species.name, species.initial
                )));
            }
            if species_index.insert(species.name.clone(), idx).is_some() {
                return Err(SimError::Model(format!(
                    "duplicate species name '{}'",
                    species.name
                )));
            }
        }

        let n_species = self.species.len();
        let mut reactions = Vec::with_capacity(self.reactions.len());
        for def in self.reactions {
            if !(def.rate >= 0.0) || !def.rate.is_finite() {
                return Err(SimError::Model(format!(
                    "reaction '{}' has invalid rate constant {}",
                    def.name, def.rate
                )));
            }
            let mut net = vec![0i32; n_species];
            let mut reactants = Vec::with_capacity(def.reactants.len());
            for (species_name, count) in &def.reactants {
                let idx = resolve(&species_index, species_name, &def.name)?;
                if *count <= 0 {
                    return Err(SimError::Model(format!(
                        "reaction '{}' has non-positive reactant coefficient for '{}'",
                        def.name, species_name
                    )));
                }
                net[idx] -= count;
                reactants.push(Reactant {
                    species: idx,
                    count: *count,
                });
            }
            for (species_name, count) in &def.products {
                let idx = resolve(&species_index, species_name, &def.name)?;
                if *count <= 0 {
                    return Err(SimError::Model(format!(
                        "reaction '{}' has non-positive product coefficient for '{}'",
                        def.name, species_name
                    )));
                }
                net[idx] += count;
            }
            let deltas = net
                .iter()
                .enumerate()
                .filter_map(|(species, &delta)| {
                    (delta != 0).then_some(SpeciesDelta { species, delta })
                })
                .collect();
            reactions.push(Reaction {
                name: def.name,
                rate: def.rate,
                reactants,
                deltas,
            });
        }

        let dependencies = build_dependency_graph(n_species, &reactions);

        Ok(Network {
            name: self.name,
            species: self.species,
            reactions,
            species_index,
            dependencies,
        })
    }
}

fn resolve(
    species_index: &HashMap<String, usize>,
    species_name: &str,
    reaction_name: &str,
) -> Result<usize, SimError> {
    species_index.get(species_name).copied().ok_or_else(|| {
        SimError::Model(format!(
            "reaction '{}' references unknown species '{}'",
            reaction_name, species_name
        ))
    })
}

/// For each reaction, the set of reactions whose propensity depends on a
/// species touched by its net change vector.
fn build_dependency_graph(n_species: usize, reactions: &[Reaction]) -> Vec<Vec<usize>> {
    let mut species_dependents: Vec<Vec<usize>> = vec![Vec::new(); n_species];
    for (idx, reaction) in reactions.iter().enumerate() {
        for reactant in &reaction.reactants {
            species_dependents[reactant.species].push(idx);
        }
    }

    let mut dependencies = vec![Vec::new(); reactions.len()];
    let mut visit_markers = vec![0usize; reactions.len()];
    let mut stamp = 1usize;
    for (r, deps) in dependencies.iter_mut().enumerate() {
        if stamp == usize::MAX {
            visit_markers.fill(0);
            stamp = 1;
        }
        let mark = stamp;
        stamp += 1;

        visit_markers[r] = mark;
        deps.push(r);
        for delta in &reactions[r].deltas {
            for &dep in &species_dependents[delta.species] {
                if visit_markers[dep] != mark {
                    visit_markers[dep] = mark;
                    deps.push(dep);
                }
            }
        }
    }
    dependencies
}
