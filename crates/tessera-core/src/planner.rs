//! End-to-end decomposition and allocation
//!
//! The planner runs the bounded retry loop: structural analysis and role
//! extraction happen once per run, then each attempt splits, partitions and
//! reduces the goal clusters with a growing exploration rate until the
//! subtask bound is met or the retry budget is spent.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::allocation::Allocator;
use crate::capability::CapabilityIndex;
use crate::config::Config;
use crate::decomposition::{Cluster, ClusterDecomposer, EpsilonSchedule, SearchState};
use crate::error::{Error, Result};
use crate::graph::{CausalGraph, GoalGraph, LandmarkExtractor, LandmarkTable, MAX_LANDMARK_DEPTH, MIN_LANDMARK_DEPTH};
use crate::merge::{ConstraintSet, ObjectiveScorer, Reduction, SubtaskCountReducer};
use crate::model::{Agent, PlanningModel};
use crate::report::{AttemptRecord, Diagnostics, Outcome, PlanReport, SubtaskRecord};
use crate::roles::{RoleAssignment, RoleExtractionEngine, RolePartitioner, RoleSchema, RoleTable};
use crate::subtask::{SubTask, verify_partition};

/// Structural analysis of a model
#[derive(Debug, Clone)]
pub struct Structure {
    pub causal: CausalGraph,
    pub landmarks: LandmarkTable,
    /// Depth used for landmark extraction, 0 when disabled
    pub landmark_depth: u8,
    pub graph: GoalGraph,
}

/// Per-run data shared by every attempt
struct RunContext<'a> {
    model: &'a PlanningModel,
    structure: &'a Structure,
    components: &'a [Cluster],
    roles: &'a RoleTable,
    constraints: &'a ConstraintSet,
    scorer: Option<&'a ObjectiveScorer>,
}

/// Goal decomposition and allocation driver
pub struct Planner {
    config: Config,
    schema: RoleSchema,
    cancel: Option<Arc<AtomicBool>>,
}

impl Planner {
    /// Validate the configuration against the role schema
    pub fn new(config: Config, schema: RoleSchema) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::Configuration(format!("{:#}", e)))?;
        if let Some(role) = &config.constraints.type_role {
            if schema.role(role).is_none() {
                return Err(Error::Configuration(format!(
                    "constraints.type_role '{}' is not a declared role",
                    role
                )));
            }
        }
        Ok(Self {
            config,
            schema,
            cancel: None,
        })
    }

    /// Stop between attempts once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn schema(&self) -> &RoleSchema {
        &self.schema
    }

    /// Causal graph, landmarks and goal graph, drawing the landmark depth from the run seed if needed
    pub fn structure(&self, model: &PlanningModel) -> Structure {
        let schedule = self.schedule();
        let mut rng = SearchState::initial(self.config.seed, &schedule).rng();
        self.build_structure(model, &mut rng)
    }

    /// Run decomposition and allocation
    pub fn plan(&self, model: &PlanningModel, agents: &[Agent]) -> Result<PlanReport> {
        self.schema.check_against(model)?;
        let constraints = ConstraintSet::compile(&self.config.constraints, self.config.merge.goal_limit(), model)?;

        let schedule = self.schedule();
        let mut state = SearchState::initial(self.config.seed, &schedule);

        let mut rng = state.rng();
        let structure = self.build_structure(model, &mut rng);
        let strategy = self.config.merge.strategy.map(|preset| preset.resolve(&mut rng));
        state = state.resume_after(&rng);

        let scorer = self.config.merge.uses_objectives().then(|| {
            let objectives = match strategy {
                Some(preset) => preset.objectives(),
                None => self.config.merge.objectives.clone(),
            };
            ObjectiveScorer::new(objectives, self.config.merge.randomness)
        });

        let engine = RoleExtractionEngine::new(&self.schema, model.facts(), self.config.roles.on_ambiguous);
        let roles = engine.assign_all(model.goals())?;
        let agent_roles = engine.agent_roles(agents)?;

        let decomposer = ClusterDecomposer::new(self.config.clustering.max_cluster_size);
        let components = decomposer.components(&structure.graph);

        let mut diagnostics = Diagnostics {
            goals: model.goals().len(),
            agents: agents.len(),
            causal_edges: structure.causal.edge_count(),
            goal_edges: structure.graph.edge_count(),
            components: components.len(),
            landmark_depth: structure.landmark_depth,
            strategy,
            roles: roles.diagnostics().clone(),
            ..Default::default()
        };

        info!(
            goals = diagnostics.goals,
            agents = diagnostics.agents,
            components = diagnostics.components,
            bound = self.config.retry.max_subtasks,
            "Starting decomposition"
        );

        let ctx = RunContext {
            model,
            structure: &structure,
            components: &components,
            roles: &roles,
            constraints: &constraints,
            scorer: scorer.as_ref(),
        };

        let k_max = self.config.retry.max_subtasks;
        loop {
            if self.is_cancelled() {
                info!(attempts = state.attempt, "Decomposition cancelled");
                let outcome = Outcome::Cancelled {
                    attempts: state.attempt,
                };
                return Ok(self.report(model, outcome, diagnostics));
            }

            let (reduction, record, next) = self.attempt(state, &decomposer, &ctx)?;
            diagnostics.rejections.add(&record.merges.rejections);
            diagnostics.attempts.push(record);
            state = next;

            let count = reduction.subtasks.len();
            if count <= k_max {
                info!(attempt = state.attempt, subtasks = count, "Subtask bound met");
                let outcome = self.finish(reduction.subtasks, model, agents, &agent_roles, state);
                return Ok(self.report(model, outcome, diagnostics));
            }

            if state.attempt >= self.config.retry.max_retries {
                warn!(
                    attempts = state.attempt + 1,
                    subtasks = count,
                    bound = k_max,
                    "Subtask bound unsatisfiable"
                );
                let outcome = Outcome::Unsatisfiable {
                    last_count: count,
                    k_max,
                    epsilon_schedule: schedule.values(state.attempt),
                };
                return Ok(self.report(model, outcome, diagnostics));
            }

            state = state.next_attempt(&schedule);
        }
    }

    fn schedule(&self) -> EpsilonSchedule {
        EpsilonSchedule::new(self.config.retry.epsilon_start, self.config.retry.epsilon_step)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn build_structure(&self, model: &PlanningModel, rng: &mut ChaCha8Rng) -> Structure {
        let causal = CausalGraph::build(model);
        let goals = model.goals();

        let (landmarks, landmark_depth) = if self.config.landmarks.enabled {
            let depth = match self.config.landmarks.max_depth {
                0 => rng.gen_range(MIN_LANDMARK_DEPTH..=MAX_LANDMARK_DEPTH),
                depth => depth,
            };
            (LandmarkExtractor::new(&causal, depth).extract_all(goals), depth)
        } else {
            (LandmarkTable::empty(goals.len()), 0)
        };

        let overlap = (self.config.landmarks.enabled && self.config.clustering.landmark_edges).then_some(&landmarks);
        let graph = GoalGraph::build(goals, &causal, overlap);

        debug!(
            causal_edges = causal.edge_count(),
            goal_edges = graph.edge_count(),
            landmark_depth,
            "Structure built"
        );

        Structure {
            causal,
            landmarks,
            landmark_depth,
            graph,
        }
    }

    /// One attempt: split, partition, reduce, then re-check the goal partition
    fn attempt(
        &self,
        state: SearchState,
        decomposer: &ClusterDecomposer,
        ctx: &RunContext<'_>,
    ) -> Result<(Reduction, AttemptRecord, SearchState)> {
        let goals = ctx.model.goals();
        let mut rng = state.rng();
        debug!(attempt = state.attempt, seed = state.seed(), word_pos = %state.stream_position(), "Attempt starting");

        let split = decomposer.split(ctx.components, state.epsilon, &mut rng);
        let partition = RolePartitioner::new(&self.schema, self.config.roles.on_missing).partition(
            &split.clusters,
            ctx.roles,
            &ctx.structure.landmarks,
            goals,
        )?;
        let partitioned = partition.subtasks.len();

        let mut reducer = SubtaskCountReducer::new(ctx.constraints, goals, self.config.retry.max_subtasks);
        if let Some(scorer) = ctx.scorer {
            reducer = reducer.with_scorer(scorer);
        }
        let reduction = reducer.reduce(partition.subtasks, &mut rng);
        verify_partition(&reduction.subtasks, goals.len())?;

        let record = AttemptRecord {
            attempt: state.attempt,
            epsilon: state.epsilon,
            clusters: split.clusters.len(),
            shuffled: split.shuffled,
            structural: split.structural,
            partitioned,
            subtasks: reduction.subtasks.len(),
            unresolved_singletons: partition.unresolved_singletons,
            merges: reduction.stats,
        };
        info!(
            attempt = record.attempt,
            epsilon = record.epsilon,
            clusters = record.clusters,
            shuffled = record.shuffled,
            structural = record.structural,
            partitioned = record.partitioned,
            subtasks = record.subtasks,
            "Attempt finished"
        );

        Ok((reduction, record, state.resume_after(&rng)))
    }

    fn finish(
        &self,
        subtasks: Vec<SubTask>,
        model: &PlanningModel,
        agents: &[Agent],
        agent_roles: &BTreeMap<String, RoleAssignment>,
        state: SearchState,
    ) -> Outcome {
        let capabilities = CapabilityIndex::build(model, agents);
        let allocator = Allocator::new(&capabilities, agent_roles, self.config.allocation.cost);
        let mut rng = state.rng();
        let allocation = allocator.allocate(&subtasks, model.goals(), &mut rng);

        let records = subtasks
            .into_iter()
            .map(|subtask| {
                let assignment = allocation.assignments.iter().find(|a| a.subtask_id == subtask.id);
                SubtaskRecord {
                    id: subtask.id,
                    goals: subtask.goals.iter().map(|&g| model.goals()[g].clone()).collect(),
                    goal_ids: subtask.goals,
                    landmarks: subtask.landmarks,
                    signature: subtask.signature,
                    agent: assignment.map(|a| a.agent.clone()),
                    cost: assignment.map(|a| a.cost),
                }
            })
            .collect();

        Outcome::Solved {
            subtasks: records,
            failures: allocation.failures,
        }
    }

    fn report(&self, model: &PlanningModel, outcome: Outcome, diagnostics: Diagnostics) -> PlanReport {
        PlanReport::new(model.domain(), model.problem(), self.config.seed, outcome, diagnostics)
    }
}
