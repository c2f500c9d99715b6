//! Layering sort - groups steps into dependency layers

use crate::core::error::CycleError;
use crate::core::PipelineDefinition;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Steps that share a dependency depth and may run concurrently
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layer {
    pub index: usize,
    pub step_ids: Vec<String>,
}

/// Ordered layers for one definition, layer 0 first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    layers: Vec<Layer>,
}

impl ExecutionPlan {
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Index of the layer containing the given step
    pub fn layer_of(&self, step_id: &str) -> Option<usize> {
        self.layers
            .iter()
            .find(|layer| layer.step_ids.iter().any(|id| id == step_id))
            .map(|layer| layer.index)
    }

    /// Step ids per layer
    pub fn step_ids(&self) -> Vec<Vec<String>> {
        self.layers.iter().map(|l| l.step_ids.clone()).collect()
    }

    pub fn total_steps(&self) -> usize {
        self.layers.iter().map(|l| l.step_ids.len()).sum()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Linear order in which every dependency precedes its dependents
///
/// Depth-first over `depends_on` with an explicit stack, so deep chains do
/// not grow the call stack. Meeting an in-progress step means a cycle.
/// Dependencies that name no step are ignored here; structural validation
/// rejects them first.
pub fn topological_order(definition: &PipelineDefinition) -> Result<Vec<usize>, CycleError> {
    order_by_index(definition, &index_by_id(definition))
}

/// Position of each step id; the first occurrence wins
fn index_by_id(definition: &PipelineDefinition) -> HashMap<&str, usize> {
    let mut index = HashMap::with_capacity(definition.steps.len());
    for (i, step) in definition.steps.iter().enumerate() {
        index.entry(step.id.as_str()).or_insert(i);
    }
    index
}

fn order_by_index(
    definition: &PipelineDefinition,
    index: &HashMap<&str, usize>,
) -> Result<Vec<usize>, CycleError> {
    let steps = &definition.steps;
    let mut marks = vec![Mark::Unvisited; steps.len()];
    let mut order = Vec::with_capacity(steps.len());

    for root in 0..steps.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }

        // (step, next dependency to look at)
        let mut stack = vec![(root, 0usize)];
        marks[root] = Mark::InProgress;

        while let Some(frame) = stack.last_mut() {
            let (current, next_dep) = *frame;
            let deps = &steps[current].depends_on;

            if next_dep < deps.len() {
                frame.1 += 1;
                let Some(&dep) = index.get(deps[next_dep].as_str()) else {
                    continue;
                };
                match marks[dep] {
                    Mark::InProgress => {
                        return Err(CycleError {
                            step_id: steps[dep].id.clone(),
                        });
                    }
                    Mark::Unvisited => {
                        marks[dep] = Mark::InProgress;
                        stack.push((dep, 0));
                    }
                    Mark::Done => {}
                }
            } else {
                marks[current] = Mark::Done;
                order.push(current);
                stack.pop();
            }
        }
    }

    Ok(order)
}

/// Group the steps of a definition into layers by dependency depth
///
/// A step with no dependencies has depth 0; any other step has depth
/// `1 + max(depth of its dependencies)`. A step therefore always lands in a
/// later layer than everything it depends on.
pub fn layer(definition: &PipelineDefinition) -> Result<ExecutionPlan, CycleError> {
    let steps = &definition.steps;
    let index = index_by_id(definition);
    let order = order_by_index(definition, &index)?;

    // Dependencies come first in `order`, so their depth is already known
    let mut depth: Vec<Option<usize>> = vec![None; steps.len()];
    let mut layers: Vec<Layer> = Vec::new();

    for &current in &order {
        let d = steps[current]
            .depends_on
            .iter()
            .filter_map(|dep| index.get(dep.as_str()))
            .filter_map(|&dep| depth[dep])
            .max()
            .map_or(0, |max| max + 1);
        depth[current] = Some(d);

        while layers.len() <= d {
            layers.push(Layer {
                index: layers.len(),
                step_ids: Vec::new(),
            });
        }
        layers[d].step_ids.push(steps[current].id.clone());
    }

    debug!(
        pipeline = %definition.name,
        layers = layers.len(),
        "Computed execution layers"
    );

    Ok(ExecutionPlan { layers })
}
