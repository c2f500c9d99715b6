//! Structural checks: step-level schedules, duplicate ids, dangling dependencies

use crate::core::error::{StructuralError, StructuralViolation, ViolationKind};
use crate::core::PipelineDefinition;
use std::collections::HashSet;

/// Check that the definition describes a legal graph
///
/// Runs every check in order (schedules, duplicates, dependencies) and
/// reports all violations together. Cycles are detected later, by the
/// layering sort.
pub fn validate_structure(definition: &PipelineDefinition) -> Result<(), StructuralError> {
    let mut violations = Vec::new();

    for step in &definition.steps {
        if step.schedule.is_some() {
            violations.push(StructuralViolation {
                step_id: step.id.clone(),
                kind: ViolationKind::StepSchedule,
            });
        }
    }

    let mut ids = HashSet::new();
    let mut reported = HashSet::new();
    for step in &definition.steps {
        if !ids.insert(step.id.as_str()) && reported.insert(step.id.as_str()) {
            violations.push(StructuralViolation {
                step_id: step.id.clone(),
                kind: ViolationKind::DuplicateId,
            });
        }
    }

    for step in &definition.steps {
        for dep in &step.depends_on {
            if !ids.contains(dep.as_str()) {
                violations.push(StructuralViolation {
                    step_id: step.id.clone(),
                    kind: ViolationKind::MissingDependency {
                        dependency: dep.clone(),
                    },
                });
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(StructuralError { violations })
    }
}
