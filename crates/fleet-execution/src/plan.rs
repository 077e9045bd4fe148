use std::collections::HashMap;

use crate::error::{ExecutionError, ExecutionResult, PortAssignment};
use crate::spec::{WorkerSpec, WorkerSpecBuilder};

/// The specifications of all workers of one fleet.
///
/// Building the plan checks every port of every worker against all others.
/// Two base ports that are closer together than the span covered by the
/// stride would otherwise collide across port kinds even though each kind
/// on its own is collision-free.
#[derive(Debug, Clone)]
pub struct FleetPlan {
    specs: Vec<WorkerSpec>,
}

impl FleetPlan {
    pub fn try_new(builder: &WorkerSpecBuilder) -> ExecutionResult<Self> {
        let specs = (0..builder.fleet_size())
            .map(|index| builder.build(index))
            .collect::<ExecutionResult<Vec<_>>>()?;
        let mut assignments: HashMap<u16, PortAssignment> = HashMap::new();
        for spec in &specs {
            for (kind, port) in spec.ports.iter() {
                let second = PortAssignment {
                    index: spec.index,
                    kind,
                };
                if let Some(first) = assignments.insert(port, second) {
                    return Err(ExecutionError::PortCollision {
                        port,
                        first,
                        second,
                    });
                }
            }
        }
        Ok(Self { specs })
    }

    pub fn specs(&self) -> &[WorkerSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
