use serde::{Deserialize, Serialize};

/// Parameters of a layer graph, mirroring its shape.
///
/// Each record holds the flat parameter tensors of one node (weights then
/// bias for parameterized layers, nothing for structural ones) and one
/// child record per predecessor. A node reached twice in the same walk
/// (a shared predecessor in a diamond) is recorded in full only the first
/// time; later visits produce an empty record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightSnapshot {
    #[serde(default)]
    pub parameters: Vec<Vec<f64>>,
    #[serde(default)]
    pub children: Vec<WeightSnapshot>,
}

impl WeightSnapshot {
    /// True for the placeholder written on a repeat visit.
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.children.is_empty()
    }

    /// Total number of scalar parameters in the whole tree.
    pub fn num_parameters(&self) -> usize {
        self.parameters.iter().map(Vec::len).sum::<usize>()
            + self
                .children
                .iter()
                .map(WeightSnapshot::num_parameters)
                .sum::<usize>()
    }
}
