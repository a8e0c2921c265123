// Graph — arena of layers connected into a DAG
//
// Layers are stored in a Vec and referred to by `LayerId` handles. Edges
// always point from an older node to a newer one (a node can only be
// connected to predecessors that already exist) so node ids are a
// topological order for free: walking ids downwards visits every
// successor before its predecessors.
//
// MEMOIZATION:
//
// Every node caches, per pass, its pre-activation, its activated output,
// its derivative view and its accumulated incoming gradient. Instead of
// clearing flags on every node, the graph carries a pass counter and each
// cache remembers the pass it was filled in. `reset` is a counter bump.
// Snapshot walks work the same way with a separate walk counter, so a node
// shared by several successors is only visited once per walk.
//
// ONE TRAINING STEP:
//
//   reset -> output(sink) -> set_dif(sink, loss) -> dif(sink) -> fit(sink)
//
// `dif` processes the sink's ancestors from the newest id down. By the time
// a node is reached all of its successors have already added their
// contribution, so fan-in gradients are complete before they propagate.

use axon_core::{misuse, Error, Result, Shape, Tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::layer::Layer;
use crate::snapshot::WeightSnapshot;

/// Handle to a node in a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(usize);

impl LayerId {
    /// Position of the node in insertion order.
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct Stamped {
    pass: u64,
    value: Tensor,
}

fn fresh(slot: &Option<Stamped>, pass: u64) -> Option<&Tensor> {
    match slot {
        Some(s) if s.pass == pass => Some(&s.value),
        _ => None,
    }
}

#[derive(Debug)]
struct Node {
    layer: Box<dyn Layer>,
    preds: Vec<LayerId>,
    trainable: bool,
    neta: Option<Stamped>,
    output: Option<Stamped>,
    derivative: Option<Stamped>,
    delta: Option<Stamped>,
    walk: u64,
}

/// Owner of every layer in a network and of the RNG used to initialise them.
#[derive(Debug)]
pub struct Graph {
    nodes: Vec<Node>,
    pass: u64,
    walk: u64,
    rng: StdRng,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// An empty graph whose parameters are seeded from OS entropy.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// An empty graph with reproducible parameter initialisation.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Graph {
            nodes: Vec::new(),
            pass: 1,
            walk: 1,
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: LayerId) -> bool {
        id.0 < self.nodes.len()
    }

    fn index(&self, id: LayerId) -> Result<usize> {
        if self.contains(id) {
            Ok(id.0)
        } else {
            Err(Error::misuse(format!(
                "layer {id} does not exist in a graph of {} layers",
                self.nodes.len()
            )))
        }
    }

    // Construction

    /// Add a root layer. Its input is the external tensor passed to
    /// [`Graph::output`].
    pub fn add_root(&mut self, layer: impl Layer + 'static) -> Result<LayerId> {
        self.add_boxed_root(Box::new(layer))
    }

    pub fn add_boxed_root(&mut self, mut layer: Box<dyn Layer>) -> Result<LayerId> {
        layer.build(&mut self.rng)?;
        Ok(self.push(layer, Vec::new()))
    }

    /// Add a layer fed by `preds`, inferring its input shape from them.
    pub fn connect(&mut self, layer: impl Layer + 'static, preds: &[LayerId]) -> Result<LayerId> {
        self.connect_boxed(Box::new(layer), preds)
    }

    pub fn connect_boxed(&mut self, mut layer: Box<dyn Layer>, preds: &[LayerId]) -> Result<LayerId> {
        if preds.is_empty() {
            misuse!(
                "{} needs at least one predecessor; use add_root for roots",
                layer.name()
            );
        }
        let shapes = preds
            .iter()
            .map(|&p| self.index(p).map(|i| self.nodes[i].layer.out_shape()))
            .collect::<Result<Vec<_>>>()?;
        layer.connect(&shapes, &mut self.rng)?;
        Ok(self.push(layer, preds.to_vec()))
    }

    fn push(&mut self, layer: Box<dyn Layer>, preds: Vec<LayerId>) -> LayerId {
        let id = LayerId(self.nodes.len());
        log::debug!(
            "graph: added {} {} with output {} <- {:?}",
            layer.name(),
            id,
            layer.out_shape(),
            preds
        );
        self.nodes.push(Node {
            layer,
            preds,
            trainable: true,
            neta: None,
            output: None,
            derivative: None,
            delta: None,
            walk: 0,
        });
        id
    }

    // Inspection

    pub fn layer(&self, id: LayerId) -> Result<&dyn Layer> {
        let i = self.index(id)?;
        Ok(self.nodes[i].layer.as_ref())
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Result<&mut dyn Layer> {
        let i = self.index(id)?;
        Ok(self.nodes[i].layer.as_mut())
    }

    pub fn predecessors(&self, id: LayerId) -> Result<&[LayerId]> {
        let i = self.index(id)?;
        Ok(&self.nodes[i].preds)
    }

    pub fn out_shape(&self, id: LayerId) -> Result<Shape> {
        Ok(self.layer(id)?.out_shape())
    }

    pub fn set_trainable(&mut self, id: LayerId, trainable: bool) -> Result<()> {
        let i = self.index(id)?;
        self.nodes[i].trainable = trainable;
        Ok(())
    }

    pub fn is_trainable(&self, id: LayerId) -> Result<bool> {
        Ok(self.nodes[self.index(id)?].trainable)
    }

    /// Pre-activation computed in the current pass, if any.
    pub fn cached_pre_activation(&self, id: LayerId) -> Option<&Tensor> {
        self.nodes.get(id.0).and_then(|n| fresh(&n.neta, self.pass))
    }

    /// Activated output computed in the current pass, if any.
    pub fn cached_output(&self, id: LayerId) -> Option<&Tensor> {
        self.nodes.get(id.0).and_then(|n| fresh(&n.output, self.pass))
    }

    /// Gradient accumulated in the current pass, if any.
    pub fn delta(&self, id: LayerId) -> Option<&Tensor> {
        self.nodes.get(id.0).and_then(|n| fresh(&n.delta, self.pass))
    }

    /// Every ancestor of `id` and `id` itself, newest first.
    pub fn upstream(&self, id: LayerId) -> Result<Vec<LayerId>> {
        let start = self.index(id)?;
        let mut seen = vec![false; start + 1];
        let mut stack = vec![start];
        seen[start] = true;
        while let Some(i) = stack.pop() {
            for p in &self.nodes[i].preds {
                if !seen[p.0] {
                    seen[p.0] = true;
                    stack.push(p.0);
                }
            }
        }
        Ok((0..=start).rev().filter(|&i| seen[i]).map(LayerId).collect())
    }

    // Pass lifecycle

    /// Invalidate every per-pass cache. Recurrent state is kept.
    pub fn reset(&mut self) {
        self.pass += 1;
    }

    /// Invalidate caches and clear persistent state of `id` and its
    /// ancestors.
    pub fn full_reset(&mut self, id: LayerId) -> Result<()> {
        for n in self.upstream(id)? {
            self.nodes[n.0].layer.full_reset();
        }
        self.reset();
        Ok(())
    }

    // Forward

    /// Pre-activation of `id`, evaluating ancestors as needed. Roots receive
    /// `input` directly.
    pub fn get(&mut self, id: LayerId, input: &Tensor) -> Result<Tensor> {
        let i = self.index(id)?;
        if let Some(t) = fresh(&self.nodes[i].neta, self.pass) {
            return Ok(t.clone());
        }
        let preds = self.nodes[i].preds.clone();
        let inputs = if preds.is_empty() {
            vec![input.clone()]
        } else {
            preds
                .iter()
                .map(|&p| self.output(p, input))
                .collect::<Result<Vec<_>>>()?
        };
        self.compute(i, &inputs)
    }

    /// Pre-activation of `id` from explicitly supplied predecessor outputs,
    /// without touching the ancestors.
    pub fn get_one(&mut self, id: LayerId, inputs: &[&Tensor]) -> Result<Tensor> {
        let i = self.index(id)?;
        if let Some(t) = fresh(&self.nodes[i].neta, self.pass) {
            return Ok(t.clone());
        }
        let pre = self.nodes[i].layer.forward(inputs)?;
        self.nodes[i].neta = Some(Stamped {
            pass: self.pass,
            value: pre.clone(),
        });
        Ok(pre)
    }

    fn compute(&mut self, i: usize, inputs: &[Tensor]) -> Result<Tensor> {
        let refs: Vec<&Tensor> = inputs.iter().collect();
        let pre = self.nodes[i].layer.forward(&refs)?;
        self.nodes[i].neta = Some(Stamped {
            pass: self.pass,
            value: pre.clone(),
        });
        Ok(pre)
    }

    /// Activated output of `id`.
    pub fn output(&mut self, id: LayerId, input: &Tensor) -> Result<Tensor> {
        let i = self.index(id)?;
        if let Some(t) = fresh(&self.nodes[i].output, self.pass) {
            return Ok(t.clone());
        }
        let pre = self.get(id, input)?;
        let node = &mut self.nodes[i];
        let out = node.layer.activation().activate(&pre);
        node.layer.after_output(&out)?;
        node.output = Some(Stamped {
            pass: self.pass,
            value: out.clone(),
        });
        Ok(out)
    }

    /// Derivative view of `id` for the current pass.
    pub fn derivative(&mut self, id: LayerId) -> Result<Tensor> {
        let i = self.index(id)?;
        if let Some(t) = fresh(&self.nodes[i].derivative, self.pass) {
            return Ok(t.clone());
        }
        let pre = fresh(&self.nodes[i].neta, self.pass).cloned().ok_or_else(|| {
            Error::misuse(format!("derivative of layer {id} requested before a forward pass"))
        })?;
        let upstream = if self.nodes[i].layer.forwards_derivative() {
            let preds = self.nodes[i].preds.clone();
            preds
                .iter()
                .map(|&p| self.derivative(p))
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };
        let refs: Vec<&Tensor> = upstream.iter().collect();
        let d = self.nodes[i].layer.derivative(&pre, &refs)?;
        self.nodes[i].derivative = Some(Stamped {
            pass: self.pass,
            value: d.clone(),
        });
        Ok(d)
    }

    // Backward

    /// Add `gradient` to the node's incoming gradient for this pass. The
    /// gradient is reshaped to the node's output shape first.
    pub fn set_dif(&mut self, id: LayerId, mut gradient: Tensor) -> Result<()> {
        let i = self.index(id)?;
        gradient.reshape(self.nodes[i].layer.out_shape())?;
        let pass = self.pass;
        match &mut self.nodes[i].delta {
            Some(acc) if acc.pass == pass => acc.value.add_tensor(&gradient)?,
            slot => {
                *slot = Some(Stamped {
                    pass,
                    value: gradient,
                })
            }
        }
        Ok(())
    }

    /// Propagate gradients from `id` to all of its ancestors.
    pub fn dif(&mut self, id: LayerId) -> Result<()> {
        let i = self.index(id)?;
        if fresh(&self.nodes[i].neta, self.pass).is_none() {
            misuse!("dif on layer {id} called before a forward pass");
        }
        if fresh(&self.nodes[i].delta, self.pass).is_none() {
            misuse!("dif on layer {id} called before set_dif");
        }
        for node in self.upstream(id)? {
            let n = node.0;
            let delta = match fresh(&self.nodes[n].delta, self.pass) {
                Some(d) => d.clone(),
                None => continue,
            };
            let preds = self.nodes[n].preds.clone();
            if preds.is_empty() {
                continue;
            }
            let views = preds
                .iter()
                .map(|&p| self.derivative(p))
                .collect::<Result<Vec<_>>>()?;
            let refs: Vec<&Tensor> = views.iter().collect();
            let grads = self.nodes[n].layer.backward(&delta, &refs)?;
            if grads.len() != preds.len() {
                misuse!(
                    "{} {node} produced {} gradients for {} predecessors",
                    self.nodes[n].layer.name(),
                    grads.len(),
                    preds.len()
                );
            }
            for (p, g) in preds.into_iter().zip(grads) {
                self.set_dif(p, g)?;
            }
        }
        Ok(())
    }

    /// Update every trainable ancestor of `id` that received a gradient in
    /// this pass. Untrainable nodes are skipped but their ancestors still
    /// learn.
    pub fn fit(&mut self, id: LayerId, alpha: f64, momentum: f64) -> Result<()> {
        let pass = self.pass;
        for n in self.upstream(id)? {
            let node = &mut self.nodes[n.0];
            if !node.trainable {
                continue;
            }
            if let Some(delta) = fresh(&node.delta, pass) {
                node.layer.fit(delta, alpha, momentum)?;
            }
        }
        Ok(())
    }

    // Snapshots

    /// Start a new snapshot walk.
    pub fn reset_sl(&mut self) {
        self.walk += 1;
    }

    /// Parameters of `id` and its ancestors as a tree mirroring the graph.
    pub fn get_weights(&mut self, id: LayerId) -> Result<WeightSnapshot> {
        let i = self.index(id)?;
        if self.nodes[i].walk == self.walk {
            return Ok(WeightSnapshot::default());
        }
        self.nodes[i].walk = self.walk;
        let parameters = self.nodes[i].layer.parameters();
        let preds = self.nodes[i].preds.clone();
        let children = preds
            .iter()
            .map(|&p| self.get_weights(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(WeightSnapshot {
            parameters,
            children,
        })
    }

    /// Load parameters produced by [`Graph::get_weights`] on a graph of the
    /// same topology.
    pub fn set_weights(&mut self, id: LayerId, snapshot: &WeightSnapshot) -> Result<()> {
        let i = self.index(id)?;
        if self.nodes[i].walk == self.walk {
            return Ok(());
        }
        self.nodes[i].walk = self.walk;
        let preds = self.nodes[i].preds.clone();
        if snapshot.children.len() != preds.len() {
            misuse!(
                "{} {id} has {} predecessors, snapshot has {} children",
                self.nodes[i].layer.name(),
                preds.len(),
                snapshot.children.len()
            );
        }
        self.nodes[i].layer.set_parameters(&snapshot.parameters)?;
        for (&p, child) in preds.iter().zip(&snapshot.children) {
            self.set_weights(p, child)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::{Linear, Relu, Sigmoid};
    use crate::combine::{Concat, Join};
    use crate::conv::MaxPool2D;
    use crate::dense::Dense;
    use crate::flatten::Flatten;
    use crate::input::Input;

    #[test]
    fn test_memoized_forward() -> Result<()> {
        let mut g = Graph::with_seed(1);
        let a = g.add_root(Dense::with_inputs(2, 3, Sigmoid))?;
        let b = g.connect(Dense::new(1, Sigmoid), &[a])?;
        let x = Tensor::from_slice(&[0.5, -0.5], 2)?;
        let y1 = g.output(b, &x)?;
        // Cached: a different input gives the same answer until reset.
        let y2 = g.output(b, &Tensor::zeros(2)?)?;
        assert_eq!(y1, y2);
        g.reset();
        assert!(g.cached_output(b).is_none());
        let y3 = g.output(b, &x)?;
        assert_eq!(y1, y3);
        Ok(())
    }

    #[test]
    fn test_get_one_uses_supplied_inputs() -> Result<()> {
        let mut g = Graph::with_seed(2);
        let a = g.add_root(Input::new(2))?;
        let b = g.connect(Dense::new(1, Linear), &[a])?;
        g.layer_mut(b)?.set_parameters(&[vec![1.0, 1.0], vec![0.0]])?;
        let x = Tensor::from_slice(&[2.0, 3.0], 2)?;
        assert_eq!(g.get_one(b, &[&x])?.data(), &[5.0]);
        assert!(g.cached_output(a).is_none());
        Ok(())
    }

    #[test]
    fn test_structural_refusals() -> Result<()> {
        let mut g = Graph::with_seed(3);
        assert!(matches!(g.add_root(Concat::new()), Err(Error::StructuralMisuse(_))));
        assert!(matches!(g.add_root(Join::new()), Err(Error::StructuralMisuse(_))));
        assert!(matches!(g.add_root(MaxPool2D::new()), Err(Error::StructuralMisuse(_))));
        let a = g.add_root(Input::new(2))?;
        assert!(matches!(g.connect(Input::new(2), &[a]), Err(Error::StructuralMisuse(_))));
        assert!(matches!(g.connect(Flatten::new(), &[]), Err(Error::StructuralMisuse(_))));
        assert!(g.connect(Flatten::new(), &[LayerId(9)]).is_err());
        Ok(())
    }

    #[test]
    fn test_dif_requires_forward_pass() -> Result<()> {
        let mut g = Graph::with_seed(4);
        let a = g.add_root(Dense::with_inputs(2, 1, Linear))?;
        assert!(matches!(g.dif(a), Err(Error::StructuralMisuse(_))));
        assert!(matches!(g.derivative(a), Err(Error::StructuralMisuse(_))));
        Ok(())
    }

    #[test]
    fn test_set_dif_accumulates_within_a_pass() -> Result<()> {
        let mut g = Graph::with_seed(5);
        let a = g.add_root(Dense::with_inputs(2, 2, Linear))?;
        g.set_dif(a, Tensor::from_slice(&[1.0, 2.0], 2)?)?;
        g.set_dif(a, Tensor::from_slice(&[0.5, 0.5], (1, 2))?)?;
        assert_eq!(g.delta(a).map(|d| d.data().to_vec()), Some(vec![1.5, 2.5]));
        g.reset();
        g.set_dif(a, Tensor::from_slice(&[1.0, 1.0], 2)?)?;
        assert_eq!(g.delta(a).map(|d| d.data().to_vec()), Some(vec![1.0, 1.0]));
        assert!(g.set_dif(a, Tensor::zeros(3)?).is_err());
        Ok(())
    }

    #[test]
    fn test_fan_in_gradients_are_summed() -> Result<()> {
        // input -> shared -> (left, right) -> concat -> head
        let mut g = Graph::with_seed(6);
        let input = g.add_root(Input::new(2))?;
        let shared = g.connect(Dense::new(2, Linear), &[input])?;
        let left = g.connect(Dense::new(2, Linear), &[shared])?;
        let right = g.connect(Dense::new(2, Linear), &[shared])?;
        let cat = g.connect(Concat::new(), &[left, right])?;
        let head = g.connect(Dense::new(1, Linear), &[cat])?;

        g.layer_mut(left)?.set_parameters(&[vec![1.0, 0.0, 0.0, 1.0], vec![0.0, 0.0]])?;
        g.layer_mut(right)?.set_parameters(&[vec![2.0, 0.0, 0.0, 2.0], vec![0.0, 0.0]])?;
        g.layer_mut(head)?.set_parameters(&[vec![1.0; 4], vec![0.0]])?;

        let x = Tensor::from_slice(&[1.0, -1.0], 2)?;
        g.output(head, &x)?;
        g.set_dif(head, Tensor::from_slice(&[1.0], 1)?)?;
        g.dif(head)?;

        // d head / d shared = left^T·1 + right^T·1 = [1 + 2, 1 + 2]
        let d = g.delta(shared).map(|d| d.data().to_vec());
        assert_eq!(d, Some(vec![3.0, 3.0]));
        assert_eq!(g.upstream(head)?, vec![head, cat, right, left, shared, input]);
        Ok(())
    }

    #[test]
    fn test_untrainable_node_is_skipped_but_ancestors_learn() -> Result<()> {
        let mut g = Graph::with_seed(7);
        let a = g.add_root(Dense::with_inputs(2, 2, Relu))?;
        let b = g.connect(Dense::new(1, Linear), &[a])?;
        g.layer_mut(a)?.set_parameters(&[vec![1.0, 0.0, 0.0, 1.0], vec![0.0, 0.0]])?;
        g.set_trainable(b, false)?;
        let before_a = g.layer(a)?.parameters();
        let before_b = g.layer(b)?.parameters();

        g.output(b, &Tensor::from_slice(&[1.0, 1.0], 2)?)?;
        g.set_dif(b, Tensor::from_slice(&[1.0], 1)?)?;
        g.dif(b)?;
        g.fit(b, 0.1, 0.0)?;

        assert_eq!(g.layer(b)?.parameters(), before_b);
        assert_ne!(g.layer(a)?.parameters(), before_a);
        Ok(())
    }

    #[test]
    fn test_diamond_snapshot_visits_shared_node_once() -> Result<()> {
        let build = |seed| -> Result<(Graph, LayerId)> {
            let mut g = Graph::with_seed(seed);
            let input = g.add_root(Input::new(3))?;
            let shared = g.connect(Dense::new(2, Sigmoid), &[input])?;
            let left = g.connect(Dense::new(2, Sigmoid), &[shared])?;
            let right = g.connect(Dense::new(2, Sigmoid), &[shared])?;
            let joined = g.connect(Join::new(), &[left, right])?;
            let head = g.connect(Dense::new(1, Sigmoid), &[joined])?;
            Ok((g, head))
        };
        let (mut g1, head1) = build(10)?;
        g1.reset_sl();
        let snap = g1.get_weights(head1)?;

        let join = &snap.children[0];
        assert_eq!(join.children.len(), 2);
        assert!(!join.children[0].children[0].is_empty());
        // The second path to the shared layer records nothing.
        assert!(join.children[1].children[0].is_empty());
        // head + left + right + shared
        assert_eq!(snap.num_parameters(), (4 + 1) + 2 * (4 + 2) + (6 + 2));

        let (mut g2, head2) = build(11)?;
        g2.reset_sl();
        g2.set_weights(head2, &snap)?;
        let x = Tensor::from_slice(&[0.1, 0.2, 0.3], 3)?;
        assert_eq!(g1.output(head1, &x)?, g2.output(head2, &x)?);
        Ok(())
    }

    #[test]
    fn test_set_weights_rejects_other_topology() -> Result<()> {
        let mut g = Graph::with_seed(12);
        let a = g.add_root(Input::new(2))?;
        let b = g.connect(Dense::new(1, Linear), &[a])?;
        g.reset_sl();
        let bad = WeightSnapshot {
            parameters: vec![vec![0.0, 0.0], vec![0.0]],
            children: vec![],
        };
        assert!(matches!(g.set_weights(b, &bad), Err(Error::StructuralMisuse(_))));
        Ok(())
    }
}
