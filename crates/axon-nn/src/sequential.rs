// Sequential — a chain of layers plus the training loop
//
// A Sequential appends each new layer to the previous one inside a Graph it
// owns. The first layer is built as a root, unless the chain was started
// with `Sequential::on`, in which case it is connected to a node that
// already lives in the graph and the chain becomes one branch of a larger
// network.
//
// TRAINING ONE SAMPLE:
//
//   reset -> output -> loss(output, target) -> set_dif -> dif -> fit
//
// `train` repeats this for every sample of every epoch. With `shuffle` the
// sample order is permuted before each epoch; inputs and targets are looked
// up through the same permutation so pairs never separate.

use axon_core::{bail, misuse, Error, Result, Shape, Tensor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::TrainConfig;
use crate::graph::{Graph, LayerId};
use crate::layer::Layer;
use crate::snapshot::WeightSnapshot;

/// A linear chain of layers and the graph that owns them.
#[derive(Debug)]
pub struct Sequential {
    graph: Graph,
    predecessor: Option<LayerId>,
    input: Option<LayerId>,
    output: Option<LayerId>,
    layers: Vec<LayerId>,
}

impl Default for Sequential {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequential {
    pub fn new() -> Self {
        Self::from_parts(Graph::new(), None)
    }

    /// A model whose parameter initialisation is reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_parts(Graph::with_seed(seed), None)
    }

    /// Continue an existing graph: the first added layer is connected to
    /// `predecessor` instead of being built as a root.
    pub fn on(graph: Graph, predecessor: LayerId) -> Result<Self> {
        if !graph.contains(predecessor) {
            misuse!("predecessor {predecessor} is not part of the graph");
        }
        Ok(Self::from_parts(graph, Some(predecessor)))
    }

    fn from_parts(graph: Graph, predecessor: Option<LayerId>) -> Self {
        Sequential {
            graph,
            predecessor,
            input: None,
            output: None,
            layers: Vec::new(),
        }
    }

    /// Append a layer to the chain and return its id.
    pub fn add_layer(&mut self, layer: impl Layer + 'static) -> Result<LayerId> {
        let id = match self.output.or(self.predecessor) {
            Some(tail) => self.graph.connect(layer, &[tail])?,
            None => self.graph.add_root(layer)?,
        };
        self.input.get_or_insert(id);
        self.output = Some(id);
        self.layers.push(id);
        Ok(id)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }

    /// Id of the first layer added.
    pub fn input_id(&self) -> Option<LayerId> {
        self.input
    }

    /// Id of the last layer added (the sink).
    pub fn output_id(&self) -> Option<LayerId> {
        self.output
    }

    /// Ids of the layers added through this chain, in order.
    pub fn layers(&self) -> &[LayerId] {
        &self.layers
    }

    fn sink(&self) -> Result<LayerId> {
        if let Some(p) = self.predecessor {
            if !self.graph.contains(p) {
                misuse!("predecessor {p} no longer exists");
            }
        }
        self.output
            .ok_or_else(|| Error::misuse("model has no layers"))
    }

    pub fn out_shape(&self) -> Result<Shape> {
        self.graph.out_shape(self.sink()?)
    }

    /// Mark every layer of this chain as (un)trainable.
    pub fn set_trainable(&mut self, trainable: bool) -> Result<()> {
        for &id in &self.layers {
            self.graph.set_trainable(id, trainable)?;
        }
        Ok(())
    }

    /// Clear cached passes and recurrent state.
    pub fn full_reset(&mut self) -> Result<()> {
        let sink = self.sink()?;
        self.graph.full_reset(sink)
    }

    /// Activated output of the sink for `input`.
    pub fn predict(&mut self, input: &Tensor) -> Result<Tensor> {
        let sink = self.sink()?;
        self.graph.reset();
        self.graph.output(sink, input)
    }

    /// One forward/backward/update step. Returns the loss signal.
    pub fn train_one<F>(
        &mut self,
        input: &Tensor,
        target: &Tensor,
        alpha: f64,
        momentum: f64,
        loss: F,
    ) -> Result<Tensor>
    where
        F: Fn(&Tensor, &Tensor) -> Result<Tensor>,
    {
        let sink = self.sink()?;
        self.graph.reset();
        let output = self.graph.output(sink, input)?;
        let signal = loss(&output, target)?;
        self.graph.set_dif(sink, signal.clone())?;
        self.graph.dif(sink)?;
        self.graph.fit(sink, alpha, momentum)?;
        Ok(signal)
    }

    /// Train on `inputs`/`targets` and return the mean absolute loss of the
    /// last epoch (0 when `epochs` is 0).
    pub fn train<F>(
        &mut self,
        inputs: &[Tensor],
        targets: &[Tensor],
        loss: F,
        config: &TrainConfig,
    ) -> Result<f64>
    where
        F: Fn(&Tensor, &Tensor) -> Result<Tensor>,
    {
        if inputs.len() != targets.len() {
            bail!(
                "train: {} inputs but {} targets",
                inputs.len(),
                targets.len()
            );
        }
        if inputs.is_empty() {
            bail!("train: empty dataset");
        }
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let batch = config.effective_batch(inputs.len());
        let mut order: Vec<usize> = (0..inputs.len()).collect();
        let mut epoch_loss = 0.0;

        for epoch in 0..config.epochs {
            if config.shuffle {
                order.shuffle(&mut rng);
            }
            let mut total = 0.0;
            for (step, &k) in order[..batch].iter().enumerate() {
                let signal =
                    self.train_one(&inputs[k], &targets[k], config.alpha, config.momentum, &loss)?;
                let sample_loss = signal.abs().mean();
                if config.verbosity >= 2 {
                    log::debug!(
                        "epoch {} sample {}/{} (#{}): loss {:.6}",
                        epoch + 1,
                        step + 1,
                        batch,
                        k,
                        sample_loss
                    );
                }
                total += sample_loss;
            }
            epoch_loss = total / batch as f64;
            if config.verbosity >= 1 {
                log::info!("epoch {}/{}: loss {:.6}", epoch + 1, config.epochs, epoch_loss);
            }
        }
        Ok(epoch_loss)
    }

    /// Snapshot of every parameter reachable from the sink.
    pub fn get_model_weights(&mut self) -> Result<WeightSnapshot> {
        let sink = self.sink()?;
        self.graph.reset_sl();
        self.graph.get_weights(sink)
    }

    /// Load a snapshot taken from a model of the same topology.
    pub fn set_model_weights(&mut self, snapshot: &WeightSnapshot) -> Result<()> {
        let sink = self.sink()?;
        self.graph.reset_sl();
        self.graph.set_weights(sink, snapshot)
    }
}
