// Checkpoint integration tests: snapshots taken from real graphs survive
// both encodings and reload into fresh graphs of the same topology.

use std::path::PathBuf;

use axon::checkpoint::{self, CheckpointError};
use axon::prelude::*;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("axon_{}_{}", std::process::id(), name))
}

/// input -> shared -> (left, right) -> concat -> flatten -> head
fn diamond(seed: u64) -> Result<(Graph, LayerId)> {
    let mut g = Graph::with_seed(seed);
    let input = g.add_root(Input::new(4))?;
    let shared = g.connect(Dense::new(3, Tanh), &[input])?;
    let left = g.connect(Dense::new(2, Sigmoid), &[shared])?;
    let right = g.connect(Dense::new(2, Relu), &[shared])?;
    let cat = g.connect(Concat::new(), &[left, right])?;
    let flat = g.connect(Flatten::new(), &[cat])?;
    let head = g.connect(Dense::new(1, Linear), &[flat])?;
    Ok((g, head))
}

fn conv_model(seed: u64) -> Result<Sequential> {
    let mut m = Sequential::with_seed(seed);
    m.add_layer(Input::new((6, 6, 2)))?;
    m.add_layer(Conv2D::new(3, 3, 3, 1, Tanh))?;
    m.add_layer(Deconv2D::new(1, 2, 2, 1, Sigmoid))?;
    m.add_layer(MaxPool2D::new())?;
    m.add_layer(Flatten::new())?;
    m.add_layer(Recurrent::new(2, Tanh))?;
    Ok(m)
}

#[test]
fn test_diamond_snapshot_through_json() -> std::result::Result<(), CheckpointError> {
    let (mut a, head_a) = diamond(1)?;
    let (mut b, head_b) = diamond(2)?;
    let x = Tensor::from_slice(&[0.1, -0.2, 0.3, -0.4], 4)?;
    assert_ne!(a.output(head_a, &x)?, b.output(head_b, &x)?);

    a.reset_sl();
    let snap = a.get_weights(head_a)?;
    let text = checkpoint::to_json(&snap)?;
    b.reset_sl();
    b.set_weights(head_b, &checkpoint::from_json(&text)?)?;

    a.reset();
    b.reset();
    assert_eq!(a.output(head_a, &x)?, b.output(head_b, &x)?);
    Ok(())
}

#[test]
fn test_conv_model_snapshot_through_binary_file() -> std::result::Result<(), CheckpointError> {
    let mut a = conv_model(3)?;
    let mut b = conv_model(4)?;
    let snap = a.get_model_weights()?;
    let path = temp_path("conv.axws");
    checkpoint::save_bin(&path, &snap)?;
    let loaded = checkpoint::load_bin(&path)?;
    std::fs::remove_file(&path)?;
    assert_eq!(loaded, snap);

    b.set_model_weights(&loaded)?;
    let x = Tensor::rand_uniform(-1.0, 1.0, (6, 6, 2))?;
    assert_eq!(a.predict(&x)?, b.predict(&x)?);
    Ok(())
}

#[test]
fn test_json_file_round_trip() -> std::result::Result<(), CheckpointError> {
    let mut m = conv_model(5)?;
    let snap = m.get_model_weights()?;
    let path = temp_path("conv.json");
    checkpoint::save_json(&path, &snap)?;
    let loaded = checkpoint::load_json(&path)?;
    std::fs::remove_file(&path)?;
    assert_eq!(loaded, snap);
    Ok(())
}

#[test]
fn test_snapshot_from_other_topology_is_rejected() -> std::result::Result<(), CheckpointError> {
    let (mut g, head) = diamond(6)?;
    g.reset_sl();
    let snap = g.get_weights(head)?;
    let mut other = conv_model(7)?;
    let err = other.set_model_weights(&snap);
    assert!(err.is_err());
    Ok(())
}

#[test]
fn test_missing_file_is_io_error() {
    let err = checkpoint::load_bin(temp_path("does_not_exist.axws"));
    assert!(matches!(err, Err(CheckpointError::Io(_))));
}
