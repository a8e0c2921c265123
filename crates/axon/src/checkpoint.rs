// Checkpoint — Save and load weight snapshots
//
// Two encodings of the same `WeightSnapshot` tree:
//
// JSON (.json), via serde_json:
//
//   {"parameters": [[w...], [b...]], "children": [ {...}, ... ]}
//
// Binary (.axws):
//
//   Header:
//     magic:   [u8; 4]  = b"AXWS"
//     version: u32 LE   = 1
//
//   Then the root node, each node written as:
//     param_count: u32 LE
//     for each parameter tensor:
//       len:    u64 LE          (number of f64 values)
//       values: [f64 LE; len]
//     child_count: u32 LE
//     children, recursively, in predecessor order
//
// Usage:
//   let snap = model.get_model_weights()?;
//   checkpoint::save_bin("model.axws", &snap)?;
//   model.set_model_weights(&checkpoint::load_bin("model.axws")?)?;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use axon_nn::WeightSnapshot;

// Constants

const MAGIC: &[u8; 4] = b"AXWS";
const VERSION: u32 = 1;
/// Deepest predecessor chain a binary checkpoint may encode.
const MAX_DEPTH: usize = 1024;

/// Errors produced while encoding, decoding or storing snapshots.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid checkpoint: expected magic {expected:?}, got {got:?}")]
    BadMagic { expected: [u8; 4], got: [u8; 4] },

    #[error("unsupported checkpoint version: {got} (expected {expected})")]
    UnsupportedVersion { expected: u32, got: u32 },

    #[error("invalid checkpoint: {0}")]
    Malformed(String),

    #[error(transparent)]
    Model(#[from] axon_core::Error),
}

pub type Result<T> = std::result::Result<T, CheckpointError>;

// JSON

/// JSON has no NaN or infinity (serde_json would write `null`), so a
/// snapshot holding either is refused instead of producing a file that
/// cannot be read back.
fn check_finite(node: &WeightSnapshot) -> Result<()> {
    for (p, param) in node.parameters.iter().enumerate() {
        if let Some(i) = param.iter().position(|v| !v.is_finite()) {
            return Err(CheckpointError::Malformed(format!(
                "parameter {p} holds non-finite value {} at {i}; JSON cannot encode it",
                param[i]
            )));
        }
    }
    node.children.iter().try_for_each(check_finite)
}

/// Encode as JSON. Fails with `Malformed` on NaN or infinite weights;
/// the binary format stores those exactly.
pub fn to_json(snapshot: &WeightSnapshot) -> Result<String> {
    check_finite(snapshot)?;
    Ok(serde_json::to_string(snapshot)?)
}

pub fn from_json(text: &str) -> Result<WeightSnapshot> {
    Ok(serde_json::from_str(text)?)
}

pub fn save_json(path: impl AsRef<Path>, snapshot: &WeightSnapshot) -> Result<()> {
    let path = path.as_ref();
    check_finite(snapshot)?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, snapshot)?;
    writer.flush()?;
    log::debug!(
        "checkpoint: wrote {} parameters to {}",
        snapshot.num_parameters(),
        path.display()
    );
    Ok(())
}

pub fn load_json(path: impl AsRef<Path>) -> Result<WeightSnapshot> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let snapshot: WeightSnapshot = serde_json::from_reader(reader)?;
    log::debug!(
        "checkpoint: read {} parameters from {}",
        snapshot.num_parameters(),
        path.display()
    );
    Ok(snapshot)
}

// Low-level IO helpers

fn write_u32(w: &mut impl Write, v: u32) -> std::io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_u64(w: &mut impl Write, v: u64) -> std::io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn read_u32(r: &mut impl Read) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f64(r: &mut impl Read) -> std::io::Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn count_u32(n: usize, what: &str) -> Result<u32> {
    u32::try_from(n).map_err(|_| CheckpointError::Malformed(format!("too many {what}: {n}")))
}

// Write checkpoint

/// Write a snapshot in the binary format.
pub fn write_snapshot(writer: &mut impl Write, snapshot: &WeightSnapshot) -> Result<()> {
    writer.write_all(MAGIC)?;
    write_u32(writer, VERSION)?;
    write_node(writer, snapshot)
}

fn write_node(writer: &mut impl Write, node: &WeightSnapshot) -> Result<()> {
    write_u32(writer, count_u32(node.parameters.len(), "parameter tensors")?)?;
    for param in &node.parameters {
        write_u64(writer, param.len() as u64)?;
        for v in param {
            writer.write_all(&v.to_le_bytes())?;
        }
    }
    write_u32(writer, count_u32(node.children.len(), "children")?)?;
    for child in &node.children {
        write_node(writer, child)?;
    }
    Ok(())
}

// Read checkpoint

/// Read a snapshot in the binary format.
pub fn read_snapshot(reader: &mut impl Read) -> Result<WeightSnapshot> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(CheckpointError::BadMagic {
            expected: *MAGIC,
            got: magic,
        });
    }
    let version = read_u32(reader)?;
    if version != VERSION {
        return Err(CheckpointError::UnsupportedVersion {
            expected: VERSION,
            got: version,
        });
    }
    read_node(reader, 0)
}

fn read_node(reader: &mut impl Read, depth: usize) -> Result<WeightSnapshot> {
    if depth > MAX_DEPTH {
        return Err(CheckpointError::Malformed(format!(
            "snapshot nested deeper than {MAX_DEPTH} levels"
        )));
    }
    let count = read_u32(reader)? as usize;
    let mut parameters = Vec::with_capacity(count.min(16));
    for _ in 0..count {
        let len = read_u64(reader)?;
        let len = usize::try_from(len)
            .map_err(|_| CheckpointError::Malformed(format!("parameter length {len}")))?;
        // Lengths come from untrusted input; grow as values actually arrive.
        let mut values = Vec::with_capacity(len.min(1 << 16));
        for _ in 0..len {
            values.push(read_f64(reader)?);
        }
        parameters.push(values);
    }
    let children_count = read_u32(reader)? as usize;
    let mut children = Vec::with_capacity(children_count.min(16));
    for _ in 0..children_count {
        children.push(read_node(reader, depth + 1)?);
    }
    Ok(WeightSnapshot {
        parameters,
        children,
    })
}

pub fn to_bytes(snapshot: &WeightSnapshot) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_snapshot(&mut buf, snapshot)?;
    Ok(buf)
}

pub fn from_bytes(mut bytes: &[u8]) -> Result<WeightSnapshot> {
    let snapshot = read_snapshot(&mut bytes)?;
    if !bytes.is_empty() {
        return Err(CheckpointError::Malformed(format!(
            "{} trailing bytes",
            bytes.len()
        )));
    }
    Ok(snapshot)
}

pub fn save_bin(path: impl AsRef<Path>, snapshot: &WeightSnapshot) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_snapshot(&mut writer, snapshot)?;
    writer.flush()?;
    log::debug!(
        "checkpoint: wrote {} parameters to {}",
        snapshot.num_parameters(),
        path.display()
    );
    Ok(())
}

pub fn load_bin(path: impl AsRef<Path>) -> Result<WeightSnapshot> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let snapshot = read_snapshot(&mut reader)?;
    log::debug!(
        "checkpoint: read {} parameters from {}",
        snapshot.num_parameters(),
        path.display()
    );
    Ok(snapshot)
}
