use std::io::Cursor;

use log::{debug, info, warn};

use crate::archive::{
    DrsHeader, Hierarchy, IndexTable, LoadedArchive, Node, ReadOptions, SkippedRecord,
};
use crate::error::{DrsError, Result};
use crate::primitive::read;
use crate::records::geometry::CGeoPrimitiveContainer;
use crate::records::{Payload, RecordKind, RecordTree};

/// Parses a whole archive held in memory.
///
/// Header, index and hierarchy faults abort the load. Faults inside a payload drop that
/// record into `LoadedArchive::skipped` unless `options.strict` is set.
pub fn read_archive(bytes: &[u8], options: &ReadOptions) -> Result<LoadedArchive> {
    let mut cursor = Cursor::new(bytes);
    let header: DrsHeader = read(&mut cursor)?;
    header.validate()?;

    let index = IndexTable::parse(&mut cursor, stream_offset(header.index_table_offset), header.node_count)?;
    let hierarchy = Hierarchy::parse(&mut cursor, stream_offset(header.hierarchy_offset), header.node_count)?;

    let mut tree = RecordTree::default();
    let mut skipped = Vec::new();

    for node in &hierarchy.nodes {
        let kind = index
            .slot(node.info_index.max(0) as usize)
            .and_then(|entry| entry.kind());
        match decode_node(bytes, &index, node, options) {
            Ok(payload) => {
                let decoded_kind = payload.kind();
                if tree.contains(decoded_kind) {
                    warn!(
                        "node '{}' decoded a second {}, keeping the first",
                        node.name, decoded_kind
                    );
                    skipped.push(SkippedRecord {
                        node: node.name.to_string(),
                        info_index: node.info_index,
                        kind: Some(decoded_kind),
                        reason: format!("duplicate {decoded_kind}"),
                    });
                } else {
                    tree.insert(payload);
                }
            }
            Err(err) if err.is_fatal() || options.strict => return Err(err),
            Err(err) => {
                warn!("skipping node '{}': {}", node.name, err);
                skipped.push(SkippedRecord {
                    node: node.name.to_string(),
                    info_index: node.info_index,
                    kind,
                    reason: err.to_string(),
                });
            }
        }
    }

    info!(
        "loaded {} records from {} nodes ({} skipped)",
        tree.kinds().count(),
        hierarchy.nodes.len(),
        skipped.len()
    );

    Ok(LoadedArchive {
        header,
        index,
        hierarchy,
        tree,
        skipped,
    })
}

fn stream_offset(offset: i32) -> u64 {
    u64::try_from(offset).unwrap_or(u64::MAX)
}

/// Decoders to try for a node, in priority order. A node whose name agrees with its index
/// entry gets exactly one. Otherwise the index magic goes first, then the declared name,
/// then a plain `CGeoMesh`.
pub fn fallback_candidates(declared: Option<RecordKind>, actual: RecordKind) -> Vec<RecordKind> {
    if declared == Some(actual) {
        return vec![actual];
    }
    let mut candidates = vec![actual];
    for kind in declared.into_iter().chain([RecordKind::CGeoMesh]) {
        if !candidates.contains(&kind) {
            candidates.push(kind);
        }
    }
    candidates
}

fn decode_node(bytes: &[u8], index: &IndexTable, node: &Node, options: &ReadOptions) -> Result<Payload> {
    let dangling = || DrsError::DanglingNode {
        node: node.name.to_string(),
        info_index: node.info_index,
    };
    let slot = usize::try_from(node.info_index).map_err(|_| dangling())?;
    let entry = index.slot(slot).ok_or_else(dangling)?;
    let actual = entry.kind().ok_or(DrsError::UnknownChunk {
        index: slot,
        magic: entry.magic,
    })?;
    let declared = node.declared_kind();

    let extent = match index.resolve_alias(slot)? {
        Some(extent) => extent,
        None => return Ok(Payload::CGeoPrimitiveContainer(CGeoPrimitiveContainer)),
    };

    let out_of_bounds = DrsError::OutOfBounds {
        kind: actual,
        offset: extent.offset,
        size: extent.size,
        len: bytes.len(),
    };
    let (start, len) = match (usize::try_from(extent.offset), usize::try_from(extent.size)) {
        (Ok(start), Ok(len)) => (start, len),
        _ => return Err(out_of_bounds),
    };
    let payload_bytes = start
        .checked_add(len)
        .and_then(|end| bytes.get(start..end))
        .ok_or(out_of_bounds)?;

    let candidates = fallback_candidates(declared, actual);
    if candidates.len() > 1 {
        warn!(
            "node '{}' does not match index slot {} ({}), trying {:?}",
            node.name, slot, actual, candidates
        );
    }

    let mut last_err = None;
    for kind in &candidates {
        match Payload::decode(*kind, payload_bytes) {
            Ok((payload, consumed)) => {
                debug!(
                    "node '{}' decoded as {} ({} of {} bytes at offset {})",
                    node.name, kind, consumed, len, extent.offset
                );
                if consumed < len && options.warn_on_trailing_bytes {
                    warn!(
                        "{} in node '{}' left {} trailing bytes",
                        kind,
                        node.name,
                        len - consumed
                    );
                }
                if *kind != actual {
                    warn!("node '{}' recovered as {} instead of {}", node.name, kind, actual);
                }
                return Ok(payload);
            }
            Err(err) => {
                let err = DrsError::from_record(*kind, err);
                warn!("node '{}' failed to decode as {}: {}", node.name, kind, err);
                last_err = Some(err);
            }
        }
    }

    match last_err {
        Some(err) if candidates.len() == 1 => Err(err),
        _ => Err(DrsError::NodeTypeMismatch {
            node: node.name.to_string(),
            declared: declared.map_or("unknown", RecordKind::name).to_string(),
            actual,
        }),
    }
}
