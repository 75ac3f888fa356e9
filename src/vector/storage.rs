//! On-disk layout for the similarity index.
//!
//! The whole index persists as a single binary file so a save is one
//! atomic publish: the bytes are written to a temporary file in the
//! destination directory and renamed into place. A crash mid-write can
//! never leave a half-written index loadable.
//!
//! # File format
//!
//! - Header (20 bytes): magic `LVEC`, version, dimension, record count,
//!   next-id counter, all little-endian u32
//! - Records, in ascending id order: id (u32), source path length (u32),
//!   UTF-8 path bytes, then `dimension` f32 values

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};
use tempfile::NamedTempFile;

use crate::error::{IndexError, IndexResult};
use crate::vector::store::VectorRecordStore;
use crate::vector::types::{VectorDimension, VectorId, VectorRecord};

/// Current storage format version.
const STORAGE_VERSION: u32 = 1;

/// Magic bytes identifying a lookalike index file.
const MAGIC_BYTES: &[u8; 4] = b"LVEC";

/// Size of the file header in bytes.
const HEADER_SIZE: usize = 20;

/// Number of bytes per f32 value.
const BYTES_PER_F32: usize = 4;

/// Writes the whole store to `path` atomically.
///
/// The temporary file lives in the same directory as the destination so
/// the final rename stays on one filesystem.
pub fn save_store(store: &VectorRecordStore, path: &Path) -> IndexResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    write_store(store, tmp.as_file_mut())?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(path).map_err(|e| IndexError::Io(e.error))?;
    Ok(())
}

/// Loads a store from `path`, validating the layout end to end.
///
/// Fails with [`IndexError::CorruptIndex`] if the header disagrees with
/// the payload: wrong magic or version, record count mismatch, a vector
/// whose length differs from the stored dimensionality, ids out of
/// order, or an id counter behind the highest stored id.
pub fn load_store(path: &Path) -> IndexResult<VectorRecordStore> {
    let file = File::open(path)?;
    // SAFETY: the file is opened read-only and the mapping is dropped
    // before this function returns anything referencing it.
    let mmap = unsafe { MmapOptions::new().map(&file)? };

    let header = read_header(path, &mmap)?;
    let records = read_records(path, &mmap, &header)?;

    Ok(VectorRecordStore::from_parts(
        records,
        header.dimension,
        header.next_id,
    ))
}

struct Header {
    /// `None` only for a persisted empty index.
    dimension: Option<VectorDimension>,
    count: usize,
    next_id: u32,
}

fn corrupt(path: &Path, reason: impl Into<String>) -> IndexError {
    IndexError::CorruptIndex {
        path: PathBuf::from(path),
        reason: reason.into(),
    }
}

fn write_store(store: &VectorRecordStore, file: &mut File) -> IndexResult<()> {
    let dimension = store
        .dimension()
        .map(|d| d.get() as u32)
        .unwrap_or_default();

    let mut buf = Vec::with_capacity(HEADER_SIZE);
    buf.extend_from_slice(MAGIC_BYTES);
    buf.extend_from_slice(&STORAGE_VERSION.to_le_bytes());
    buf.extend_from_slice(&dimension.to_le_bytes());
    buf.extend_from_slice(&(store.len() as u32).to_le_bytes());
    buf.extend_from_slice(&store.next_id().to_le_bytes());

    for record in store.records() {
        buf.extend_from_slice(&record.id.to_bytes());
        let path_bytes = record.source_path.as_bytes();
        buf.extend_from_slice(&(path_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(path_bytes);
        for &value in &record.vector {
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }

    file.write_all(&buf)?;
    Ok(())
}

fn read_header(path: &Path, mmap: &Mmap) -> IndexResult<Header> {
    if mmap.len() < HEADER_SIZE {
        return Err(corrupt(path, "file too small to contain header"));
    }

    if &mmap[0..4] != MAGIC_BYTES {
        return Err(corrupt(path, "invalid magic bytes"));
    }

    let version = read_u32(mmap, 4);
    if version != STORAGE_VERSION {
        return Err(corrupt(
            path,
            format!("unsupported version {version}, expected {STORAGE_VERSION}"),
        ));
    }

    let dim_value = read_u32(mmap, 8) as usize;
    let count = read_u32(mmap, 12) as usize;
    let next_id = read_u32(mmap, 16);

    if count > 0 && dim_value == 0 {
        return Err(corrupt(path, "records present but dimension is zero"));
    }

    // An empty index persists a zero dimension; the dimensionality is
    // fixed again by the first add after reload.
    let dimension = if dim_value == 0 {
        None
    } else {
        Some(
            VectorDimension::new(dim_value)
                .map_err(|e| corrupt(path, format!("invalid dimension: {e}")))?,
        )
    };

    Ok(Header {
        dimension,
        count,
        next_id,
    })
}

fn read_records(path: &Path, mmap: &Mmap, header: &Header) -> IndexResult<Vec<VectorRecord>> {
    let dimension = header.dimension.map(|d| d.get()).unwrap_or(0);
    if header.dimension.is_none() && mmap.len() > HEADER_SIZE {
        return Err(corrupt(path, "records present but dimension is zero"));
    }
    let mut records = Vec::with_capacity(header.count);
    let mut offset = HEADER_SIZE;
    let mut last_id = 0u32;

    while offset < mmap.len() {
        if offset + 8 > mmap.len() {
            return Err(corrupt(path, "truncated record header"));
        }

        let id = VectorId::new(read_u32(mmap, offset))
            .ok_or_else(|| corrupt(path, "record with zero id"))?;
        if id.get() <= last_id {
            return Err(corrupt(path, format!("ids out of order at id {id}")));
        }
        last_id = id.get();

        let path_len = read_u32(mmap, offset + 4) as usize;
        offset += 8;

        if offset + path_len + dimension * BYTES_PER_F32 > mmap.len() {
            return Err(corrupt(path, format!("truncated record for id {id}")));
        }

        let source_path = std::str::from_utf8(&mmap[offset..offset + path_len])
            .map_err(|_| corrupt(path, format!("non-UTF-8 source path for id {id}")))?
            .to_string();
        offset += path_len;

        let mut vector = Vec::with_capacity(dimension);
        for i in 0..dimension {
            let bytes_offset = offset + i * BYTES_PER_F32;
            vector.push(f32::from_le_bytes([
                mmap[bytes_offset],
                mmap[bytes_offset + 1],
                mmap[bytes_offset + 2],
                mmap[bytes_offset + 3],
            ]));
        }
        offset += dimension * BYTES_PER_F32;

        records.push(VectorRecord {
            id,
            source_path,
            vector,
        });
    }

    if records.len() != header.count {
        return Err(corrupt(
            path,
            format!(
                "header claims {} records but file holds {}",
                header.count,
                records.len()
            ),
        ));
    }

    if header.next_id <= last_id {
        return Err(corrupt(
            path,
            format!(
                "id counter {} is behind highest stored id {last_id}",
                header.next_id
            ),
        ));
    }

    Ok(records)
}

fn read_u32(mmap: &Mmap, offset: usize) -> u32 {
    u32::from_le_bytes([
        mmap[offset],
        mmap[offset + 1],
        mmap[offset + 2],
        mmap[offset + 3],
    ])
}
