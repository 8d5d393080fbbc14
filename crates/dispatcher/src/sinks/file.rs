//! FileSink - segmented JSON Lines metadata with the raw outputs alongside
//!
//! Each segment is a pair of files:
//! - `records-NNNNNN.jsonl`: one metadata object per record
//! - `raw-NNNNNN.bin`: the model outputs back to back as little-endian f32
//!
//! Each metadata line carries the `raw_offset` (bytes) and `output_len`
//! (floats) of its output inside the segment's raw file. A new segment starts
//! every `segment_records` records.

use contracts::{ContractError, DataSink, ModelOutputRecord};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument};

/// One hour of model cycles at 20 Hz
const DEFAULT_SEGMENT_RECORDS: u64 = 72_000;

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output directory
    pub base_path: PathBuf,
    /// Also write `raw_output` to the segment's raw file
    pub write_raw: bool,
    /// Records per segment, 0 never rotates
    pub segment_records: u64,
}

impl FileSinkConfig {
    /// Recognised params: `base_path`, `write_raw`, `segment_records`
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));
        let write_raw = params
            .get("write_raw")
            .map(|v| v != "false")
            .unwrap_or(true);
        let segment_records = match params.get("segment_records") {
            Some(s) => s
                .parse()
                .map_err(|e| format!("invalid segment_records '{s}': {e}"))?,
            None => DEFAULT_SEGMENT_RECORDS,
        };

        Ok(Self {
            base_path,
            write_raw,
            segment_records,
        })
    }
}

pub fn records_file_name(segment: u32) -> String {
    format!("records-{segment:06}.jsonl")
}

pub fn raw_file_name(segment: u32) -> String {
    format!("raw-{segment:06}.bin")
}

/// `values` as little-endian bytes
fn le_bytes(values: &[f32]) -> Cow<'_, [u8]> {
    if cfg!(target_endian = "little") {
        Cow::Borrowed(bytemuck::cast_slice(values))
    } else {
        Cow::Owned(values.iter().flat_map(|v| v.to_le_bytes()).collect())
    }
}

#[derive(Serialize)]
struct RecordLine {
    frame_id: u32,
    frame_id_extra: u32,
    frame_id_plan: u32,
    frame_drop_ratio: f32,
    frames_dropped: u32,
    timestamp_eof: u64,
    model_execution_time: f32,
    live_calib_seen: bool,
    output_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_offset: Option<u64>,
}

struct Segment {
    index: u32,
    records: u64,
    meta: BufWriter<File>,
    raw: Option<BufWriter<File>>,
    raw_offset: u64,
}

impl Segment {
    fn open(dir: &Path, index: u32, write_raw: bool) -> std::io::Result<Self> {
        let append = |name: String| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(name))
                .map(BufWriter::new)
        };
        let meta = append(records_file_name(index))?;
        let raw = write_raw.then(|| append(raw_file_name(index))).transpose()?;
        let raw_offset = if write_raw {
            fs::metadata(dir.join(raw_file_name(index)))?.len()
        } else {
            0
        };

        Ok(Self {
            index,
            records: 0,
            meta,
            raw,
            raw_offset,
        })
    }

    fn append(&mut self, record: &ModelOutputRecord) -> std::io::Result<()> {
        let raw_offset = match self.raw.as_mut() {
            Some(raw) => {
                let bytes = le_bytes(&record.raw_output);
                raw.write_all(&bytes)?;
                let offset = self.raw_offset;
                self.raw_offset += bytes.len() as u64;
                Some(offset)
            }
            None => None,
        };

        let line = RecordLine {
            frame_id: record.frame_id,
            frame_id_extra: record.frame_id_extra,
            frame_id_plan: record.frame_id_plan,
            frame_drop_ratio: record.frame_drop_ratio,
            frames_dropped: record.frames_dropped,
            timestamp_eof: record.timestamp_eof,
            model_execution_time: record.model_execution_time,
            live_calib_seen: record.live_calib_seen,
            output_len: record.raw_output.len(),
            raw_offset,
        };
        serde_json::to_writer(&mut self.meta, &line)?;
        self.meta.write_all(b"\n")?;
        self.records += 1;
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.meta.flush()?;
        if let Some(raw) = self.raw.as_mut() {
            raw.flush()?;
        }
        Ok(())
    }
}

/// Sink that writes records to disk
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    segment: Segment,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> Result<Self, ContractError> {
        fs::create_dir_all(&config.base_path)?;
        let segment = Segment::open(&config.base_path, 0, config.write_raw)?;
        Ok(Self {
            name: name.into(),
            config,
            segment,
        })
    }

    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = FileSinkConfig::from_params(params).map_err(|message| {
            ContractError::config_validation(format!("sinks[{name}].params"), message)
        })?;
        Self::new(name, config)
    }

    fn rotate(&mut self) -> std::io::Result<()> {
        self.segment.flush()?;
        let next = self.segment.index + 1;
        self.segment = Segment::open(&self.config.base_path, next, self.config.write_raw)?;
        info!(sink = %self.name, segment = next, "FileSink rotated");
        Ok(())
    }

    fn write_record_to_disk(&mut self, record: &ModelOutputRecord) -> std::io::Result<()> {
        let limit = self.config.segment_records;
        if limit > 0 && self.segment.records >= limit {
            self.rotate()?;
        }
        self.segment.append(record)
    }
}

impl DataSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, record),
        fields(sink = %self.name, frame_id = record.frame_id)
    )]
    async fn write(&mut self, record: &ModelOutputRecord) -> Result<(), ContractError> {
        self.write_record_to_disk(record).map_err(|e| {
            error!(error = %e, "write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        self.segment
            .flush()
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush().await?;
        debug!(sink = %self.name, segment = self.segment.index, "FileSink closed");
        Ok(())
    }
}
