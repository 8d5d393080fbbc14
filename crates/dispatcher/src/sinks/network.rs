//! NetworkSink - one UDP datagram per model cycle

use contracts::{ContractError, DataSink, ModelOutputRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, instrument, warn};

/// Largest UDP payload over IPv4
const UDP_MAX_PAYLOAD: usize = 65_507;

/// Encoding of the datagram body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    #[default]
    Json,
    Bincode,
}

/// What each datagram carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkPayload {
    /// Header plus the raw model output
    #[default]
    Full,
    /// Header only, for consumers that just track timing and drops
    Header,
}

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    pub addr: SocketAddr,
    pub format: NetworkFormat,
    pub payload: NetworkPayload,
    /// Full packets above this size are sent header-only
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    /// Recognised params: `addr` (required), `format` (`json`|`bincode`),
    /// `payload` (`full`|`header`), `max_packet_size`
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;
        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{addr_str}': {e}"))?;

        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => return Err(format!("unknown format '{other}'")),
        };

        let payload = match params.get("payload").map(String::as_str) {
            Some("header") => NetworkPayload::Header,
            Some("full") | None => NetworkPayload::Full,
            Some(other) => return Err(format!("unknown payload '{other}'")),
        };

        let max_packet_size = match params.get("max_packet_size") {
            Some(s) => s
                .parse::<usize>()
                .map_err(|e| format!("invalid max_packet_size '{s}': {e}"))?,
            None => UDP_MAX_PAYLOAD,
        }
        .min(UDP_MAX_PAYLOAD);

        Ok(Self {
            addr,
            format,
            payload,
            max_packet_size,
        })
    }
}

/// Per-cycle metadata sent ahead of the model output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PacketHeader {
    pub frame_id: u32,
    pub frame_id_extra: u32,
    pub frame_id_plan: u32,
    pub frame_drop_ratio: f32,
    pub frames_dropped: u32,
    pub timestamp_eof: u64,
    pub model_execution_time: f32,
    pub live_calib_seen: bool,
    /// Length of the model output, even when it was left out of the packet
    pub output_len: u32,
}

impl From<&ModelOutputRecord> for PacketHeader {
    fn from(record: &ModelOutputRecord) -> Self {
        Self {
            frame_id: record.frame_id,
            frame_id_extra: record.frame_id_extra,
            frame_id_plan: record.frame_id_plan,
            frame_drop_ratio: record.frame_drop_ratio,
            frames_dropped: record.frames_dropped,
            timestamp_eof: record.timestamp_eof,
            model_execution_time: record.model_execution_time,
            live_calib_seen: record.live_calib_seen,
            output_len: u32::try_from(record.raw_output.len()).unwrap_or(u32::MAX),
        }
    }
}

/// Datagram layout; `raw_output` is `None` for header-only packets
#[derive(Serialize)]
struct Packet<'a> {
    header: PacketHeader,
    raw_output: Option<&'a [f32]>,
}

/// Sink that streams records over UDP
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    socket: Option<UdpSocket>,
    truncated: u64,
}

impl NetworkSink {
    #[instrument(name = "network_sink_new", skip(name, config), fields(target = %config.addr))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let bind_addr = if config.addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(config.addr).await?;
        debug!(sink = %name, "NetworkSink connected");

        Ok(Self {
            name,
            config,
            socket: Some(socket),
            truncated: 0,
        })
    }

    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params).map_err(|message| {
            ContractError::config_validation(format!("sinks[{name}].params"), message)
        })?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::SinkConnection {
                sink_name: name,
                message: e.to_string(),
            })
    }

    fn encode(&self, packet: &Packet<'_>) -> Result<Vec<u8>, ContractError> {
        match self.config.format {
            NetworkFormat::Json => serde_json::to_vec(packet)
                .map_err(|e| ContractError::sink_write(&self.name, format!("json: {e}"))),
            NetworkFormat::Bincode => bincode::serialize(packet)
                .map_err(|e| ContractError::sink_write(&self.name, format!("bincode: {e}"))),
        }
    }

    /// Encode `record`, falling back to a header-only packet when the full one
    /// does not fit in a datagram
    fn build_datagram(&mut self, record: &ModelOutputRecord) -> Result<Vec<u8>, ContractError> {
        let header = PacketHeader::from(record);
        if self.config.payload == NetworkPayload::Full {
            let full = self.encode(&Packet {
                header,
                raw_output: Some(&record.raw_output),
            })?;
            if full.len() <= self.config.max_packet_size {
                return Ok(full);
            }
            self.truncated += 1;
            warn!(
                sink = %self.name,
                frame_id = record.frame_id,
                size = full.len(),
                max = self.config.max_packet_size,
                "model output does not fit in a datagram, sending header only"
            );
        }

        let data = self.encode(&Packet {
            header,
            raw_output: None,
        })?;
        if data.len() > self.config.max_packet_size {
            return Err(ContractError::sink_write(
                &self.name,
                format!("header of {} bytes exceeds max_packet_size", data.len()),
            ));
        }
        Ok(data)
    }
}

impl DataSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_write",
        skip(self, record),
        fields(sink = %self.name, frame_id = record.frame_id)
    )]
    async fn write(&mut self, record: &ModelOutputRecord) -> Result<(), ContractError> {
        if self.socket.is_none() {
            return Err(ContractError::sink_write(&self.name, "socket closed"));
        }
        let data = self.build_datagram(record)?;

        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.name, "socket closed"))?;
        let sent = socket
            .send(&data)
            .await
            .map_err(|e| ContractError::sink_write(&self.name, format!("udp send: {e}")))?;
        debug!(sink = %self.name, bytes = sent, "datagram sent");
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(sink = %self.name, truncated = self.truncated, "NetworkSink closed");
        Ok(())
    }
}
