//! Blocking JSON-over-TCP oracle client.
//!
//! One request line, one reply line, in order. The caller is suspended
//! until the reply arrives or the connection fails; there is no timeout
//! or cancellation path, matching the document's synchronous model.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};

use serde::{Deserialize, Serialize};

use crate::packet::DecodedPacket;

use super::Oracle;
use super::error::OracleError;
use super::request::LayerEditBatch;

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    id: u64,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    kind: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    protocol_id: Option<String>,
    #[serde(default)]
    field_id: Option<String>,
}

impl WireError {
    fn into_oracle_error(self) -> OracleError {
        let WireError {
            kind,
            message,
            protocol_id,
            field_id,
        } = self;
        match kind.as_str() {
            "decode_failed" => OracleError::DecodeFailed { message },
            "unknown_protocol" => OracleError::UnknownProtocol {
                id: protocol_id.unwrap_or(message),
            },
            "append_rejected" => OracleError::AppendRejected {
                id: protocol_id.unwrap_or_default(),
                message,
            },
            "empty_stack" => OracleError::EmptyStack,
            "invalid_field_id" => OracleError::InvalidFieldId {
                protocol_id: protocol_id.unwrap_or_default(),
                field_id: field_id.unwrap_or_default(),
            },
            "value_out_of_range" => OracleError::ValueOutOfRange {
                field_id: field_id.unwrap_or_default(),
                message,
            },
            "expression_error" => OracleError::ExpressionError {
                field_id: field_id.unwrap_or_default(),
                message,
            },
            other => OracleError::Protocol(format!("unknown error kind {other}: {message}")),
        }
    }
}

/// Oracle client over a TCP connection, line-delimited JSON both ways.
pub struct RemoteOracle {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    next_id: u64,
}

impl RemoteOracle {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, OracleError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            reader,
            writer: BufWriter::new(stream),
            next_id: 0,
        })
    }

    fn call(
        &mut self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, OracleError> {
        self.next_id += 1;
        let id = self.next_id;

        let mut line = serde_json::to_string(&WireRequest { id, method, params })
            .map_err(|err| OracleError::Protocol(format!("request encoding failed: {err}")))?;
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;

        let mut reply = String::new();
        if self.reader.read_line(&mut reply)? == 0 {
            return Err(OracleError::Protocol(
                "connection closed by oracle".to_string(),
            ));
        }
        let response: WireResponse = serde_json::from_str(reply.trim_end())
            .map_err(|err| OracleError::Protocol(format!("malformed reply: {err}")))?;
        if response.id != id {
            return Err(OracleError::Protocol(format!(
                "reply id {} does not match request id {}",
                response.id, id
            )));
        }
        match (response.result, response.error) {
            (Some(result), None) => Ok(result),
            (None, Some(error)) => Err(error.into_oracle_error()),
            _ => Err(OracleError::Protocol(
                "reply carries neither result nor error".to_string(),
            )),
        }
    }

    fn call_for_packet(
        &mut self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<DecodedPacket, OracleError> {
        let result = self.call(method, params)?;
        serde_json::from_value(result)
            .map_err(|err| OracleError::Protocol(format!("malformed packet in reply: {err}")))
    }
}

impl Oracle for RemoteOracle {
    fn decode(&mut self, bytes: &[u8]) -> Result<DecodedPacket, OracleError> {
        let bytes = crate::packet::PacketBytes::from(bytes);
        self.call_for_packet("decode", serde_json::json!({ "bytes": bytes }))
    }

    fn append_layer(
        &mut self,
        packet: &DecodedPacket,
        protocol_id: &str,
    ) -> Result<DecodedPacket, OracleError> {
        self.call_for_packet(
            "append_layer",
            serde_json::json!({ "packet": packet, "protocol_id": protocol_id }),
        )
    }

    fn remove_top_layer(&mut self, packet: &DecodedPacket) -> Result<DecodedPacket, OracleError> {
        self.call_for_packet("remove_top_layer", serde_json::json!({ "packet": packet }))
    }

    fn apply_edits(
        &mut self,
        packet: &DecodedPacket,
        batches: &[LayerEditBatch],
    ) -> Result<DecodedPacket, OracleError> {
        self.call_for_packet(
            "apply_edits",
            serde_json::json!({ "packet": packet, "batches": batches }),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::{Oracle, OracleError, RemoteOracle};

    /// Serve one connection with canned reply lines, returning the
    /// request lines that were received.
    fn canned_server(replies: Vec<String>) -> (std::net::SocketAddr, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));
            let mut stream = stream;
            let mut requests = Vec::new();
            for reply in replies {
                let mut line = String::new();
                if reader.read_line(&mut line).expect("read request") == 0 {
                    break;
                }
                requests.push(line.trim_end().to_string());
                stream.write_all(reply.as_bytes()).expect("write reply");
                stream.write_all(b"\n").expect("write newline");
            }
            requests
        });
        (addr, handle)
    }

    #[test]
    fn decode_round_trip() {
        let reply = serde_json::json!({
            "id": 1,
            "result": {
                "bytes": "AAE=",
                "layers": [{"protocol_id": "Ether", "offset": 0, "fields": []}]
            }
        });
        let (addr, server) = canned_server(vec![reply.to_string()]);

        let mut oracle = RemoteOracle::connect(addr).expect("connect");
        let packet = oracle.decode(&[0x00, 0x01]).expect("decode");
        assert_eq!(packet.bytes.as_slice(), &[0x00, 0x01]);
        assert_eq!(packet.layers[0].protocol_id, "Ether");

        let requests = server.join().expect("server");
        let request: serde_json::Value = serde_json::from_str(&requests[0]).expect("request json");
        assert_eq!(request["method"], "decode");
        assert_eq!(request["params"]["bytes"], "AAE=");
    }

    #[test]
    fn semantic_errors_are_mapped() {
        let reply = serde_json::json!({
            "id": 1,
            "error": {
                "kind": "value_out_of_range",
                "message": "65536 does not fit in 16 bits",
                "field_id": "sport"
            }
        });
        let (addr, server) = canned_server(vec![reply.to_string()]);

        let mut oracle = RemoteOracle::connect(addr).expect("connect");
        let err = oracle
            .apply_edits(&Default::default(), &[])
            .expect_err("error reply");
        assert!(
            matches!(err, OracleError::ValueOutOfRange { ref field_id, .. } if field_id == "sport")
        );
        server.join().expect("server");
    }

    #[test]
    fn closed_connection_is_a_protocol_error() {
        let (addr, server) = canned_server(vec![]);
        let mut oracle = RemoteOracle::connect(addr).expect("connect");
        let err = oracle.decode(&[]).expect_err("closed");
        assert!(matches!(err, OracleError::Protocol(_) | OracleError::Io(_)));
        server.join().expect("server");
    }
}
