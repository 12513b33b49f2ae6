//! Minimal async client for the line protocol.

use crate::error::{KvError, KvResult};
use crate::protocol::{DeleteRequest, GetRequest, PutRequest, Response, encode_line};
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, writer) = stream.into_split();
        Ok(Client {
            reader: BufReader::new(read_half),
            writer,
        })
    }

    pub async fn get(&mut self, key: &str) -> KvResult<String> {
        let payload = encode_line(&GetRequest { key: key.to_string() })?;
        let response = self.request("GET", &payload).await?;
        Ok(response.into_result()?.unwrap_or_default())
    }

    pub async fn put(&mut self, key: &str, value: &str, expiration: i64) -> KvResult<()> {
        let payload = encode_line(&PutRequest {
            key: key.to_string(),
            value: value.to_string(),
            expiration,
        })?;
        self.request("PUT", &payload).await?.into_result()?;
        Ok(())
    }

    pub async fn delete(&mut self, key: &str) -> KvResult<()> {
        let payload = encode_line(&DeleteRequest { key: key.to_string() })?;
        self.request("DELETE", &payload).await?.into_result()?;
        Ok(())
    }

    /// Send a verb line, then `payload` verbatim (may be empty), and read one
    /// response line.
    pub async fn raw(&mut self, verb: &str, payload: &str) -> KvResult<Response> {
        let mut body = payload.as_bytes().to_vec();
        if !body.is_empty() && !body.ends_with(b"\n") {
            body.push(b'\n');
        }
        self.request(verb, &body).await
    }

    async fn request(&mut self, verb: &str, payload: &[u8]) -> KvResult<Response> {
        let mut message = Vec::with_capacity(verb.len() + 1 + payload.len());
        message.extend_from_slice(verb.as_bytes());
        message.push(b'\n');
        message.extend_from_slice(payload);
        self.writer.write_all(&message).await?;
        self.writer.flush().await?;
        self.read_response().await
    }

    async fn read_response(&mut self) -> KvResult<Response> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err(KvError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            )));
        }
        Ok(serde_json::from_str(line.trim_end())?)
    }
}
