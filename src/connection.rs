use crate::error::KvError;
use crate::protocol::{
    CommandLine, DeleteRequest, FrameError, GetRequest, LineParser, PutRequest, Response, Verb,
    parse_command_line,
};
use crate::service::Service;
use bytes::BytesMut;
use serde::de::DeserializeOwned;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-connection limits.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    /// Longest a read may wait for data. None = no deadline.
    pub read_timeout: Option<Duration>,
    pub max_line_bytes: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        ConnectionSettings {
            read_timeout: Some(Duration::from_secs(300)),
            max_line_bytes: 1024 * 1024,
        }
    }
}

/// Where a connection is in the two-line request exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    AwaitVerb,
    AwaitPayload(Verb),
}

/// Serve one client until it disconnects.
///
/// Requests are handled strictly in order: a response is written and flushed
/// before the next line is looked at. Returns `Ok(())` on end of stream or
/// once `shutdown` fires between requests, and an error when the connection
/// has to be dropped (deadline, oversized line, socket failure).
pub async fn handle_connection<T, S>(
    mut stream: T,
    service: &S,
    settings: ConnectionSettings,
    shutdown: &CancellationToken,
) -> io::Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
    S: Service,
{
    let mut buf = BytesMut::with_capacity(4096);
    let mut parser = LineParser::new(settings.max_line_bytes);
    let mut state = RequestState::AwaitVerb;

    loop {
        // Handle every complete line already buffered
        loop {
            match parser.parse(&mut buf) {
                Ok(Some(line)) => {
                    let (next, response) = step(state, &line, service).await;
                    state = next;
                    if let Some(response) = response {
                        write_response(&mut stream, &response).await?;
                    }
                }
                Ok(None) => break,
                Err(FrameError::InvalidUtf8) => {
                    warn!("Skipping line: {}", FrameError::InvalidUtf8);
                }
                Err(e @ FrameError::TooLong(_)) => {
                    return Err(io::Error::new(io::ErrorKind::InvalidData, e));
                }
            }
        }

        let read = async {
            match settings.read_timeout {
                Some(dur) => match tokio::time::timeout(dur, stream.read_buf(&mut buf)).await {
                    Ok(result) => result,
                    Err(_) => Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "read deadline exceeded",
                    )),
                },
                None => stream.read_buf(&mut buf).await,
            }
        };
        let result = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            result = read => result,
        };

        match result {
            Ok(0) => {
                if let RequestState::AwaitPayload(verb) = state {
                    debug!("Client left before sending the {} payload", verb.as_str());
                }
                return Ok(());
            }
            Ok(_) => {}
            Err(e) if is_transient(&e) => {
                warn!("Read error, retrying: {e}");
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}

/// Advance the request state by one line, producing a response when a
/// request is complete.
async fn step<S: Service>(
    state: RequestState,
    line: &str,
    service: &S,
) -> (RequestState, Option<Response>) {
    match state {
        RequestState::AwaitVerb => match parse_command_line(line) {
            CommandLine::Verb(verb, Some(payload)) => {
                (RequestState::AwaitVerb, Some(execute(verb, payload, service).await))
            }
            CommandLine::Verb(verb, None) => (RequestState::AwaitPayload(verb), None),
            CommandLine::Unexpected => {
                debug!("Unexpected operation line: {line:?}");
                (
                    RequestState::AwaitVerb,
                    Some(Response::error(&KvError::UnexpectedOperation)),
                )
            }
        },
        RequestState::AwaitPayload(verb) => {
            (RequestState::AwaitVerb, Some(execute(verb, line, service).await))
        }
    }
}

/// Run one request against the service.
///
/// A payload that fails to parse is logged and replaced by an empty request
/// of the right shape, so the operation still runs (with an empty key).
pub async fn execute<S: Service>(verb: Verb, payload: &str, service: &S) -> Response {
    debug!("{}", verb.as_str());
    match verb {
        Verb::Get => {
            let req: GetRequest = decode_payload(verb, payload);
            Response::from_get(service.get(req.key).await)
        }
        Verb::Put => {
            let req: PutRequest = decode_payload(verb, payload);
            Response::from_unit(service.put(req.key, req.value, req.expiration).await)
        }
        Verb::Delete => {
            let req: DeleteRequest = decode_payload(verb, payload);
            Response::from_unit(service.delete(req.key).await)
        }
    }
}

fn decode_payload<T: DeserializeOwned + Default>(verb: Verb, payload: &str) -> T {
    match serde_json::from_str(payload.trim()) {
        Ok(req) => req,
        Err(e) => {
            warn!("Bad {} payload, using empty request: {}", verb.as_str(), KvError::from(e));
            T::default()
        }
    }
}

async fn write_response<T>(stream: &mut T, response: &Response) -> io::Result<()>
where
    T: AsyncWrite + Unpin,
{
    let encoded = response.encode().map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    stream.write_all(&encoded).await?;
    stream.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KvResult;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::io::{AsyncBufReadExt, BufReader};

    /// Records calls and answers GET with the key itself.
    #[derive(Default)]
    struct EchoService {
        calls: Mutex<Vec<String>>,
        puts: Mutex<HashMap<String, (String, i64)>>,
    }

    impl Service for EchoService {
        async fn put(&self, key: String, value: String, expiration: i64) -> KvResult<()> {
            self.calls.lock().unwrap().push(format!("PUT {key}"));
            self.puts.lock().unwrap().insert(key, (value, expiration));
            Ok(())
        }

        async fn get(&self, key: String) -> KvResult<String> {
            self.calls.lock().unwrap().push(format!("GET {key}"));
            if key.is_empty() {
                Err(KvError::KeyNotFound)
            } else {
                Ok(key)
            }
        }

        async fn delete(&self, key: String) -> KvResult<()> {
            self.calls.lock().unwrap().push(format!("DELETE {key}"));
            Ok(())
        }
    }

    async fn exchange(input: &str, service: &EchoService) -> Vec<String> {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (read_half, mut write_half) = tokio::io::split(client);
        write_half.write_all(input.as_bytes()).await.unwrap();
        write_half.shutdown().await.unwrap();

        handle_connection(server, service, ConnectionSettings::default(), &CancellationToken::new())
            .await
            .unwrap();

        let mut lines = Vec::new();
        let mut reader = BufReader::new(read_half).lines();
        while let Some(line) = reader.next_line().await.unwrap() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn test_get_two_lines() {
        let service = EchoService::default();
        let lines = exchange("GET\n{\"Key\":\"someKey\"}\n", &service).await;
        assert_eq!(lines, vec!["{\"Value\":\"someKey\",\"Err\":\"\"}"]);
    }

    #[tokio::test]
    async fn test_put_and_delete() {
        let service = EchoService::default();
        let lines = exchange(
            "PUT\n{\"Key\":\"1\",\"Value\":\"one\",\"Expiration\":99}\nDELETE\n{\"Key\":\"1\"}\n",
            &service,
        )
        .await;
        assert_eq!(lines, vec!["{\"Err\":\"\"}", "{\"Err\":\"\"}"]);
        assert_eq!(
            service.puts.lock().unwrap().get("1"),
            Some(&("one".to_string(), 99))
        );
        assert_eq!(*service.calls.lock().unwrap(), vec!["PUT 1", "DELETE 1"]);
    }

    #[tokio::test]
    async fn test_unexpected_verb_reads_no_payload() {
        let service = EchoService::default();
        let lines = exchange("STRANGERTHING\nGET\n{\"Key\":\"k\"}\n", &service).await;
        assert_eq!(
            lines,
            vec![
                "{\"Err\":\"unexpected type of operation\"}",
                "{\"Value\":\"k\",\"Err\":\"\"}",
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_payload_fails_open() {
        let service = EchoService::default();
        let lines = exchange("GET\nnot json at all\n", &service).await;
        assert_eq!(lines, vec!["{\"Value\":\"\",\"Err\":\"key not found\"}"]);
        assert_eq!(*service.calls.lock().unwrap(), vec!["GET "]);
    }

    #[tokio::test]
    async fn test_inline_payload() {
        let service = EchoService::default();
        let lines = exchange("GET {\"Key\":\"inline\"}\n", &service).await;
        assert_eq!(lines, vec!["{\"Value\":\"inline\",\"Err\":\"\"}"]);
    }

    #[tokio::test]
    async fn test_oversized_line_drops_connection() {
        let service = EchoService::default();
        let (mut client, server) = tokio::io::duplex(1024);
        client.write_all(&[b'x'; 100]).await.unwrap();

        let settings = ConnectionSettings {
            read_timeout: None,
            max_line_bytes: 16,
        };
        let err = handle_connection(server, &service, settings, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_deadline() {
        let service = EchoService::default();
        let (_client, server) = tokio::io::duplex(1024);
        let settings = ConnectionSettings {
            read_timeout: Some(Duration::from_secs(5)),
            max_line_bytes: 1024,
        };
        let err = handle_connection(server, &service, settings, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_shutdown_between_requests() {
        let service = EchoService::default();
        let (_client, server) = tokio::io::duplex(1024);
        let token = CancellationToken::new();
        token.cancel();
        handle_connection(server, &service, ConnectionSettings::default(), &token)
            .await
            .unwrap();
        assert!(service.calls.lock().unwrap().is_empty());
    }
}
