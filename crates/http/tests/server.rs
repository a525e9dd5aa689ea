use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use micro_echo_http::connection::{HttpConnection, Phase};
use micro_echo_http::handler::{BodyHandler, Exchange, FormHandler, HandlerMode, MAX_FORM_BODY_SIZE};
use micro_echo_http::protocol::HandlerError;
use micro_echo_http::server::{Server, ServerConfig};
use micro_echo_http::transport::ListenAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

/// Sends `chunks` one write at a time, then half-closes and reads until EOF.
async fn roundtrip(handler: Arc<dyn BodyHandler>, chunks: &[&[u8]]) -> String {
    let (mut client, server) = duplex(64 * 1024);
    let connection = HttpConnection::new(server, handler);

    let client_side = async move {
        for chunk in chunks {
            client.write_all(chunk).await.unwrap();
            tokio::task::yield_now().await;
        }
        client.shutdown().await.unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        response
    };

    let (result, response) = tokio::join!(connection.process(), client_side);
    result.unwrap();
    response
}

async fn send(mode: HandlerMode, request: &[u8]) -> String {
    roundtrip(mode.handler(), &[request]).await
}

fn response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn post(content_type: &str, body: &str) -> String {
    format!("POST / HTTP/1.1\r\nHost: localhost\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\r\n{body}", body.len())
}

#[tokio::test]
async fn json_stream_echoes_data() {
    let request = post("application/json", r#"{"data":{"x":1}}"#);
    assert_eq!(send(HandlerMode::JsonStream, request.as_bytes()).await, response("200 OK", r#"{"status":"ok","mode":"stream","echo":{"x":1}}"#));
}

#[tokio::test]
async fn json_buffer_echoes_data() {
    let request = post("application/json; charset=utf-8", r#"{"data":[1,"two",null],"other":true}"#);
    assert_eq!(
        send(HandlerMode::JsonBuffer, request.as_bytes()).await,
        response("200 OK", r#"{"status":"ok","mode":"buffer","echo":[1,"two",null]}"#)
    );
}

#[tokio::test]
async fn response_is_independent_of_how_the_request_is_split() {
    let request = post("application/json", r#"{"data":{"name":"café","n":[1.5,-2e3]}}"#);
    let request = request.as_bytes();

    for mode in [HandlerMode::JsonStream, HandlerMode::JsonBuffer] {
        let whole = send(mode, request).await;
        assert!(whole.starts_with("HTTP/1.1 200 OK\r\n"), "{whole}");

        for split in (1..request.len()).step_by(7) {
            let (head, tail) = request.split_at(split);
            assert_eq!(roundtrip(mode.handler(), &[head, tail]).await, whole, "{mode} split at {split}");
        }

        let bytes: Vec<&[u8]> = request.chunks(1).collect();
        assert_eq!(roundtrip(mode.handler(), &bytes).await, whole, "{mode} byte by byte");
    }
}

#[tokio::test]
async fn bodyless_request_gets_the_default_message() {
    let request = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
    assert_eq!(send(HandlerMode::JsonStream, request).await, response("200 OK", r#"{"status":"ok","message":"HTTP JSON Server (stream)"}"#));
    assert_eq!(send(HandlerMode::JsonBuffer, request).await, response("200 OK", r#"{"status":"ok","message":"HTTP JSON Server (buffer)"}"#));
    assert_eq!(send(HandlerMode::Form, request).await, response("200 OK", r#"{"status":"ok","message":"HTTP Form Server"}"#));
}

#[tokio::test]
async fn other_content_types_are_ignored() {
    let request = post("text/plain", "hello");
    assert_eq!(send(HandlerMode::JsonStream, request.as_bytes()).await, response("200 OK", r#"{"status":"ok","message":"HTTP JSON Server (stream)"}"#));

    let request = post("application/json", "a=1");
    assert_eq!(send(HandlerMode::Form, request.as_bytes()).await, response("200 OK", r#"{"status":"ok","message":"HTTP Form Server"}"#));
}

#[tokio::test]
async fn form_fields_come_back_in_reverse_order() {
    let request = post("application/x-www-form-urlencoded", "name=John+Smith&city=New%20York&age=30");
    assert_eq!(
        send(HandlerMode::Form, request.as_bytes()).await,
        response("200 OK", r#"{"status":"ok","type":"form-urlencoded","fields":{"age":"30","city":"New York","name":"John Smith"}}"#)
    );
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let request = post("application/json", r#"{"data": tru}"#);
    let expected = response("400 Bad Request", r#"{"error":"Invalid JSON","status":"error"}"#);
    assert_eq!(send(HandlerMode::JsonStream, request.as_bytes()).await, expected);
    assert_eq!(send(HandlerMode::JsonBuffer, request.as_bytes()).await, expected);
}

#[tokio::test]
async fn truncated_json_is_a_bad_request() {
    let request = post("application/json", r#"{"data":[1,2"#);
    assert_eq!(
        send(HandlerMode::JsonStream, request.as_bytes()).await,
        response("400 Bad Request", r#"{"error":"Invalid JSON","status":"error"}"#)
    );
}

#[tokio::test]
async fn oversized_form_body_is_a_bad_request() {
    let body = "a".repeat(MAX_FORM_BODY_SIZE + 1);
    let request = post("application/x-www-form-urlencoded", &body);
    assert_eq!(
        send(HandlerMode::Form, request.as_bytes()).await,
        response("400 Bad Request", r#"{"error":"Form body too large","status":"error"}"#)
    );
}

#[tokio::test]
async fn chunked_body_is_reassembled() {
    let request = concat!(
        "POST / HTTP/1.1\r\n",
        "Content-Type: application/json\r\n",
        "Transfer-Encoding: chunked\r\n\r\n",
        "7\r\n{\"data\"\r\n",
        "5\r\n:\"hi\"\r\n",
        "1\r\n}\r\n",
        "0\r\n\r\n",
    );
    assert_eq!(send(HandlerMode::JsonStream, request.as_bytes()).await, response("200 OK", r#"{"status":"ok","mode":"stream","echo":"hi"}"#));
}

#[tokio::test]
async fn bytes_after_the_request_are_dropped() {
    let mut request = post("application/json", r#"{"data":1}"#);
    request.push_str("GET /second HTTP/1.1\r\n\r\n");
    assert_eq!(send(HandlerMode::JsonStream, request.as_bytes()).await, response("200 OK", r#"{"status":"ok","mode":"stream","echo":1}"#));
}

#[tokio::test]
async fn syntax_error_gets_no_response() {
    assert_eq!(send(HandlerMode::JsonStream, b"NOT AN HTTP REQUEST\x01\r\n\r\n").await, "");
}

#[tokio::test]
async fn peer_closing_early_gets_no_response() {
    assert_eq!(send(HandlerMode::Form, b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nab").await, "");
}

/// Form handler that counts how often its state is released.
#[derive(Debug, Default)]
struct CountingCleanup {
    cleanups: AtomicUsize,
}

impl BodyHandler for CountingCleanup {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn init(&self, exchange: &mut Exchange, content_type: Option<&str>) -> Result<(), HandlerError> {
        FormHandler.init(exchange, content_type)
    }

    fn data(&self, exchange: &mut Exchange, chunk: &[u8]) -> Result<(), HandlerError> {
        FormHandler.data(exchange, chunk)
    }

    fn complete(&self, exchange: &mut Exchange) -> Result<(), HandlerError> {
        FormHandler.complete(exchange)
    }

    fn cleanup(&self, exchange: &mut Exchange) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        FormHandler.cleanup(exchange);
    }
}

#[tokio::test]
async fn handler_state_is_released_once_after_processing() {
    let handler = Arc::new(CountingCleanup::default());
    let request = post("application/x-www-form-urlencoded", "a=1");

    let response = roundtrip(Arc::clone(&handler) as Arc<dyn BodyHandler>, &[request.as_bytes()]).await;
    assert!(response.ends_with(r#"{"status":"ok","type":"form-urlencoded","fields":{"a":"1"}}"#), "{response}");
    assert_eq!(handler.cleanups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dropping_an_unprocessed_connection_releases_its_state() {
    let handler = Arc::new(CountingCleanup::default());
    let (_client, server) = duplex(1024);

    let mut connection = HttpConnection::new(server, Arc::clone(&handler) as Arc<dyn BodyHandler>);
    assert_eq!(connection.phase(), Phase::Accepted);

    connection.teardown();
    assert_eq!(connection.phase(), Phase::Closed);
    drop(connection);

    assert_eq!(handler.cleanups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn serves_over_tcp() {
    let config = ServerConfig { listen: ListenAddr::Tcp { host: "127.0.0.1".into(), port: 0 }, mode: HandlerMode::JsonStream, tls: None };
    let server = Server::bind(&config).await.unwrap();
    assert!(!server.is_tls());
    let addr = server.local_addr().unwrap();
    let serving = tokio::spawn(async move { server.run().await });

    for n in 0..3 {
        let mut stream = tokio::net::TcpStream::connect(addr.as_str()).await.unwrap();
        stream.write_all(post("application/json", &format!(r#"{{"data":{n}}}"#)).as_bytes()).await.unwrap();

        let mut reply = String::new();
        stream.read_to_string(&mut reply).await.unwrap();
        assert_eq!(reply, response("200 OK", &format!(r#"{{"status":"ok","mode":"stream","echo":{n}}}"#)));
    }

    serving.abort();
}

#[cfg(unix)]
#[tokio::test]
async fn serves_over_a_unix_socket() {
    let path = std::env::temp_dir().join(format!("micro-echo-it-{}.sock", std::process::id()));
    let config = ServerConfig { listen: ListenAddr::Unix(path.clone()), mode: HandlerMode::Form, tls: None };
    let server = Server::bind(&config).await.unwrap();
    let serving = tokio::spawn(async move { server.run().await });

    let mut stream = tokio::net::UnixStream::connect(&path).await.unwrap();
    stream.write_all(post("application/x-www-form-urlencoded", "x=1&y=2").as_bytes()).await.unwrap();

    let mut reply = String::new();
    stream.read_to_string(&mut reply).await.unwrap();
    assert_eq!(reply, response("200 OK", r#"{"status":"ok","type":"form-urlencoded","fields":{"y":"2","x":"1"}}"#));

    serving.abort();
    std::fs::remove_file(&path).unwrap();
}
