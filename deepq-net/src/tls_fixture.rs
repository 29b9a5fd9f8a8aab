//! Loopback HTTPS listener presenting a self-signed certificate

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ServerConfig, ServerConnection, StreamOwned};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::Arc;

const CERT_PEM: &[u8] = include_bytes!("../testdata/self_signed_cert.pem");
const KEY_PEM: &[u8] = include_bytes!("../testdata/self_signed_key.pem");

fn server_config() -> Arc<ServerConfig> {
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut &CERT_PEM[..])
        .collect::<Result<_, _>>()
        .unwrap();
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut &KEY_PEM[..]).unwrap().unwrap();

    let config = ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap();
    Arc::new(config)
}

/// Serve `body` as HTML to every connection that completes the handshake.
/// Returns the base URL.
pub fn spawn_https(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = server_config();

    std::thread::spawn(move || {
        for tcp in listener.incoming().flatten() {
            let Ok(conn) = ServerConnection::new(config.clone()) else {
                continue;
            };
            let mut tls = StreamOwned::new(conn, tcp);
            // Clients that reject the certificate end the handshake here
            let _ = respond(&mut tls, body);
        }
    });

    format!("https://127.0.0.1:{}", port)
}

fn respond<S: Read + Write>(stream: &mut StreamOwned<ServerConnection, S>, body: &str) -> std::io::Result<()> {
    let mut reader = BufReader::new(&mut *stream);
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 || line == "\r\n" {
            break;
        }
    }
    drop(reader);

    write!(
        stream,
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )?;
    stream.conn.send_close_notify();
    stream.flush()
}
