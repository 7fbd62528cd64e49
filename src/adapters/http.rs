//! HTTP firmware fetch adapter — [`FetchClient`] over `esp-idf-svc`'s
//! HTTP client.
//!
//! One connection per update; the engine drives the chunked read loop.

use std::time::Duration;

use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
use esp_idf_svc::http::Method;
use log::warn;

use crate::app::ports::{FetchClient, FetchConnection, FetchError};

pub struct HttpFetchClient;

impl HttpFetchClient {
    pub fn new() -> Self {
        Self
    }
}

impl FetchClient for HttpFetchClient {
    fn open(&self, url: &str, timeout: Duration) -> Result<Box<dyn FetchConnection>, FetchError> {
        let mut conn = EspHttpConnection::new(&Configuration {
            timeout: Some(timeout),
            ..Default::default()
        })
        .map_err(|e| {
            warn!("http client init failed: {e}");
            FetchError::Connect
        })?;

        conn.initiate_request(Method::Get, url, &[]).map_err(|e| {
            warn!("http request to {url} failed: {e}");
            FetchError::Connect
        })?;
        conn.initiate_response().map_err(|e| {
            warn!("http response failed: {e}");
            FetchError::Connect
        })?;

        let status = conn.status();
        if !(200..300).contains(&status) {
            warn!("http status {status} for {url}");
            return Err(FetchError::Protocol);
        }

        Ok(Box::new(HttpFetchConnection { conn }))
    }
}

struct HttpFetchConnection {
    conn: EspHttpConnection,
}

impl FetchConnection for HttpFetchConnection {
    fn content_length(&mut self) -> Result<u64, FetchError> {
        self.conn
            .header("Content-Length")
            .and_then(|v| v.parse().ok())
            .ok_or(FetchError::Protocol)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FetchError> {
        self.conn.read(buf).map_err(|e| {
            warn!("http read failed: {e}");
            FetchError::Io
        })
    }
}
