//! A thin JSON-RPC-over-HTTP client, the wire shape Bitcoin-family daemons
//! use for `getblocktemplate`/`getwork`/`submitblock`: HTTP basic auth, a
//! `{"jsonrpc":"1.0","id":...,"method":...,"params":...}` body, and the
//! result either in `.result` or an error in `.error`.

use std::time::Duration;

use serde_json::{json, Value};

use crate::error::RpcError;

/// The `result` value of a response plus, if the server sent one
/// alongside it, the `reject-reason` sibling field bitcoind-style daemons
/// attach to a `getwork`/`submitblock` rejection (§7/spec.md:197).
pub struct RpcResponse {
    pub result: Value,
    pub reject_reason: Option<String>,
}

/// What a single RPC call came back as: a normal `getblocktemplate`/etc
/// response needs no fallback; `NotFound` signals the server doesn't
/// support this method at all (the GBT → GetWork protocol fallback in
/// §4.4/S5 triggers off exactly this).
pub enum RpcOutcome {
    Ok(RpcResponse),
    NotFound,
}

pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    user: Option<String>,
    pass: Option<String>,
}

impl RpcClient {
    pub fn new(
        url: String,
        user: Option<String>,
        pass: Option<String>,
        timeout_secs: u32,
        proxy: Option<&str>,
        cert: Option<&str>,
    ) -> Result<Self, RpcError> {
        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(timeout_secs as u64));
        if let Some(proxy_url) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }
        if let Some(cert_path) = cert {
            let pem = std::fs::read(cert_path)?;
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }
        let http = builder.build()?;
        Ok(RpcClient { http, url, user, pass })
    }

    pub async fn call(&self, id: u64, method: &str, params: Value) -> Result<RpcOutcome, RpcError> {
        self.call_with_timeout(id, method, params, false).await
    }

    /// Runs a call with an effectively-infinite client-side timeout — used
    /// by the long-poll task, which relies entirely on the server holding
    /// the connection open until the chain tip changes.
    pub async fn call_long(&self, id: u64, method: &str, params: Value) -> Result<RpcOutcome, RpcError> {
        self.call_with_timeout(id, method, params, true).await
    }

    async fn call_with_timeout(
        &self,
        id: u64,
        method: &str,
        params: Value,
        long_poll: bool,
    ) -> Result<RpcOutcome, RpcError> {
        let body = json!({
            "jsonrpc": "1.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut request = self.http.post(&self.url).json(&body);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.pass.as_deref());
        }
        if long_poll {
            request = request.timeout(Duration::from_secs(3600));
        }

        let response = request.send().await?;
        if response.status().as_u16() == 404 {
            return Ok(RpcOutcome::NotFound);
        }

        let body: Value = response.json().await?;
        if !body["error"].is_null() {
            return Err(RpcError::Server(body["error"].to_string()));
        }
        let reject_reason = body["reject-reason"].as_str().map(str::to_string);
        Ok(RpcOutcome::Ok(RpcResponse { result: body["result"].clone(), reject_reason }))
    }
}
