use tracing::trace;

use super::RpcError;
use super::codec::{decode_response, encode_call};
use super::value::Value;

/// 📡 One XML-RPC endpoint, one POST per call.
///
/// The `reqwest::Client` is shared and cheap to clone; timeouts live on it, not here.
#[derive(Debug, Clone)]
pub(crate) struct XmlRpcClient {
    http: reqwest::Client,
    endpoint: String,
}

impl XmlRpcClient {
    pub(crate) fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    pub(crate) fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 📨 Call `method` with positional `params` and decode the single return value.
    pub(crate) async fn call(&self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        let body = encode_call(method, params);
        trace!("📨 {} ← {} ({} bytes)", self.endpoint, method, body.len());

        let transport = |source| RpcError::Transport {
            endpoint: self.endpoint.clone(),
            source,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "text/xml")
            .body(body)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let text = response.text().await.map_err(transport)?;
        decode_response(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn int_response(i: i64) -> String {
        format!(
            "<?xml version='1.0'?><methodResponse><params><param><value><int>{i}</int></value></param></params></methodResponse>"
        )
    }

    #[tokio::test]
    async fn the_one_where_a_call_goes_out_as_xml_and_comes_back_as_a_value() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/object"))
            .and(header("Content-Type", "text/xml"))
            .and(body_string_contains("<methodName>execute_kw</methodName>"))
            .respond_with(ResponseTemplate::new(200).set_body_string(int_response(250)))
            .expect(1)
            .mount(&server)
            .await;

        let client = XmlRpcClient::new(
            reqwest::Client::new(),
            format!("{}/xmlrpc/2/object", server.uri()),
        );
        let value = client.call("execute_kw", &["db".into()]).await?;
        assert_eq!(value, Value::Int(250));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_500_is_reported_as_a_status_not_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&server)
            .await;

        let client = XmlRpcClient::new(reqwest::Client::new(), server.uri());
        match client.call("authenticate", &[]).await {
            Err(RpcError::Status { status, .. }) => assert_eq!(status, 500),
            other => panic!("💀 expected an HTTP status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn the_one_where_nobody_is_listening() {
        // -- 🔌 port 9 is "discard". nothing XML-RPC lives there. probably.
        let client = XmlRpcClient::new(reqwest::Client::new(), "http://127.0.0.1:9/xmlrpc/2/common");
        let err = client.call("version", &[]).await.unwrap_err();
        assert!(matches!(err, RpcError::Transport { .. }));
        assert!(err.to_string().contains("127.0.0.1:9"));
    }
}
