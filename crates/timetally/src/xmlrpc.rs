//! 📜 XML-RPC — the wire format that time forgot, and the ERP never did.
//!
//! 🎬 *[a methodCall envelope is sealed with wax. somewhere, a SOAP server sheds a single tear.]*
//!
//! Three pieces, leaf first:
//! - [`Value`]: the dynamically typed payload (ints, doubles, strings, arrays, structs, `false`)
//! - `codec`: `Value` → `<methodCall>` text, `<methodResponse>` text → `Value` or fault
//! - [`XmlRpcClient`]: one endpoint, one POST per call, via reqwest
//!
//! This is not a general RPC framework. It is exactly enough XML-RPC to talk to one ERP. 🦆

mod client;
mod codec;
mod value;

pub(crate) use client::XmlRpcClient;
pub(crate) use value::Value;

/// 💀 Everything that can go wrong between us and the remote end, sorted by blame.
#[derive(Debug, thiserror::Error)]
pub(crate) enum RpcError {
    /// 📡 the request never got an answer (DNS, TCP, TLS, timeouts...)
    #[error("📡 transport failure talking to '{endpoint}'")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// 🚪 the server answered, just not with a 2xx
    #[error("💀 '{endpoint}' answered with HTTP {status}")]
    Status { endpoint: String, status: u16 },
    /// 🧯 the server understood us and said no
    #[error("💀 XML-RPC fault {code}: {message}")]
    Fault { code: String, message: String },
    /// 🧩 the bytes were not the XML-RPC we were promised
    #[error("💀 malformed XML-RPC payload: {0}")]
    Malformed(String),
}
