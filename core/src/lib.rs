//! HTTP request pipeline and persistence façade for mobile clients.
//!
//! # Overview
//! `RequestPipeline` turns a `RequestDescriptor` into an `HttpRequest`, hands
//! it to an injected `HttpTransport`, and classifies the `HttpResponse` into a
//! decoded value or a `NetworkError`. It offers an async call and a
//! single-event `Publisher`. `PersistenceController` wraps an injected
//! `PersistentContext` with typed save/fetch/delete.
//!
//! # Design
//! - The pipeline is stateless apart from its debug flag, and each call makes
//!   exactly one transport dispatch.
//! - `build_request` and `parse_response` are public and do no I/O, so a host
//!   can run the exchange itself (see the `netkit-ffi` crate).
//! - Persistence contexts are passed in explicitly; there is no global store.

pub mod client;
pub mod config;
pub mod decoder;
pub mod diagnostics;
pub mod encoding;
pub mod error;
pub mod http;
pub mod mock;
pub mod store;
pub mod stream;
pub mod transport;
pub mod types;

pub use client::RequestPipeline;
pub use config::NetworkConfig;
pub use decoder::{Date, DateStrategy, DecodeError, Decoder, JsonDecoder};
pub use error::{NetworkError, PersistenceError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, StatusClass};
pub use store::{
    JsonFileContext, MemoryContext, PersistenceController, PersistentContext, Record, RecordChange, RecordEdit, StoreError,
};
pub use stream::{DeliveryContext, EventStream, InlineContext, MainContext, Publisher, Subscription};
pub use transport::{Detached, HttpTransport, TransportError};
pub use types::{
    BodyEncoding, EmptyResponse, ErrorEnvelope, Expect, Headers, ParamPlacement, ParamValue, Params, Payload,
    RequestDescriptor,
};
