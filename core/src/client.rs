//! The request pipeline: build, dispatch, classify, decode.
//!
//! # Design
//! `RequestPipeline` holds only an injected transport and a debug flag, and
//! carries no mutable state between calls. Like the host-does-IO split it is
//! built on, every call is `build_request` (descriptor to plain request) then
//! the transport, then `parse_response` (plain response to typed result).
//! The async form and the stream form share `exchange`, so both classify
//! responses identically.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use url::Url;

use crate::config::NetworkConfig;
use crate::decoder::Decoder;
use crate::diagnostics::{CallLog, Channel};
use crate::encoding::{encode_json, encode_pairs};
use crate::error::{NetworkError, DEFAULT_ERROR_MESSAGE};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, StatusClass};
use crate::stream::Publisher;
use crate::transport::HttpTransport;
use crate::types::{
    BodyEncoding, EmptyResponse, ErrorEnvelope, Expect, Headers, ParamPlacement, ParamValue, Params, Payload,
    RequestDescriptor,
};

/// Stateless HTTP façade over an injected `HttpTransport`.
#[derive(Clone)]
pub struct RequestPipeline {
    transport: Arc<dyn HttpTransport>,
    debug: bool,
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline").field("debug", &self.debug).finish_non_exhaustive()
    }
}

impl RequestPipeline {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport, debug: false }
    }

    /// A pipeline that logs every call it makes: request id, URL, params,
    /// headers, elapsed time and the pretty-printed response body.
    pub fn with_diagnostics(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport, debug: true }
    }

    pub fn from_config(transport: Arc<dyn HttpTransport>, config: &NetworkConfig) -> Self {
        Self {
            transport,
            debug: config.debug,
        }
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Turn a descriptor into a plain request. Performs no I/O.
    ///
    /// Fails with `InvalidUrl` if the descriptor has no URL or it does not parse.
    pub fn build_request(&self, descriptor: &RequestDescriptor) -> Result<HttpRequest, NetworkError> {
        self.build_logged(descriptor, &CallLog::new(self.debug, Channel::Parse))
    }

    fn build_logged(&self, descriptor: &RequestDescriptor, log: &CallLog) -> Result<HttpRequest, NetworkError> {
        let mut url = descriptor
            .url()
            .and_then(|raw| Url::parse(raw).ok())
            .ok_or(NetworkError::InvalidUrl)?;

        let mut body = None;
        match (descriptor.param_placement(), descriptor.param_map()) {
            (_, None) => {}
            (ParamPlacement::Query, Some(params)) => {
                let query = encode_pairs(params);
                url.set_query((!query.is_empty()).then_some(query.as_str()));
            }
            (ParamPlacement::Body, Some(params)) => {
                body = match descriptor.body_encoding() {
                    BodyEncoding::Form => Some(encode_pairs(params)),
                    BodyEncoding::Json => encode_json(params),
                };
            }
        }

        let mut request = HttpRequest {
            method: descriptor.method(),
            url: url.into(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body,
        };
        for (name, value) in descriptor.header_map() {
            match value {
                ParamValue::String(value) => request.set_header(name, value),
                _ => log.dropped_header(name),
            }
        }
        Ok(request)
    }

    /// Classify a response and decode its body.
    ///
    /// `None` means the transport finished without an HTTP response.
    pub fn parse_response<T, D>(
        &self,
        decoder: &D,
        expect: Expect,
        response: Option<HttpResponse>,
    ) -> Result<Payload<T>, NetworkError>
    where
        T: DeserializeOwned,
        D: Decoder,
    {
        self.classify(decoder, expect, response, &CallLog::new(self.debug, Channel::Parse))
    }

    fn classify<T, D>(
        &self,
        decoder: &D,
        expect: Expect,
        response: Option<HttpResponse>,
        log: &CallLog,
    ) -> Result<Payload<T>, NetworkError>
    where
        T: DeserializeOwned,
        D: Decoder,
    {
        let Some(response) = response else {
            log.no_response();
            return Err(NetworkError::NoResponse);
        };

        match (response.class(), expect) {
            (StatusClass::Success, Expect::Empty) => {
                log.parsed_empty();
                Ok(Payload::Empty)
            }
            (StatusClass::Success, Expect::Body) => match decoder.decode::<T>(&response.body) {
                Ok(value) => {
                    log.parsed_ok();
                    Ok(Payload::Decoded(value))
                }
                Err(e) => {
                    log.decode_failed(&e);
                    Err(NetworkError::decode())
                }
            },
            (StatusClass::Failure, _) => match decoder.decode::<ErrorEnvelope>(&response.body) {
                Ok(envelope) => {
                    log.server_error(response.status, &envelope);
                    let message = envelope
                        .error_message
                        .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());
                    Err(NetworkError::ServerError(message))
                }
                Err(e) => {
                    log.decode_failed(&e);
                    Err(NetworkError::decode())
                }
            },
        }
    }

    /// Build, dispatch once, and classify.
    pub(crate) async fn exchange<T, D>(
        &self,
        descriptor: RequestDescriptor,
        decoder: &D,
        expect: Expect,
        channel: Channel,
    ) -> Result<Payload<T>, NetworkError>
    where
        T: DeserializeOwned,
        D: Decoder,
    {
        let log = CallLog::new(self.debug, channel);
        log.request(&descriptor);

        let request = match self.build_logged(&descriptor, &log) {
            Ok(request) => request,
            Err(e) => {
                log.invalid_url();
                return Err(e);
            }
        };

        let in_flight = log.dispatch();
        match self.transport.send(request).await {
            Ok(response) => {
                in_flight.complete(response.as_ref());
                self.classify(decoder, expect, response, &log)
            }
            Err(e) => {
                in_flight.fail();
                let error = NetworkError::from(e);
                log.transport_failed(&error);
                Err(error)
            }
        }
    }

    /// Send a request and classify the response according to `expect`.
    pub async fn send<T, D>(
        &self,
        descriptor: RequestDescriptor,
        decoder: &D,
        expect: Expect,
    ) -> Result<Payload<T>, NetworkError>
    where
        T: DeserializeOwned,
        D: Decoder,
    {
        self.exchange(descriptor, decoder, expect, Channel::Async).await
    }

    /// Send a request and decode the success body into `T`.
    pub async fn request<T, D>(&self, descriptor: RequestDescriptor, decoder: &D) -> Result<T, NetworkError>
    where
        T: DeserializeOwned,
        D: Decoder,
    {
        expect_decoded(self.send(descriptor, decoder, Expect::Body).await?)
    }

    /// Send a request whose success body is ignored.
    pub async fn request_empty<D>(
        &self,
        descriptor: RequestDescriptor,
        decoder: &D,
    ) -> Result<EmptyResponse, NetworkError>
    where
        D: Decoder,
    {
        self.send::<serde::de::IgnoredAny, D>(descriptor, decoder, Expect::Empty)
            .await
            .map(|_| EmptyResponse)
    }

    /// Lazy single-event stream for a JSON-in-body request.
    ///
    /// Nothing is sent until the returned publisher is subscribed to.
    pub fn publisher<T, D>(
        &self,
        method: HttpMethod,
        decoder: D,
        url: &str,
        headers: Headers,
        params: Option<Params>,
    ) -> Publisher<T>
    where
        T: DeserializeOwned + Send + 'static,
        D: Decoder + 'static,
    {
        let descriptor = RequestDescriptor::new(method, Some(url)).headers(headers).params(params);
        let pipeline = self.clone();
        Publisher::new(Box::pin(async move {
            let payload = pipeline
                .exchange(descriptor, &decoder, Expect::Body, Channel::Stream)
                .await?;
            expect_decoded(payload)
        }))
    }

    /// Like `publisher`, for endpoints whose success body is ignored.
    pub fn publisher_empty<D>(
        &self,
        method: HttpMethod,
        decoder: D,
        url: &str,
        headers: Headers,
        params: Option<Params>,
    ) -> Publisher<EmptyResponse>
    where
        D: Decoder + 'static,
    {
        let descriptor = RequestDescriptor::new(method, Some(url)).headers(headers).params(params);
        let pipeline = self.clone();
        Publisher::new(Box::pin(async move {
            pipeline
                .exchange::<serde::de::IgnoredAny, D>(descriptor, &decoder, Expect::Empty, Channel::Stream)
                .await
                .map(|_| EmptyResponse)
        }))
    }
}

fn expect_decoded<T>(payload: Payload<T>) -> Result<T, NetworkError> {
    // `Expect::Body` never yields `Payload::Empty`.
    payload.into_decoded().ok_or_else(NetworkError::decode)
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;
    use crate::decoder::JsonDecoder;
    use crate::error::{DECODING_ERROR_MESSAGE, DEFAULT_CONNECTION_ERROR_MESSAGE};
    use crate::mock::MockTransport;
    use crate::transport::TransportError;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: u32,
        name: String,
        tags: Vec<String>,
    }

    fn pipeline(transport: &Arc<MockTransport>) -> RequestPipeline {
        RequestPipeline::new(transport.clone())
    }

    fn item() -> Item {
        Item {
            id: 7,
            name: "milk".to_string(),
            tags: vec!["dairy".to_string()],
        }
    }

    #[test]
    fn build_sets_method_and_json_content_type() {
        let p = pipeline(&Arc::new(MockTransport::pending()));
        let req = p.build_request(&RequestDescriptor::delete("http://localhost:3000/items/1")).unwrap();
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.url, "http://localhost:3000/items/1");
        assert_eq!(req.headers, vec![("Content-Type".to_string(), "application/json".to_string())]);
        assert!(req.body.is_none());
    }

    #[test]
    fn build_without_url_is_invalid() {
        let p = pipeline(&Arc::new(MockTransport::pending()));
        let err = p.build_request(&RequestDescriptor::new(HttpMethod::Get, None)).unwrap_err();
        assert_eq!(err, NetworkError::InvalidUrl);
        let err = p.build_request(&RequestDescriptor::get("not a url")).unwrap_err();
        assert_eq!(err, NetworkError::InvalidUrl);
    }

    #[test]
    fn build_query_placement_encodes_params() {
        let p = pipeline(&Arc::new(MockTransport::pending()));
        let d = RequestDescriptor::get("http://localhost:3000/search?stale=1")
            .param("ids", vec![1, 2, 3])
            .param("q", "a b")
            .in_query();
        let req = p.build_request(&d).unwrap();
        assert_eq!(req.url, "http://localhost:3000/search?ids=1,2,3&q=a%20b");
        assert!(req.body.is_none());
    }

    #[test]
    fn build_query_placement_without_params_keeps_url() {
        let p = pipeline(&Arc::new(MockTransport::pending()));
        let req = p
            .build_request(&RequestDescriptor::get("http://localhost:3000/search?keep=1").in_query())
            .unwrap();
        assert_eq!(req.url, "http://localhost:3000/search?keep=1");
    }

    #[test]
    fn build_form_body() {
        let p = pipeline(&Arc::new(MockTransport::pending()));
        let d = RequestDescriptor::post("http://localhost:3000/login")
            .param("a", "1")
            .param("b", "x y")
            .form_encoded();
        let req = p.build_request(&d).unwrap();
        assert_eq!(req.body.as_deref(), Some("a=1&b=x%20y"));
    }

    #[test]
    fn build_json_body() {
        let p = pipeline(&Arc::new(MockTransport::pending()));
        let d = RequestDescriptor::put("http://localhost:3000/items/7")
            .param("name", "milk")
            .param("count", 2)
            .param("done", false);
        let req = p.build_request(&d).unwrap();
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"name": "milk", "count": 2, "done": false}));
    }

    #[test]
    fn build_copies_string_headers_and_drops_others() {
        let p = pipeline(&Arc::new(MockTransport::pending()));
        let d = RequestDescriptor::get("http://localhost:3000/")
            .header("Authorization", "Bearer abc")
            .header("X-Retry", 3)
            .header("content-type", "text/plain");
        let req = p.build_request(&d).unwrap();
        assert_eq!(req.header("authorization"), Some("Bearer abc"));
        assert_eq!(req.header("X-Retry"), None);
        assert_eq!(req.header("Content-Type"), Some("text/plain"));
        assert_eq!(req.headers.len(), 2);
    }

    #[tokio::test]
    async fn missing_url_fails_before_any_transport_call() {
        let transport = Arc::new(MockTransport::respond(200, "{}"));
        let err = pipeline(&transport)
            .request::<Item, _>(RequestDescriptor::new(HttpMethod::Post, None), &JsonDecoder::new())
            .await
            .unwrap_err();
        assert_eq!(err, NetworkError::InvalidUrl);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn success_decodes_round_tripped_value() {
        let transport = Arc::new(MockTransport::respond(200, &serde_json::to_string(&item()).unwrap()));
        let got: Item = pipeline(&transport)
            .request(RequestDescriptor::get("http://localhost:3000/items/7"), &JsonDecoder::new())
            .await
            .unwrap();
        assert_eq!(got, item());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn empty_expectation_ignores_malformed_body() {
        for status in [200, 204, 298] {
            let transport = Arc::new(MockTransport::respond(status, "{not json"));
            let got = pipeline(&transport)
                .request_empty(RequestDescriptor::delete("http://localhost:3000/items/7"), &JsonDecoder::new())
                .await
                .unwrap();
            assert_eq!(got, EmptyResponse);
        }
    }

    #[tokio::test]
    async fn decode_failures_flatten_to_decode() {
        let bodies = [
            "{not json",
            r#"{"id":7,"tags":[]}"#,
            r#"{"id":"seven","name":"milk","tags":[]}"#,
            r#"{"id":7,"name":null,"tags":[]}"#,
            "",
        ];
        for body in bodies {
            let transport = Arc::new(MockTransport::respond(200, body));
            let err = pipeline(&transport)
                .request::<Item, _>(RequestDescriptor::get("http://localhost:3000/items/7"), &JsonDecoder::new())
                .await
                .unwrap_err();
            assert_eq!(err, NetworkError::Decode(DECODING_ERROR_MESSAGE.to_string()), "body {body:?}");
        }
    }

    #[tokio::test]
    async fn failure_status_with_envelope_is_server_error() {
        let transport = Arc::new(MockTransport::json(
            422,
            &json!({"errorMessage": "name is required", "description": "validation", "code": 42}),
        ));
        let err = pipeline(&transport)
            .request::<Item, _>(RequestDescriptor::post("http://localhost:3000/items"), &JsonDecoder::new())
            .await
            .unwrap_err();
        assert_eq!(err, NetworkError::ServerError("name is required".to_string()));
    }

    #[tokio::test]
    async fn failure_status_without_message_uses_default() {
        let transport = Arc::new(MockTransport::json(500, &json!({"code": 500})));
        let err = pipeline(&transport)
            .request_empty(RequestDescriptor::post("http://localhost:3000/items"), &JsonDecoder::new())
            .await
            .unwrap_err();
        assert_eq!(err, NetworkError::ServerError(DEFAULT_ERROR_MESSAGE.to_string()));
    }

    #[tokio::test]
    async fn failure_status_with_undecodable_envelope_is_decode() {
        let transport = Arc::new(MockTransport::respond(502, "<html>bad gateway</html>"));
        let err = pipeline(&transport)
            .request::<Item, _>(RequestDescriptor::get("http://localhost:3000/items"), &JsonDecoder::new())
            .await
            .unwrap_err();
        assert_eq!(err, NetworkError::decode());
    }

    #[tokio::test]
    async fn missing_response_is_no_response() {
        let transport = Arc::new(MockTransport::no_response());
        let err = pipeline(&transport)
            .request::<Item, _>(RequestDescriptor::get("http://localhost:3000/items"), &JsonDecoder::new())
            .await
            .unwrap_err();
        assert_eq!(err, NetworkError::NoResponse);
    }

    #[tokio::test]
    async fn transport_errors_are_mapped() {
        let transport = Arc::new(MockTransport::failing(TransportError::NotConnected));
        let err = pipeline(&transport)
            .request::<Item, _>(RequestDescriptor::get("http://localhost:3000/items"), &JsonDecoder::new())
            .await
            .unwrap_err();
        assert_eq!(err, NetworkError::NoInternet(DEFAULT_CONNECTION_ERROR_MESSAGE.to_string()));

        let transport = Arc::new(MockTransport::failing(TransportError::Other("reset".to_string())));
        let err = pipeline(&transport)
            .request::<Item, _>(RequestDescriptor::get("http://localhost:3000/items"), &JsonDecoder::new())
            .await
            .unwrap_err();
        assert_eq!(err, NetworkError::Transport(TransportError::Other("reset".to_string())));
    }

    #[tokio::test]
    async fn diagnostics_do_not_change_outcomes() {
        let cases = [
            MockTransport::respond(200, &serde_json::to_string(&item()).unwrap()),
            MockTransport::respond(200, "{bad"),
            MockTransport::json(400, &json!({"message": "nope"})),
            MockTransport::no_response(),
            MockTransport::failing(TransportError::NotConnected),
        ];
        for transport in cases {
            let transport = Arc::new(transport);
            let d = RequestDescriptor::get("http://localhost:3000/items/7").header("X-Trace", "1");
            let quiet = RequestPipeline::new(transport.clone())
                .request::<Item, _>(d.clone(), &JsonDecoder::new())
                .await;
            let loud = RequestPipeline::with_diagnostics(transport.clone())
                .request::<Item, _>(d, &JsonDecoder::new())
                .await;
            assert_eq!(quiet, loud);
            assert_eq!(transport.calls(), 2);
        }
    }

    #[test]
    fn parse_response_is_usable_without_transport() {
        let p = pipeline(&Arc::new(MockTransport::pending()));
        let payload: Payload<Item> = p
            .parse_response(
                &JsonDecoder::new(),
                Expect::Body,
                Some(HttpResponse::new(201, serde_json::to_string(&item()).unwrap())),
            )
            .unwrap();
        assert_eq!(payload, Payload::Decoded(item()));

        let payload: Payload<Item> = p
            .parse_response(&JsonDecoder::new(), Expect::Empty, Some(HttpResponse::new(204, "")))
            .unwrap();
        assert_eq!(payload, Payload::Empty);
    }

    #[test]
    fn from_config_reads_debug_flag() {
        let transport: Arc<dyn HttpTransport> = Arc::new(MockTransport::pending());
        assert!(RequestPipeline::from_config(transport.clone(), &NetworkConfig { debug: true }).is_debug());
        assert!(!RequestPipeline::new(transport).is_debug());
    }
}
