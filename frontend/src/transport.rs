use async_trait::async_trait;
use http::StatusCode;
use taskdesk_shared::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, RequestMode, Response};

/// `HttpTransport` over `window.fetch`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchTransport;

#[async_trait(?Send)]
impl HttpTransport for FetchTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let opts = RequestInit::new();
        opts.set_method(request.method.as_str());
        opts.set_mode(RequestMode::Cors);
        if let Some(body) = &request.body {
            opts.set_body(&JsValue::from_str(body));
        }

        let js_request = Request::new_with_str_and_init(&request.url, &opts)
            .map_err(|e| js_error("Failed to create request", e))?;
        for (name, value) in &request.headers {
            js_request
                .headers()
                .set(name.as_str(), value)
                .map_err(|e| js_error("Failed to set header", e))?;
        }

        let window = web_sys::window().ok_or_else(|| TransportError::new("No window available"))?;
        let response: Response = JsFuture::from(window.fetch_with_request(&js_request))
            .await
            .map_err(|e| js_error("Failed to send request", e))?
            .dyn_into()
            .map_err(|e| js_error("Fetch did not return a Response", e))?;

        let text_promise = response
            .text()
            .map_err(|e| js_error("Failed to read response", e))?;
        let body = JsFuture::from(text_promise)
            .await
            .map_err(|e| js_error("Failed to get text", e))?
            .as_string()
            .unwrap_or_default();

        let status = StatusCode::from_u16(response.status())
            .map_err(|e| TransportError::new(format!("Invalid status code: {e}")))?;
        Ok(HttpResponse::new(status, body))
    }
}

fn js_error(context: &str, value: JsValue) -> TransportError {
    match value.as_string() {
        Some(detail) => TransportError::new(format!("{context}: {detail}")),
        None => TransportError::new(format!("{context}: {value:?}")),
    }
}
