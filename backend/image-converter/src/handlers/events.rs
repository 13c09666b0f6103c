/// Event handler - the function's invocation entry point
use actix_web::{http::header, web, HttpRequest, HttpResponse};

use crate::error::Result;
use crate::events::{Envelope, EventAttributes, STRUCTURED_CONTENT_TYPE};
use crate::services::ConversionService;

/// Receive a CloudEvent and run the conversion for it
///
/// Success answers 200 with the conversion report; any error is mapped to
/// a failure status so the platform treats the invocation as failed.
pub async fn receive_event(
    req: HttpRequest,
    body: web::Bytes,
    service: web::Data<ConversionService>,
) -> Result<HttpResponse> {
    let envelope = envelope_from_request(&req, body);
    let report = service.handle(&envelope).await?;
    Ok(HttpResponse::Ok().json(report))
}

fn envelope_from_request(req: &HttpRequest, body: web::Bytes) -> Envelope {
    let structured = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with(STRUCTURED_CONTENT_TYPE))
        .unwrap_or(false);

    if structured {
        return Envelope::structured(body);
    }

    let attributes = EventAttributes::from_headers(|name| {
        req.headers().get(name).and_then(|v| v.to_str().ok())
    });
    Envelope::binary(attributes, body)
}
