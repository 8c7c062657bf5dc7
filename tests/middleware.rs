use bytes::Bytes;
use http::{Method, Request, Response, StatusCode, header};
use http_body_util::{BodyExt, Full};
use http_response_encoding::{
    Config, DecodeError, EncodingBody, EncodingLayer, Level, Transformation, classify, negotiate,
    select,
};
use std::convert::Infallible;
use std::io::{Read, Write};
use tower::{Layer, ServiceExt, service_fn};

/// Serves `content` with the headers a static file server would set.
async fn serve(
    method: Method,
    path: &str,
    accept_encoding: &str,
    content: Vec<u8>,
    content_type: &'static str,
) -> Response<EncodingBody<Full<Bytes>>> {
    serve_with(EncodingLayer::new(), method, path, accept_encoding, content, content_type).await
}

async fn serve_with(
    layer: EncodingLayer,
    method: Method,
    path: &str,
    accept_encoding: &str,
    content: Vec<u8>,
    content_type: &'static str,
) -> Response<EncodingBody<Full<Bytes>>> {
    let handler = service_fn(move |_req: Request<Full<Bytes>>| {
        let content = content.clone();
        async move {
            let response = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, content.len())
                .header(header::ACCEPT_RANGES, "bytes")
                .body(Full::new(Bytes::from(content)))
                .unwrap();
            Ok::<_, Infallible>(response)
        }
    });

    let mut request = Request::builder().method(method).uri(path);
    if !accept_encoding.is_empty() {
        request = request.header(header::ACCEPT_ENCODING, accept_encoding);
    }
    let request = request.body(Full::new(Bytes::new())).unwrap();

    layer.layer(handler).oneshot(request).await.unwrap()
}

async fn body_bytes(response: Response<EncodingBody<Full<Bytes>>>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn brotli(data: &[u8]) -> Vec<u8> {
    let mut writer = brotli::CompressorWriter::new(Vec::new(), 4096, 5, 22);
    writer.write_all(data).unwrap();
    writer.into_inner()
}

fn decompress(data: &[u8], encoding: &str) -> Vec<u8> {
    let mut out = Vec::new();
    match encoding {
        "gzip" => flate2::read::GzDecoder::new(data).read_to_end(&mut out),
        "deflate" => flate2::read::ZlibDecoder::new(data).read_to_end(&mut out),
        "br" => brotli::Decompressor::new(data, 4096).read_to_end(&mut out),
        other => panic!("unsupported encoding {other}"),
    }
    .unwrap();
    out
}

fn content_encoding<B>(response: &Response<B>) -> Option<&str> {
    response
        .headers()
        .get(header::CONTENT_ENCODING)
        .map(|v| v.to_str().unwrap())
}

#[tokio::test]
async fn test_precompressed_served_as_stored() {
    let stored = gzip(b"Test 1");
    let response = serve(
        Method::GET,
        "/report.txt.gz",
        "gzip,deflate,br",
        stored.clone(),
        "application/gzip",
    )
    .await;

    assert_eq!(content_encoding(&response), Some("gzip"));
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_LENGTH).unwrap(),
        &stored.len().to_string()
    );

    let body = body_bytes(response).await;
    assert_eq!(body, stored);
    assert_eq!(decompress(&body, "gzip"), b"Test 1");
}

#[tokio::test]
async fn test_precompressed_served_as_stored_regardless_of_order() {
    let stored = brotli(b"Test 2");
    for accept in ["br,gzip,deflate", "gzip,deflate,br"] {
        let response = serve(
            Method::GET,
            "/test2.txt.br",
            accept,
            stored.clone(),
            "application/octet-stream",
        )
        .await;

        assert_eq!(content_encoding(&response), Some("br"), "{accept}");
        assert_eq!(decompress(&body_bytes(response).await, "br"), b"Test 2");
    }
}

#[tokio::test]
async fn test_precompressed_decoded_when_not_accepted() {
    let response = serve(
        Method::GET,
        "/report.txt.gz",
        "",
        gzip(b"Test 1"),
        "application/gzip",
    )
    .await;

    assert_eq!(content_encoding(&response), None);
    assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain"
    );
    assert_eq!(body_bytes(response).await, b"Test 1");
}

#[tokio::test]
async fn test_precompressed_brotli_decoded() {
    let response = serve(
        Method::GET,
        "/test2.txt.br",
        "gzip, deflate",
        brotli(b"Test 2"),
        "application/octet-stream",
    )
    .await;

    assert_eq!(content_encoding(&response), None);
    assert_eq!(body_bytes(response).await, b"Test 2");
}

#[tokio::test]
async fn test_plain_encoded_with_preferred_encoding() {
    for (accept, expected) in [
        ("br,gzip,deflate", "br"),
        ("gzip,deflate,br", "gzip"),
        ("deflate,gzip,br", "deflate"),
        ("gzip;q=0.5, deflate;q=0.9", "deflate"),
    ] {
        let response = serve(
            Method::GET,
            "/report.txt",
            accept,
            b"Test 3".to_vec(),
            "text/plain",
        )
        .await;

        assert_eq!(content_encoding(&response), Some(expected), "{accept}");
        assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
        assert!(response.headers().get(header::ACCEPT_RANGES).is_none());
        assert_eq!(
            response.headers().get(header::VARY).unwrap(),
            "accept-encoding"
        );
        assert_eq!(
            decompress(&body_bytes(response).await, expected),
            b"Test 3"
        );
    }
}

#[tokio::test]
async fn test_plain_passthrough_without_accepted_encoding() {
    for accept in ["", "identity", "zstd, compress"] {
        let response = serve(
            Method::GET,
            "/report.txt",
            accept,
            b"Test 3".to_vec(),
            "text/plain",
        )
        .await;

        assert_eq!(content_encoding(&response), None);
        assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "6");
        assert!(response.headers().get(header::VARY).is_none());
        assert_eq!(body_bytes(response).await, b"Test 3");
    }
}

#[tokio::test]
async fn test_ineligible_method_untouched() {
    let stored = gzip(b"Test 1");
    for method in [Method::PUT, Method::HEAD] {
        let response = serve(
            method.clone(),
            "/report.txt.gz",
            "",
            stored.clone(),
            "application/gzip",
        )
        .await;

        assert!(matches!(response.body(), EncodingBody::Passthrough { .. }));
        assert_eq!(content_encoding(&response), None, "{method}");
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/gzip"
        );
        assert_eq!(response.headers().len(), 3);
        assert_eq!(body_bytes(response).await, stored);
    }

    let response = serve(
        Method::PUT,
        "/report.txt",
        "gzip",
        b"Test 3".to_vec(),
        "text/plain",
    )
    .await;
    assert_eq!(content_encoding(&response), None);
    assert_eq!(body_bytes(response).await, b"Test 3");
}

#[tokio::test]
async fn test_corrupt_precompressed_asset_fails_body() {
    let response = serve(
        Method::GET,
        "/broken.txt.gz",
        "",
        b"this is not gzip".to_vec(),
        "application/gzip",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let err = response.into_body().collect().await.unwrap_err();
    let decode_err = err
        .get_ref()
        .and_then(|e| e.downcast_ref::<DecodeError>())
        .expect("Expected DecodeError");
    assert_eq!(decode_err.path, "/broken.txt.gz");
    assert_eq!(decode_err.method, Method::GET);
}

#[tokio::test]
async fn test_large_body_round_trip() {
    let text: Vec<u8> = (0..2_000_000u32)
        .flat_map(|i| (i % 251).to_le_bytes())
        .collect();

    let response = serve(
        Method::GET,
        "/large.bin",
        "gzip",
        text.clone(),
        "application/octet-stream",
    )
    .await;
    let encoded = body_bytes(response).await;
    assert!(encoded.len() < text.len());

    let response = serve(
        Method::GET,
        "/large.bin.gz",
        "",
        encoded,
        "application/gzip",
    )
    .await;
    assert!(body_bytes(response).await == text);
}

#[tokio::test]
async fn test_large_compressible_asset_decoded() {
    let text = b"a highly repetitive line of logical content\n".repeat(2_000);
    assert!(text.len() >= 64 * 1024);

    for (path, stored) in [
        ("/large.txt.gz", gzip(&text)),
        ("/large.txt.br", brotli(&text)),
    ] {
        let response = serve(
            Method::GET,
            path,
            "identity",
            stored,
            "application/octet-stream",
        )
        .await;

        assert_eq!(content_encoding(&response), None, "{path}");
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        assert!(body_bytes(response).await == text, "{path}");
    }
}

#[tokio::test]
async fn test_configured_levels() {
    let config = Config {
        gzip_level: Level::Precise(1),
        deflate_level: Level::Precise(9),
        brotli_level: Level::Precise(11),
    };
    let layer = EncodingLayer::with_config(config).unwrap();
    let text = b"configured compression level ".repeat(200);

    for encoding in ["gzip", "deflate", "br"] {
        let response = serve_with(
            layer.clone(),
            Method::POST,
            "/data.txt",
            encoding,
            text.clone(),
            "text/plain",
        )
        .await;
        assert_eq!(content_encoding(&response), Some(encoding));
        assert_eq!(decompress(&body_bytes(response).await, encoding), text);
    }
}

#[test]
fn test_exactly_one_transformation() {
    let paths = ["/a.txt", "/a.txt.gz", "/a.txt.br", "/a"];
    let accepts = ["", "gzip", "br;q=0.1, gzip", "deflate", "identity", "*"];
    for path in paths {
        for accept in accepts {
            let choice = select(&classify(path), &negotiate(accept));
            let kinds = [
                matches!(choice, Transformation::Passthrough { .. }),
                matches!(choice, Transformation::Decode { .. }),
                matches!(choice, Transformation::Encode { .. }),
            ];
            assert_eq!(kinds.iter().filter(|k| **k).count(), 1);
        }
    }
}
