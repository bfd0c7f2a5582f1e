//! HTTP MJPEG streaming of annotated arena scenes.
//!
//! One `watch` channel carries the latest encoded frame from the vision
//! driver to any number of HTTP clients. Each client of `/video_feed` gets
//! a `multipart/x-mixed-replace` stream that always serves the newest
//! frame; slow clients skip frames instead of lagging behind.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::State,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use futures::StreamExt;
use machine_vision_formats::{pixel_format::RGB8, ImageStride};
use tokio_stream::wrappers::WatchStream;
use tracing::info;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("JPEG encoding failed: {source}")]
    Encode {
        #[from]
        source: image::ImageError,
    },
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// Streamed frames are scaled down to at most this wide.
pub const MAX_STREAM_WIDTH: u32 = 640;
/// JPEG quality of the streamed frames.
pub const JPEG_QUALITY: u8 = 80;

const BOUNDARY: &str = "frame";

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head><title>Arena</title></head>
  <body>
    <h1>Arena camera</h1>
    <img src="/video_feed" alt="live arena view">
  </body>
</html>
"#;

/// Sender half: the vision driver pushes encoded frames here.
pub type FrameSender = tokio::sync::watch::Sender<Option<Bytes>>;
/// Receiver half: handed to [`router`] / [`serve`].
pub type FrameReceiver = tokio::sync::watch::Receiver<Option<Bytes>>;

/// Create the latest-frame channel connecting the driver to the server.
pub fn frame_channel() -> (FrameSender, FrameReceiver) {
    tokio::sync::watch::channel(None)
}

/// Encode a scene for streaming: downscale to at most `max_width` columns
/// (preserving aspect ratio) and JPEG-compress.
pub fn encode_scene<IM>(frame: &IM, max_width: u32, quality: u8) -> Result<Bytes>
where
    IM: ImageStride<RGB8>,
{
    let width = frame.width();
    let height = frame.height();
    let row_bytes = width as usize * 3;
    let stride = frame.stride();

    // tightly packed copy for the image crate
    let mut packed = Vec::with_capacity(row_bytes * height as usize);
    let data = frame.image_data();
    for row in 0..height as usize {
        let start = row * stride;
        packed.extend_from_slice(&data[start..start + row_bytes]);
    }
    let mut img =
        image::RgbImage::from_raw(width, height, packed).expect("packed buffer sized exactly");

    if width > max_width {
        let new_height =
            ((max_width as f64 / width as f64) * height as f64).round().max(1.0) as u32;
        img = image::imageops::resize(
            &img,
            max_width,
            new_height,
            image::imageops::FilterType::Triangle,
        );
    }

    let mut jpeg = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, quality);
    img.write_with_encoder(encoder)?;
    Ok(Bytes::from(jpeg))
}

fn multipart_chunk(jpeg: &Bytes) -> Bytes {
    let mut chunk = Vec::with_capacity(jpeg.len() + 64);
    chunk.extend_from_slice(
        format!("--{BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n").as_bytes(),
    );
    chunk.extend_from_slice(jpeg);
    chunk.extend_from_slice(b"\r\n");
    Bytes::from(chunk)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn video_feed(State(rx): State<FrameReceiver>) -> Response {
    let stream = WatchStream::new(rx)
        .filter_map(|opt| async move { opt.map(|jpeg| Ok::<Bytes, Infallible>(multipart_chunk(&jpeg))) });

    Response::builder()
        .header(
            http::header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={BOUNDARY}"),
        )
        .body(Body::from_stream(stream))
        .expect("static response parts")
        .into_response()
}

/// The two-route HTTP surface: an index page and the MJPEG stream.
pub fn router(rx: FrameReceiver) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/video_feed", get(video_feed))
        .with_state(rx)
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(addr: SocketAddr, rx: FrameReceiver) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("video stream at http://{}/", listener.local_addr()?);
    axum::serve(listener, router(rx)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn gradient_frame(
        w: u32,
        h: u32,
    ) -> machine_vision_formats::owned::OImage<machine_vision_formats::pixel_format::RGB8> {
        use machine_vision_formats::{ImageMutData, Stride};
        let mut frame = arena_imops::zeros(w, h);
        let stride = frame.stride();
        let data = frame.buffer_mut_ref().data;
        for y in 0..h as usize {
            for x in 0..w as usize {
                data[y * stride + x * 3] = (x % 256) as u8;
                data[y * stride + x * 3 + 1] = (y % 256) as u8;
            }
        }
        frame
    }

    #[test]
    fn encoded_scene_is_jpeg_and_downscaled() {
        let frame = gradient_frame(1280, 720);
        let jpeg = encode_scene(&frame, MAX_STREAM_WIDTH, JPEG_QUALITY).unwrap();
        assert_eq!(&jpeg[..2], &[0xff, 0xd8]);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 640);
        assert_eq!(decoded.height(), 360);
    }

    #[test]
    fn small_scenes_are_not_upscaled() {
        let frame = gradient_frame(320, 240);
        let jpeg = encode_scene(&frame, MAX_STREAM_WIDTH, JPEG_QUALITY).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 320);
    }

    #[tokio::test]
    async fn index_page_serves_html() {
        let (_tx, rx) = frame_channel();
        let response = router(rx)
            .oneshot(
                http::Request::builder()
                    .uri("/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(std::str::from_utf8(&body).unwrap().contains("/video_feed"));
    }

    #[tokio::test]
    async fn video_feed_streams_multipart_jpeg() {
        let (tx, rx) = frame_channel();
        let frame = gradient_frame(64, 48);
        let jpeg = encode_scene(&frame, MAX_STREAM_WIDTH, JPEG_QUALITY).unwrap();
        tx.send(Some(jpeg)).unwrap();

        let response = router(rx)
            .oneshot(
                http::Request::builder()
                    .uri("/video_feed")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);
        let content_type = response
            .headers()
            .get(http::header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap();
        assert_eq!(content_type, "multipart/x-mixed-replace; boundary=frame");

        let mut body = response.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        let text_prefix = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
        assert_eq!(&first[..text_prefix.len()], text_prefix);
    }
}
