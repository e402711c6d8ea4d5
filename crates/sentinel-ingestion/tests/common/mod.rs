//! Shared fixtures for the pipeline integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use sentinel_common::{Result, SentinelError};
use sentinel_ingestion::extractor::OcrEngine;
use sentinel_ingestion::notify::{NotificationRequest, Notifier};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use url::Url;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Serve `routes` (path -> body) on an ephemeral local port. Unknown paths
/// answer 404.
pub async fn serve(routes: Vec<(&str, Vec<u8>)>) -> Url {
    let routes: Arc<HashMap<String, Vec<u8>>> =
        Arc::new(routes.into_iter().map(|(p, b)| (p.to_string(), b)).collect());

    let app = Router::new().fallback(move |uri: Uri| {
        let routes = Arc::clone(&routes);
        async move {
            match routes.get(uri.path()) {
                Some(body) => (StatusCode::OK, body.clone()).into_response(),
                None => StatusCode::NOT_FOUND.into_response(),
            }
        }
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/")).unwrap()
}

/// Answer every request with `body` and no Content-Length, ending the body by
/// closing the connection.
pub async fn serve_unsized(body: Vec<u8>) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let body = Arc::new(body);
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let body = Arc::clone(&body);
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = stream.read(&mut request).await;
                let head = b"HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nConnection: close\r\n\r\n";
                let _ = stream.write_all(head).await;
                let _ = stream.write_all(&body).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    Url::parse(&format!("http://{addr}/")).unwrap()
}

/// HTML index page linking each of `hrefs`, plus some navigation noise.
pub fn index_html(hrefs: &[&str]) -> Vec<u8> {
    let rows: String = hrefs
        .iter()
        .map(|h| format!("<tr><td><a href=\"{h}\">{h}</a></td></tr>"))
        .collect();
    format!(
        "<html><body><a href=\"/help.html\">Help</a><table>{rows}</table>\
         <a href=\"mailto:clerk@house.gov\">Contact</a></body></html>"
    )
    .into_bytes()
}

/// A PDF with one Courier text line per page. An empty string yields a page
/// with no text layer, standing in for a scanned filing.
pub fn pdf(pages: &[impl AsRef<str>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for text in pages {
        let text = text.as_ref();
        let mut operations = Vec::new();
        if !text.is_empty() {
            operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 10.into()]),
                Operation::new("Td", vec![36.into(), 760.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ];
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// ZIP archive holding `entries` (name -> bytes) in order.
pub fn zip(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Filing text comfortably above the OCR threshold.
pub fn filing(asset_line: &str) -> String {
    format!(
        "PERIODIC TRANSACTION REPORT  Filer: Hon. Example Member  Status: Member  \
         State/District: XX01  Asset: {asset_line}  Type: S  Date: 01/15/2025  Amount: $1,001 - $15,000"
    )
}

/// OCR stand-in that counts invocations and returns fixed text.
#[derive(Clone)]
pub struct CountingOcr {
    pub calls: Arc<AtomicUsize>,
    pub text: String,
}

impl CountingOcr {
    pub fn new(text: &str) -> Self {
        Self { calls: Arc::new(AtomicUsize::new(0)), text: text.to_string() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for CountingOcr {
    fn name(&self) -> &str {
        "counting"
    }

    fn recognise_pages(&self, _pdf_path: &Path) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![self.text.clone()])
    }
}

/// Notifier that keeps every request it is asked to send.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<NotificationRequest>>>,
}

impl RecordingNotifier {
    pub fn requests(&self) -> Vec<NotificationRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn channel(&self) -> &str {
        "recording"
    }

    async fn send(&self, request: &NotificationRequest) -> Result<()> {
        if request.title.is_empty() {
            return Err(SentinelError::notification("recording", "empty title"));
        }
        self.sent.lock().unwrap().push(request.clone());
        Ok(())
    }
}
