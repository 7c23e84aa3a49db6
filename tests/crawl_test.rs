use mockito::{Matcher, Mock, Server, ServerGuard};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

use vozcivica::api::{CamaraClient, ClientConfig, CouncilSource};
use vozcivica::crawl::{CrawlDriver, RunConfig};
use vozcivica::store::{open_store, store_path, RecordStore, StoreKind};

const LANDING: &str = r#"<!DOCTYPE html>
<html><head>
<meta name="csrf-param" content="authenticity_token" />
<meta name="csrf-token" content="tok3n==" />
</head><body><h1>Projetos</h1></body></html>"#;

fn entry(id: u64, title: &str) -> String {
    format!(
        r#"<article class="item"><h2 class="header"><a href="/processos/{id}">{title}</a></h2></article>"#
    )
}

fn results(entries: &[String], sidebar: &[String]) -> String {
    format!(
        r#"<div class="ui grid">
            <div class="twelve wide column">{}</div>
            <div class="four wide column">{}</div>
        </div>"#,
        entries.concat(),
        sidebar.concat()
    )
}

fn detail(id: u64) -> String {
    format!(
        r#"<html><body>
        <div class="ui tab" data-tab="dados">
          <dl class="dados">
            <dt>Processo</dt><dd>{id}</dd>
            <dt>Projeto</dt><dd>PLL 12/25</dd>
            <dt>Situação Plenária</dt><dd>Aguardando</dd>
            <dt>Data Abertura</dt><dd>03/02/2025</dd>
            <dt>Autor</dt><dd>Fulana de Tal (PT)</dd>
          </dl>
        </div>
        <div class="ui tab" data-tab="tramitacoes"></div>
        <div class="ui tab" data-tab="documentos">
          <a href="/processos/{id}/documentos/proj.pdf">Projeto: Texto Inicial</a>
          <a href="/processos/{id}/andamento">Andamento</a>
        </div>
        </body></html>"#
    )
}

fn client_for(server: &ServerGuard) -> CamaraClient {
    CamaraClient::new(ClientConfig {
        base_url: server.url(),
        timeout: 5,
        max_retries: 3,
        retry_base_delay: 1,
        ..ClientConfig::default()
    })
    .unwrap()
}

fn run_config(documents_dir: &Path, download: bool) -> RunConfig {
    RunConfig {
        max_pages: 10,
        page_delay: Duration::ZERO,
        record_delay: Duration::ZERO,
        download_documents: download,
        documents_dir: documents_dir.to_path_buf(),
        ..RunConfig::default()
    }
}

fn landing(server: &mut ServerGuard) -> Mock {
    server
        .mock("GET", "/projetos")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_header("set-cookie", "_session_id=s3ss10n; path=/; HttpOnly")
        .with_body(LANDING)
}

fn search_page(server: &mut ServerGuard, page: u32, body: &str) -> Mock {
    server
        .mock("GET", "/processos")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("page".into(), page.to_string()),
            Matcher::UrlEncoded("tipo".into(), "PLL".into()),
            Matcher::UrlEncoded("andamento".into(), "todos".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(body)
}

fn record(server: &mut ServerGuard, id: u64) -> Mock {
    server
        .mock("GET", format!("/processos/{}", id).as_str())
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(detail(id))
}

#[tokio::test]
async fn test_end_to_end_crawl_into_snapshot() {
    let mut server = Server::new_async().await;
    let data = TempDir::new().unwrap();
    let path = store_path(StoreKind::Json, data.path());

    // 140595 is already harvested
    std::fs::write(
        &path,
        r#"[{"url": "https://www.camarapoa.rs.gov.br/processos/140595", "id": "140595"}]"#,
    )
    .unwrap();

    let warm = landing(&mut server).create_async().await;
    let page1 = server
        .mock("GET", "/processos")
        .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
        .match_header("x-csrf-token", "tok3n==")
        .match_header("cookie", Matcher::Regex("_session_id=s3ss10n".into()))
        .match_header("referer", Matcher::Regex("/projetos$".into()))
        .with_status(200)
        .with_body(results(
            &[
                entry(140595, "PLL 1/25"),
                entry(140600, "PLL 2/25"),
                entry(140601, "PLCE 3/25"),
            ],
            &[entry(139000, "PLL 99/24")],
        ))
        .create_async()
        .await;

    // the site sometimes answers with a jQuery snippet
    let scripted = format!(
        r##"$("#resultados").html("{}");"##,
        entry(140610, "PLL 7/25")
            .replace('"', "\\\"")
            .replace('/', "\\/")
            .replace('<', "\\u003c")
            .replace('>', "\\u003e")
    );
    let page2 = server
        .mock("GET", "/processos")
        .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
        .with_status(200)
        .with_header("content-type", "text/javascript; charset=utf-8")
        .with_body(scripted)
        .create_async()
        .await;
    let page3 = search_page(&mut server, 3, &results(&[], &[])).create_async().await;
    let page4 = search_page(&mut server, 4, &results(&[entry(1, "PLL 1/20")], &[]))
        .expect(0)
        .create_async()
        .await;

    let known = record(&mut server, 140595).expect(0).create_async().await;
    let r600 = record(&mut server, 140600).create_async().await;
    let r610 = record(&mut server, 140610).create_async().await;
    let sidebar = record(&mut server, 139000).expect(0).create_async().await;
    let off_category = record(&mut server, 140601).expect(0).create_async().await;

    let mut store = open_store(StoreKind::Json, &path, 10).await.unwrap();
    let driver = CrawlDriver::new(client_for(&server), run_config(&data.path().join("pdfs"), false));
    let summary = driver.run(store.as_mut()).await.unwrap();

    assert_eq!(summary.pages_fetched, 3);
    assert!(summary.exhausted);
    assert_eq!(summary.discovered, 2);
    assert_eq!(summary.committed, 2);
    assert_eq!(summary.failed, 0);
    assert!(!summary.interrupted);

    for mock in [&warm, &page1, &page2, &page3, &page4, &known, &r600, &r610, &sidebar, &off_category] {
        mock.assert_async().await;
    }

    let reopened = open_store(StoreKind::Json, &path, 10).await.unwrap();
    let records = reopened.records().await.unwrap();
    let ids: Vec<u64> = records.iter().map(|r| r.external_id).collect();
    assert_eq!(ids, vec![140595, 140600, 140610]);

    let stored = &records[1];
    assert_eq!(stored.url.as_str(), format!("{}/processos/140600", server.url()));
    assert_eq!(stored.metadata.get("processo"), Some("140600"));
    assert_eq!(stored.metadata.plenary_status(), Some("Aguardando"));
    assert!(stored.has_history);
    assert!(!stored.has_votes);
    // downloads are off, so no attachments are recorded
    assert!(stored.files.is_empty());
}

#[tokio::test]
async fn test_second_run_fetches_no_known_records() {
    let mut server = Server::new_async().await;
    let data = TempDir::new().unwrap();
    let path = store_path(StoreKind::Sqlite, data.path());

    let _warm = landing(&mut server).expect(2).create_async().await;
    let _page1 = search_page(&mut server, 1, &results(&[entry(140600, "PLL 2/25")], &[]))
        .expect(2)
        .create_async()
        .await;
    let _page2 = search_page(&mut server, 2, &results(&[], &[])).expect(2).create_async().await;
    let detail_page = record(&mut server, 140600).expect(1).create_async().await;

    for _ in 0..2 {
        let mut store = open_store(StoreKind::Sqlite, &path, 10).await.unwrap();
        let driver = CrawlDriver::new(client_for(&server), run_config(&data.path().join("pdfs"), false));
        driver.run(store.as_mut()).await.unwrap();
    }

    detail_page.assert_async().await;
    let store = open_store(StoreKind::Sqlite, &path, 10).await.unwrap();
    assert_eq!(store.records().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mut server = Server::new_async().await;
    let data = TempDir::new().unwrap();
    let path = store_path(StoreKind::Json, data.path());

    let _warm = landing(&mut server).create_async().await;
    let failing = server
        .mock("GET", "/processos")
        .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
        .with_status(502)
        .expect(1)
        .create_async()
        .await;
    let recovered = search_page(&mut server, 1, &results(&[entry(140600, "PLL 2/25")], &[]))
        .expect(1)
        .create_async()
        .await;
    let _page2 = search_page(&mut server, 2, &results(&[], &[])).create_async().await;
    let _detail = record(&mut server, 140600).create_async().await;

    let mut store = open_store(StoreKind::Json, &path, 10).await.unwrap();
    let driver = CrawlDriver::new(client_for(&server), run_config(&data.path().join("pdfs"), false));
    let summary = driver.run(store.as_mut()).await.unwrap();

    failing.assert_async().await;
    recovered.assert_async().await;
    assert_eq!(summary.page_failures, 0);
    assert_eq!(summary.committed, 1);
}

#[tokio::test]
async fn test_empty_page_body_is_a_failure_not_the_end() {
    let mut server = Server::new_async().await;
    let data = TempDir::new().unwrap();
    let path = store_path(StoreKind::Json, data.path());

    let _warm = landing(&mut server).create_async().await;
    let _page1 = search_page(&mut server, 1, "   ").create_async().await;
    let _page2 = search_page(&mut server, 2, &results(&[entry(140600, "PLL 2/25")], &[])).create_async().await;
    let _page3 = search_page(&mut server, 3, &results(&[], &[])).create_async().await;
    let _detail = record(&mut server, 140600).create_async().await;

    let mut store = open_store(StoreKind::Json, &path, 10).await.unwrap();
    let driver = CrawlDriver::new(client_for(&server), run_config(&data.path().join("pdfs"), false));
    let summary = driver.run(store.as_mut()).await.unwrap();

    assert_eq!(summary.page_failures, 1);
    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(summary.committed, 1);
    assert!(summary.exhausted);
}

#[tokio::test]
async fn test_warm_up_failure_is_fatal() {
    let mut server = Server::new_async().await;
    let data = TempDir::new().unwrap();
    let path = store_path(StoreKind::Json, data.path());

    let _warm = server
        .mock("GET", "/projetos")
        .with_status(403)
        .create_async()
        .await;
    let search = server
        .mock("GET", "/processos")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let mut store = open_store(StoreKind::Json, &path, 10).await.unwrap();
    let driver = CrawlDriver::new(client_for(&server), run_config(&data.path().join("pdfs"), false));
    assert!(driver.run(store.as_mut()).await.is_err());
    search.assert_async().await;
}

#[tokio::test]
async fn test_documents_downloaded_once() {
    let mut server = Server::new_async().await;
    let data = TempDir::new().unwrap();
    let docs = data.path().join("pdfs");

    let _warm = landing(&mut server).create_async().await;
    let _page1 = search_page(&mut server, 1, &results(&[entry(140600, "PLL 2/25")], &[])).create_async().await;
    let _page2 = search_page(&mut server, 2, &results(&[], &[])).create_async().await;
    let _detail = record(&mut server, 140600).create_async().await;
    let pdf = server
        .mock("GET", "/processos/140600/documentos/proj.pdf")
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .with_body(b"%PDF-1.7 fake")
        .expect(1)
        .create_async()
        .await;

    // first run downloads into a fresh JSON store
    let path = store_path(StoreKind::Json, data.path());
    let mut store = open_store(StoreKind::Json, &path, 10).await.unwrap();
    let driver = CrawlDriver::new(client_for(&server), run_config(&docs, true));
    driver.run(store.as_mut()).await.unwrap();

    let expected = docs.join("140600").join("Projeto Texto Inicial.pdf");
    assert_eq!(std::fs::read(&expected).unwrap(), b"%PDF-1.7 fake");
    assert!(!docs.join("140600").join("Projeto Texto Inicial.pdf.part").exists());

    let records = store.records().await.unwrap();
    assert_eq!(records[0].files[0].local_path.as_deref(), Some(expected.as_path()));

    // a second store re-extracts the bill but finds the file already on disk
    let other = store_path(StoreKind::Sqlite, data.path());
    let mut store = open_store(StoreKind::Sqlite, &other, 10).await.unwrap();
    let driver = CrawlDriver::new(client_for(&server), run_config(&docs, true));
    driver.run(store.as_mut()).await.unwrap();

    pdf.assert_async().await;
}

#[tokio::test]
async fn test_download_failure_leaves_no_partial_file() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let _missing = server
        .mock("GET", "/processos/1/documentos/x.pdf")
        .with_status(404)
        .create_async()
        .await;

    let client = client_for(&server);
    let dest = dir.path().join("x.pdf");
    let url = format!("{}/processos/1/documentos/x.pdf", server.url());
    assert!(client.download(&url, &dest).await.is_err());
    assert!(!dest.exists());
    assert!(!dir.path().join("x.pdf.part").exists());
}
