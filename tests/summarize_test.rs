use mockito::{Matcher, Server};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use vozcivica::api::GeminiClient;
use vozcivica::cli::commands::summarize::summarize_file;
use vozcivica::error::HarvestError;
use vozcivica::summary::{BillSummary, Category, Summarizer};

const MODEL: &str = "gemini-test";
const ENDPOINT: &str = "/v1beta/models/gemini-test:generateContent";

fn answer() -> String {
    json!({
        "titulo": "Semana da bicicleta",
        "resumo": "Inclui no calendário oficial de Porto Alegre a Semana Municipal da Bicicleta.",
        "mudancas": [{
            "texto_simplificado": "A cidade passa a ter uma semana dedicada à bicicleta.",
            "trechos_originais": ["Fica instituída a Semana Municipal da Bicicleta"]
        }],
        "justificativas": [{
            "texto_simplificado": "Incentivar o transporte ativo.",
            "trechos_originais": ["estimular o uso da bicicleta"]
        }],
        "categorias": [
            {"nome": "Transporte", "trechos_originais": ["uso da bicicleta"]},
            {"nome": "Homenagens/Datas Comemorativas", "trechos_originais": ["calendário oficial"]}
        ]
    })
    .to_string()
}

fn envelope(text: &str) -> String {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
    .to_string()
}

fn client(server: &mockito::ServerGuard) -> GeminiClient {
    GeminiClient::new("test-key".to_string(), MODEL.to_string(), server.url(), 5).unwrap()
}

#[tokio::test]
async fn test_summary_request_and_decode() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", ENDPOINT)
        .match_header("x-goog-api-key", "test-key")
        .match_body(Matcher::PartialJson(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "Art. 1º Fica instituída..." }] }],
            "generationConfig": { "responseMimeType": "application/json" }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(envelope(&answer()))
        .create_async()
        .await;

    let summary = client(&server).summarize("Art. 1º Fica instituída...").await.unwrap();

    mock.assert_async().await;
    assert_eq!(summary.titulo, "Semana da bicicleta");
    assert_eq!(summary.mudancas.len(), 1);
    assert_eq!(
        summary.categories().collect::<Vec<_>>(),
        vec![Category::Transporte, Category::Homenagens]
    );
}

#[tokio::test]
async fn test_request_carries_schema_and_prompt() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", ENDPOINT)
        .match_body(Matcher::PartialJson(json!({
            "generationConfig": {
                "responseSchema": {
                    "type": "OBJECT",
                    "required": ["titulo", "resumo", "mudancas", "justificativas", "categorias"]
                }
            }
        })))
        .with_status(200)
        .with_body(envelope(&answer()))
        .create_async()
        .await;

    client(&server).summarize("texto").await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_off_schema_answer_is_decode_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", ENDPOINT)
        .with_status(200)
        .with_body(envelope(r#"{"titulo": "x", "resumo": "y", "categorias": [{"nome": "Astrologia", "trechos_originais": []}]}"#))
        .create_async()
        .await;

    let result = client(&server).summarize("texto").await;
    assert!(matches!(result, Err(HarvestError::SummaryDecode(_))));
}

#[tokio::test]
async fn test_rate_limit_maps_to_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", ENDPOINT)
        .with_status(429)
        .create_async()
        .await;

    let result = client(&server).summarize("texto").await;
    assert!(matches!(result, Err(HarvestError::RateLimit)));
}

#[tokio::test]
async fn test_blank_text_is_not_sent() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", ENDPOINT)
        .expect(0)
        .create_async()
        .await;

    let result = client(&server).summarize("  \n ").await;
    assert!(matches!(result, Err(HarvestError::InvalidInput(_))));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_summarize_file_against_server() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", ENDPOINT)
        .with_status(200)
        .with_body(envelope(&answer()))
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("pll-0042-25.txt");
    std::fs::write(&input, "Fica instituída a Semana Municipal da Bicicleta").unwrap();

    let (path, summary) = summarize_file(&client(&server), &input, None).await.unwrap();

    assert_eq!(path, dir.path().join("pll-0042-25.summary.json"));
    let stored: BillSummary = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(stored, summary);
}
