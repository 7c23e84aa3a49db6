//! Plain-language summaries of bill text.
//!
//! The summarizer receives text that was already extracted from a bill's
//! documents and answers with a [`BillSummary`]. Anything the model returns
//! that does not fit the schema is a [`HarvestError::SummaryDecode`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::error::{HarvestError, Result};

/// Instruction sent with every request.
pub const SYSTEM_PROMPT: &str = "\
Você é especialista em Linguagem Simples e em comunicação legislativa para o cidadão comum.
Traduza o Projeto de Lei da Câmara Municipal de Porto Alegre recebido, sem juridiquês, \
focando no efeito prático na vida das pessoas.

Regras de redação:
1. Comece cada frase pela ação (\"Cria um auxílio...\"), nunca por \"O projeto propõe\" ou \"Trata-se de\".
2. Troque termos técnicos por palavras do dia a dia: \"revoga\" vira \"cancela\", \"dotação\" vira \"dinheiro\".
3. Seja neutro. Atribua os argumentos ao autor (\"Segundo o autor...\").
4. Responda à pergunta: o que muda na vida de quem mora na cidade se isto for aprovado?
5. Para cada ponto, copie os trechos exatos do texto original que o sustentam.

Se o projeto for só uma homenagem, nome de rua ou data comemorativa, diga isso e seja breve.
";

/// Thematic category, exactly as published in the schema enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Saúde")]
    Saude,
    #[serde(rename = "Educação")]
    Educacao,
    #[serde(rename = "Transporte")]
    Transporte,
    #[serde(rename = "Segurança")]
    Seguranca,
    #[serde(rename = "Assistência Social")]
    AssistenciaSocial,
    #[serde(rename = "Urbanismo")]
    Urbanismo,
    #[serde(rename = "Meio Ambiente")]
    MeioAmbiente,
    #[serde(rename = "Causa Animal")]
    CausaAnimal,
    #[serde(rename = "Cultura e Turismo")]
    CulturaTurismo,
    #[serde(rename = "Esporte e Lazer")]
    EsporteLazer,
    #[serde(rename = "Direitos Humanos")]
    DireitosHumanos,
    #[serde(rename = "Ciência e Tecnologia")]
    CienciaTecnologia,
    #[serde(rename = "Orçamento e Finanças")]
    OrcamentoFinancas,
    #[serde(rename = "Servidor Público")]
    ServidorPublico,
    #[serde(rename = "Homenagens/Datas Comemorativas")]
    Homenagens,
    #[serde(rename = "Administração Pública")]
    AdministracaoPublica,
}

impl Category {
    pub const ALL: [Category; 16] = [
        Category::Saude,
        Category::Educacao,
        Category::Transporte,
        Category::Seguranca,
        Category::AssistenciaSocial,
        Category::Urbanismo,
        Category::MeioAmbiente,
        Category::CausaAnimal,
        Category::CulturaTurismo,
        Category::EsporteLazer,
        Category::DireitosHumanos,
        Category::CienciaTecnologia,
        Category::OrcamentoFinancas,
        Category::ServidorPublico,
        Category::Homenagens,
        Category::AdministracaoPublica,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Saude => "Saúde",
            Category::Educacao => "Educação",
            Category::Transporte => "Transporte",
            Category::Seguranca => "Segurança",
            Category::AssistenciaSocial => "Assistência Social",
            Category::Urbanismo => "Urbanismo",
            Category::MeioAmbiente => "Meio Ambiente",
            Category::CausaAnimal => "Causa Animal",
            Category::CulturaTurismo => "Cultura e Turismo",
            Category::EsporteLazer => "Esporte e Lazer",
            Category::DireitosHumanos => "Direitos Humanos",
            Category::CienciaTecnologia => "Ciência e Tecnologia",
            Category::OrcamentoFinancas => "Orçamento e Finanças",
            Category::ServidorPublico => "Servidor Público",
            Category::Homenagens => "Homenagens/Datas Comemorativas",
            Category::AdministracaoPublica => "Administração Pública",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A plain-language point backed by excerpts of the original text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupportedPoint {
    pub texto_simplificado: String,
    pub trechos_originais: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryTag {
    pub nome: Category,
    pub trechos_originais: Vec<String>,
}

/// Structured summary of one bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BillSummary {
    /// Short headline, at most about ten words.
    pub titulo: String,
    /// One sentence starting with the verb.
    pub resumo: String,
    pub mudancas: Vec<SupportedPoint>,
    pub justificativas: Vec<SupportedPoint>,
    pub categorias: Vec<CategoryTag>,
}

impl BillSummary {
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.categorias.iter().map(|c| c.nome)
    }
}

/// Something that turns bill text into a [`BillSummary`].
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<BillSummary>;
}

fn supported_point_schema(point: &str, excerpts: &str) -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "texto_simplificado": { "type": "STRING", "description": point },
            "trechos_originais": {
                "type": "ARRAY",
                "description": excerpts,
                "items": { "type": "STRING" }
            }
        },
        "required": ["texto_simplificado", "trechos_originais"]
    })
}

/// Response schema in the OpenAPI subset accepted by `generateContent`.
pub fn response_schema() -> Value {
    let categories: Vec<&str> = Category::ALL.iter().map(Category::label).collect();

    json!({
        "type": "OBJECT",
        "properties": {
            "titulo": {
                "type": "STRING",
                "description": "Título curto (no máximo 10 palavras) explicando o projeto."
            },
            "resumo": {
                "type": "STRING",
                "description": "Uma frase simples com o objetivo central, começando pelo verbo (Cria, Proíbe, Autoriza)."
            },
            "mudancas": {
                "type": "ARRAY",
                "description": "Mudanças práticas propostas.",
                "items": supported_point_schema(
                    "A mudança em linguagem simples.",
                    "Trechos exatos da lei que sustentam a mudança."
                )
            },
            "justificativas": {
                "type": "ARRAY",
                "description": "Principais argumentos do autor.",
                "items": supported_point_schema(
                    "O argumento do autor em linguagem simples.",
                    "Trechos exatos da justificativa original."
                )
            },
            "categorias": {
                "type": "ARRAY",
                "description": "Categorias temáticas do projeto, com evidências no texto.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "nome": { "type": "STRING", "enum": categories },
                        "trechos_originais": {
                            "type": "ARRAY",
                            "description": "Trechos que justificam a categoria.",
                            "items": { "type": "STRING" }
                        }
                    },
                    "required": ["nome", "trechos_originais"]
                }
            }
        },
        "required": ["titulo", "resumo", "mudancas", "justificativas", "categorias"]
    })
}

/// Decode the model's answer, tolerating a surrounding Markdown code fence.
pub fn decode_summary(raw: &str) -> Result<BillSummary> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let summary: BillSummary =
        serde_json::from_str(body).map_err(|e| HarvestError::SummaryDecode(e.to_string()))?;

    if summary.titulo.trim().is_empty() || summary.resumo.trim().is_empty() {
        return Err(HarvestError::SummaryDecode("empty titulo or resumo".to_string()));
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ANSWER: &str = r#"{
        "titulo": "Auxílio para mães atípicas",
        "resumo": "Cria um auxílio financeiro para mães de pessoas com autismo.",
        "mudancas": [
            {"texto_simplificado": "Mães recebem um auxílio mensal.", "trechos_originais": ["Art. 1º Fica instituído..."]}
        ],
        "justificativas": [],
        "categorias": [
            {"nome": "Assistência Social", "trechos_originais": ["mães atípicas"]},
            {"nome": "Homenagens/Datas Comemorativas", "trechos_originais": []}
        ]
    }"#;

    #[test]
    fn test_decode_conforming_answer() {
        let summary = decode_summary(ANSWER).unwrap();
        assert_eq!(summary.titulo, "Auxílio para mães atípicas");
        assert_eq!(
            summary.categories().collect::<Vec<_>>(),
            vec![Category::AssistenciaSocial, Category::Homenagens]
        );
    }

    #[test]
    fn test_decode_fenced_answer() {
        let fenced = format!("```json\n{}\n```", ANSWER);
        assert!(decode_summary(&fenced).is_ok());
    }

    #[test]
    fn test_unknown_category_is_decode_error() {
        let bad = ANSWER.replace("Assistência Social", "Habitação");
        assert!(matches!(decode_summary(&bad), Err(HarvestError::SummaryDecode(_))));
    }

    #[test]
    fn test_missing_field_is_decode_error() {
        let bad = r#"{"titulo": "x", "resumo": "y", "mudancas": []}"#;
        assert!(matches!(decode_summary(bad), Err(HarvestError::SummaryDecode(_))));
        assert!(matches!(decode_summary("not json"), Err(HarvestError::SummaryDecode(_))));
    }

    #[test]
    fn test_schema_enum_matches_category_labels() {
        let schema = response_schema();
        let names = schema["properties"]["categorias"]["items"]["properties"]["nome"]["enum"]
            .as_array()
            .unwrap();
        assert_eq!(names.len(), 16);
        for (value, category) in names.iter().zip(Category::ALL) {
            let decoded: Category = serde_json::from_value(value.clone()).unwrap();
            assert_eq!(decoded, category);
        }
    }
}
