use colored::*;
use comfy_table::{Cell, Color, ContentArrangement, Table};

use crate::api::types::{keys, ScrapedRecord};
use crate::cli::OutputFormat;
use crate::crawl::RunSummary;
use crate::error::{HarvestError, Result};
use crate::summary::{BillSummary, SupportedPoint};

const RECORD_HEADERS: [&str; 7] = ["ID", "Processo", "Projeto", "Situação", "Abertura", "Autores", "Anexos"];

pub struct Formatter {
    format: OutputFormat,
}

/// One listing row, shared by the tabular formats.
struct RecordRow {
    id: String,
    processo: String,
    projeto: String,
    situacao: String,
    abertura: String,
    autores: String,
    anexos: String,
}

impl RecordRow {
    fn from_record(record: &ScrapedRecord) -> Self {
        let metadata = &record.metadata;
        let authors: Vec<String> = metadata.authors().into_iter().map(|a| a.name).collect();
        let downloaded = record.files.iter().filter(|f| f.local_path.is_some()).count();

        Self {
            id: record.external_id.to_string(),
            processo: metadata.processing_number().unwrap_or("-").to_string(),
            projeto: metadata.get(keys::PROJETO).unwrap_or("-").to_string(),
            situacao: metadata.status().unwrap_or("-").to_string(),
            abertura: metadata
                .opening_date()
                .map(|d| d.format("%d/%m/%Y").to_string())
                .unwrap_or_else(|| "-".to_string()),
            autores: if authors.is_empty() { "-".to_string() } else { authors.join(", ") },
            anexos: format!("{}/{}", downloaded, record.files.len()),
        }
    }

    fn cells(&self) -> [&str; 7] {
        [
            &self.id,
            &self.processo,
            &self.projeto,
            &self.situacao,
            &self.abertura,
            &self.autores,
            &self.anexos,
        ]
    }
}

impl Formatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Format stored records
    pub fn format_records(&self, records: &[ScrapedRecord]) -> Result<String> {
        match self.format {
            OutputFormat::Table => self.format_records_table(records),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(records)?),
            OutputFormat::Markdown => self.format_records_markdown(records),
            OutputFormat::Csv => self.format_records_csv(records),
        }
    }

    /// Format the outcome of a crawl run
    pub fn format_run_summary(&self, summary: &RunSummary) -> Result<String> {
        let rows = [
            ("Pages fetched", summary.pages_fetched.to_string()),
            ("Page failures", summary.page_failures.to_string()),
            ("End of results", yes_no(summary.exhausted).to_string()),
            ("New records found", summary.discovered.to_string()),
            ("Committed", summary.committed.to_string()),
            ("Duplicates", summary.duplicates.to_string()),
            ("Failed", summary.failed.to_string()),
            ("Interrupted", yes_no(summary.interrupted).to_string()),
        ];

        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(summary)?),
            OutputFormat::Table => {
                let mut table = Table::new();
                table.set_header(vec![
                    Cell::new("Run").fg(Color::Cyan),
                    Cell::new("Count").fg(Color::Cyan),
                ]);
                for (label, value) in &rows {
                    table.add_row(vec![Cell::new(label), Cell::new(value)]);
                }
                let status = if summary.interrupted {
                    "⚠️  Interrupted, progress saved".yellow()
                } else {
                    "✅ Done".green()
                };
                Ok(format!("\n{}\n\n{}", status, table))
            }
            OutputFormat::Markdown => {
                let mut md = String::from("| Run | Count |\n|-----|-------|\n");
                for (label, value) in &rows {
                    md.push_str(&format!("| {} | {} |\n", label, value));
                }
                Ok(md)
            }
            OutputFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                wtr.write_record(["metric", "value"])?;
                for (label, value) in &rows {
                    wtr.write_record([*label, value.as_str()])?;
                }
                finish_csv(wtr)
            }
        }
    }

    /// Format a bill summary
    pub fn format_bill_summary(&self, summary: &BillSummary) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(summary)?),
            OutputFormat::Markdown => Ok(bill_summary_markdown(summary)),
            OutputFormat::Table => {
                let mut result = String::new();
                result.push_str(&format!("\n{} {}\n", "📜".cyan(), summary.titulo.bold()));
                result.push_str(&"=".repeat(80));
                result.push('\n');
                result.push_str(&summary.resumo);
                result.push('\n');

                push_points(&mut result, "O que muda", &summary.mudancas);
                push_points(&mut result, "Por quê", &summary.justificativas);

                if !summary.categorias.is_empty() {
                    let names: Vec<String> = summary.categories().map(|c| c.to_string()).collect();
                    result.push_str(&format!("\n{} {}\n", "🏷️".cyan(), names.join(" · ").yellow()));
                }
                Ok(result)
            }
            OutputFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                wtr.write_record(["secao", "texto", "trechos"])?;
                wtr.write_record(["titulo", summary.titulo.as_str(), ""])?;
                wtr.write_record(["resumo", summary.resumo.as_str(), ""])?;
                let sections = [("mudanca", &summary.mudancas), ("justificativa", &summary.justificativas)];
                for (section, points) in sections {
                    for point in points {
                        let excerpts = point.trechos_originais.join(" | ");
                        wtr.write_record([section, point.texto_simplificado.as_str(), excerpts.as_str()])?;
                    }
                }
                for tag in &summary.categorias {
                    let excerpts = tag.trechos_originais.join(" | ");
                    wtr.write_record(["categoria", tag.nome.label(), excerpts.as_str()])?;
                }
                finish_csv(wtr)
            }
        }
    }

    fn format_records_table(&self, records: &[ScrapedRecord]) -> Result<String> {
        let mut table = Table::new();

        table.set_header(
            RECORD_HEADERS
                .iter()
                .map(|h| Cell::new(h).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );

        for record in records {
            let row = RecordRow::from_record(record);
            let cells = row.cells();
            table.add_row(vec![
                Cell::new(cells[0]),
                Cell::new(cells[1]),
                Cell::new(cells[2]),
                Cell::new(truncate_string(cells[3], 24)),
                Cell::new(cells[4]),
                Cell::new(truncate_string(cells[5], 40)),
                Cell::new(cells[6]),
            ]);
        }

        table.set_content_arrangement(ContentArrangement::Dynamic);

        let mut result = String::new();
        result.push_str(&format!(
            "\n{} Records: {}\n\n",
            "📊".cyan(),
            records.len().to_string().yellow()
        ));
        result.push_str(&table.to_string());

        Ok(result)
    }

    fn format_records_markdown(&self, records: &[ScrapedRecord]) -> Result<String> {
        let mut md = String::new();
        md.push_str(&format!("| {} |\n", RECORD_HEADERS.join(" | ")));
        md.push_str(&format!("|{}\n", "-----|".repeat(RECORD_HEADERS.len())));

        for record in records {
            let row = RecordRow::from_record(record);
            let cells: Vec<String> = row.cells().iter().map(|c| escape_markdown(c)).collect();
            md.push_str(&format!("| {} |\n", cells.join(" | ")));
        }

        Ok(md)
    }

    fn format_records_csv(&self, records: &[ScrapedRecord]) -> Result<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.write_record(RECORD_HEADERS)?;

        for record in records {
            let row = RecordRow::from_record(record);
            wtr.write_record(row.cells())?;
        }

        finish_csv(wtr)
    }
}

fn finish_csv(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().map_err(|e| HarvestError::Other(e.to_string()))?;

    // Add BOM for Excel compatibility
    let mut result = vec![0xEF, 0xBB, 0xBF];
    result.extend_from_slice(&data);

    String::from_utf8(result).map_err(|e| HarvestError::Other(e.to_string()))
}

fn push_points(out: &mut String, heading: &str, points: &[SupportedPoint]) {
    if points.is_empty() {
        return;
    }
    out.push_str(&format!("\n{}\n", heading.bold()));
    for point in points {
        out.push_str(&format!("  • {}\n", point.texto_simplificado));
        for excerpt in &point.trechos_originais {
            out.push_str(&format!("      \"{}\"\n", excerpt.dimmed()));
        }
    }
}

fn bill_summary_markdown(summary: &BillSummary) -> String {
    let mut md = format!("# {}\n\n{}\n", summary.titulo, summary.resumo);

    for (heading, points) in [("O que muda", &summary.mudancas), ("Por quê", &summary.justificativas)] {
        if points.is_empty() {
            continue;
        }
        md.push_str(&format!("\n## {}\n\n", heading));
        for point in points {
            md.push_str(&format!("- {}\n", point.texto_simplificado));
            for excerpt in &point.trechos_originais {
                md.push_str(&format!("  > {}\n", excerpt));
            }
        }
    }

    if !summary.categorias.is_empty() {
        let names: Vec<String> = summary.categories().map(|c| c.to_string()).collect();
        md.push_str(&format!("\n**Categorias:** {}\n", names.join(", ")));
    }
    md
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

// Helper functions
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

fn escape_markdown(s: &str) -> String {
    s.replace('|', "\\|").replace('*', "\\*").replace('_', "\\_")
}
