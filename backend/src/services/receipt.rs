//! Settlement receipts
//!
//! A receipt is a CSV document listing every sold item of a settlement
//! followed by the totals. Rendering is an explicit follow-up action; the
//! settlement only stores the resulting URL and content digest.

use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use shared::SettlementDetails;

use crate::error::{AppError, AppResult};

/// A rendered receipt and where it can be fetched from
#[derive(Debug, Clone)]
pub struct RenderedReceipt {
    pub bytes: Vec<u8>,
    pub url: String,
}

impl RenderedReceipt {
    /// Hex-encoded SHA-256 of the document bytes
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

/// Produces and stores receipt documents
#[async_trait]
pub trait ReceiptRenderer: Send + Sync {
    async fn render(&self, details: &SettlementDetails) -> AppResult<RenderedReceipt>;
}

/// Writes CSV receipts to a local directory
#[derive(Debug, Clone)]
pub struct CsvReceiptRenderer {
    output_dir: PathBuf,
    public_base_url: String,
}

impl CsvReceiptRenderer {
    pub fn new(output_dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            public_base_url: public_base_url.into(),
        }
    }

    fn file_name(details: &SettlementDetails) -> String {
        format!("acerto-{}.csv", details.settlement.id)
    }
}

#[async_trait]
impl ReceiptRenderer for CsvReceiptRenderer {
    async fn render(&self, details: &SettlementDetails) -> AppResult<RenderedReceipt> {
        let bytes = render_csv(details)?;
        let file_name = Self::file_name(details);

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| AppError::Storage(format!("Cannot create receipt directory: {}", e)))?;
        tokio::fs::write(self.output_dir.join(&file_name), &bytes)
            .await
            .map_err(|e| AppError::Storage(format!("Cannot write receipt: {}", e)))?;

        Ok(RenderedReceipt {
            bytes,
            url: format!(
                "{}/{}",
                self.public_base_url.trim_end_matches('/'),
                file_name
            ),
        })
    }
}

/// Render the receipt document without touching the filesystem
pub fn render_csv(details: &SettlementDetails) -> AppResult<Vec<u8>> {
    let settlement = &details.settlement;
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(vec![]);

    let next_date = settlement
        .next_settlement_date
        .map(|d| d.to_string())
        .unwrap_or_default();
    write_pair(&mut wtr, "acerto", &settlement.id.to_string())?;
    write_pair(&mut wtr, "maleta", &settlement.suitcase_id.to_string())?;
    write_pair(&mut wtr, "vendedor", &settlement.seller_id.to_string())?;
    write_pair(&mut wtr, "data", &settlement.settlement_date.to_string())?;
    write_pair(&mut wtr, "proximo_acerto", &next_date)?;

    wtr.write_record([
        "item",
        "produto",
        "quantidade",
        "preco",
        "cliente",
        "pagamento",
    ])
    .map_err(csv_error)?;
    for record in details.sold_items.iter().filter(|r| r.voided_at.is_none()) {
        wtr.write_record([
            record.suitcase_item_id.to_string(),
            record.inventory_id.to_string(),
            record.quantity.to_string(),
            record.price.to_string(),
            record.customer_name.clone().unwrap_or_default(),
            record.payment_method.clone().unwrap_or_default(),
        ])
        .map_err(csv_error)?;
    }

    write_pair(&mut wtr, "total_vendas", &settlement.total_sales.to_string())?;
    write_pair(&mut wtr, "comissao", &settlement.commission_amount.to_string())?;

    wtr.into_inner()
        .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))
}

fn write_pair(wtr: &mut csv::Writer<Vec<u8>>, key: &str, value: &str) -> AppResult<()> {
    wtr.write_record([key, value]).map_err(csv_error)
}

fn csv_error(e: csv::Error) -> AppError {
    AppError::Internal(format!("CSV serialization error: {}", e))
}
