use crate::{
    entities::produto,
    errors::ServiceError,
    services::{MovementLedgerService, ProductCatalogService},
    stock::{self, MonthlyTotals},
};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Product under its minimum stock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StockAlert {
    pub id: Uuid,
    pub nome: String,
    pub quantidade_estoque: i32,
    pub estoque_minimo: i32,
    #[schema(example = "3 / 10 unidades")]
    pub rotulo: String,
}

impl From<&produto::Model> for StockAlert {
    fn from(product: &produto::Model) -> Self {
        Self {
            id: product.id,
            nome: product.nome.clone(),
            quantidade_estoque: product.quantidade_estoque,
            estoque_minimo: product.estoque_minimo,
            rotulo: stock::stock_label(product.quantidade_estoque, product.estoque_minimo),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DashboardSummary {
    pub total_produtos: u64,
    pub abaixo_minimo: u64,
    pub entradas_mes: i64,
    pub saidas_mes: i64,
    /// Start of the month the totals cover
    pub mes_inicio: DateTime<Utc>,
    pub alertas: Vec<StockAlert>,
}

impl DashboardSummary {
    /// Derives every figure from the rows; no store access
    pub fn compute(
        products: &[produto::Model],
        totals: MonthlyTotals,
        mes_inicio: DateTime<Utc>,
    ) -> Self {
        let alertas: Vec<StockAlert> = stock::below_minimum(products)
            .into_iter()
            .map(StockAlert::from)
            .collect();

        Self {
            total_produtos: products.len() as u64,
            abaixo_minimo: alertas.len() as u64,
            entradas_mes: totals.entradas,
            saidas_mes: totals.saidas,
            mes_inicio,
            alertas,
        }
    }
}

/// Dashboard figures, recomputed from scratch on every call
#[derive(Clone)]
pub struct DashboardService {
    catalog: ProductCatalogService,
    ledger: MovementLedgerService,
    reporting_offset: FixedOffset,
}

impl DashboardService {
    pub fn new(
        catalog: ProductCatalogService,
        ledger: MovementLedgerService,
        reporting_offset: FixedOffset,
    ) -> Self {
        Self {
            catalog,
            ledger,
            reporting_offset,
        }
    }

    #[instrument(skip(self))]
    pub async fn dashboard_summary(&self) -> Result<DashboardSummary, ServiceError> {
        self.summary_at(Utc::now()).await
    }

    /// Summary as of `now`. Movements count when created in `[month_start, now]`,
    /// with the month read in the reporting offset.
    pub async fn summary_at(&self, now: DateTime<Utc>) -> Result<DashboardSummary, ServiceError> {
        let since = stock::month_start(now, self.reporting_offset);
        let (products, movements) = futures::try_join!(
            self.catalog.list_products(),
            self.ledger.movements_between(since, now)
        )?;

        let totals = MonthlyTotals::from_movements(&movements);
        debug!(
            products = products.len(),
            movements = movements.len(),
            since = %since,
            "dashboard figures computed"
        );
        Ok(DashboardSummary::compute(&products, totals, since))
    }
}
